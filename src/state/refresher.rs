use crate::state::channel::ChannelEvent;
use crate::state::messages::{RefreshTarget, UiEvent};
use log::warn;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;

pub const SUGGESTIONS_INTERVAL: Duration = Duration::from_secs(10);
pub const CHAT_INTERVAL: Duration = Duration::from_secs(8);

/// Periodic pulls: suggestions every 10 seconds, chat every 8.
/// Whether a pull is actually made is decided by the receiver.
pub struct PeriodicRefresher {
    ui_events: mpsc::Sender<UiEvent>,
    suggestions_every: Duration,
    chat_every: Duration,
}

impl PeriodicRefresher {
    pub fn new(ui_events: mpsc::Sender<UiEvent>) -> Self {
        Self {
            ui_events,
            suggestions_every: SUGGESTIONS_INTERVAL,
            chat_every: CHAT_INTERVAL,
        }
    }

    pub async fn run(self) {
        let mut suggestions = interval(self.suggestions_every);
        let mut chat = interval(self.chat_every);
        // Skip the immediate first ticks so startup loading isn't double-triggered.
        suggestions.tick().await;
        chat.tick().await;

        loop {
            let target = tokio::select! {
                _ = suggestions.tick() => RefreshTarget::Suggestions,
                _ = chat.tick() => RefreshTarget::Chat,
            };
            if self.ui_events.send(UiEvent::RefreshDue(target)).await.is_err() {
                break;
            }
        }
    }
}

/// Turns suggestion cues from the push channel into pull requests.
/// Push payloads are never trusted for this feed.
pub struct SuggestionsCue {
    channel: broadcast::Receiver<ChannelEvent>,
    ui_events: mpsc::Sender<UiEvent>,
}

impl SuggestionsCue {
    pub fn new(channel: broadcast::Receiver<ChannelEvent>, ui_events: mpsc::Sender<UiEvent>) -> Self {
        Self { channel, ui_events }
    }

    pub async fn run(mut self) {
        loop {
            match self.channel.recv().await {
                Ok(ChannelEvent::SuggestionsInvalidated) => {
                    let due = UiEvent::RefreshDue(RefreshTarget::Suggestions);
                    if self.ui_events.send(due).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Cues are idempotent; one pull covers any number missed.
                    warn!("suggestion cue lagged by {skipped}");
                    let _ = self
                        .ui_events
                        .send(UiEvent::RefreshDue(RefreshTarget::Suggestions))
                        .await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test]
    async fn push_cue_becomes_a_suggestions_pull() {
        let (channel_tx, channel_rx) = broadcast::channel(8);
        let (ui_tx, mut ui_rx) = mpsc::channel(8);
        tokio::spawn(SuggestionsCue::new(channel_rx, ui_tx).run());

        channel_tx
            .send(ChannelEvent::ScoreCorrected { goals_for: 1, goals_against: 0 })
            .unwrap();
        channel_tx.send(ChannelEvent::SuggestionsInvalidated).unwrap();

        let event = timeout(Duration::from_secs(2), ui_rx.recv()).await.unwrap();
        assert!(matches!(event, Some(UiEvent::RefreshDue(RefreshTarget::Suggestions))));
        assert!(ui_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn refresher_emits_both_targets() {
        let (ui_tx, mut ui_rx) = mpsc::channel(8);
        let refresher = PeriodicRefresher {
            ui_events: ui_tx,
            suggestions_every: Duration::from_millis(10),
            chat_every: Duration::from_millis(15),
        };
        tokio::spawn(refresher.run());

        let mut seen = Vec::new();
        while seen.len() < 2 {
            let event = timeout(Duration::from_secs(2), ui_rx.recv())
                .await
                .expect("refresher went quiet");
            if let Some(UiEvent::RefreshDue(target)) = event
                && !seen.contains(&target)
            {
                seen.push(target);
            }
        }
        assert!(seen.contains(&RefreshTarget::Chat));
        assert!(seen.contains(&RefreshTarget::Suggestions));
    }
}
