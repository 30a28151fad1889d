use crate::session::MatchPhase;
use log::debug;
use matchday_api::{ChatMessage, MessageId, Suggestion};
use std::collections::HashSet;

pub const CHAT_HISTORY_LIMIT: usize = 200;

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Chat history, deduplicated by id and ordered by (timestamp, id).
#[derive(Debug)]
pub struct ChatFeed {
    messages: Vec<ChatMessage>,
    /// Every id ever merged, including ones trimmed from `messages`.
    seen: HashSet<MessageId>,
    limit: usize,
}

impl Default for ChatFeed {
    fn default() -> Self {
        Self::with_limit(CHAT_HISTORY_LIMIT)
    }
}

impl ChatFeed {
    pub fn with_limit(limit: usize) -> Self {
        Self { messages: Vec::new(), seen: HashSet::new(), limit: limit.max(1) }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Insert unseen messages. Returns how many were added.
    pub fn merge_chat(&mut self, incoming: impl IntoIterator<Item = ChatMessage>) -> usize {
        let before = self.messages.len();
        for message in incoming {
            if self.seen.insert(message.id.clone()) {
                self.messages.push(message);
            }
        }
        let added = self.messages.len() - before;
        if added == 0 {
            return 0;
        }

        self.messages
            .sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        if self.messages.len() > self.limit {
            let excess = self.messages.len() - self.limit;
            self.messages.drain(..excess);
        }
        added
    }
}

// ---------------------------------------------------------------------------
// Suggestions
// ---------------------------------------------------------------------------

/// Proof that a pull was started while suggestions were live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullTicket {
    epoch: u64,
}

/// Live suggestions. Each pull replaces the whole set.
///
/// Leaving the live phases clears the set and moves to a new epoch, so a
/// pull started before that cannot repopulate it.
#[derive(Debug, Default)]
pub struct SuggestionFeed {
    items: Vec<Suggestion>,
    phase: MatchPhase,
    epoch: u64,
    in_flight: bool,
}

impl SuggestionFeed {
    pub fn items(&self) -> &[Suggestion] {
        &self.items
    }

    pub fn is_active(&self) -> bool {
        self.phase.is_half()
    }

    pub fn is_pulling(&self) -> bool {
        self.in_flight
    }

    /// `None` when no pull should be made in the current phase.
    pub fn begin_pull(&mut self) -> Option<PullTicket> {
        if !self.is_active() {
            return None;
        }
        self.in_flight = true;
        Some(PullTicket { epoch: self.epoch })
    }

    /// Apply a completed pull. False if it was started in an earlier epoch.
    pub fn replace_suggestions(&mut self, ticket: PullTicket, incoming: Vec<Suggestion>) -> bool {
        if ticket.epoch != self.epoch {
            debug!("dropping suggestions from epoch {} (now {})", ticket.epoch, self.epoch);
            return false;
        }
        self.in_flight = false;
        if !self.is_active() {
            return false;
        }
        self.items = incoming;
        true
    }

    /// A pull finished without data.
    pub fn pull_failed(&mut self, ticket: PullTicket) {
        if ticket.epoch == self.epoch {
            self.in_flight = false;
        }
    }

    pub fn set_phase(&mut self, phase: MatchPhase) {
        let was_active = self.is_active();
        self.phase = phase;
        if !phase.is_half() {
            self.clear();
        } else if !was_active {
            self.epoch += 1;
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.in_flight = false;
        self.epoch += 1;
    }
}

// ---------------------------------------------------------------------------
// Reducer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    ChatArrived(Vec<ChatMessage>),
    SuggestionsPulled { ticket: PullTicket, items: Vec<Suggestion> },
    SuggestionsFailed(PullTicket),
    PhaseChanged(MatchPhase),
}

/// Both feeds, driven by discrete events.
#[derive(Debug, Default)]
pub struct FeedStores {
    pub chat: ChatFeed,
    pub suggestions: SuggestionFeed,
}

impl FeedStores {
    /// Returns whether anything visible changed.
    pub fn apply(&mut self, event: FeedEvent) -> bool {
        match event {
            FeedEvent::ChatArrived(messages) => self.chat.merge_chat(messages) > 0,
            FeedEvent::SuggestionsPulled { ticket, items } => {
                self.suggestions.replace_suggestions(ticket, items)
            }
            FeedEvent::SuggestionsFailed(ticket) => {
                self.suggestions.pull_failed(ticket);
                false
            }
            FeedEvent::PhaseChanged(phase) => {
                let had_items = !self.suggestions.items().is_empty();
                self.suggestions.set_phase(phase);
                had_items && self.suggestions.items().is_empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use matchday_api::Priority;

    fn chat(id: &str, second: u32) -> ChatMessage {
        ChatMessage {
            id: MessageId::new(id),
            sender: "coach".into(),
            sender_role: "manager".into(),
            text: format!("message {id}"),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 13, 18, 30, second).unwrap(),
        }
    }

    fn suggestion(title: &str) -> Suggestion {
        Suggestion {
            category: "Tactical".into(),
            priority: Priority::High,
            title: title.into(),
            message: String::new(),
            action_items: Vec::new(),
        }
    }

    fn ids(feed: &ChatFeed) -> Vec<&str> {
        feed.messages().iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn push_then_pull_keeps_one_copy() {
        let mut feed = ChatFeed::default();
        assert_eq!(feed.merge_chat([chat("m1", 0)]), 1);
        assert_eq!(feed.merge_chat([chat("m1", 0), chat("m2", 5)]), 1);
        assert_eq!(ids(&feed), vec!["m1", "m2"]);
    }

    #[test]
    fn out_of_order_arrivals_are_sorted() {
        let mut feed = ChatFeed::default();
        feed.merge_chat([chat("3", 20)]);
        feed.merge_chat([chat("10", 10), chat("2", 10), chat("1", 30)]);
        assert_eq!(ids(&feed), vec!["2", "10", "3", "1"]);
    }

    #[test]
    fn history_is_bounded_and_evicted_ids_stay_seen() {
        let mut feed = ChatFeed::with_limit(2);
        feed.merge_chat([chat("1", 1), chat("2", 2), chat("3", 3)]);
        assert_eq!(ids(&feed), vec!["2", "3"]);

        assert_eq!(feed.merge_chat([chat("1", 1)]), 0);
        assert_eq!(ids(&feed), vec!["2", "3"]);
    }

    #[test]
    fn pulls_replace_the_whole_set() {
        let mut feed = SuggestionFeed::default();
        feed.set_phase(MatchPhase::FirstHalf);

        let ticket = feed.begin_pull().unwrap();
        assert!(feed.replace_suggestions(ticket, vec![suggestion("a"), suggestion("b")]));
        let ticket = feed.begin_pull().unwrap();
        assert!(feed.replace_suggestions(ticket, vec![suggestion("c")]));

        let titles: Vec<&str> = feed.items().iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["c"]);
    }

    #[test]
    fn no_pull_outside_live_phases() {
        let mut feed = SuggestionFeed::default();
        assert!(feed.begin_pull().is_none());
        feed.set_phase(MatchPhase::Finished);
        assert!(feed.begin_pull().is_none());
    }

    #[test]
    fn finishing_clears_even_with_a_pull_in_flight() {
        let mut stores = FeedStores::default();
        stores.apply(FeedEvent::PhaseChanged(MatchPhase::SecondHalf));
        let ticket = stores.suggestions.begin_pull().unwrap();
        stores.apply(FeedEvent::SuggestionsPulled { ticket, items: vec![suggestion("a")] });

        let in_flight = stores.suggestions.begin_pull().unwrap();
        assert!(stores.apply(FeedEvent::PhaseChanged(MatchPhase::Finished)));
        assert!(stores.suggestions.items().is_empty());

        let changed = stores.apply(FeedEvent::SuggestionsPulled {
            ticket: in_flight,
            items: vec![suggestion("late")],
        });
        assert!(!changed);
        assert!(stores.suggestions.items().is_empty());
    }

    #[test]
    fn pull_from_before_a_restart_is_rejected() {
        let mut feed = SuggestionFeed::default();
        feed.set_phase(MatchPhase::FirstHalf);
        let old = feed.begin_pull().unwrap();
        feed.set_phase(MatchPhase::NotStarted);
        feed.set_phase(MatchPhase::FirstHalf);

        assert!(!feed.replace_suggestions(old, vec![suggestion("stale")]));
        assert!(feed.items().is_empty());
    }

    #[test]
    fn switching_halves_keeps_the_current_set() {
        let mut feed = SuggestionFeed::default();
        feed.set_phase(MatchPhase::FirstHalf);
        let ticket = feed.begin_pull().unwrap();
        feed.replace_suggestions(ticket, vec![suggestion("a")]);

        feed.set_phase(MatchPhase::SecondHalf);
        assert_eq!(feed.items().len(), 1);
        assert!(feed.begin_pull().is_some());
    }
}
