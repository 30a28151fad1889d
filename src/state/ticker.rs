use crate::session::clock::ClockModel;
use crate::state::messages::UiEvent;
use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};

/// Drives local clock ticks while the clock runs.
///
/// Every tick carries the generation it was armed with. Re-arming replaces
/// the previous task, and the clock model drops ticks from older generations,
/// so nothing scheduled before a phase change can land after it.
pub struct TickScheduler {
    events: mpsc::Sender<UiEvent>,
    period: Duration,
    armed: Option<(u64, JoinHandle<()>)>,
}

impl TickScheduler {
    pub fn new(events: mpsc::Sender<UiEvent>) -> Self {
        Self::with_period(events, Duration::from_secs(1))
    }

    pub fn with_period(events: mpsc::Sender<UiEvent>, period: Duration) -> Self {
        Self { events, period, armed: None }
    }

    pub fn armed_generation(&self) -> Option<u64> {
        self.armed.as_ref().map(|(generation, _)| *generation)
    }

    /// Follow the clock: armed with its generation while running, idle otherwise.
    pub fn sync(&mut self, clock: &ClockModel) {
        if clock.is_running() {
            if self.armed_generation() != Some(clock.generation()) {
                self.arm(clock.generation());
            }
        } else {
            self.disarm();
        }
    }

    pub fn arm(&mut self, generation: u64) {
        self.disarm();
        debug!("clock ticker armed for generation {generation}");

        let events = self.events.clone();
        let period = self.period;
        let handle = tokio::spawn(async move {
            let mut ticks = interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticks.tick().await;
            loop {
                ticks.tick().await;
                if events.send(UiEvent::ClockTick { generation }).await.is_err() {
                    break;
                }
            }
        });
        self.armed = Some((generation, handle));
    }

    pub fn disarm(&mut self) {
        if let Some((generation, handle)) = self.armed.take() {
            handle.abort();
            debug!("clock ticker for generation {generation} disarmed");
        }
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MatchPhase;
    use tokio::time::{sleep, timeout};

    async fn next_tick(rx: &mut mpsc::Receiver<UiEvent>) -> u64 {
        match timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(UiEvent::ClockTick { generation })) => generation,
            other => panic!("expected a clock tick, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ticks_carry_the_armed_generation() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut ticker = TickScheduler::with_period(tx, Duration::from_millis(10));

        let mut clock = ClockModel::new();
        clock.apply_authoritative(MatchPhase::FirstHalf, 0, true);
        ticker.sync(&clock);

        assert_eq!(next_tick(&mut rx).await, clock.generation());
    }

    #[tokio::test]
    async fn stopping_the_clock_stops_the_ticks() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut ticker = TickScheduler::with_period(tx, Duration::from_millis(10));

        let mut clock = ClockModel::new();
        clock.apply_authoritative(MatchPhase::FirstHalf, 0, true);
        ticker.sync(&clock);
        next_tick(&mut rx).await;

        clock.apply_authoritative(MatchPhase::FirstHalf, 3, false);
        ticker.sync(&clock);
        assert_eq!(ticker.armed_generation(), None);

        while rx.try_recv().is_ok() {}
        sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn rearming_replaces_the_old_generation() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut ticker = TickScheduler::with_period(tx, Duration::from_millis(10));

        ticker.arm(1);
        next_tick(&mut rx).await;
        ticker.arm(2);
        while rx.try_recv().is_ok() {}

        assert_eq!(next_tick(&mut rx).await, 2);
        assert_eq!(ticker.armed_generation(), Some(2));
    }
}
