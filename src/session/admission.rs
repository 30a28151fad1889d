use crate::session::MatchPhase;
use crate::session::clock::ClockModel;
use matchday_api::{EventKind, PitchZone};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordingTarget {
    #[default]
    Team,
    Opposition,
}

impl RecordingTarget {
    pub fn toggled(self) -> Self {
        match self {
            RecordingTarget::Team => RecordingTarget::Opposition,
            RecordingTarget::Opposition => RecordingTarget::Team,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecordingTarget::Team => "Our team",
            RecordingTarget::Opposition => "Opposition",
        }
    }
}

/// Draft of the event about to be recorded. Cleared after each submit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventRecordingIntent {
    pub target: RecordingTarget,
    pub event: Option<EventKind>,
    pub player: Option<String>,
    pub zone: Option<PitchZone>,
}

/// A complete draft, ready to become a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingRequest {
    Team {
        event: EventKind,
        player: String,
        zone: PitchZone,
    },
    Opposition {
        event: EventKind,
    },
}

impl EventRecordingIntent {
    pub fn is_complete(&self) -> bool {
        self.ready().is_some()
    }

    /// The write this draft describes, when every required field is set.
    pub fn ready(&self) -> Option<RecordingRequest> {
        let event = self.event?;
        match self.target {
            RecordingTarget::Team => Some(RecordingRequest::Team {
                event,
                player: self.player.clone()?,
                zone: self.zone?,
            }),
            RecordingTarget::Opposition => Some(RecordingRequest::Opposition { event }),
        }
    }

    /// Switch target and drop the fields only team recording uses.
    pub fn toggle_target(&mut self) {
        self.target = self.target.toggled();
        if self.target == RecordingTarget::Opposition {
            self.player = None;
            self.zone = None;
        }
    }

    /// Reset the selection but stay on the same target.
    pub fn clear(&mut self) {
        *self = Self { target: self.target, ..Default::default() };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    SessionNotStarted,
    ClockPaused,
    MissingSelection(RecordingTarget),
    SessionClosed,
}

impl BlockReason {
    pub fn message(&self) -> &'static str {
        match self {
            BlockReason::SessionNotStarted => "Must start match first",
            BlockReason::ClockPaused => "Resume match to record event",
            BlockReason::MissingSelection(RecordingTarget::Team) => "Select event, player & zone",
            BlockReason::MissingSelection(RecordingTarget::Opposition) => "Select an event",
            BlockReason::SessionClosed => "Match is finished",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Blocked(BlockReason),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

fn admit_clock(clock: &ClockModel) -> Option<BlockReason> {
    match clock.phase() {
        MatchPhase::Finished => Some(BlockReason::SessionClosed),
        MatchPhase::NotStarted => Some(BlockReason::SessionNotStarted),
        _ if !clock.is_running() => Some(BlockReason::ClockPaused),
        _ => None,
    }
}

/// Whether the draft may be written now. Clock conditions are checked
/// before the selection, so a paused clock is reported even for an
/// incomplete draft.
pub fn admit_event(clock: &ClockModel, intent: &EventRecordingIntent) -> Admission {
    if let Some(reason) = admit_clock(clock) {
        return Admission::Blocked(reason);
    }
    if !intent.is_complete() {
        return Admission::Blocked(BlockReason::MissingSelection(intent.target));
    }
    Admission::Allowed
}

/// Goals need a live clock and nothing else.
pub fn admit_goal(clock: &ClockModel) -> Admission {
    match admit_clock(clock) {
        Some(reason) => Admission::Blocked(reason),
        None => Admission::Allowed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(phase: MatchPhase, running: bool) -> ClockModel {
        let mut clock = ClockModel::new();
        clock.apply_authoritative(phase, 300, running);
        clock
    }

    fn full_team_intent() -> EventRecordingIntent {
        EventRecordingIntent {
            target: RecordingTarget::Team,
            event: Some(EventKind::Tackles),
            player: Some("Ana".into()),
            zone: Some(PitchZone::DefensiveCenter),
        }
    }

    #[test]
    fn paused_clock_blocks_regardless_of_selection() {
        let paused = clock(MatchPhase::FirstHalf, false);
        assert_eq!(
            admit_event(&paused, &full_team_intent()),
            Admission::Blocked(BlockReason::ClockPaused)
        );
        assert_eq!(
            admit_event(&paused, &EventRecordingIntent::default()),
            Admission::Blocked(BlockReason::ClockPaused)
        );
    }

    #[test]
    fn not_started_blocks_first() {
        let idle = ClockModel::new();
        assert_eq!(
            admit_event(&idle, &full_team_intent()),
            Admission::Blocked(BlockReason::SessionNotStarted)
        );
        assert_eq!(admit_goal(&idle), Admission::Blocked(BlockReason::SessionNotStarted));
    }

    #[test]
    fn team_needs_event_player_and_zone() {
        let live = clock(MatchPhase::SecondHalf, true);
        assert!(admit_event(&live, &full_team_intent()).is_allowed());

        let mut intent = full_team_intent();
        intent.zone = None;
        assert_eq!(
            admit_event(&live, &intent),
            Admission::Blocked(BlockReason::MissingSelection(RecordingTarget::Team))
        );
    }

    #[test]
    fn opposition_needs_only_the_event() {
        let live = clock(MatchPhase::FirstHalf, true);
        let mut intent = EventRecordingIntent {
            target: RecordingTarget::Opposition,
            ..Default::default()
        };
        assert_eq!(
            admit_event(&live, &intent),
            Admission::Blocked(BlockReason::MissingSelection(RecordingTarget::Opposition))
        );

        intent.event = Some(EventKind::Fouls);
        assert!(admit_event(&live, &intent).is_allowed());
        assert_eq!(
            intent.ready(),
            Some(RecordingRequest::Opposition { event: EventKind::Fouls })
        );
    }

    #[test]
    fn finished_match_reports_session_closed() {
        let done = clock(MatchPhase::Finished, false);
        assert_eq!(
            admit_event(&done, &full_team_intent()),
            Admission::Blocked(BlockReason::SessionClosed)
        );
        assert_eq!(admit_goal(&done), Admission::Blocked(BlockReason::SessionClosed));
    }

    #[test]
    fn each_reason_has_its_own_message() {
        let reasons = [
            BlockReason::SessionNotStarted,
            BlockReason::ClockPaused,
            BlockReason::MissingSelection(RecordingTarget::Team),
            BlockReason::MissingSelection(RecordingTarget::Opposition),
            BlockReason::SessionClosed,
        ];
        let mut messages: Vec<&str> = reasons.iter().map(BlockReason::message).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), reasons.len());
    }

    #[test]
    fn switching_to_opposition_drops_player_and_zone() {
        let mut intent = full_team_intent();
        intent.toggle_target();
        assert_eq!(intent.target, RecordingTarget::Opposition);
        assert_eq!(intent.event, Some(EventKind::Tackles));
        assert!(intent.player.is_none() && intent.zone.is_none());

        intent.clear();
        assert_eq!(intent.target, RecordingTarget::Opposition);
        assert!(intent.event.is_none());
    }
}
