pub mod client;
pub mod wire;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Upper bound on the length of an outgoing chat message, in characters.
pub const MAX_CHAT_TEXT_CHARS: usize = 1000;

// ---------------------------------------------------------------------------
// Domain types, independent of the REST wire format
// ---------------------------------------------------------------------------

/// Timer state as reported by the session store.
///
/// `Paused` and `InProgress` are extra values the server may still emit; the
/// engine folds them into a phase plus a running flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    NotStarted,
    FirstHalf,
    SecondHalf,
    Paused,
    InProgress,
    Finished,
}

/// Phase-changing commands accepted by the timer endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerAction {
    Start,
    Pause,
    Resume,
    Finish,
}

impl TimerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerAction::Start => "start",
            TimerAction::Pause => "pause",
            TimerAction::Resume => "resume",
            TimerAction::Finish => "finish",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimerAction::Start => "Start match",
            TimerAction::Pause => "Pause",
            TimerAction::Resume => "Resume",
            TimerAction::Finish => "Finish match",
        }
    }
}

impl fmt::Display for TimerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authoritative match record returned by the detail, timer and score endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSnapshot {
    pub id: String,
    pub opponent: String,
    pub state: MatchState,
    pub elapsed_seconds: u32,
    pub goals_scored: u32,
    pub goals_conceded: u32,
    pub formation: Option<String>,
    pub opponent_formation: Option<String>,
}

/// Which side of the scoreline a goal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalSide {
    Scored,
    Conceded,
}

impl GoalSide {
    pub fn field(&self) -> &'static str {
        match self {
            GoalSide::Scored => "goals_scored",
            GoalSide::Conceded => "goals_conceded",
        }
    }
}

/// Recordable match events. The key doubles as the URL segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ShotsOnTarget,
    ShotsOffTarget,
    KeyPasses,
    DuelsWon,
    DuelsLost,
    Fouls,
    Interceptions,
    Blocks,
    Tackles,
    Clearances,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::ShotsOnTarget,
        EventKind::ShotsOffTarget,
        EventKind::KeyPasses,
        EventKind::DuelsWon,
        EventKind::DuelsLost,
        EventKind::Fouls,
        EventKind::Interceptions,
        EventKind::Blocks,
        EventKind::Tackles,
        EventKind::Clearances,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            EventKind::ShotsOnTarget => "shots_on_target",
            EventKind::ShotsOffTarget => "shots_off_target",
            EventKind::KeyPasses => "key_passes",
            EventKind::DuelsWon => "duels_won",
            EventKind::DuelsLost => "duels_lost",
            EventKind::Fouls => "fouls",
            EventKind::Interceptions => "interceptions",
            EventKind::Blocks => "blocks",
            EventKind::Tackles => "tackles",
            EventKind::Clearances => "clearances",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EventKind::ShotsOnTarget => "Shots on Target",
            EventKind::ShotsOffTarget => "Shots off Target",
            EventKind::KeyPasses => "Key Passes",
            EventKind::DuelsWon => "Duels Won",
            EventKind::DuelsLost => "Duels Lost",
            EventKind::Fouls => "Fouls",
            EventKind::Interceptions => "Interceptions",
            EventKind::Blocks => "Blocks",
            EventKind::Tackles => "Tackles",
            EventKind::Clearances => "Clearances",
        }
    }
}

/// The six pitch zones, numbered 1–6 on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PitchZone {
    DefensiveLeft,
    DefensiveCenter,
    DefensiveRight,
    AttackingLeft,
    AttackingCenter,
    AttackingRight,
}

impl PitchZone {
    pub const ALL: [PitchZone; 6] = [
        PitchZone::DefensiveLeft,
        PitchZone::DefensiveCenter,
        PitchZone::DefensiveRight,
        PitchZone::AttackingLeft,
        PitchZone::AttackingCenter,
        PitchZone::AttackingRight,
    ];

    pub fn number(&self) -> u8 {
        match self {
            PitchZone::DefensiveLeft => 1,
            PitchZone::DefensiveCenter => 2,
            PitchZone::DefensiveRight => 3,
            PitchZone::AttackingLeft => 4,
            PitchZone::AttackingCenter => 5,
            PitchZone::AttackingRight => 6,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|z| z.number() == n)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PitchZone::DefensiveLeft => "Defensive left",
            PitchZone::DefensiveCenter => "Defensive centre",
            PitchZone::DefensiveRight => "Defensive right",
            PitchZone::AttackingLeft => "Attacking left",
            PitchZone::AttackingCenter => "Attacking centre",
            PitchZone::AttackingRight => "Attacking right",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: Option<String>,
    pub name: String,
}

/// Current opposition count for one event type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OppositionStat {
    pub event: String,
    #[serde(default)]
    pub count: u32,
}

/// Server-assigned chat message id.
///
/// The server hands out integer ids; they are kept as strings so the client
/// never depends on that. Ordering compares numerically when both sides are
/// numeric, so "9" sorts before "10".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for MessageId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.parse::<u64>(), other.0.parse::<u64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            _ => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for MessageId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => MessageId(n.to_string()),
            RawId::Text(s) => MessageId(s),
        })
    }
}

/// A team chat message, identical whether pulled over HTTP or pushed on the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender: String,
    #[serde(default)]
    pub sender_role: String,
    #[serde(rename = "message")]
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
pub enum Priority {
    High,
    Medium,
    #[default]
    #[serde(other)]
    Low,
}

impl Priority {
    pub fn label(&self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

/// One live tactical suggestion. Suggestions are recomputed server-side on
/// every pull and carry no identity of their own.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub action_items: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_ids_order_numerically() {
        let mut ids = vec![MessageId::new("10"), MessageId::new("9"), MessageId::new("100")];
        ids.sort();
        let ordered: Vec<&str> = ids.iter().map(MessageId::as_str).collect();
        assert_eq!(ordered, vec!["9", "10", "100"]);
    }

    #[test]
    fn message_id_accepts_numbers_and_strings() {
        let msg: ChatMessage = serde_json::from_str(
            r#"{"id": 42, "sender": "coach", "sender_role": "manager",
                "message": "press higher", "timestamp": "2026-01-13T18:30:00.123456+00:00"}"#,
        )
        .unwrap();
        assert_eq!(msg.id, MessageId::new("42"));
        assert_eq!(msg.text, "press higher");

        let msg: ChatMessage = serde_json::from_str(
            r#"{"id": "m1", "sender": "ana", "message": "ok", "timestamp": "2026-01-13T18:30:00Z"}"#,
        )
        .unwrap();
        assert_eq!(msg.id, MessageId::new("m1"));
        assert!(msg.sender_role.is_empty());
    }

    #[test]
    fn unknown_priority_falls_back_to_low() {
        let s: Suggestion =
            serde_json::from_str(r#"{"title": "Hold shape", "priority": "Urgent"}"#).unwrap();
        assert_eq!(s.priority, Priority::Low);
        assert!(s.action_items.is_empty());
    }

    #[test]
    fn zones_round_trip_through_their_numbers() {
        for zone in PitchZone::ALL {
            assert_eq!(PitchZone::from_number(zone.number()), Some(zone));
        }
        assert_eq!(PitchZone::from_number(0), None);
        assert_eq!(PitchZone::from_number(7), None);
    }
}
