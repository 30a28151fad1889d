/// Wire types for the match session REST service.
/// Root: {base}/api
use crate::{ChatMessage, EventKind, MatchState, OppositionStat, Suggestion, TimerAction};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Deserialize, Debug)]
pub struct RawMatch {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub opponent: String,
    /// Absent on matches created before the timer existed.
    pub state: Option<MatchState>,
    pub elapsed_seconds: Option<u32>,
    pub goals_scored: Option<u32>,
    pub goals_conceded: Option<u32>,
    pub formation: Option<String>,
    pub opponent_formation: Option<String>,
}

#[derive(Deserialize, Default, Debug)]
pub struct RawSquad {
    #[serde(default)]
    pub players: Vec<RawPlayer>,
}

#[derive(Deserialize, Debug)]
pub struct RawPlayer {
    #[serde(default, deserialize_with = "optional_id_string")]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Deserialize, Default, Debug)]
pub struct RawSuggestions {
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

/// Error body the service returns alongside 4xx responses.
#[derive(Deserialize, Default, Debug)]
pub struct RawDetail {
    pub detail: Option<String>,
}

pub type RawChatList = Vec<ChatMessage>;
pub type RawOppositionList = Vec<OppositionStat>;

#[derive(Serialize, Debug)]
pub struct TimerRequest {
    pub action: TimerAction,
    pub elapsed_seconds: u32,
}

#[derive(Serialize, Debug)]
pub struct TeamEventRequest {
    pub zone: u8,
    pub second: u32,
}

#[derive(Serialize, Debug)]
pub struct OppositionRequest {
    pub event: EventKind,
    pub count: u32,
}

#[derive(Serialize, Debug)]
pub struct ChatPost<'a> {
    pub message: &'a str,
    pub match_id: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

fn optional_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    }))
}
