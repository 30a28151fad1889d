use crate::wire::{
    ChatPost, OppositionRequest, RawChatList, RawDetail, RawMatch, RawOppositionList, RawSquad,
    RawSuggestions, TeamEventRequest, TimerRequest,
};
use crate::{
    ChatMessage, EventKind, GoalSide, MatchSnapshot, MatchState, OppositionStat, PitchZone,
    Player, Suggestion, TimerAction,
};
use log::debug;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;

pub type ApiResult<T> = Result<T, ApiError>;

/// Debugging header attached to every request; the tunnel in front of the
/// service skips its interstitial page when it is present.
pub const DEBUG_HEADER: (&str, &str) = ("ngrok-skip-browser-warning", "true");

/// REST client for the authoritative match session store.
#[derive(Debug, Clone)]
pub struct MatchdayApi {
    client: Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

#[derive(Debug)]
pub enum ApiError {
    /// Missing credential, or the service answered 401. Never retried.
    Unauthorized(String),
    Network(reqwest::Error, String),
    /// The service answered with a non-auth error status.
    Api {
        status: u16,
        detail: Option<String>,
        url: String,
    },
    Parsing(reqwest::Error, String),
    Other(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// True when the server received the request and refused it, as opposed
    /// to the request's fate being unknown.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ApiError::Api { status, .. } if (400..500).contains(status))
    }

    /// Message suitable for the status line.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthorized(_) => "Unauthorized".to_string(),
            ApiError::Api { detail: Some(detail), .. } => detail.clone(),
            ApiError::Api { status, .. } => format!("Request failed ({status})"),
            ApiError::Network(..) | ApiError::Parsing(..) | ApiError::Other(_) => {
                "Server connection failed".to_string()
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized(url) => write!(f, "Unauthorized for {url}"),
            ApiError::Network(e, url) => write!(f, "Network error for {url}: {e}"),
            ApiError::Api { status, detail, url } => match detail {
                Some(detail) => write!(f, "API error {status} for {url}: {detail}"),
                None => write!(f, "API error {status} for {url}"),
            },
            ApiError::Parsing(e, url) => write!(f, "Parse error for {url}: {e}"),
            ApiError::Other(msg) => write!(f, "Error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl MatchdayApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .user_agent("matchday/0.1 (live match console)")
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            token: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub async fn fetch_match(&self, match_id: &str) -> ApiResult<MatchSnapshot> {
        let url = self.endpoint(&["matches", match_id], None)?;
        let raw: RawMatch = self.execute(Method::GET, url, None::<&()>).await?;
        Ok(map_match(raw))
    }

    /// Submit a phase command. The response is the canonical match record.
    pub async fn submit_timer(
        &self,
        match_id: &str,
        action: TimerAction,
        elapsed_seconds: u32,
    ) -> ApiResult<MatchSnapshot> {
        let url = self.endpoint(&["matches", match_id, "timer"], None)?;
        let body = TimerRequest { action, elapsed_seconds };
        let raw: RawMatch = self.execute(Method::POST, url, Some(&body)).await?;
        Ok(map_match(raw))
    }

    /// Increment one team event for one player, tagged with zone and match second.
    pub async fn record_team_event(
        &self,
        match_id: &str,
        event: EventKind,
        player: &str,
        zone: PitchZone,
        second: u32,
    ) -> ApiResult<()> {
        let url = self.endpoint(&["matches", match_id, event.key(), player, "increment"], None)?;
        let body = TeamEventRequest { zone: zone.number(), second };
        self.execute::<serde_json::Value, _>(Method::POST, url, Some(&body))
            .await
            .map(|_| ())
    }

    pub async fn fetch_opposition(&self, match_id: &str) -> ApiResult<Vec<OppositionStat>> {
        let url = self.endpoint(&["matches", match_id, "opposition"], None)?;
        let raw: RawOppositionList = self.execute(Method::GET, url, None::<&()>).await?;
        Ok(raw)
    }

    /// Write an absolute opposition count. The service does not increment
    /// these itself, so the caller supplies previous + 1.
    pub async fn submit_opposition_count(
        &self,
        match_id: &str,
        event: EventKind,
        count: u32,
    ) -> ApiResult<()> {
        let url = self.endpoint(&["matches", match_id, "opposition"], None)?;
        let body = OppositionRequest { event, count };
        self.execute::<serde_json::Value, _>(Method::POST, url, Some(&body))
            .await
            .map(|_| ())
    }

    /// Write the new absolute goal count for one side.
    pub async fn update_goals(
        &self,
        match_id: &str,
        side: GoalSide,
        value: u32,
    ) -> ApiResult<MatchSnapshot> {
        let url = self.endpoint(&["matches", match_id], None)?;
        let body = serde_json::json!({ side.field(): value });
        let raw: RawMatch = self.execute(Method::PATCH, url, Some(&body)).await?;
        Ok(map_match(raw))
    }

    pub async fn fetch_squad(&self) -> ApiResult<Vec<Player>> {
        let url = self.endpoint(&["teams", "players"], None)?;
        let raw: RawSquad = self.execute(Method::GET, url, None::<&()>).await?;
        Ok(raw
            .players
            .into_iter()
            .filter(|p| !p.name.trim().is_empty())
            .map(|p| Player { id: p.id, name: p.name })
            .collect())
    }

    pub async fn fetch_chat(&self, match_id: &str) -> ApiResult<Vec<ChatMessage>> {
        let url = self.endpoint(&["chat", "messages"], Some(("match_id", match_id)))?;
        let raw: RawChatList = self.execute(Method::GET, url, None::<&()>).await?;
        Ok(raw)
    }

    pub async fn send_chat(&self, match_id: &str, text: &str) -> ApiResult<ChatMessage> {
        let url = self.endpoint(&["chat", "messages"], None)?;
        let body = ChatPost { message: text, match_id };
        self.execute(Method::POST, url, Some(&body)).await
    }

    pub async fn fetch_live_suggestions(&self, match_id: &str) -> ApiResult<Vec<Suggestion>> {
        let url = self.endpoint(&["matches", match_id, "live-suggestions"], None)?;
        let raw: RawSuggestions = self.execute(Method::GET, url, None::<&()>).await?;
        Ok(raw.suggestions)
    }

    /// Build `{base}/api/{segments..}/`. Each segment is percent-encoded on its own,
    /// so player names containing `/` or spaces stay a single segment.
    fn endpoint(&self, segments: &[&str], query: Option<(&str, &str)>) -> ApiResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ApiError::Other(format!("invalid base url {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Other(format!("base url {} cannot hold a path", self.base_url)))?
            .pop_if_empty()
            .push("api")
            .extend(segments)
            .push("");
        if let Some((key, value)) = query {
            url.query_pairs_mut().append_pair(key, value);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, token: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .timeout(self.timeout)
            .bearer_auth(token)
            .header(DEBUG_HEADER.0, DEBUG_HEADER.1)
    }

    async fn execute<T, B>(&self, method: Method, url: Url, body: Option<&B>) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url_str = url.to_string();
        let Some(token) = self.token.as_deref() else {
            return Err(ApiError::Unauthorized(url_str));
        };

        debug!("{method} {url_str}");
        let mut builder = self.request(method, url, token);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(e, url_str.clone()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized(url_str));
        }
        if !status.is_success() {
            let detail = response
                .json::<RawDetail>()
                .await
                .ok()
                .and_then(|d| d.detail);
            return Err(ApiError::Api {
                status: status.as_u16(),
                detail,
                url: url_str,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Parsing(e, url_str))
    }
}

// ---------------------------------------------------------------------------
// Mapping: wire types → clean domain types
// ---------------------------------------------------------------------------

fn map_match(raw: RawMatch) -> MatchSnapshot {
    MatchSnapshot {
        id: raw.id,
        opponent: raw.opponent,
        state: raw.state.unwrap_or(MatchState::NotStarted),
        elapsed_seconds: raw.elapsed_seconds.unwrap_or_default(),
        goals_scored: raw.goals_scored.unwrap_or_default(),
        goals_conceded: raw.goals_conceded.unwrap_or_default(),
        formation: raw.formation.filter(|f| !f.is_empty()),
        opponent_formation: raw.opponent_formation.filter(|f| !f.is_empty()),
    }
}
