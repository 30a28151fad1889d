use futures_util::StreamExt;
use log::{debug, error, info, warn};
use matchday_api::{ChatMessage, MessageId};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message};

pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);
pub const MAX_RECONNECT_ATTEMPTS: u32 = 15;
const EVENT_CAPACITY: usize = 256;
const RECENT_ID_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { delay: RECONNECT_DELAY, max_attempts: MAX_RECONNECT_ATTEMPTS }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Retry budget spent. Only an explicit retry leaves this state.
    Failed,
}

impl ChannelStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ChannelStatus::Disconnected => "offline",
            ChannelStatus::Connecting => "connecting",
            ChannelStatus::Connected => "live",
            ChannelStatus::Failed => "failed",
        }
    }
}

/// Snapshot of one physical connection. Every transition yields a new value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelConnection {
    pub status: ChannelStatus,
    /// Reconnects scheduled since the last successful open.
    pub reconnect_attempt: u32,
}

impl ChannelConnection {
    pub fn initial() -> Self {
        Self::default()
    }

    pub fn connecting(self) -> Self {
        Self { status: ChannelStatus::Connecting, ..self }
    }

    pub fn on_open(self) -> Self {
        Self { status: ChannelStatus::Connected, reconnect_attempt: 0 }
    }

    /// Record a close or failed attempt. Returns the delay before the next
    /// reconnect, or `None` once `max_attempts` reconnects have been spent.
    pub fn on_drop(self, policy: ReconnectPolicy) -> (Self, Option<Duration>) {
        if self.reconnect_attempt >= policy.max_attempts {
            return (Self { status: ChannelStatus::Failed, ..self }, None);
        }
        (
            Self {
                status: ChannelStatus::Disconnected,
                reconnect_attempt: self.reconnect_attempt + 1,
            },
            Some(policy.delay),
        )
    }
}

/// A parsed push frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Chat {
        message: ChatMessage,
        match_id: Option<String>,
    },
    SuggestionsInvalidated,
    /// Match statistics changed. Goal updates carry the new scoreline.
    Stat {
        match_id: Option<String>,
        goals: Option<(u32, u32)>,
    },
    Unknown(String),
}

#[derive(Deserialize)]
struct RawFrame {
    kind: String,
    data: Option<Value>,
}

#[derive(Deserialize)]
struct RawStat {
    #[serde(rename = "type")]
    kind: Option<String>,
    match_id: Option<Value>,
    goals_scored: Option<u32>,
    goals_conceded: Option<u32>,
}

/// Parse one text frame. Chat payloads may sit under `data` or inline.
pub fn classify(text: &str) -> Result<InboundMessage, serde_json::Error> {
    let frame: Value = serde_json::from_str(text)?;
    let RawFrame { kind, data } = RawFrame::deserialize(&frame)?;

    Ok(match kind.as_str() {
        "chat" => {
            let payload = data.unwrap_or(frame);
            let match_id = payload.get("match_id").and_then(id_text);
            InboundMessage::Chat { message: ChatMessage::deserialize(&payload)?, match_id }
        }
        "suggestions_invalidated" | "suggestionsInvalidated" => {
            InboundMessage::SuggestionsInvalidated
        }
        "stat" => {
            let stat = match data {
                Some(data) => RawStat::deserialize(&data)?,
                None => RawStat { kind: None, match_id: None, goals_scored: None, goals_conceded: None },
            };
            let goals = match (stat.kind.as_deref(), stat.goals_scored, stat.goals_conceded) {
                (Some("goal_update"), Some(scored), Some(conceded)) => Some((scored, conceded)),
                _ => None,
            };
            InboundMessage::Stat { match_id: stat.match_id.as_ref().and_then(id_text), goals }
        }
        _ => InboundMessage::Unknown(kind),
    })
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// What subscribers of the channel receive.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Status(ChannelConnection),
    Chat(ChatMessage),
    /// Cue to pull suggestions again; carries nothing.
    SuggestionsInvalidated,
    ScoreCorrected { goals_for: u32, goals_against: u32 },
}

/// Bounded memory of recently delivered chat ids.
#[derive(Debug)]
pub struct RecentIds {
    order: VecDeque<MessageId>,
    seen: HashSet<MessageId>,
    capacity: usize,
}

impl RecentIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// False if the id was already seen.
    pub fn insert(&mut self, id: &MessageId) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.seen.remove(&oldest);
        }
        self.order.push_back(id.clone());
        self.seen.insert(id.clone());
        true
    }
}

/// Owner of the single push connection for one match.
///
/// Consumers observe it through [`RealtimeChannel::subscribe`]; only the
/// owner opens, closes or retries it.
pub struct RealtimeChannel {
    url: String,
    match_id: String,
    policy: ReconnectPolicy,
    events: broadcast::Sender<ChannelEvent>,
    task: Option<JoinHandle<()>>,
}

impl RealtimeChannel {
    pub fn new(url: impl Into<String>, match_id: impl Into<String>, policy: ReconnectPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            url: url.into(),
            match_id: match_id.into(),
            policy,
            events,
            task: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }

    pub fn is_open(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start the connection loop if it is not already running.
    pub fn open(&mut self) {
        if self.is_open() {
            return;
        }
        let worker = ChannelWorker {
            url: self.url.clone(),
            match_id: self.match_id.clone(),
            policy: self.policy,
            events: self.events.clone(),
            recent: RecentIds::new(RECENT_ID_CAPACITY),
        };
        info!("opening push channel {}", self.url);
        self.task = Some(tokio::spawn(worker.run()));
    }

    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("push channel closed");
        }
        let _ = self
            .events
            .send(ChannelEvent::Status(ChannelConnection::initial()));
    }

    /// Start over with a fresh retry budget.
    pub fn retry(&mut self) {
        self.close();
        self.open();
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct ChannelWorker {
    url: String,
    match_id: String,
    policy: ReconnectPolicy,
    events: broadcast::Sender<ChannelEvent>,
    recent: RecentIds,
}

impl ChannelWorker {
    async fn run(mut self) {
        let mut connection = ChannelConnection::initial();
        loop {
            connection = connection.connecting();
            self.publish(ChannelEvent::Status(connection));

            match connect_async(self.url.as_str()).await {
                Ok((mut stream, _)) => {
                    connection = connection.on_open();
                    info!("push channel connected");
                    self.publish(ChannelEvent::Status(connection));

                    while let Some(frame) = stream.next().await {
                        match frame {
                            Ok(Message::Text(text)) => self.dispatch(&text),
                            Ok(Message::Close(_)) => break,
                            Ok(_) => {}
                            Err(e) => {
                                warn!("push channel read failed: {e}");
                                break;
                            }
                        }
                    }
                }
                Err(e) => warn!("push channel connect failed: {e}"),
            }

            let (next, delay) = connection.on_drop(self.policy);
            connection = next;
            self.publish(ChannelEvent::Status(connection));

            let Some(delay) = delay else {
                error!(
                    "push channel gave up after {} reconnects",
                    connection.reconnect_attempt
                );
                return;
            };
            debug!(
                "reconnecting in {delay:?} (attempt {}/{})",
                connection.reconnect_attempt, self.policy.max_attempts
            );
            sleep(delay).await;
        }
    }

    fn dispatch(&mut self, text: &str) {
        let inbound = match classify(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!("dropping malformed push frame: {e}");
                return;
            }
        };

        match inbound {
            InboundMessage::Chat { message, match_id } => {
                if !self.for_this_match(match_id.as_deref()) {
                    return;
                }
                if self.recent.insert(&message.id) {
                    self.publish(ChannelEvent::Chat(message));
                } else {
                    debug!("duplicate chat push {}", message.id);
                }
            }
            InboundMessage::SuggestionsInvalidated => {
                self.publish(ChannelEvent::SuggestionsInvalidated);
            }
            InboundMessage::Stat { match_id, goals } => {
                if !self.for_this_match(match_id.as_deref()) {
                    return;
                }
                if let Some((goals_for, goals_against)) = goals {
                    self.publish(ChannelEvent::ScoreCorrected { goals_for, goals_against });
                }
                self.publish(ChannelEvent::SuggestionsInvalidated);
            }
            InboundMessage::Unknown(kind) => debug!("ignoring push of kind {kind}"),
        }
    }

    fn for_this_match(&self, match_id: Option<&str>) -> bool {
        match_id.is_none_or(|id| id == self.match_id)
    }

    fn publish(&self, event: ChannelEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}
