use crate::app::MenuItem;
use crate::session::MatchSession;
use crate::session::admission::EventRecordingIntent;
use crate::session::gateway::SessionGateway;
use crate::state::channel::ChannelConnection;
use crate::state::feeds::FeedStores;
use matchday_api::{EventKind, MAX_CHAT_TEXT_CHARS, Player};

// ---------------------------------------------------------------------------
// Status line
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub text: String,
    pub is_error: bool,
}

impl StatusLine {
    pub fn info(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: false }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: true }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    SignedIn,
    /// Credential missing or rejected. Nothing is sent until restart.
    SignInRequired,
}

// ---------------------------------------------------------------------------
// Recording form
// ---------------------------------------------------------------------------

/// Cursor state behind the recording draft.
#[derive(Debug, Default)]
pub struct RecordingForm {
    pub intent: EventRecordingIntent,
    pub squad: Vec<Player>,
    event_cursor: Option<usize>,
    player_cursor: Option<usize>,
}

impl RecordingForm {
    pub fn load_squad(&mut self, squad: Vec<Player>) {
        let keep = self.intent.player.clone();
        self.squad = squad;
        self.player_cursor = keep.and_then(|name| self.squad.iter().position(|p| p.name == name));
        if self.player_cursor.is_none() {
            self.intent.player = None;
        }
    }

    pub fn next_event(&mut self) {
        self.event_cursor = Some(step(self.event_cursor, EventKind::ALL.len(), true));
        self.intent.event = self.event_cursor.map(|i| EventKind::ALL[i]);
    }

    pub fn prev_event(&mut self) {
        self.event_cursor = Some(step(self.event_cursor, EventKind::ALL.len(), false));
        self.intent.event = self.event_cursor.map(|i| EventKind::ALL[i]);
    }

    pub fn next_player(&mut self) {
        self.move_player(true);
    }

    pub fn prev_player(&mut self) {
        self.move_player(false);
    }

    pub fn clear(&mut self) {
        self.intent.clear();
        self.event_cursor = None;
        self.player_cursor = None;
    }

    pub fn toggle_target(&mut self) {
        self.intent.toggle_target();
        if self.intent.player.is_none() {
            self.player_cursor = None;
        }
    }

    fn move_player(&mut self, forward: bool) {
        if self.squad.is_empty() {
            return;
        }
        let index = step(self.player_cursor, self.squad.len(), forward);
        self.player_cursor = Some(index);
        self.intent.player = self.squad.get(index).map(|p| p.name.clone());
    }
}

fn step(current: Option<usize>, len: usize, forward: bool) -> usize {
    match (current, forward) {
        (None, true) => 0,
        (None, false) => len.saturating_sub(1),
        (Some(i), true) => (i + 1) % len.max(1),
        (Some(i), false) => (i + len.max(1) - 1) % len.max(1),
    }
}

// ---------------------------------------------------------------------------
// Chat composer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatDraftError {
    Empty,
    TooLong { chars: usize },
}

impl ChatDraftError {
    pub fn message(&self) -> String {
        match self {
            ChatDraftError::Empty => "Type a message first".to_string(),
            ChatDraftError::TooLong { chars } => {
                format!("Message too long ({chars}/{MAX_CHAT_TEXT_CHARS} characters)")
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ChatComposer {
    pub input: String,
    pub composing: bool,
    pub scroll_offset: u16,
}

impl ChatComposer {
    /// Take the trimmed draft. The draft is kept when it is rejected.
    pub fn take(&mut self) -> Result<String, ChatDraftError> {
        let text = self.input.trim();
        if text.is_empty() {
            return Err(ChatDraftError::Empty);
        }
        let chars = text.chars().count();
        if chars > MAX_CHAT_TEXT_CHARS {
            return Err(ChatDraftError::TooLong { chars });
        }
        let text = text.to_string();
        self.input.clear();
        self.composing = false;
        self.scroll_offset = 0;
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Root app state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct AppState {
    pub active_tab: MenuItem,
    pub previous_tab: MenuItem,
    pub show_logs: bool,
    pub status: Option<StatusLine>,
    pub auth: AuthState,
    pub session: MatchSession,
    pub gateway: SessionGateway,
    pub form: RecordingForm,
    pub feeds: FeedStores,
    pub channel: ChannelConnection,
    pub chat: ChatComposer,
    pub suggestion_scroll: u16,
}

impl AppState {
    pub fn new(match_id: impl Into<String>) -> Self {
        Self {
            session: MatchSession::new(match_id),
            ..Self::default()
        }
    }

    pub fn signed_in(&self) -> bool {
        self.auth == AuthState::SignedIn
    }
}
