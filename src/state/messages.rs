use crate::session::gateway::PendingCommand;
use crate::session::score::PendingGoal;
use crate::state::feeds::PullTicket;
use crate::state::network::LoadingState;
use crossterm::event::KeyEvent;
use matchday_api::client::ApiResult;
use matchday_api::{ChatMessage, EventKind, MatchSnapshot, PitchZone, Player, Suggestion};

#[derive(Debug, Clone, PartialEq)]
pub enum NetworkRequest {
    LoadMatch { sequence: u64 },
    LoadSquad,
    SubmitTimer { command: PendingCommand },
    RecordTeamEvent {
        event: EventKind,
        player: String,
        zone: PitchZone,
        second: u32,
    },
    RecordOppositionEvent { event: EventKind },
    UpdateGoals { pending: PendingGoal },
    PullChat,
    SendChat { text: String },
    PullSuggestions { ticket: PullTicket },
}

#[derive(Debug)]
pub enum NetworkResponse {
    LoadingStateChanged { loading_state: LoadingState },
    MatchLoaded { sequence: u64, result: ApiResult<MatchSnapshot> },
    SquadLoaded { result: ApiResult<Vec<Player>> },
    TimerResolved { command: PendingCommand, result: ApiResult<MatchSnapshot> },
    EventRecorded { summary: String, result: ApiResult<()> },
    GoalResolved { pending: PendingGoal, result: ApiResult<MatchSnapshot> },
    ChatPulled { result: ApiResult<Vec<ChatMessage>> },
    ChatSent { result: ApiResult<ChatMessage> },
    SuggestionsPulled { ticket: PullTicket, result: ApiResult<Vec<Suggestion>> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTarget {
    Chat,
    Suggestions,
}

#[derive(Debug, Clone)]
pub enum UiEvent {
    KeyPressed(KeyEvent),
    Resize,
    AppStarted,
    ClockTick { generation: u64 },
    RefreshDue(RefreshTarget),
}
