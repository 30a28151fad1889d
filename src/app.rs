use crate::session::{MatchPhase, SessionError};
use crate::session::admission::{Admission, RecordingRequest, admit_event, admit_goal};
use crate::session::clock::{ClockEvent, ClockOutcome, ClockTransition};
use crate::session::gateway::PendingCommand;
use crate::session::score::PendingGoal;
use crate::state::app_settings::AppSettings;
use crate::state::app_state::{AppState, AuthState, StatusLine};
use crate::state::channel::{ChannelEvent, ChannelStatus, RealtimeChannel};
use crate::state::credentials::CredentialStore;
use crate::state::feeds::{FeedEvent, PullTicket};
use crate::state::messages::{NetworkRequest, RefreshTarget};
use crate::state::ticker::TickScheduler;
use log::{debug, error, info, warn};
use matchday_api::client::ApiResult;
use matchday_api::{ChatMessage, GoalSide, MatchSnapshot, PitchZone, Player, Suggestion, TimerAction};
use std::sync::Arc;

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum MenuItem {
    #[default]
    Match,
    Chat,
    Suggestions,
    Help,
}

pub struct App {
    pub settings: AppSettings,
    pub state: AppState,
    credentials: Arc<dyn CredentialStore>,
    ticker: TickScheduler,
    channel: RealtimeChannel,
}

impl App {
    pub fn new(
        settings: AppSettings,
        match_id: String,
        credentials: Arc<dyn CredentialStore>,
        ticker: TickScheduler,
        channel: RealtimeChannel,
    ) -> Self {
        let app = Self {
            state: AppState::new(match_id),
            settings,
            credentials,
            ticker,
            channel,
        };

        if let Some(level) = app.settings.log_level {
            log::set_max_level(level);
            tui_logger::set_default_level(level);
        }

        app
    }

    /// Initial loads. Without a credential nothing is sent at all.
    pub fn start(&mut self) -> Vec<NetworkRequest> {
        if self.credentials.get_token().is_none() {
            warn!("no credential available");
            self.state.auth = AuthState::SignInRequired;
            return Vec::new();
        }

        self.channel.open();
        vec![
            NetworkRequest::LoadMatch { sequence: self.state.gateway.begin_sync() },
            NetworkRequest::LoadSquad,
            NetworkRequest::PullChat,
        ]
    }

    // -----------------------------------------------------------------------
    // Phase commands
    // -----------------------------------------------------------------------

    pub fn submit_phase(&mut self, action: TimerAction) -> Option<NetworkRequest> {
        if !self.state.signed_in() {
            return None;
        }
        match self.state.gateway.submit(action, &self.state.session.clock) {
            Ok(command) => {
                self.set_status(StatusLine::info(format!("{}…", action.label())));
                Some(NetworkRequest::SubmitTimer { command })
            }
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    /// Pause a running clock, resume a stopped one.
    pub fn toggle_pause(&mut self) -> Option<NetworkRequest> {
        let action = if self.state.session.is_clock_running() {
            TimerAction::Pause
        } else {
            TimerAction::Resume
        };
        self.submit_phase(action)
    }

    pub fn on_clock_tick(&mut self, generation: u64) -> bool {
        match self.state.session.clock.apply(ClockEvent::Tick { generation }) {
            Ok(ClockOutcome::Ticked(_)) => true,
            Ok(_) => false,
            Err(_) => {
                self.ticker.sync(&self.state.session.clock);
                false
            }
        }
    }

    pub fn on_match_loaded(
        &mut self,
        sequence: u64,
        result: ApiResult<MatchSnapshot>,
    ) -> Option<NetworkRequest> {
        self.resolve_snapshot(sequence, None, result)
    }

    pub fn on_timer_resolved(
        &mut self,
        command: PendingCommand,
        result: ApiResult<MatchSnapshot>,
    ) -> Option<NetworkRequest> {
        self.resolve_snapshot(command.sequence, Some(command.action), result)
    }

    fn resolve_snapshot(
        &mut self,
        sequence: u64,
        action: Option<TimerAction>,
        result: ApiResult<MatchSnapshot>,
    ) -> Option<NetworkRequest> {
        let state = &mut self.state;
        match state.gateway.resolve(sequence, result, &mut state.session.clock) {
            Ok(resolution) => {
                state.session.absorb_details(&resolution.snapshot);
                if action.is_some() {
                    self.set_status(StatusLine::info(format!(
                        "{} · {}",
                        resolution.reading.phase,
                        if resolution.reading.is_running { "clock running" } else { "clock stopped" }
                    )));
                }
                self.after_clock_change(resolution.transition)
            }
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    /// Keep the ticker and the suggestions feed in step with the clock.
    /// Entering a live phase triggers an immediate suggestions pull.
    fn after_clock_change(&mut self, transition: ClockTransition) -> Option<NetworkRequest> {
        let clock = &self.state.session.clock;
        self.ticker.sync(clock);
        debug!(
            "clock now {} at {}s (generation {})",
            clock.phase(),
            clock.elapsed_seconds(),
            transition.generation
        );

        let phase = clock.phase();
        self.state.feeds.apply(FeedEvent::PhaseChanged(phase));
        if transition.phase_changed {
            info!("match phase {} -> {phase}", transition.previous_phase);
            return self.pull_suggestions();
        }
        None
    }

    // -----------------------------------------------------------------------
    // Recording
    // -----------------------------------------------------------------------

    pub fn record_event(&mut self) -> Option<NetworkRequest> {
        if !self.state.signed_in() {
            return None;
        }
        let admission = admit_event(&self.state.session.clock, &self.state.form.intent);
        if let Admission::Blocked(reason) = admission {
            self.set_status(StatusLine::error(reason.message()));
            return None;
        }

        let second = self.state.session.elapsed_seconds();
        let request = match self.state.form.intent.ready()? {
            RecordingRequest::Team { event, player, zone } => {
                NetworkRequest::RecordTeamEvent { event, player, zone, second }
            }
            RecordingRequest::Opposition { event } => NetworkRequest::RecordOppositionEvent { event },
        };
        self.state.form.clear();
        Some(request)
    }

    pub fn on_event_recorded(&mut self, summary: String, result: ApiResult<()>) {
        match result {
            Ok(()) => self.set_status(StatusLine::info(format!("Recorded {summary}"))),
            Err(err) => {
                warn!("recording {summary} failed: {err}");
                self.fail(SessionError::from_api(&err));
            }
        }
    }

    pub fn record_goal(&mut self, side: GoalSide) -> Option<NetworkRequest> {
        if !self.state.signed_in() {
            return None;
        }
        if let Admission::Blocked(reason) = admit_goal(&self.state.session.clock) {
            self.set_status(StatusLine::error(reason.message()));
            return None;
        }
        let pending = self.state.session.score.record(side);
        Some(NetworkRequest::UpdateGoals { pending })
    }

    pub fn on_goal_resolved(&mut self, pending: PendingGoal, result: ApiResult<MatchSnapshot>) {
        if let Err(err) = self.state.session.score.resolve(pending, result) {
            self.fail(err);
        }
    }

    pub fn select_zone(&mut self, number: u8) {
        if let Some(zone) = PitchZone::from_number(number) {
            self.state.form.intent.zone = Some(zone);
        }
    }

    pub fn on_squad_loaded(&mut self, result: ApiResult<Vec<Player>>) {
        match result {
            Ok(squad) => {
                debug!("squad loaded: {} players", squad.len());
                self.state.form.load_squad(squad);
            }
            Err(err) => self.background_failure("squad", &err),
        }
    }

    // -----------------------------------------------------------------------
    // Feeds
    // -----------------------------------------------------------------------

    pub fn on_refresh_due(&mut self, target: RefreshTarget) -> Option<NetworkRequest> {
        if !self.state.signed_in() {
            return None;
        }
        match target {
            RefreshTarget::Chat => Some(NetworkRequest::PullChat),
            RefreshTarget::Suggestions => self.pull_suggestions(),
        }
    }

    fn pull_suggestions(&mut self) -> Option<NetworkRequest> {
        let ticket = self.state.feeds.suggestions.begin_pull()?;
        Some(NetworkRequest::PullSuggestions { ticket })
    }

    pub fn on_suggestions_pulled(&mut self, ticket: PullTicket, result: ApiResult<Vec<Suggestion>>) {
        match result {
            Ok(items) => {
                self.state.feeds.apply(FeedEvent::SuggestionsPulled { ticket, items });
            }
            Err(err) => {
                self.state.feeds.apply(FeedEvent::SuggestionsFailed(ticket));
                self.background_failure("suggestions", &err);
            }
        }
    }

    pub fn on_chat_pulled(&mut self, result: ApiResult<Vec<ChatMessage>>) {
        match result {
            Ok(messages) => {
                self.state.feeds.apply(FeedEvent::ChatArrived(messages));
            }
            Err(err) => self.background_failure("chat", &err),
        }
    }

    pub fn send_chat(&mut self) -> Option<NetworkRequest> {
        if !self.state.signed_in() {
            return None;
        }
        match self.state.chat.take() {
            Ok(text) => Some(NetworkRequest::SendChat { text }),
            Err(err) => {
                self.set_status(StatusLine::error(err.message()));
                None
            }
        }
    }

    pub fn on_chat_sent(&mut self, result: ApiResult<ChatMessage>) {
        match result {
            Ok(message) => {
                self.state.feeds.apply(FeedEvent::ChatArrived(vec![message]));
            }
            Err(err) => self.fail(SessionError::from_api(&err)),
        }
    }

    // -----------------------------------------------------------------------
    // Push channel
    // -----------------------------------------------------------------------

    /// Suggestion cues are consumed by their own subscriber.
    pub fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Status(connection) => {
                if connection.status == ChannelStatus::Failed {
                    self.set_status(StatusLine::error("Live updates unavailable. Press R to retry"));
                }
                self.state.channel = connection;
            }
            ChannelEvent::Chat(message) => {
                self.state.feeds.apply(FeedEvent::ChatArrived(vec![message]));
            }
            ChannelEvent::ScoreCorrected { goals_for, goals_against } => {
                if self.state.session.phase() == MatchPhase::Finished {
                    debug!("ignoring score correction {goals_for}-{goals_against} after full time");
                    return;
                }
                self.state.session.score.apply_authoritative(goals_for, goals_against);
            }
            ChannelEvent::SuggestionsInvalidated => {}
        }
    }

    pub fn retry_channel(&mut self) {
        if !self.state.signed_in() {
            return;
        }
        info!("retrying push channel");
        self.channel.retry();
    }

    // -----------------------------------------------------------------------
    // Errors
    // -----------------------------------------------------------------------

    fn fail(&mut self, err: SessionError) {
        match err {
            SessionError::SessionInvalid => self.invalidate_session(),
            err if err.is_user_visible() => self.set_status(StatusLine::error(err.to_string())),
            err => debug!("{err}"),
        }
    }

    /// Failures of periodic pulls stay in the log unless they end the session.
    fn background_failure(&mut self, what: &str, err: &matchday_api::client::ApiError) {
        if err.is_unauthorized() {
            self.invalidate_session();
        } else {
            warn!("{what} refresh failed: {err}");
        }
    }

    fn invalidate_session(&mut self) {
        if self.state.auth == AuthState::SignInRequired {
            return;
        }
        warn!("session rejected by the server; signing out");
        if let Err(e) = self.credentials.clear_token() {
            error!("failed to clear stored token: {e}");
        }
        self.channel.close();
        self.ticker.disarm();
        self.state.auth = AuthState::SignInRequired;
        self.set_status(StatusLine::error(SessionError::SessionInvalid.to_string()));
    }

    fn set_status(&mut self, status: StatusLine) {
        self.state.status = Some(status);
    }

    // -----------------------------------------------------------------------
    // Tab management
    // -----------------------------------------------------------------------

    pub fn update_tab(&mut self, next: MenuItem) {
        if self.state.active_tab == next {
            return;
        }
        self.state.previous_tab = self.state.active_tab;
        self.state.active_tab = next;
        if self.state.active_tab == MenuItem::Chat {
            self.state.chat.scroll_offset = 0;
        }
    }

    pub fn next_tab(&mut self) {
        let next = match self.state.active_tab {
            MenuItem::Match => MenuItem::Chat,
            MenuItem::Chat => MenuItem::Suggestions,
            MenuItem::Suggestions | MenuItem::Help => MenuItem::Match,
        };
        self.update_tab(next);
    }

    pub fn exit_help(&mut self) {
        if self.state.active_tab == MenuItem::Help {
            self.state.active_tab = self.state.previous_tab;
        }
    }

    pub fn toggle_show_logs(&mut self) {
        self.state.show_logs = !self.state.show_logs;
    }

    pub fn toggle_full_screen(&mut self) {
        self.settings.full_screen = !self.settings.full_screen;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::channel::{ChannelConnection, ReconnectPolicy};
    use crate::state::credentials::MemoryCredentialStore;
    use crate::state::messages::UiEvent;
    use chrono::{TimeZone, Utc};
    use matchday_api::client::ApiError;
    use matchday_api::{EventKind, MatchState, MessageId, Priority};
    use tokio::sync::mpsc;

    struct Harness {
        app: App,
        credentials: Arc<MemoryCredentialStore>,
        _ticks: mpsc::Receiver<UiEvent>,
    }

    fn harness(token: Option<&str>) -> Harness {
        let credentials = Arc::new(MemoryCredentialStore::new(token.map(str::to_string)));
        let (tx, rx) = mpsc::channel(64);
        let app = App::new(
            AppSettings::default(),
            "7".into(),
            credentials.clone(),
            TickScheduler::new(tx),
            // Port 9 is discard; nothing in these tests waits on the channel.
            RealtimeChannel::new("ws://127.0.0.1:9", "7", ReconnectPolicy::default()),
        );
        Harness { app, credentials, _ticks: rx }
    }

    fn snapshot(state: MatchState, elapsed: u32) -> MatchSnapshot {
        MatchSnapshot {
            id: "7".into(),
            opponent: "Rovers".into(),
            state,
            elapsed_seconds: elapsed,
            goals_scored: 0,
            goals_conceded: 0,
            formation: None,
            opponent_formation: None,
        }
    }

    fn timer_command(request: Option<NetworkRequest>) -> PendingCommand {
        match request {
            Some(NetworkRequest::SubmitTimer { command }) => command,
            other => panic!("expected a timer submission, got {other:?}"),
        }
    }

    fn started(app: &mut App) {
        let start = timer_command(app.submit_phase(TimerAction::Start));
        app.on_timer_resolved(start, Ok(snapshot(MatchState::FirstHalf, 0)));
    }

    fn status_text(app: &App) -> &str {
        app.state.status.as_ref().map(|s| s.text.as_str()).unwrap_or("")
    }

    #[tokio::test]
    async fn start_without_credential_asks_for_sign_in() {
        let mut h = harness(None);
        assert!(h.app.start().is_empty());
        assert_eq!(h.app.state.auth, AuthState::SignInRequired);
        assert!(h.app.submit_phase(TimerAction::Start).is_none());
    }

    #[tokio::test]
    async fn start_loads_match_squad_and_chat() {
        let mut h = harness(Some("tok"));
        let requests = h.app.start();
        assert_eq!(
            requests,
            vec![
                NetworkRequest::LoadMatch { sequence: 1 },
                NetworkRequest::LoadSquad,
                NetworkRequest::PullChat,
            ]
        );
    }

    #[tokio::test]
    async fn start_tick_pause_flow() {
        let mut h = harness(Some("tok"));
        let start = timer_command(h.app.submit_phase(TimerAction::Start));
        assert_eq!(start.submitted_elapsed, 0);

        let follow_up = h.app.on_timer_resolved(start, Ok(snapshot(MatchState::FirstHalf, 0)));
        assert!(matches!(follow_up, Some(NetworkRequest::PullSuggestions { .. })));
        assert_eq!(h.app.state.session.phase(), MatchPhase::FirstHalf);
        assert!(h.app.state.session.is_clock_running());
        assert_eq!(h.app.ticker.armed_generation(), Some(h.app.state.session.clock.generation()));

        let generation = h.app.state.session.clock.generation();
        for _ in 0..5 {
            assert!(h.app.on_clock_tick(generation));
        }
        assert_eq!(h.app.state.session.elapsed_seconds(), 5);

        let pause = timer_command(h.app.toggle_pause());
        assert_eq!(pause.action, TimerAction::Pause);
        assert_eq!(pause.submitted_elapsed, 5);
        h.app.on_timer_resolved(pause, Ok(snapshot(MatchState::FirstHalf, 5)));

        assert!(!h.app.state.session.is_clock_running());
        assert_eq!(h.app.ticker.armed_generation(), None);
        assert!(!h.app.on_clock_tick(generation));
        assert_eq!(h.app.state.session.elapsed_seconds(), 5);
    }

    #[tokio::test]
    async fn invalid_transition_is_reported_without_a_request() {
        let mut h = harness(Some("tok"));
        assert!(h.app.submit_phase(TimerAction::Pause).is_none());
        assert!(status_text(&h.app).contains("cannot pause"));
    }

    #[tokio::test]
    async fn unauthorized_response_signs_out() {
        let mut h = harness(Some("tok"));
        h.app.start();
        let start = timer_command(h.app.submit_phase(TimerAction::Start));

        h.app.on_timer_resolved(start, Err(ApiError::Unauthorized("u".into())));

        assert_eq!(h.app.state.auth, AuthState::SignInRequired);
        assert_eq!(h.credentials.get_token(), None);
        assert!(!h.app.channel.is_open());
        assert!(h.app.submit_phase(TimerAction::Start).is_none());
        assert!(h.app.on_refresh_due(RefreshTarget::Chat).is_none());
    }

    #[tokio::test]
    async fn transport_failure_keeps_the_clock_running() {
        let mut h = harness(Some("tok"));
        started(&mut h.app);
        let pause = timer_command(h.app.toggle_pause());

        h.app.on_timer_resolved(pause, Err(ApiError::Other("reset".into())));

        assert!(h.app.state.session.is_clock_running());
        assert_eq!(status_text(&h.app), "Server connection failed");
        assert_eq!(h.app.state.auth, AuthState::SignedIn);
    }

    #[tokio::test]
    async fn paused_clock_blocks_recording() {
        let mut h = harness(Some("tok"));
        started(&mut h.app);
        let pause = timer_command(h.app.toggle_pause());
        h.app.on_timer_resolved(pause, Ok(snapshot(MatchState::FirstHalf, 0)));

        h.app.state.form.next_event();
        assert!(h.app.record_event().is_none());
        assert_eq!(status_text(&h.app), "Resume match to record event");
        assert!(h.app.record_goal(GoalSide::Scored).is_none());
    }

    #[tokio::test]
    async fn complete_team_intent_becomes_a_write_at_the_current_second() {
        let mut h = harness(Some("tok"));
        started(&mut h.app);
        let generation = h.app.state.session.clock.generation();
        for _ in 0..12 {
            h.app.on_clock_tick(generation);
        }
        h.app.on_squad_loaded(Ok(vec![Player { id: None, name: "Ana".into() }]));
        h.app.state.form.next_event();
        h.app.state.form.next_player();
        h.app.select_zone(5);

        assert_eq!(
            h.app.record_event(),
            Some(NetworkRequest::RecordTeamEvent {
                event: EventKind::ShotsOnTarget,
                player: "Ana".into(),
                zone: PitchZone::AttackingCenter,
                second: 12,
            })
        );
        assert!(h.app.state.form.intent.event.is_none());
    }

    #[tokio::test]
    async fn goal_is_optimistic_then_rolled_back_on_refusal() {
        let mut h = harness(Some("tok"));
        started(&mut h.app);

        let Some(NetworkRequest::UpdateGoals { pending }) = h.app.record_goal(GoalSide::Scored) else {
            panic!("expected a goal write");
        };
        assert_eq!(h.app.state.session.goals_for(), 1);

        h.app.on_goal_resolved(
            pending,
            Err(ApiError::Api { status: 400, detail: Some("Nope".into()), url: "u".into() }),
        );
        assert_eq!(h.app.state.session.goals_for(), 0);
        assert_eq!(status_text(&h.app), "Nope");
    }

    #[tokio::test]
    async fn pushed_then_pulled_chat_appears_once() {
        let mut h = harness(Some("tok"));
        let message = ChatMessage {
            id: MessageId::new("m1"),
            sender: "coach".into(),
            sender_role: "manager".into(),
            text: "press".into(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 13, 18, 30, 0).unwrap(),
        };

        h.app.on_channel_event(ChannelEvent::Chat(message.clone()));
        h.app.on_chat_pulled(Ok(vec![message]));

        assert_eq!(h.app.state.feeds.chat.len(), 1);
    }

    #[tokio::test]
    async fn finishing_clears_suggestions_despite_a_pull_in_flight() {
        let mut h = harness(Some("tok"));
        started(&mut h.app);

        let Some(NetworkRequest::PullSuggestions { ticket }) =
            h.app.on_refresh_due(RefreshTarget::Suggestions)
        else {
            panic!("expected a suggestions pull");
        };

        let finish = timer_command(h.app.submit_phase(TimerAction::Finish));
        h.app.on_timer_resolved(finish, Ok(snapshot(MatchState::Finished, 2700)));
        h.app.on_suggestions_pulled(
            ticket,
            Ok(vec![Suggestion {
                category: "Tactical".into(),
                priority: Priority::High,
                title: "Press higher".into(),
                message: String::new(),
                action_items: Vec::new(),
            }]),
        );

        assert!(h.app.state.feeds.suggestions.items().is_empty());
        assert!(h.app.on_refresh_due(RefreshTarget::Suggestions).is_none());
        assert_eq!(h.app.submit_phase(TimerAction::Start), None);
        assert_eq!(status_text(&h.app), "match is finished");
    }

    #[tokio::test]
    async fn failed_channel_is_announced() {
        let mut h = harness(Some("tok"));
        h.app.on_channel_event(ChannelEvent::Status(ChannelConnection {
            status: ChannelStatus::Failed,
            reconnect_attempt: 15,
        }));
        assert_eq!(h.app.state.channel.status, ChannelStatus::Failed);
        assert!(status_text(&h.app).contains("Press R"));
    }

    #[tokio::test]
    async fn score_correction_from_push_is_applied() {
        let mut h = harness(Some("tok"));
        h.app.on_channel_event(ChannelEvent::ScoreCorrected { goals_for: 2, goals_against: 1 });
        assert_eq!(h.app.state.session.goals_for(), 2);
        assert_eq!(h.app.state.session.goals_against(), 1);
    }

    #[tokio::test]
    async fn score_correction_after_full_time_is_ignored() {
        let mut h = harness(Some("tok"));
        started(&mut h.app);
        h.app.on_channel_event(ChannelEvent::ScoreCorrected { goals_for: 1, goals_against: 0 });

        let finish = timer_command(h.app.submit_phase(TimerAction::Finish));
        let full_time = MatchSnapshot { goals_scored: 1, ..snapshot(MatchState::Finished, 2700) };
        h.app.on_timer_resolved(finish, Ok(full_time));
        assert_eq!(h.app.state.session.phase(), MatchPhase::Finished);
        h.app.on_channel_event(ChannelEvent::ScoreCorrected { goals_for: 4, goals_against: 4 });

        assert_eq!(h.app.state.session.goals_for(), 1);
        assert_eq!(h.app.state.session.goals_against(), 0);
    }

    #[tokio::test]
    async fn tick_from_before_a_pause_does_not_redraw() {
        let mut h = harness(Some("tok"));
        started(&mut h.app);
        let before = h.app.state.session.clock.generation();
        assert!(h.app.on_clock_tick(before));

        let pause = timer_command(h.app.toggle_pause());
        h.app.on_timer_resolved(pause, Ok(snapshot(MatchState::Paused, 1)));
        assert_ne!(h.app.state.session.clock.generation(), before);

        assert!(!h.app.on_clock_tick(before));
        assert_eq!(h.app.state.session.elapsed_seconds(), 1);
    }
}
