mod app;
mod draw;
mod keys;
mod session;
mod state;
mod ui;

use crate::app::App;
use crate::state::app_settings::AppSettings;
use crate::state::channel::{ChannelEvent, RealtimeChannel, ReconnectPolicy};
use crate::state::credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
use crate::state::messages::{NetworkRequest, NetworkResponse, UiEvent};
use crate::state::network::{LoadingState, NetworkWorker};
use crate::state::refresher::{PeriodicRefresher, SuggestionsCue};
use crate::state::ticker::TickScheduler;
use crossterm::event::{self as crossterm_event, Event};
use crossterm::{cursor, execute, terminal};
use log::{error, warn};
use matchday_api::client::MatchdayApi;
use std::io::Stdout;
use std::sync::Arc;
use std::{io, panic};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, mpsc};
use tui::{Terminal, backend::CrosstermBackend};

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    match_id: Option<String>,
    token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Some(args) = handle_cli_args() else {
        return Ok(());
    };

    let settings = AppSettings::load().with_overrides(args.match_id, args.token);
    let Some(match_id) = settings.match_id.clone() else {
        eprintln!("No match selected.\n\n{}", usage_text());
        std::process::exit(2);
    };

    better_panic::install();

    tui_logger::init_logger(log::LevelFilter::Trace)?;
    tui_logger::set_default_level(log::LevelFilter::Info);

    let credentials = credential_store(&settings);
    let client = MatchdayApi::new(settings.api_base.clone()).with_token(credentials.get_token());

    let backend = CrosstermBackend::new(io::stdout());
    let terminal = Terminal::new(backend)?;

    setup_panic_hook();
    setup_terminal()?;

    let (ui_event_tx, ui_event_rx) = mpsc::channel::<UiEvent>(100);
    let (network_req_tx, network_req_rx) = mpsc::channel::<NetworkRequest>(100);
    let (network_resp_tx, network_resp_rx) = mpsc::channel::<NetworkResponse>(100);

    let channel = RealtimeChannel::new(settings.ws_url.clone(), match_id.clone(), ReconnectPolicy::default());
    let channel_events = channel.subscribe();
    let suggestion_cues = channel.subscribe();

    // Input handler thread
    let input_handler = tokio::spawn(input_handler_task(ui_event_tx.clone()));

    // Network thread
    let network_worker = NetworkWorker::new(client, match_id.clone(), network_req_rx, network_resp_tx);
    let network_task = tokio::spawn(network_worker.run());

    // Chat and suggestion pulls
    let periodic_updater = PeriodicRefresher::new(ui_event_tx.clone());
    let periodic_task = tokio::spawn(periodic_updater.run());

    let cue = SuggestionsCue::new(suggestion_cues, ui_event_tx.clone());
    let cue_task = tokio::spawn(cue.run());

    let ticker = TickScheduler::new(ui_event_tx.clone());
    let app = Arc::new(Mutex::new(App::new(settings, match_id, credentials, ticker, channel)));

    let _ = ui_event_tx.send(UiEvent::AppStarted).await;

    main_ui_loop(terminal, app, ui_event_rx, network_req_tx, network_resp_rx, channel_events).await;

    input_handler.abort();
    network_task.abort();
    periodic_task.abort();
    cue_task.abort();

    Ok(())
}

/// `None` when the invocation only asked for help or the version.
fn handle_cli_args() -> Option<CliArgs> {
    match parse_args(std::env::args().skip(1)) {
        Ok(Some(args)) => Some(args),
        Ok(None) => None,
        Err(message) => {
            eprintln!("{message}\n\n{}", usage_text());
            std::process::exit(2);
        }
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<CliArgs>, String> {
    let mut parsed = CliArgs::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("{}", usage_text());
                return Ok(None);
            }
            "-V" | "--version" => {
                println!("matchday {}", env!("CARGO_PKG_VERSION"));
                return Ok(None);
            }
            "-t" | "--token" => {
                let token = args.next().ok_or("--token needs a value")?;
                parsed.token = Some(token);
            }
            other if other.starts_with('-') => return Err(format!("Unknown argument: {other}")),
            other => {
                if parsed.match_id.is_some() {
                    return Err(format!("Unexpected argument: {other}"));
                }
                parsed.match_id = Some(other.to_string());
            }
        }
    }
    Ok(Some(parsed))
}

fn usage_text() -> &'static str {
    "matchday - live match console

Usage:
  matchday [--token <token>] <match-id>
  matchday --help
  matchday --version

Environment:
  MATCHDAY_API_BASE   REST base URL (default http://localhost:8000)
  MATCHDAY_WS_URL     Live updates URL (default ws://localhost:3001)
  MATCHDAY_MATCH_ID   Match to open when none is given
  MATCHDAY_TOKEN      Bearer token, stored for later runs
  MATCHDAY_LOG        Log level (error, warn, info, debug, trace)"
}

/// A token given at startup replaces the stored one. When it cannot be
/// written it is kept for this run only.
fn credential_store(settings: &AppSettings) -> Arc<dyn CredentialStore> {
    let store = FileCredentialStore::default_location();
    match &settings.token {
        Some(token) => match store.set_token(token) {
            Ok(()) => Arc::new(store),
            Err(e) => {
                warn!("cannot store token at {}: {e}", store.path().display());
                Arc::new(MemoryCredentialStore::new(Some(token.clone())))
            }
        },
        None => Arc::new(store),
    }
}

async fn main_ui_loop(
    mut terminal: Terminal<CrosstermBackend<Stdout>>,
    app: Arc<Mutex<App>>,
    mut ui_events: mpsc::Receiver<UiEvent>,
    network_requests: mpsc::Sender<NetworkRequest>,
    mut network_responses: mpsc::Receiver<NetworkResponse>,
    mut channel_events: broadcast::Receiver<ChannelEvent>,
) {
    let mut loading = LoadingState::default();

    loop {
        tokio::select! {
            Some(ui_event) = ui_events.recv() => {
                let should_redraw = handle_ui_event(ui_event, &app, &network_requests).await;
                if should_redraw {
                    let mut app_guard = app.lock().await;
                    draw::draw(&mut terminal, &mut app_guard, loading);
                }
            }

            Some(response) = network_responses.recv() => {
                let should_redraw =
                    handle_network_response(response, &app, &network_requests, &mut loading).await;
                if should_redraw {
                    let mut app_guard = app.lock().await;
                    draw::draw(&mut terminal, &mut app_guard, loading);
                }
            }

            received = channel_events.recv() => {
                match received {
                    Ok(event) => {
                        let mut app_guard = app.lock().await;
                        app_guard.on_channel_event(event);
                        draw::draw(&mut terminal, &mut app_guard, loading);
                    }
                    Err(RecvError::Lagged(skipped)) => warn!("ui fell behind live updates by {skipped}"),
                    Err(RecvError::Closed) => {
                        error!("live update channel closed");
                        break;
                    }
                }
            }
        }
    }
}

async fn handle_ui_event(
    ui_event: UiEvent,
    app: &Arc<Mutex<App>>,
    network_requests: &mpsc::Sender<NetworkRequest>,
) -> bool {
    match ui_event {
        UiEvent::AppStarted => {
            let requests = app.lock().await.start();
            for request in requests {
                let _ = network_requests.send(request).await;
            }
            true
        }
        UiEvent::KeyPressed(key_event) => {
            keys::handle_key_bindings(key_event, app, network_requests).await;
            true
        }
        UiEvent::Resize => true,
        UiEvent::ClockTick { generation } => app.lock().await.on_clock_tick(generation),
        UiEvent::RefreshDue(target) => {
            let request = app.lock().await.on_refresh_due(target);
            if let Some(request) = request {
                let _ = network_requests.send(request).await;
            }
            false
        }
    }
}

async fn handle_network_response(
    response: NetworkResponse,
    app: &Arc<Mutex<App>>,
    network_requests: &mpsc::Sender<NetworkRequest>,
    loading: &mut LoadingState,
) -> bool {
    let mut guard = app.lock().await;
    let follow_up = match response {
        NetworkResponse::LoadingStateChanged { loading_state } => {
            *loading = loading_state;
            None
        }
        NetworkResponse::MatchLoaded { sequence, result } => guard.on_match_loaded(sequence, result),
        NetworkResponse::TimerResolved { command, result } => guard.on_timer_resolved(command, result),
        NetworkResponse::SquadLoaded { result } => {
            guard.on_squad_loaded(result);
            None
        }
        NetworkResponse::EventRecorded { summary, result } => {
            guard.on_event_recorded(summary, result);
            None
        }
        NetworkResponse::GoalResolved { pending, result } => {
            guard.on_goal_resolved(pending, result);
            None
        }
        NetworkResponse::ChatPulled { result } => {
            guard.on_chat_pulled(result);
            None
        }
        NetworkResponse::ChatSent { result } => {
            guard.on_chat_sent(result);
            None
        }
        NetworkResponse::SuggestionsPulled { ticket, result } => {
            guard.on_suggestions_pulled(ticket, result);
            None
        }
    };
    drop(guard);

    if let Some(request) = follow_up {
        let _ = network_requests.send(request).await;
    }
    true
}

async fn input_handler_task(ui_events: mpsc::Sender<UiEvent>) {
    loop {
        if let Ok(event) = crossterm_event::read() {
            let ui_event = match event {
                Event::Key(key_event) => Some(UiEvent::KeyPressed(key_event)),
                Event::Resize(_, _) => Some(UiEvent::Resize),
                _ => None,
            };

            if let Some(ui_event) = ui_event
                && ui_events.send(ui_event).await.is_err()
            {
                break;
            }
        }
    }
}

fn setup_terminal() -> io::Result<()> {
    let mut stdout = io::stdout();
    execute!(stdout, cursor::Hide)?;
    execute!(stdout, terminal::EnterAlternateScreen)?;
    execute!(stdout, terminal::Clear(terminal::ClearType::All))?;
    terminal::enable_raw_mode()
}

pub fn cleanup_terminal() {
    let mut stdout = io::stdout();
    let _ = execute!(stdout, cursor::MoveTo(0, 0));
    let _ = execute!(stdout, terminal::Clear(terminal::ClearType::All));
    let _ = execute!(stdout, terminal::LeaveAlternateScreen);
    let _ = execute!(stdout, cursor::Show);
    let _ = terminal::disable_raw_mode();
}

fn setup_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        cleanup_terminal();
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));
}
