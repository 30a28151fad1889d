use crate::app::{App, MenuItem};
use crate::state::messages::NetworkRequest;
use crossterm::event::KeyCode::Char;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use matchday_api::{GoalSide, TimerAction};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

pub async fn handle_key_bindings(
    key_event: KeyEvent,
    app: &Arc<Mutex<App>>,
    network_requests: &mpsc::Sender<NetworkRequest>,
) {
    let mut guard = app.lock().await;

    if !guard.state.signed_in() {
        match (key_event.code, key_event.modifiers) {
            (Char('q'), _) | (Char('c'), KeyModifiers::CONTROL) => quit(),
            (Char('"'), _) => guard.toggle_show_logs(),
            _ => {}
        }
        return;
    }

    if guard.state.chat.composing {
        let request = match (key_event.code, key_event.modifiers) {
            (Char('c'), KeyModifiers::CONTROL) => quit(),
            (KeyCode::Esc, _) => {
                guard.state.chat.composing = false;
                None
            }
            (KeyCode::Enter, _) => guard.send_chat(),
            (KeyCode::Backspace, _) => {
                guard.state.chat.input.pop();
                None
            }
            (Char(c), _) => {
                guard.state.chat.input.push(c);
                None
            }
            _ => None,
        };
        drop(guard);
        send(network_requests, request).await;
        return;
    }

    let request = match (guard.state.active_tab, key_event.code, key_event.modifiers) {
        // Quit
        (_, Char('q'), _) | (_, Char('c'), KeyModifiers::CONTROL) => quit(),

        // Tab switching
        (_, KeyCode::Tab, _) => {
            guard.next_tab();
            None
        }
        (_, Char('?'), _) => {
            guard.update_tab(MenuItem::Help);
            None
        }
        (MenuItem::Help, KeyCode::Esc, _) => {
            guard.exit_help();
            None
        }

        // Phase commands
        (MenuItem::Match, Char('s'), _) => guard.submit_phase(TimerAction::Start),
        (MenuItem::Match, Char('p') | Char(' '), _) => guard.toggle_pause(),
        (MenuItem::Match, Char('F'), _) => guard.submit_phase(TimerAction::Finish),

        // Recording form
        (MenuItem::Match, Char('t'), _) => {
            guard.state.form.toggle_target();
            None
        }
        (MenuItem::Match, Char('e') | KeyCode::Right, _) => {
            guard.state.form.next_event();
            None
        }
        (MenuItem::Match, Char('E') | KeyCode::Left, _) => {
            guard.state.form.prev_event();
            None
        }
        (MenuItem::Match, Char('j') | KeyCode::Down, _) => {
            guard.state.form.next_player();
            None
        }
        (MenuItem::Match, Char('k') | KeyCode::Up, _) => {
            guard.state.form.prev_player();
            None
        }
        (MenuItem::Match, Char(c @ '1'..='6'), _) => {
            if let Some(n) = c.to_digit(10) {
                guard.select_zone(n as u8);
            }
            None
        }
        (MenuItem::Match, Char('c'), _) => {
            guard.state.form.clear();
            None
        }
        (MenuItem::Match, KeyCode::Enter, _) => guard.record_event(),
        (MenuItem::Match, Char('g'), _) => guard.record_goal(GoalSide::Scored),
        (MenuItem::Match, Char('G'), _) => guard.record_goal(GoalSide::Conceded),

        // Chat
        (MenuItem::Chat, Char('i') | KeyCode::Enter, _) => {
            guard.state.chat.composing = true;
            None
        }
        (MenuItem::Chat, Char('k') | KeyCode::Up, _) => {
            guard.state.chat.scroll_offset = guard.state.chat.scroll_offset.saturating_add(1);
            None
        }
        (MenuItem::Chat, Char('j') | KeyCode::Down, _) => {
            guard.state.chat.scroll_offset = guard.state.chat.scroll_offset.saturating_sub(1);
            None
        }

        // Suggestions
        (MenuItem::Suggestions, Char('j') | KeyCode::Down, _) => {
            guard.state.suggestion_scroll = guard.state.suggestion_scroll.saturating_add(1);
            None
        }
        (MenuItem::Suggestions, Char('k') | KeyCode::Up, _) => {
            guard.state.suggestion_scroll = guard.state.suggestion_scroll.saturating_sub(1);
            None
        }

        // Global
        (_, Char('R'), _) => {
            guard.retry_channel();
            None
        }
        (_, Char('f'), _) => {
            guard.toggle_full_screen();
            None
        }
        (_, Char('"'), _) => {
            guard.toggle_show_logs();
            None
        }

        _ => None,
    };

    drop(guard);
    send(network_requests, request).await;
}

async fn send(network_requests: &mpsc::Sender<NetworkRequest>, request: Option<NetworkRequest>) {
    if let Some(request) = request {
        let _ = network_requests.send(request).await;
    }
}

fn quit() -> ! {
    crate::cleanup_terminal();
    std::process::exit(0);
}
