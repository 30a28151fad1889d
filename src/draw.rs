use tui::backend::Backend;
use tui::layout::{Alignment, Constraint, Layout, Rect};
use tui::style::{Color, Modifier, Style};
use tui::text::{Line, Span};
use tui::widgets::{Block, BorderType, Borders, Paragraph, Tabs, Wrap};
use tui::{Frame, Terminal};
use tui_logger::TuiLoggerWidget;

use crate::app::{App, MenuItem};
use crate::session::MatchPhase;
use crate::session::admission::{Admission, RecordingTarget, admit_event};
use crate::session::clock::format_clock;
use crate::state::channel::ChannelStatus;
use crate::state::network::{ERROR_CHAR, LoadingState};
use crate::ui::layout::LayoutAreas;
use matchday_api::{PitchZone, Priority};

static TABS: &[&str; 3] = &["Match", "Chat", "Suggestions"];

pub fn draw<B>(terminal: &mut Terminal<B>, app: &mut App, loading: LoadingState)
where
    B: Backend,
{
    let current_size = terminal.size().unwrap_or_default();
    if current_size.width <= 10 || current_size.height <= 10 {
        return;
    }

    let mut layout = LayoutAreas::new(current_size);

    let drawn = terminal.draw(|f| {
        layout.update(f.area(), app.settings.full_screen, app.state.show_logs);

        if !app.settings.full_screen {
            draw_tabs(f, layout.tab_bar, app);
        }

        if !app.state.signed_in() {
            draw_sign_in_required(f, layout.main, app);
        } else {
            match app.state.active_tab {
                MenuItem::Match => draw_match(f, layout.main, app),
                MenuItem::Chat => draw_chat(f, layout.main, app),
                MenuItem::Suggestions => draw_suggestions(f, layout.main, app),
                MenuItem::Help => draw_help(f, layout.main),
            }
        }

        if app.state.show_logs {
            draw_logs(f, layout.logs);
        }
        draw_status(f, layout.status, app);
        draw_loading_spinner(f, f.area(), app, loading);
    });
    if let Err(e) = drawn {
        log::error!("draw failed: {e}");
    }
}

pub fn default_border<'a>(color: Color) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(color))
}

fn draw_tabs(f: &mut Frame, tab_bar: [Rect; 2], app: &App) {
    let style = Style::default().fg(Color::White);
    let border_type = BorderType::Rounded;

    let tab_index = match app.state.active_tab {
        MenuItem::Match => 0,
        MenuItem::Chat => 1,
        MenuItem::Suggestions => 2,
        MenuItem::Help => 0,
    };

    let titles: Vec<Line> = TABS.iter().map(|t| Line::from(*t)).collect();
    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::LEFT | Borders::BOTTOM | Borders::TOP)
                .border_type(border_type),
        )
        .highlight_style(Style::default().add_modifier(Modifier::UNDERLINED))
        .select(tab_index)
        .style(style);
    f.render_widget(tabs, tab_bar[0]);

    let channel = app.state.channel;
    let color = match channel.status {
        ChannelStatus::Connected => Color::Green,
        ChannelStatus::Connecting => Color::Yellow,
        ChannelStatus::Disconnected => Color::DarkGray,
        ChannelStatus::Failed => Color::Red,
    };
    let mut spans = vec![
        Span::styled("● ", Style::default().fg(color)),
        Span::styled(channel.status.label(), Style::default().fg(color)),
    ];
    if channel.reconnect_attempt > 0 && channel.status != ChannelStatus::Connected {
        spans.push(Span::styled(
            format!(" ({})", channel.reconnect_attempt),
            Style::default().fg(Color::DarkGray),
        ));
    }
    let indicator = Paragraph::new(Line::from(spans)).alignment(Alignment::Right).block(
        Block::default()
            .borders(Borders::RIGHT | Borders::BOTTOM | Borders::TOP)
            .border_type(border_type),
    );
    f.render_widget(indicator, tab_bar[1]);
}

fn draw_match(f: &mut Frame, area: Rect, app: &App) {
    let [clock_area, form_area] =
        Layout::vertical([Constraint::Length(7), Constraint::Fill(1)]).areas(area);

    draw_clock(f, clock_area, app);
    draw_recording_form(f, form_area, app);
}

fn draw_clock(f: &mut Frame, area: Rect, app: &App) {
    let session = &app.state.session;
    let title = if session.opponent.is_empty() {
        format!(" Match {} ", session.id)
    } else {
        format!(" vs {} ", session.opponent)
    };
    let block = default_border(Color::White).title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let phase_color = match session.phase() {
        MatchPhase::NotStarted => Color::DarkGray,
        MatchPhase::FirstHalf | MatchPhase::SecondHalf if session.is_clock_running() => Color::Green,
        MatchPhase::FirstHalf | MatchPhase::SecondHalf => Color::Yellow,
        MatchPhase::Finished => Color::Red,
    };
    let running = if session.is_clock_running() { "running" } else { "stopped" };
    let unconfirmed = if session.score.is_unconfirmed() { " *" } else { "" };

    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                format_clock(session.elapsed_seconds()),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(session.phase().label(), Style::default().fg(phase_color)),
            Span::styled(format!(" · {running}"), Style::default().fg(Color::DarkGray)),
        ]),
        Line::from(vec![
            Span::styled("Score ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("{} - {}{unconfirmed}", session.goals_for(), session.goals_against()),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
        ]),
    ];
    if let (Some(ours), Some(theirs)) = (&session.formation, &session.opponent_formation) {
        lines.push(Line::from(Span::styled(
            format!("Formation {ours} vs {theirs}"),
            Style::default().fg(Color::DarkGray),
        )));
    }
    let pending = app.state.gateway.in_flight().count();
    if pending > 0 {
        lines.push(Line::from(Span::styled(
            format!("{pending} command(s) awaiting the server"),
            Style::default().fg(Color::Yellow),
        )));
    }
    lines.push(Line::from(Span::styled(
        "s start  p pause/resume  F finish  g/G goal for/against",
        Style::default().fg(Color::DarkGray),
    )));
    f.render_widget(Paragraph::new(lines), inner);
}

fn draw_recording_form(f: &mut Frame, area: Rect, app: &App) {
    let form = &app.state.form;
    let intent = &form.intent;
    let block = default_border(Color::White).title(format!(" Record · {} ", intent.target.label()));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let label = Style::default().fg(Color::DarkGray);
    let value = Style::default().fg(Color::White);
    let unset = Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC);
    let field = |name: &'static str, v: Option<String>| {
        Line::from(vec![
            Span::styled(format!("{name:<8}"), label),
            match v {
                Some(v) => Span::styled(v, value),
                None => Span::styled("-", unset),
            },
        ])
    };

    let mut lines = vec![field("Event", intent.event.map(|e| e.label().to_string()))];
    if intent.target == RecordingTarget::Team {
        lines.push(field("Player", intent.player.clone()));
        lines.push(field(
            "Zone",
            intent.zone.map(|z| format!("{} {}", z.number(), z.label())),
        ));
        if form.squad.is_empty() {
            lines.push(Line::from(Span::styled("squad not loaded", unset)));
        }
    }
    lines.push(Line::from(""));

    let hint = match admit_event(&app.state.session.clock, intent) {
        Admission::Allowed => Span::styled("Enter to record", Style::default().fg(Color::Green)),
        Admission::Blocked(reason) => Span::styled(reason.message(), Style::default().fg(Color::Yellow)),
    };
    lines.push(Line::from(hint));
    lines.push(Line::from(Span::styled(
        "e/E event  j/k player  1-6 zone  t team/opposition  c clear",
        label,
    )));
    lines.push(Line::from(Span::styled(zone_legend(), label)));

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}

fn zone_legend() -> String {
    PitchZone::ALL
        .iter()
        .map(|z| format!("{}={}", z.number(), z.label()))
        .collect::<Vec<_>>()
        .join("  ")
}

fn draw_chat(f: &mut Frame, area: Rect, app: &App) {
    let block = default_border(Color::White).title(" Team chat ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    if inner.width == 0 || inner.height < 3 {
        return;
    }

    let [messages_area, input_area] =
        Layout::vertical([Constraint::Fill(1), Constraint::Length(3)]).areas(inner);

    let mut lines = Vec::new();
    for msg in app.state.feeds.chat.messages() {
        let prefix = format!("[{}] {}: ", msg.timestamp.format("%H:%M"), msg.sender);
        let style = if msg.sender_role == "manager" {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::White)
        };
        let body_width = messages_area
            .width
            .saturating_sub(prefix.chars().count() as u16)
            .max(8) as usize;
        let clipped: String = msg.text.chars().take(body_width).collect();
        lines.push(Line::from(vec![
            Span::styled(prefix, style),
            Span::styled(clipped, Style::default().fg(Color::White)),
        ]));
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "No messages yet.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let visible = messages_area.height as usize;
    let total = lines.len();
    let offset = app.state.chat.scroll_offset as usize;
    let end = total.saturating_sub(offset);
    let start = end.saturating_sub(visible);
    let window = if start < end { lines[start..end].to_vec() } else { Vec::new() };
    f.render_widget(Paragraph::new(window), messages_area);

    let composing = app.state.chat.composing;
    let input = if composing {
        format!("> {}_", app.state.chat.input)
    } else {
        "Press Enter/i to type. Esc cancel. j/k scroll.".to_string()
    };
    let input_style = if composing {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let mode = if composing { "typing" } else { "idle" };
    let input_block = default_border(Color::DarkGray).title(format!(" {mode} "));
    let input_inner = input_block.inner(input_area);
    f.render_widget(input_block, input_area);
    f.render_widget(Paragraph::new(input).style(input_style), input_inner);
}

fn draw_suggestions(f: &mut Frame, area: Rect, app: &App) {
    let feed = &app.state.feeds.suggestions;
    let title = if feed.is_pulling() { " Live suggestions · updating " } else { " Live suggestions " };
    let block = default_border(Color::White).title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    if !feed.is_active() {
        draw_placeholder(f, inner, "Suggestions appear while the match clock is live.");
        return;
    }
    if feed.items().is_empty() {
        draw_placeholder(f, inner, "No suggestions right now.");
        return;
    }

    let mut lines = Vec::new();
    for suggestion in feed.items() {
        let color = match suggestion.priority {
            Priority::High => Color::Red,
            Priority::Medium => Color::Yellow,
            Priority::Low => Color::Gray,
        };
        lines.push(Line::from(vec![
            Span::styled(
                format!("[{}] ", suggestion.priority.label()),
                Style::default().fg(color),
            ),
            Span::styled(
                suggestion.title.clone(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  {}", suggestion.category),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
        if !suggestion.message.is_empty() {
            lines.push(Line::from(suggestion.message.clone()));
        }
        for item in &suggestion.action_items {
            lines.push(Line::from(Span::styled(
                format!("  • {item}"),
                Style::default().fg(Color::Gray),
            )));
        }
        lines.push(Line::from(""));
    }

    f.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .scroll((app.state.suggestion_scroll, 0)),
        inner,
    );
}

fn draw_help(f: &mut Frame, area: Rect) {
    let block = default_border(Color::White).title(" Help ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = [
        ("q", "quit"),
        ("Tab", "next tab"),
        ("s / p / F", "start, pause or resume, finish"),
        ("e E j k 1-6", "event, player, zone"),
        ("t", "switch between our team and opposition"),
        ("Enter", "record the selected event"),
        ("g / G", "goal for / against"),
        ("R", "retry live updates"),
        ("\"", "toggle log pane"),
        ("f", "toggle full screen"),
        ("Esc", "close help"),
    ];
    let lines: Vec<Line> = rows
        .iter()
        .map(|(key, what)| {
            Line::from(vec![
                Span::styled(format!("{key:<14}"), Style::default().fg(Color::Yellow)),
                Span::raw(*what),
            ])
        })
        .collect();
    f.render_widget(Paragraph::new(lines), inner);
}

fn draw_sign_in_required(f: &mut Frame, area: Rect, app: &App) {
    let block = default_border(Color::Red).title(" Sign in required ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let [_top, body, _bottom] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(4),
        Constraint::Fill(1),
    ])
    .areas(inner);

    let lines = vec![
        Line::from("Your session is not signed in or has expired."),
        Line::from(""),
        Line::from(Span::styled(
            format!("Restart with --token <token> or set MATCHDAY_TOKEN (match {}).", app.state.session.id),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(Span::styled("Press q to quit.", Style::default().fg(Color::DarkGray))),
    ];
    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), body);
}

fn draw_logs(f: &mut Frame, area: Rect) {
    let widget = TuiLoggerWidget::default()
        .block(default_border(Color::DarkGray).title(" Log "))
        .style_error(Style::default().fg(Color::Red))
        .style_warn(Style::default().fg(Color::Yellow))
        .style_info(Style::default().fg(Color::Gray))
        .style_debug(Style::default().fg(Color::DarkGray))
        .output_target(false);
    f.render_widget(widget, area);
}

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
    let Some(status) = &app.state.status else {
        return;
    };
    let style = if status.is_error {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Gray)
    };
    f.render_widget(Paragraph::new(status.text.as_str()).style(style), area);
}

fn draw_placeholder(f: &mut Frame, area: Rect, msg: &str) {
    f.render_widget(
        Paragraph::new(msg)
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center),
        area,
    );
}

fn draw_loading_spinner(f: &mut Frame, area: Rect, app: &App, loading: LoadingState) {
    if !loading.is_loading && loading.spinner_char != ERROR_CHAR {
        return;
    }
    let style = match loading.spinner_char {
        ERROR_CHAR => Style::default().fg(Color::Red),
        _ => Style::default().fg(Color::White),
    };
    let spinner = Paragraph::new(loading.spinner_char.to_string())
        .alignment(Alignment::Right)
        .style(style);
    let area = if app.settings.full_screen {
        Rect::new(area.width.saturating_sub(3), area.height.saturating_sub(2), 1, 1)
    } else {
        Rect::new(area.width.saturating_sub(3), 1, 1, 1)
    };
    f.render_widget(spinner, area);
}
