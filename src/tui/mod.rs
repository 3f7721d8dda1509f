pub mod app;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{LeaveAlternateScreen, disable_raw_mode},
};
use ratatui::{
    DefaultTerminal, Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};

use self::app::{App, LockRow, Panel};
use super::commands::short_time;

const POLL_TIMEOUT: Duration = Duration::from_millis(250);

/// Run the live dashboard until the user quits
pub fn run(hub_dir: PathBuf, refresh_rate_ms: u64) -> Result<()> {
    if !hub_dir.exists() {
        anyhow::bail!("Hub not initialized. Run 'hub init' first.");
    }

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_terminal();
        original_hook(panic_info);
    }));

    let mut terminal = ratatui::init();
    let mut app = App::new(hub_dir, Duration::from_millis(refresh_rate_ms));

    let result = run_event_loop(&mut terminal, &mut app);

    ratatui::restore();

    result
}

fn run_event_loop(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
    loop {
        app.maybe_refresh();

        terminal.draw(|frame| draw(frame, app))?;

        if event::poll(POLL_TIMEOUT)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            if app.show_help {
                if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc) {
                    app.show_help = false;
                }
            } else {
                handle_key(app, key.code);
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Tab => app.next_panel(),
        KeyCode::BackTab => app.prev_panel(),
        KeyCode::Up | KeyCode::Char('k') => app.scroll_up(),
        KeyCode::Down | KeyCode::Char('j') => app.scroll_down(),
        KeyCode::Char('r') => app.refresh_all(),
        _ => {}
    }
}

fn draw(frame: &mut Frame, app: &App) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // stats summary
            Constraint::Min(3),    // panels
            Constraint::Length(2), // status bar
        ])
        .split(frame.area());

    draw_summary(frame, app, outer[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(outer[1]);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(columns[0]);

    draw_agents(frame, app, left[0]);
    draw_locks(frame, app, left[1]);
    draw_messages(frame, app, columns[1]);
    draw_status_bar(frame, app, outer[2]);

    if app.show_help {
        draw_help_overlay(frame);
    }
}

fn draw_summary(frame: &mut Frame, app: &App, area: Rect) {
    let s = &app.stats;
    let sep = || Span::styled(" │ ", Style::default().fg(Color::DarkGray));
    let conflict_style = if s.open_conflicts > 0 {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };

    let first = Line::from(vec![
        Span::styled(
            format!("session {}", s.session_duration()),
            Style::default().fg(Color::Cyan),
        ),
        sep(),
        Span::raw(format!(
            "{} msgs ({} unread, {:.2}/min)",
            s.total_messages, s.unread_messages, s.messages_per_minute
        )),
        sep(),
        Span::raw(format!(
            "files {} new / {} changed",
            s.files_created, s.files_modified
        )),
        sep(),
        Span::raw(format!("{} interfaces", s.integration_points)),
        sep(),
        Span::styled(format!("{} open conflicts", s.open_conflicts), conflict_style),
    ]);
    let second = Line::from(vec![
        Span::raw(format!("{} active agents", s.active_agents)),
        sep(),
        Span::raw(format!("avg response {:.2}s", s.avg_response_time)),
        sep(),
        Span::raw("hourly "),
        Span::styled(app.hourly_chart(24), Style::default().fg(Color::Green)),
    ]);

    let block = Block::default().title(" Agent Hub ").borders(Borders::ALL);
    frame.render_widget(Paragraph::new(vec![first, second]).block(block), area);
}

fn draw_agents(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(format!(" Agents ({}) ", app.agents.len()))
        .borders(Borders::ALL)
        .border_style(panel_style(app, Panel::Agents));

    if app.agents.is_empty() {
        let content = Paragraph::new(vec![Line::from(""), Line::from("  No status updates yet.")])
            .block(block);
        frame.render_widget(content, area);
        return;
    }

    let items: Vec<ListItem> = app
        .agents
        .iter()
        .map(|update| {
            let sent = app
                .stats
                .agents
                .get(&update.agent)
                .map_or(0, |a| a.messages_sent);
            ListItem::new(vec![
                Line::from(vec![
                    Span::styled(
                        update.agent.clone(),
                        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!("  {} sent", sent),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]),
                Line::from(Span::raw(format!("  {}", update.status))),
            ])
        })
        .collect();

    render_list(frame, app, Panel::Agents, items, block, app.agent_selected, area);
}

fn draw_locks(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(format!(
            " Locks ({} held, {} pending) ",
            app.stats.locked_files, app.stats.pending_requests
        ))
        .borders(Borders::ALL)
        .border_style(panel_style(app, Panel::Locks));

    if app.locks.is_empty() {
        let content =
            Paragraph::new(vec![Line::from(""), Line::from("  No locks.")]).block(block);
        frame.render_widget(content, area);
        return;
    }

    let items: Vec<ListItem> = app
        .locks
        .iter()
        .map(|row| match row {
            LockRow::Held { path, entry } => ListItem::new(Line::from(vec![
                Span::styled(" ■ ", Style::default().fg(Color::Yellow)),
                Span::raw(path.clone()),
                Span::styled(
                    format!("  ({})", entry.agent),
                    Style::default().fg(Color::DarkGray),
                ),
            ])),
            LockRow::Pending(request) => ListItem::new(Line::from(vec![
                Span::styled(" ? ", Style::default().fg(Color::Magenta)),
                Span::raw(request.file_path.clone()),
                Span::styled(
                    format!("  (requested by {})", request.agent),
                    Style::default().fg(Color::DarkGray),
                ),
            ])),
        })
        .collect();

    render_list(frame, app, Panel::Locks, items, block, app.lock_selected, area);
}

fn draw_messages(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(format!(" Recent messages ({}) ", app.messages.len()))
        .borders(Borders::ALL)
        .border_style(panel_style(app, Panel::Messages));

    if app.messages.is_empty() {
        let content =
            Paragraph::new(vec![Line::from(""), Line::from("  No messages yet.")]).block(block);
        frame.render_widget(content, area);
        return;
    }

    let items: Vec<ListItem> = app
        .messages
        .iter()
        .map(|msg| {
            let base = if app.is_message_highlighted(&msg.id) {
                Style::default()
                    .fg(Color::White)
                    .bg(Color::Magenta)
                    .add_modifier(Modifier::BOLD)
            } else if msg.read {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{} ", short_time(&msg.timestamp)),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("[{}] ", msg.kind),
                    Style::default().fg(kind_color(&msg.kind)),
                ),
                Span::styled(format!("{} → {}: ", msg.from_agent, msg.to_agent), base),
                Span::styled(msg.message.clone(), base),
            ]))
        })
        .collect();

    render_list(
        frame,
        app,
        Panel::Messages,
        items,
        block,
        app.message_selected,
        area,
    );
}

fn render_list(
    frame: &mut Frame,
    app: &App,
    panel: Panel,
    items: Vec<ListItem>,
    block: Block,
    selected: usize,
    area: Rect,
) {
    let highlight_style = if app.selected_panel == panel {
        Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let list = List::new(items)
        .block(block)
        .highlight_style(highlight_style)
        .highlight_symbol("▶ ");

    let mut state = ListState::default();
    state.select(Some(selected));
    frame.render_stateful_widget(list, area, &mut state);
}

fn kind_color(kind: &str) -> Color {
    match kind {
        "conflict" => Color::Red,
        "file_lock_approval" => Color::Green,
        "file_lock_denial" => Color::Yellow,
        "file_creation" | "file_modification" => Color::Blue,
        "progress" => Color::Cyan,
        "code_review_request" => Color::Magenta,
        _ => Color::Gray,
    }
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(
            format!(" {} ", app.hub_dir.display()),
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {} ", app.last_refresh_display),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled("│", Style::default().fg(Color::DarkGray)),
    ];
    match &app.load_error {
        Some(err) => spans.push(Span::styled(
            format!(" {} ", err),
            Style::default().fg(Color::Red),
        )),
        None => spans.push(Span::styled(
            format!(" {} ", app.key_hints()),
            Style::default().fg(Color::DarkGray),
        )),
    }

    let status = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::TOP));
    frame.render_widget(status, area);
}

fn draw_help_overlay(frame: &mut Frame) {
    let size = frame.area();
    let width = 44.min(size.width.saturating_sub(4));
    let height = 11.min(size.height.saturating_sub(4));
    let area = Rect::new(
        (size.width.saturating_sub(width)) / 2,
        (size.height.saturating_sub(height)) / 2,
        width,
        height,
    );

    frame.render_widget(Clear, area);

    let binding = |key: &str, desc: &str| -> Line {
        Line::from(vec![
            Span::styled(format!("  {:<12}", key), Style::default().fg(Color::Yellow)),
            Span::styled(desc.to_string(), Style::default().fg(Color::White)),
        ])
    };

    let lines = vec![
        Line::from(""),
        binding("q / Esc", "Quit"),
        binding("?", "Toggle this help"),
        binding("Tab", "Next panel"),
        binding("Shift-Tab", "Previous panel"),
        binding("j / k", "Move down / up"),
        binding("r", "Refresh now"),
    ];

    let block = Block::default()
        .title(" Keybindings ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn panel_style(app: &App, panel: Panel) -> Style {
    if app.selected_panel == panel {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}
