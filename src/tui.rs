// tui.rs

use crate::app::{App, AuthKind, AuthStep, InputMode};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use ratatui::{
    Terminal,
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use rustytodos::{Filter, TodoView};
use std::{io, time::Duration};
use tokio::runtime::Runtime;

pub fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App, rt: &Runtime) -> io::Result<()>
where
    std::io::Error: From<<B as Backend>::Error>,
{
    loop {
        terminal.draw(|f| ui(f, app))?;

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }
        let CEvent::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match app.input_mode {
            InputMode::Normal => match key.code {
                KeyCode::Char('q') => return Ok(()),
                KeyCode::Char('a') => app.begin_add(),
                KeyCode::Char(' ') | KeyCode::Char('d') => rt.block_on(app.toggle_selected()),
                KeyCode::Char('x') | KeyCode::Delete => rt.block_on(app.delete_selected()),
                KeyCode::Char('C') => rt.block_on(app.clear_completed()),
                KeyCode::Char('r') => rt.block_on(app.reload()),
                KeyCode::Tab => app.cycle_filter(),
                KeyCode::Char('1') => app.set_filter(Filter::All),
                KeyCode::Char('2') => app.set_filter(Filter::Active),
                KeyCode::Char('3') => app.set_filter(Filter::Completed),
                KeyCode::Char('L') => app.begin_auth(AuthKind::SignIn),
                KeyCode::Char('U') => app.begin_auth(AuthKind::SignUp),
                KeyCode::Char('O') => rt.block_on(app.sign_out()),
                KeyCode::Down | KeyCode::Char('j') => app.select_next(),
                KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
                _ => {}
            },
            InputMode::EditingTodo => match key.code {
                KeyCode::Enter => rt.block_on(app.submit_todo()),
                KeyCode::Esc => app.cancel_input(),
                KeyCode::Char(c) => app.input.push(c),
                KeyCode::Backspace => {
                    app.input.pop();
                }
                _ => {}
            },
            InputMode::Authenticating(..) => match key.code {
                KeyCode::Enter => rt.block_on(app.advance_auth()),
                KeyCode::Esc => app.cancel_input(),
                KeyCode::Char(c) => app.input.push(c),
                KeyCode::Backspace => {
                    app.input.pop();
                }
                _ => {}
            },
        }
    }
}

fn ui(f: &mut ratatui::Frame<'_>, app: &App) {
    let view = app.view();
    let needs_input = !matches!(app.input_mode, InputMode::Normal);

    let mut constraints = vec![
        Constraint::Length(1), // title
        Constraint::Length(1), // filter tabs
        Constraint::Min(3),    // todo list
        Constraint::Length(1), // counts
        Constraint::Length(1), // status
        Constraint::Length(2), // help
    ];
    if needs_input {
        constraints.push(Constraint::Length(3));
    }
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(constraints)
        .split(f.area());

    let who = app
        .signed_in_as()
        .unwrap_or_else(|| "local".to_string());
    let mut title_text = format!("Todo List  ·  {}", who);
    if view.loading {
        title_text.push_str("  ⇅ loading…");
    }
    let title = Paragraph::new(Line::from(Span::styled(
        title_text,
        Style::default().add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    let mut tabs: Vec<Span> = Vec::new();
    for filter in Filter::ALL {
        let label = format!(" {} ", capitalize(filter.as_str()));
        let style = if filter == view.filter {
            Style::default().fg(Color::White).bg(Color::Blue).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        tabs.push(Span::styled(label, style));
        tabs.push(Span::raw(" "));
    }
    f.render_widget(
        Paragraph::new(Line::from(tabs)).alignment(Alignment::Center),
        chunks[1],
    );

    render_list(f, app, &view, chunks[2]);

    let mut counts = format!(
        "{} {} left",
        view.active_count,
        if view.active_count == 1 { "item" } else { "items" }
    );
    if view.completed_count > 0 {
        counts.push_str(&format!(" • {} completed", view.completed_count));
    }
    f.render_widget(
        Paragraph::new(counts).style(Style::default().fg(Color::Gray)),
        chunks[3],
    );

    if let Some(status) = &app.status {
        let color = if status.is_error { Color::Red } else { Color::Green };
        let widget = Paragraph::new(status.text.as_str())
            .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center);
        f.render_widget(widget, chunks[4]);
    }

    let b = Style::default().add_modifier(Modifier::BOLD);
    let help = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("a", b), Span::raw(" add, "),
            Span::styled("space", b), Span::raw(" toggle, "),
            Span::styled("x", b), Span::raw(" delete, "),
            Span::styled("C", b), Span::raw(" clear completed, "),
            Span::styled("Tab", b), Span::raw(" filter, "),
            Span::styled("r", b), Span::raw(" reload"),
        ]),
        Line::from(vec![
            Span::styled("L", b), Span::raw(" sign in, "),
            Span::styled("U", b), Span::raw(" sign up, "),
            Span::styled("O", b), Span::raw(" sign out, "),
            Span::styled("q", b), Span::raw(" quit"),
        ]),
    ])
    .alignment(Alignment::Center);
    f.render_widget(help, chunks[5]);

    if needs_input {
        let caret = "|";
        let (title, shown) = match app.input_mode {
            InputMode::Authenticating(kind, step) => {
                let action = match kind {
                    AuthKind::SignIn => "Sign in",
                    AuthKind::SignUp => "Sign up",
                };
                match step {
                    AuthStep::Username => (format!("{action} · Username"), app.input.clone()),
                    AuthStep::Email => (format!("{action} · Email"), app.input.clone()),
                    AuthStep::Password => (
                        format!("{action} · Password"),
                        "*".repeat(app.input.chars().count()),
                    ),
                }
            }
            _ => ("Add a new todo".to_string(), app.input.clone()),
        };
        let widget = Paragraph::new(format!("{}{}", shown, caret))
            .block(Block::default().borders(Borders::ALL).title(title))
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .wrap(Wrap { trim: true });
        f.render_widget(widget, chunks[chunks.len() - 1]);
    }
}

fn render_list(f: &mut ratatui::Frame<'_>, app: &App, view: &TodoView, area: ratatui::layout::Rect) {
    let block = Block::default().borders(Borders::ALL).title("Todos");

    if view.filtered_todos.is_empty() {
        let text = match view.filter {
            Filter::All => "No todos yet. Add one above to get started!".to_string(),
            other => format!("No {} todos.", other),
        };
        let empty = Paragraph::new(text)
            .block(block)
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center);
        f.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = view
        .filtered_todos
        .iter()
        .map(|t| {
            let (mark, style) = if t.completed {
                (
                    "[x]",
                    Style::default().fg(Color::Green).add_modifier(Modifier::CROSSED_OUT),
                )
            } else {
                ("[ ]", Style::default().fg(Color::Yellow))
            };
            let created = t.created_at.format("%Y-%m-%d").to_string();
            ListItem::new(Line::from(vec![
                Span::styled(format!("{} {}", mark, t.text), style),
                Span::styled(format!("  {}", created), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    state.select(Some(app.selected.min(items.len() - 1)));

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");
    f.render_stateful_widget(list, area, &mut state);
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
