//! Terminal host over the scripted engine.
//!
//! Run with: cargo run -p tui-host-demo
//!
//! Type to compose, digits or space pick a candidate, PgUp/PgDn page,
//! Ctrl+C quits.

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use rime_bridge_core::{BridgeEvent, Snapshot, testing::ScriptedEngine};
use rime_bridge_session::{Bridge, BridgeConfig, BridgeError};
use rime_bridge_transport::keys::key_to_sequence;

type EventLog = Arc<Mutex<VecDeque<String>>>;

/// Events kept for the events pane.
const EVENT_LINES: usize = 4;

fn main() -> io::Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {e}");
    }

    Ok(())
}

struct App {
    committed: String,
    snapshot: Snapshot,
    events: EventLog,
    status: String,
}

impl App {
    fn new(events: EventLog) -> Self {
        Self {
            committed: String::new(),
            snapshot: Snapshot::idle(true, None),
            events,
            status: "Initializing...".to_string(),
        }
    }

    fn apply(&mut self, result: Result<Snapshot, BridgeError>) {
        match result {
            Ok(snapshot) => {
                if let Some(text) = &snapshot.committed_text {
                    self.committed.push_str(text);
                }
                self.status = if snapshot.success {
                    "Ready".to_string()
                } else {
                    "Engine rejected the key".to_string()
                };
                self.snapshot = snapshot;
            }
            Err(e) => self.status = format!("Failed: {e}"),
        }
    }
}

fn demo_bridge(events: &EventLog) -> Bridge<ScriptedEngine> {
    let engine = Arc::new(ScriptedEngine::new());
    engine.script_candidates(["你好", "你", "妳", "擬", "泥", "尼", "呢"]);
    engine.script_comment(0, "nǐ hǎo");

    let log = Arc::clone(events);
    let sink = Arc::new(move |event: BridgeEvent| {
        push_event(&log, event_line(&event));
    });
    Bridge::new(engine, sink, BridgeConfig::from_env())
}

fn push_event(log: &EventLog, line: String) {
    let mut log = log.lock().unwrap_or_else(PoisonError::into_inner);
    if log.len() == EVENT_LINES {
        log.pop_front();
    }
    log.push_back(line);
}

fn event_line(event: &BridgeEvent) -> String {
    match event {
        BridgeEvent::Notification { kind, value } => format!("{kind}: {value}"),
        BridgeEvent::SchemaList(schemas) => format!("{} schema(s)", schemas.len()),
        BridgeEvent::SwitchesList(groups) => format!("{} switch group(s)", groups.len()),
    }
}

// Candidate keys only act while a menu is showing.
fn candidate_index(key: &KeyEvent) -> Option<usize> {
    match key.code {
        KeyCode::Char(' ') => Some(0),
        KeyCode::Char(c @ '0'..='9') => c.to_digit(10).map(|d| (d as usize + 9) % 10),
        _ => None,
    }
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
    let events = EventLog::default();
    let mut app = App::new(Arc::clone(&events));
    let mut bridge = demo_bridge(&events);

    match bridge.init() {
        Ok(()) => app.status = format!("Ready (bridge {})", bridge.id()),
        Err(e) => app.status = format!("Failed: {e}"),
    }

    loop {
        terminal.draw(|f| ui(f, &app))?;

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            if let Err(e) = bridge.shutdown() {
                tracing::warn!("shutdown failed: {e}");
            }
            return Ok(());
        }

        if app.snapshot.is_composing {
            if let Some(index) = candidate_index(&key) {
                app.apply(bridge.select_candidate(index));
                continue;
            }
            match key.code {
                KeyCode::PageUp => {
                    app.apply(bridge.flip_page(true));
                    continue;
                }
                KeyCode::PageDown => {
                    app.apply(bridge.flip_page(false));
                    continue;
                }
                _ => {}
            }
        } else if key.code == KeyCode::Enter {
            app.committed.push('\n');
            continue;
        }

        if let Some(sequence) = key_to_sequence(&key) {
            app.apply(bridge.process_key(&sequence));
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Committed text
            Constraint::Length(4), // Composition
            Constraint::Length(6), // Events
            Constraint::Length(1), // Status
        ])
        .split(f.area());

    let output = Paragraph::new(app.committed.as_str())
        .block(Block::default().borders(Borders::ALL).title("Output"))
        .wrap(Wrap { trim: false });
    f.render_widget(output, chunks[0]);

    let mut lines = Vec::new();
    if let Some(composition) = &app.snapshot.composition {
        let buffer = &composition.input_buffer;
        lines.push(Line::from(vec![
            Span::raw(buffer.before.as_str()),
            Span::styled(
                buffer.active.as_str(),
                Style::default().add_modifier(Modifier::UNDERLINED),
            ),
            Span::raw(buffer.after.as_str()),
        ]));
        let mut spans = Vec::new();
        for (i, candidate) in composition.candidates.iter().enumerate() {
            let style = if i == composition.highlighted_index {
                Style::default().fg(Color::Black).bg(Color::Yellow)
            } else {
                Style::default()
            };
            spans.push(Span::styled(format!("{} {}", candidate.label, candidate.text), style));
            if let Some(comment) = &candidate.comment {
                spans.push(Span::styled(
                    format!(" {comment}"),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            spans.push(Span::raw("  "));
        }
        if !composition.is_last_page {
            spans.push(Span::raw("▸"));
        }
        lines.push(Line::from(spans));
    }
    let composition = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Composition"),
    );
    f.render_widget(composition, chunks[1]);

    let events: Vec<Line> = app
        .events
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .map(|s| Line::from(s.clone()))
        .collect();
    let events = Paragraph::new(events)
        .block(Block::default().borders(Borders::ALL).title("Events"));
    f.render_widget(events, chunks[2]);

    let status_style = if app.status.starts_with("Failed") {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Green)
    };
    let status = Paragraph::new(Line::from(vec![
        Span::raw(" "),
        Span::styled(app.status.as_str(), status_style),
        Span::raw(" | "),
        Span::styled("Ctrl+C", Style::default().fg(Color::Yellow)),
        Span::raw(" quit | "),
        Span::styled("1-0/Space", Style::default().fg(Color::Yellow)),
        Span::raw(" select | "),
        Span::styled("PgUp/PgDn", Style::default().fg(Color::Yellow)),
        Span::raw(" page "),
    ]));
    f.render_widget(status, chunks[3]);
}
