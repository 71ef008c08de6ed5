//! TUI module - workout session screen with ratatui

use std::collections::VecDeque;
use std::io::{Stdout, stdout};
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table, Wrap},
};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::warn;

use crate::client::{ExerciseCatalog, LoggedSet, RoutineStore};
use crate::error::SessionError;
use crate::exercises::{Exercise, filter_exercises, muscle_groups};
use crate::records::{self, SetSample};
use crate::routine::{Routine, RoutineProposal};
use crate::session::{
    FinishOutcome, FinishSummary, ReconcileDecision, Session, SessionEvent, SessionSnapshot, StateTag,
    badge_description,
};

type Tui = Terminal<CrosstermBackend<Stdout>>;

const WEIGHT_STEP_KG: f64 = 2.5;
const MAX_TOASTS: usize = 4;

enum Mode {
    Routines,
    Session,
    Catalog,
    Prompt(RoutineProposal),
    Summary(FinishSummary),
}

/// App state for TUI
pub struct App {
    session: Session,
    events: broadcast::Receiver<SessionEvent>,
    catalog: Vec<Exercise>,
    routines: Vec<Routine>,
    mode: Mode,
    routine_cursor: usize,
    queue_cursor: usize,
    catalog_cursor: usize,
    muscle_filter: Option<String>,
    weight_kg: f64,
    reps: u32,
    toasts: VecDeque<String>,
    status: Option<String>,
    should_quit: bool,
}

/// Weight after one +/- step, never below zero
fn step_weight(weight_kg: f64, steps: i32) -> f64 {
    (weight_kg + WEIGHT_STEP_KG * steps as f64).max(0.0)
}

/// Toast lines for a session notification
fn toast_lines(event: &SessionEvent) -> Vec<String> {
    match event {
        SessionEvent::Reward { kind, exercise_name, set } => vec![format!(
            "{} {} {}kg x {}",
            kind.headline(),
            exercise_name,
            set.weight_kg,
            set.reps
        )],
        SessionEvent::RoutineUpdated { .. } => vec!["Routine updated".to_string()],
        SessionEvent::BadgesEarned(badges) => badges
            .iter()
            .map(|b| match badge_description(b) {
                Some(description) => format!("Badge earned: {} - {}", b, description),
                None => format!("Badge earned: {}", b),
            })
            .collect(),
        SessionEvent::Finished(summary) => vec![format!(
            "Workout finished: {} sets, {:.0}kg",
            summary.set_count, summary.total_volume_kg
        )],
        SessionEvent::ReconciliationPrompt(_) => Vec::new(),
    }
}

/// True when `candidate` out-estimates every set already logged today
fn beats_session_best(candidate: SetSample, today: &[LoggedSet]) -> bool {
    let best = today
        .iter()
        .map(|s| records::estimated_one_rep_max(s.weight_kg, s.reps))
        .reduce(f64::max);
    best.is_some_and(|best| candidate.estimated_one_rep_max() > best)
}

fn format_target_weight(weight_kg: Option<f64>) -> String {
    weight_kg.map(|w| format!("{w}kg")).unwrap_or_else(|| "-".to_string())
}

impl App {
    pub async fn new(session: Session) -> Result<Self> {
        let catalog = session.catalog().list().await?;
        let routines = session.routines().list().await?;
        let events = session.events();
        Ok(Self {
            session,
            events,
            catalog,
            routines,
            mode: Mode::Routines,
            routine_cursor: 0,
            queue_cursor: 0,
            catalog_cursor: 0,
            muscle_filter: None,
            weight_kg: 20.0,
            reps: 10,
            toasts: VecDeque::new(),
            status: None,
            should_quit: false,
        })
    }

    /// Run the TUI application
    pub async fn run(&mut self) -> Result<()> {
        let mut terminal = init_terminal()?;
        let result = self.main_loop(&mut terminal).await;
        restore_terminal()?;

        if self.session.snapshot().state != StateTag::Idle {
            warn!("quitting with an unfinished workout");
            self.session.abandon();
        }
        result
    }

    async fn main_loop(&mut self, terminal: &mut Tui) -> Result<()> {
        while !self.should_quit {
            self.drain_events();
            let snapshot = self.session.snapshot();
            terminal.draw(|frame| self.render(frame, &snapshot))?;

            if let Some(code) = poll_key()? {
                self.handle_key(code, &snapshot).await;
            }
        }
        Ok(())
    }

    fn drain_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    for line in toast_lines(&event) {
                        self.toasts.push_back(line);
                    }
                }
                Err(TryRecvError::Lagged(n)) => warn!("missed {} session events", n),
                Err(_) => break,
            }
        }
        while self.toasts.len() > MAX_TOASTS {
            self.toasts.pop_front();
        }
    }

    fn report(&mut self, err: SessionError) {
        self.status = Some(if err.is_retryable() {
            format!("{err} (press again to retry)")
        } else {
            err.to_string()
        });
    }

    fn exercise_name(&self, id: uuid::Uuid) -> &str {
        self.catalog
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.name.as_str())
            .unwrap_or("(unknown exercise)")
    }

    fn filtered_catalog(&self) -> Vec<&Exercise> {
        filter_exercises(&self.catalog, self.muscle_filter.as_deref(), None)
    }

    /// Prefill weight and reps from the last set of the selected exercise
    fn sync_inputs(&mut self) {
        if let Some(last) = self.session.current_sets().last() {
            self.weight_kg = last.weight_kg;
            self.reps = last.reps;
        }
    }

    async fn reload_routines(&mut self) {
        match self.session.routines().list().await {
            Ok(routines) => self.routines = routines,
            Err(e) => self.report(e.into()),
        }
    }

    async fn handle_key(&mut self, code: KeyCode, snapshot: &SessionSnapshot) {
        self.status = None;
        match self.mode {
            Mode::Routines => self.routines_key(code).await,
            Mode::Session => self.session_key(code, snapshot).await,
            Mode::Catalog => self.catalog_key(code),
            Mode::Prompt(_) => self.prompt_key(code).await,
            Mode::Summary(_) => {
                self.mode = Mode::Routines;
                self.reload_routines().await;
            }
        }
    }

    async fn routines_key(&mut self, code: KeyCode) {
        // entry 0 is a freestyle workout
        let entries = self.routines.len() + 1;
        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Up => self.routine_cursor = self.routine_cursor.saturating_sub(1),
            KeyCode::Down => self.routine_cursor = (self.routine_cursor + 1).min(entries - 1),
            KeyCode::Char('r') => self.reload_routines().await,
            KeyCode::Enter => {
                let routine = self.routine_cursor.checked_sub(1).and_then(|i| self.routines.get(i));
                let routine_id = routine.map(|r| r.id);
                let name = routine.map(|r| r.name.clone()).unwrap_or_else(|| "Freestyle".to_string());
                match self.session.start(routine_id, Some(name)).await {
                    Ok(_) => {
                        self.mode = Mode::Session;
                        self.queue_cursor = 0;
                        self.sync_inputs();
                    }
                    Err(e) => self.report(e),
                }
            }
            _ => {}
        }
    }

    async fn session_key(&mut self, code: KeyCode, snapshot: &SessionSnapshot) {
        let current = snapshot.queue.get(self.queue_cursor).map(|q| q.queue_id);
        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Up => self.queue_cursor = self.queue_cursor.saturating_sub(1),
            KeyCode::Down => {
                self.queue_cursor = (self.queue_cursor + 1).min(snapshot.queue.len().saturating_sub(1))
            }
            KeyCode::Enter => {
                if let Some(id) = current {
                    match self.session.select(Some(id)) {
                        Ok(()) => self.sync_inputs(),
                        Err(e) => self.report(e),
                    }
                }
            }
            KeyCode::Char('K') => {
                if let Some(id) = current
                    && self.queue_cursor > 0
                {
                    match self.session.reorder(id, self.queue_cursor - 1) {
                        Ok(position) => self.queue_cursor = position,
                        Err(e) => self.report(e),
                    }
                }
            }
            KeyCode::Char('J') => {
                if let Some(id) = current {
                    match self.session.reorder(id, self.queue_cursor + 1) {
                        Ok(position) => self.queue_cursor = position,
                        Err(e) => self.report(e),
                    }
                }
            }
            KeyCode::Char('x') => {
                if let Some(id) = current {
                    match self.session.remove(id) {
                        Ok(removed) => {
                            self.queue_cursor = self.queue_cursor.min(snapshot.queue.len().saturating_sub(2));
                            self.status = Some(format!("Removed {}", removed.exercise.name));
                        }
                        Err(e) => self.report(e),
                    }
                }
            }
            KeyCode::Char('a') => {
                self.catalog_cursor = 0;
                self.mode = Mode::Catalog;
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.weight_kg = step_weight(self.weight_kg, 1),
            KeyCode::Char('-') => self.weight_kg = step_weight(self.weight_kg, -1),
            KeyCode::Char(']') => self.reps += 1,
            KeyCode::Char('[') => self.reps = self.reps.saturating_sub(1).max(1),
            KeyCode::Char('l') => {
                if let Err(e) = self.session.log_set(self.weight_kg, self.reps, None).await {
                    self.report(e);
                }
            }
            KeyCode::Char('f') => match self.session.finish().await {
                Ok(FinishOutcome::NeedsDecision(proposal)) => self.mode = Mode::Prompt(proposal),
                Ok(FinishOutcome::Finished(summary)) => self.mode = Mode::Summary(summary),
                Err(e) => self.report(e),
            },
            KeyCode::Esc => {
                self.session.abandon();
                self.mode = Mode::Routines;
                self.status = Some("Workout abandoned".to_string());
            }
            _ => {}
        }
    }

    fn catalog_key(&mut self, code: KeyCode) {
        let filtered = self.filtered_catalog().len();
        match code {
            KeyCode::Esc => self.mode = Mode::Session,
            KeyCode::Up => self.catalog_cursor = self.catalog_cursor.saturating_sub(1),
            KeyCode::Down => self.catalog_cursor = (self.catalog_cursor + 1).min(filtered.saturating_sub(1)),
            KeyCode::Tab => {
                let groups = muscle_groups(&self.catalog);
                let next = match &self.muscle_filter {
                    None => groups.first(),
                    Some(current) => groups
                        .iter()
                        .position(|g| g == current)
                        .and_then(|i| groups.get(i + 1)),
                };
                self.muscle_filter = next.map(|g| g.to_string());
                self.catalog_cursor = 0;
            }
            KeyCode::Enter => {
                let Some(exercise) = self.filtered_catalog().get(self.catalog_cursor).map(|e| (*e).clone()) else {
                    return;
                };
                let name = exercise.name.clone();
                match self.session.enqueue(exercise) {
                    Ok(_) => {
                        self.status = Some(format!("Added {}", name));
                        self.mode = Mode::Session;
                    }
                    Err(e) => self.report(e),
                }
            }
            _ => {}
        }
    }

    async fn prompt_key(&mut self, code: KeyCode) {
        let decision = match code {
            KeyCode::Char('y') => ReconcileDecision::Apply,
            KeyCode::Char('n') => ReconcileDecision::Skip,
            _ => return,
        };
        match self.session.resolve_reconciliation(decision).await {
            Ok(summary) => self.mode = Mode::Summary(summary),
            Err(e) => self.report(e),
        }
    }

    fn render(&self, frame: &mut Frame, snapshot: &SessionSnapshot) {
        let area = frame.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(MAX_TOASTS as u16 + 2),
                Constraint::Length(3),
            ])
            .split(area);

        // Header
        let workout = snapshot
            .workout
            .as_ref()
            .and_then(|w| w.name.clone())
            .unwrap_or_default();
        let header = Paragraph::new(format!("TitanLift | {} {}", snapshot.state, workout))
            .style(Style::default().fg(Color::Cyan).bold())
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, chunks[0]);

        match &self.mode {
            Mode::Routines => self.render_routines(frame, chunks[1]),
            Mode::Session => self.render_session(frame, chunks[1], snapshot),
            Mode::Catalog => self.render_catalog(frame, chunks[1]),
            Mode::Prompt(proposal) => self.render_prompt(frame, chunks[1], proposal),
            Mode::Summary(summary) => render_summary(frame, chunks[1], summary),
        }

        // Toasts and status
        let mut lines: Vec<Line> = self
            .toasts
            .iter()
            .map(|t| Line::styled(t.as_str(), Style::default().fg(Color::Yellow)))
            .collect();
        if let Some(status) = &self.status {
            lines.push(Line::styled(status.as_str(), Style::default().fg(Color::Red)));
        }
        let toasts = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Notifications"));
        frame.render_widget(toasts, chunks[2]);

        // Footer
        let help = match self.mode {
            Mode::Routines => "↑↓: move | enter: start | r: refresh | q: quit",
            Mode::Session => {
                "↑↓: move | enter: select | K/J: reorder | a: add | x: remove | +/-: weight | [/]: reps | l: log | f: finish | esc: abandon"
            }
            Mode::Catalog => "↑↓: move | tab: muscle group | enter: add | esc: back",
            Mode::Prompt(_) => "y: update routine | n: keep routine",
            Mode::Summary(_) => "any key: continue",
        };
        let footer = Paragraph::new(help)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, chunks[3]);
    }

    fn render_routines(&self, frame: &mut Frame, area: Rect) {
        let mut items = vec![ListItem::new("Freestyle workout")];
        items.extend(self.routines.iter().map(|r| {
            ListItem::new(format!(
                "{} {}",
                r.name,
                r.description.as_deref().map(|d| format!("- {d}")).unwrap_or_default()
            ))
        }));
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Start workout"))
            .highlight_style(Style::default().bold().reversed());
        let mut state = ListState::default().with_selected(Some(self.routine_cursor));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_session(&self, frame: &mut Frame, area: Rect, snapshot: &SessionSnapshot) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(area);

        // Exercise queue
        let items: Vec<ListItem> = snapshot
            .queue
            .iter()
            .map(|q| {
                let marker = if Some(q.queue_id) == snapshot.selected { "* " } else { "  " };
                ListItem::new(format!("{}{} ({})", marker, q.exercise.name, q.exercise.muscle_group))
            })
            .collect();
        let queue = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Exercises"))
            .highlight_style(Style::default().bold().reversed());
        let mut state = ListState::default().with_selected((!snapshot.queue.is_empty()).then_some(self.queue_cursor));
        frame.render_stateful_widget(queue, columns[0], &mut state);

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(4)])
            .split(columns[1]);

        // Sets of the selected exercise
        let rows: Vec<Row> = snapshot
            .current_sets
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let mut flags = Vec::new();
                if s.is_new_1rm {
                    flags.push("1RM");
                }
                if s.is_vol_pr {
                    flags.push("PR");
                }
                Row::new(vec![
                    Cell::from((i + 1).to_string()),
                    Cell::from(format!("{}kg", s.weight_kg)),
                    Cell::from(s.reps.to_string()),
                    Cell::from(flags.join(" ")),
                ])
            })
            .collect();
        let title = snapshot
            .selected_exercise()
            .map(|q| q.exercise.name.clone())
            .unwrap_or_else(|| "No exercise selected".to_string());
        let table = Table::new(
            rows,
            [
                Constraint::Length(5),
                Constraint::Length(10),
                Constraint::Length(6),
                Constraint::Min(8),
            ],
        )
        .header(Row::new(vec!["Set", "Weight", "Reps", "Records"]).style(Style::default().bold()))
        .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(table, right[0]);

        // Next set input with the unconfirmed estimate
        let candidate = SetSample::new(self.weight_kg, self.reps);
        let best_today = if beats_session_best(candidate, &snapshot.current_sets) {
            " | above today's best"
        } else {
            ""
        };
        let pending = snapshot.pending.map(|op| format!(" | {op}...")).unwrap_or_default();
        let input = Paragraph::new(vec![
            Line::from(format!(
                "Next: {}kg x {} | est. 1RM {:.1}kg (unconfirmed){}",
                self.weight_kg,
                self.reps,
                candidate.estimated_one_rep_max(),
                best_today
            )),
            Line::from(format!(
                "Session: {} sets, {:.0}kg total{}",
                snapshot.set_count, snapshot.total_volume_kg, pending
            )),
        ])
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(input, right[1]);
    }

    fn render_catalog(&self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .filtered_catalog()
            .iter()
            .map(|e| {
                ListItem::new(format!(
                    "{} ({}, {})",
                    e.name,
                    e.muscle_group,
                    e.equipment.as_deref().unwrap_or("-")
                ))
            })
            .collect();
        let title = format!("Add exercise [{}]", self.muscle_filter.as_deref().unwrap_or("All"));
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().bold().reversed());
        let mut state = ListState::default().with_selected(Some(self.catalog_cursor));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_prompt(&self, frame: &mut Frame, area: Rect, proposal: &RoutineProposal) {
        let mut lines = vec![
            Line::from(format!("Your workout differs from \"{}\".", proposal.routine_name)).bold(),
            Line::from(""),
        ];
        for target in &proposal.targets {
            lines.push(Line::from(format!(
                "{}. {} - {}x{} @ {}",
                target.order_index + 1,
                self.exercise_name(target.exercise_id),
                target.target_sets,
                target.target_reps,
                format_target_weight(target.target_weight_kg)
            )));
        }
        lines.push(Line::from(""));
        lines.push(Line::from("Update the routine with these targets? (y/n)").bold());

        let prompt = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Update routine"));
        frame.render_widget(prompt, area);
    }
}

fn render_summary(frame: &mut Frame, area: Rect, summary: &FinishSummary) {
    let mut lines = vec![
        Line::from("Workout complete").bold(),
        Line::from(format!("Sets: {}", summary.set_count)),
        Line::from(format!("Volume: {:.0}kg", summary.total_volume_kg)),
        Line::from(format!("Finished at {}", summary.end_time.format("%Y-%m-%d %H:%M"))),
        Line::from(""),
    ];
    if summary.badges.is_empty() {
        lines.push(Line::from("No badges this time"));
    }
    for badge in &summary.badges {
        lines.push(Line::styled(
            format!("{} {}", badge, badge_description(badge).unwrap_or_default()),
            Style::default().fg(Color::Yellow),
        ));
    }
    let paragraph = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Summary"));
    frame.render_widget(paragraph, area);
}

fn poll_key() -> Result<Option<KeyCode>> {
    if event::poll(Duration::from_millis(100))?
        && let Event::Key(key) = event::read()?
        && key.kind == KeyEventKind::Press
    {
        return Ok(Some(key.code));
    }
    Ok(None)
}

fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    Ok(terminal)
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}
