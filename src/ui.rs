use std::io::{self, Stdout};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{bounded, never, unbounded, Receiver, Sender, TryRecvError};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Paragraph};
use ratatui::{Frame, Terminal};
use textwrap::{wrap, Options as WrapOptions};
use tracing::{debug, warn};
use unicode_width::UnicodeWidthStr;

use crate::address;
use crate::gopher::FetchResult;
use crate::navigation::{Content, Navigation};
use crate::status::{self, Status};
use crate::worker::Fetcher;

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const FOOTER_HELP: &str =
    "[Q]uit/Esc/Ctrl+C [R]efresh Up Down Enter [B]ack/Backspace [F]orward [I]nput";
const HTML_CONTINUATION: &str = "| ";
const INPUT_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct Options {
    pub initial_address: String,
    pub status_timeout: Duration,
    pub tick_rate: Duration,
}

impl Options {
    pub fn new<S: Into<String>>(initial_address: S) -> Self {
        Self {
            initial_address: initial_address.into(),
            status_timeout: status::DEFAULT_TIMEOUT,
            tick_rate: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

/// The interactive client: navigation state, the status line, and at most
/// one outstanding fetch.
pub struct Browser<F: Fetcher> {
    fetcher: F,
    navigation: Navigation,
    status: Status,
    pending: Option<Receiver<FetchResult>>,
    prompt: Option<String>,
    spinner: Spinner,
    tick_rate: Duration,
    needs_redraw: bool,
}

impl<F: Fetcher> Browser<F> {
    pub fn new(fetcher: F, options: Options) -> Self {
        Self {
            fetcher,
            navigation: Navigation::new(options.initial_address),
            status: Status::new(options.status_timeout),
            pending: None,
            prompt: None,
            spinner: Spinner::new(),
            tick_rate: options.tick_rate,
            needs_redraw: true,
        }
    }

    pub fn navigation(&self) -> &Navigation {
        &self.navigation
    }

    pub fn status_text(&self) -> Option<&str> {
        self.status.text(Instant::now())
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Requests the initial address.
    pub fn start(&mut self) {
        let initial = self.navigation.current_address().to_string();
        let target = self.navigation.open(initial);
        self.dispatch(target);
    }

    pub fn set_status<S: Into<String>>(&mut self, message: S) {
        self.status.set(message);
        self.mark_dirty();
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn dispatch(&mut self, target: String) {
        debug!(address = %target, "requesting");
        self.pending = Some(self.fetcher.request(&target));
        self.spinner.reset();
        self.mark_dirty();
    }

    /// Applies the outstanding reply if it has arrived.
    pub fn poll_fetch(&mut self) -> bool {
        let Some(reply) = &self.pending else {
            return false;
        };
        match reply.try_recv() {
            Ok(result) => {
                self.handle_result(result);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.handle_result(FetchResult::error("network worker went away"));
                true
            }
        }
    }

    pub fn handle_result(&mut self, result: FetchResult) {
        self.pending = None;
        if let Err(err) = self.navigation.apply(result) {
            warn!(error = %err, "navigation failed");
            self.status.set(err.to_string());
        }
        self.mark_dirty();
    }

    pub fn handle_event(&mut self, event: Event) -> Flow {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            Event::Resize(_, _) => {
                self.mark_dirty();
                Flow::Continue
            }
            _ => Flow::Continue,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Flow {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Flow::Quit;
        }
        if self.prompt.is_some() {
            self.handle_prompt_key(key.code);
            return Flow::Continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => return Flow::Quit,
            _ if self.is_loading() => {}
            KeyCode::Up | KeyCode::Char('k') => {
                if self.navigation.select_link(-1) {
                    self.mark_dirty();
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.navigation.select_link(1) {
                    self.mark_dirty();
                }
            }
            KeyCode::Enter => {
                let outcome = self.navigation.follow_selection();
                self.navigate(outcome);
            }
            KeyCode::Char('b') | KeyCode::Char('B') | KeyCode::Backspace => {
                let outcome = self.navigation.go_back();
                self.navigate(outcome);
            }
            KeyCode::Char('f') | KeyCode::Char('F') => {
                let outcome = self.navigation.go_forward();
                self.navigate(outcome);
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                let target = self.navigation.reload();
                self.dispatch(target);
            }
            KeyCode::Char('i') | KeyCode::Char('I') => {
                self.prompt = Some(String::new());
                self.mark_dirty();
            }
            _ => {}
        }
        Flow::Continue
    }

    fn navigate<E: std::fmt::Display>(&mut self, outcome: Result<String, E>) {
        match outcome {
            Ok(target) => self.dispatch(target),
            Err(err) => self.set_status(err.to_string()),
        }
    }

    fn handle_prompt_key(&mut self, code: KeyCode) {
        let Some(buffer) = self.prompt.as_mut() else {
            return;
        };
        match code {
            KeyCode::Esc => self.prompt = None,
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Char(ch) => buffer.push(ch),
            KeyCode::Enter => {
                let typed = buffer.trim().to_string();
                self.prompt = None;
                if typed.is_empty() {
                    self.set_status("Error: no address entered");
                } else if self.is_loading() {
                    self.set_status("Error: a page is still loading");
                } else {
                    let target = self.navigation.open(address::normalize(&typed));
                    self.dispatch(target);
                }
            }
            _ => {}
        }
        self.mark_dirty();
    }

    /// Periodic housekeeping: status expiry and the loading spinner.
    pub fn tick(&mut self, now: Instant) {
        if self.status.expire(now) {
            self.mark_dirty();
        }
        if self.is_loading() && self.spinner.advance(now) {
            self.mark_dirty();
        }
    }

    /// Drives the browser until a quit key or the input channel closes.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>, input: &Receiver<Event>) -> Result<()> {
        self.start();
        loop {
            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let reply = self.pending.clone().unwrap_or_else(never);
            crossbeam_channel::select! {
                recv(reply) -> message => match message {
                    Ok(result) => self.handle_result(result),
                    Err(_) => self.handle_result(FetchResult::error("network worker went away")),
                },
                recv(input) -> message => match message {
                    Ok(event) => {
                        if self.handle_event(event) == Flow::Quit {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                default(self.tick_rate) => {}
            }

            self.tick(Instant::now());
        }
        Ok(())
    }

    pub fn draw(&self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let header = Paragraph::new(format!("gopher-tui: {}", self.navigation.current_address()))
            .style(
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .bg(COLOR_PANEL_FOCUSED_BG)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_widget(header, layout[0]);

        self.draw_body(frame, layout[1]);

        let footer = Paragraph::new(self.footer_line())
            .style(Style::default().fg(COLOR_TEXT_SECONDARY).bg(COLOR_PANEL_BG));
        frame.render_widget(footer, layout[2]);
    }

    fn draw_body(&self, frame: &mut Frame<'_>, area: Rect) {
        let (mut rows, selected) = self.body_rows(area.width as usize);
        pad_lines_to_width(&mut rows, area.width);
        let offset = scroll_offset(selected, rows.len(), area.height as usize);
        let body = Paragraph::new(Text::from(rows))
            .style(Style::default().fg(COLOR_TEXT_PRIMARY).bg(COLOR_BG))
            .scroll((offset.min(u16::MAX as usize) as u16, 0));
        frame.render_widget(body, area);
    }

    /// Rows to display and the first row of the selection.
    fn body_rows(&self, width: usize) -> (Vec<Line<'static>>, Option<usize>) {
        let cursor = self.navigation.cursor();
        let mut rows = Vec::new();
        let mut selected_row = None;

        match self.navigation.content() {
            Content::Empty => {}
            Content::Menu(entries) => {
                for (idx, entry) in entries.iter().enumerate() {
                    let mut style = if entry.is_link() {
                        Style::default()
                            .fg(COLOR_ACCENT)
                            .add_modifier(Modifier::UNDERLINED)
                    } else if entry.label().is_empty() {
                        Style::default().fg(COLOR_TEXT_SECONDARY)
                    } else {
                        Style::default().fg(COLOR_TEXT_PRIMARY)
                    };
                    if cursor == Some(idx) {
                        style = style.bg(COLOR_PANEL_SELECTED_BG).add_modifier(Modifier::BOLD);
                        selected_row = Some(rows.len());
                    }
                    rows.push(Line::from(Span::styled(entry.to_string(), style)));
                }
            }
            Content::Html(lines) => {
                for (idx, line) in lines.iter().enumerate() {
                    let mut style = Style::default().fg(COLOR_TEXT_PRIMARY);
                    if cursor == Some(idx) {
                        style = style.bg(COLOR_PANEL_SELECTED_BG).add_modifier(Modifier::BOLD);
                        selected_row = Some(rows.len());
                    }
                    for wrapped in wrap_html_line(line, width) {
                        rows.push(Line::from(Span::styled(wrapped, style)));
                    }
                }
            }
        }

        (rows, selected_row)
    }

    fn footer_line(&self) -> Line<'static> {
        if let Some(buffer) = &self.prompt {
            return Line::from(vec![
                Span::styled(
                    "Go to: ",
                    Style::default()
                        .fg(COLOR_ACCENT)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(format!("{buffer}_"), Style::default().fg(COLOR_TEXT_PRIMARY)),
            ]);
        }

        let mut spans = vec![Span::styled(
            FOOTER_HELP,
            Style::default().add_modifier(Modifier::ITALIC),
        )];
        if let Some(message) = self.status_text() {
            spans.push(Span::raw(" | "));
            spans.push(Span::styled(
                message.to_string(),
                Style::default().fg(COLOR_ERROR).add_modifier(Modifier::BOLD),
            ));
        } else if self.is_loading() {
            spans.push(Span::raw(" | "));
            spans.push(Span::styled(
                format!("{} Loading...", self.spinner.frame()),
                Style::default().fg(COLOR_ACCENT),
            ));
        }
        Line::from(spans)
    }
}

/// Forwards terminal events to a channel from a dedicated thread so the
/// event loop can wait on them alongside fetch replies.
pub struct InputReader {
    stop: Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl InputReader {
    pub fn spawn() -> (Self, Receiver<Event>) {
        let (events_tx, events_rx) = unbounded();
        let (stop_tx, stop_rx) = bounded(1);
        let handle = thread::spawn(move || read_input(events_tx, stop_rx));
        (
            Self {
                stop: stop_tx,
                handle: Some(handle),
            },
            events_rx,
        )
    }
}

impl Drop for InputReader {
    fn drop(&mut self) {
        let _ = self.stop.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn read_input(events: Sender<Event>, stop: Receiver<()>) {
    loop {
        if !matches!(stop.try_recv(), Err(TryRecvError::Empty)) {
            break;
        }
        match event::poll(INPUT_POLL) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(err) => {
                warn!(error = %err, "terminal poll failed");
                break;
            }
        }
        match event::read() {
            Ok(event) => {
                if events.send(event).is_err() {
                    break;
                }
            }
            Err(err) => {
                warn!(error = %err, "terminal read failed");
                break;
            }
        }
    }
}

/// Takes over the terminal, runs the browser and always restores the
/// terminal afterwards.
pub fn run<F: Fetcher>(browser: &mut Browser<F>) -> Result<()> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;
    terminal.clear()?;

    let result = {
        let (reader, input) = InputReader::spawn();
        let result = browser.run(&mut terminal, &input);
        drop(reader);
        result
    };

    restore_terminal(&mut terminal)?;
    result
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn wrap_html_line(line: &str, width: usize) -> Vec<String> {
    let expanded = line.replace('\t', "    ");
    if width <= HTML_CONTINUATION.len() || UnicodeWidthStr::width(expanded.as_str()) <= width {
        return vec![expanded];
    }
    let options = WrapOptions::new(width)
        .subsequent_indent(HTML_CONTINUATION)
        .break_words(true);
    wrap(&expanded, options)
        .into_iter()
        .map(|row| row.into_owned())
        .collect()
}

/// Keeps the selected row in view, centering it once it passes the middle.
fn scroll_offset(selected: Option<usize>, total: usize, height: usize) -> usize {
    let Some(selected) = selected else {
        return 0;
    };
    let middle = height / 2;
    if selected <= middle {
        return 0;
    }
    (selected - middle).min(total.saturating_sub(height))
}

fn pad_lines_to_width(lines: &mut [Line<'static>], width: u16) {
    let width = width as usize;
    if width == 0 {
        return;
    }

    for line in lines {
        let mut current_width = 0usize;
        for span in &line.spans {
            current_width =
                current_width.saturating_add(UnicodeWidthStr::width(span.content.as_ref()));
        }
        if current_width >= width {
            continue;
        }
        let pad_style = line.spans.last().map(|span| span.style).unwrap_or_default();
        let padding = " ".repeat(width - current_width);
        line.spans.push(Span::styled(padding, pad_style));
    }
}
