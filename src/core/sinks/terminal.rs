//! Interactive terminal dashboard.
//!
//! The dashboard content is computed by [`dashboard_sections`] as plain
//! text and drawn with `ratatui`; the crossterm backend puts the terminal in
//! raw mode on an alternate screen, which [`Release`] undoes.

use std::{
    io::{self, Stdout, Write},
    time::Duration,
};

use chrono::{DateTime, Local};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Paragraph},
    Frame, Terminal,
};

use super::{error::SinkError, traits::Sink, unavailable_message};
use crate::core::{
    lifecycle::Release,
    telemetry::{compass_point, FetchOutcome, Hemisphere},
};

pub const TITLE: &str = "New GPS Monitor";
pub const STATUS_BAR: &str = "Press 'q' or ESC to quit";

const BOX_WIDTH: u16 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Data,
    Error,
    Emphasis,
}

/// One boxed group of lines on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSection {
    pub title: Option<&'static str>,
    pub lines: Vec<String>,
    pub tone: Tone,
}

impl DashboardSection {
    fn new(title: Option<&'static str>, tone: Tone) -> Self {
        Self {
            title,
            lines: Vec::new(),
            tone,
        }
    }
}

/// Builds the dashboard for `outcome`, followed by the clock box.
pub fn dashboard_sections(outcome: &FetchOutcome<'_>, now: &DateTime<Local>) -> Vec<DashboardSection> {
    let mut sections = Vec::new();

    match outcome {
        Err(e) => {
            let mut section = DashboardSection::new(None, Tone::Error);
            section.lines.push(unavailable_message(e));
            sections.push(section);
        }
        Ok(snapshot) => {
            let fix = snapshot.fix();

            if fix.has_position() {
                let (lat, lon) = (fix.latitude_deg(), fix.longitude_deg());
                let mut section = DashboardSection::new(Some("Location"), Tone::Data);
                section.lines.push(format!(
                    "Latitude:  {:9.6}° {}",
                    lat.abs(),
                    Hemisphere::of_latitude(lat)
                ));
                section.lines.push(format!(
                    "Longitude: {:9.6}° {}",
                    lon.abs(),
                    Hemisphere::of_longitude(lon)
                ));
                sections.push(section);
            }

            if fix.speed.is_some() {
                let mut section = DashboardSection::new(Some("Navigation"), Tone::Data);
                section.lines.push(format!(
                    "Speed:      {:6.2} m/s  ({:6.2} knots)",
                    fix.speed_ms(),
                    fix.speed_knots()
                ));
                if fix.course.is_some() {
                    let course = fix.course_deg();
                    section.lines.push(format!(
                        "Course:     {:6.1}° ({})",
                        course,
                        compass_point(course)
                    ));
                }
                if fix.elevation.is_some() {
                    section
                        .lines
                        .push(format!("Elevation:  {:6.1} m", fix.elevation_m()));
                }
                sections.push(section);
            }

            if let Some(age) = fix.age {
                let mut section = DashboardSection::new(None, Tone::Data);
                section.lines.push(format!("Data Age: {} seconds", age));
                sections.push(section);
            }

            if let Some(status) = snapshot.warning() {
                let mut section = DashboardSection::new(None, Tone::Error);
                section
                    .lines
                    .push(format!("Warning: GPS service reported {}", status));
                sections.push(section);
            }
        }
    }

    let mut clock = DashboardSection::new(None, Tone::Emphasis);
    clock
        .lines
        .push(now.format("%Y-%m-%d %H:%M:%S").to_string());
    sections.push(clock);

    sections
}

fn centered(area: Rect, width: u16) -> Rect {
    let width = width.min(area.width);
    Rect {
        x: area.x + (area.width - width) / 2,
        width,
        ..area
    }
}

fn render(frame: &mut Frame<'_>, sections: &[DashboardSection]) {
    let mut constraints = vec![Constraint::Length(2)];
    constraints.extend(
        sections
            .iter()
            .map(|s| Constraint::Length(s.lines.len() as u16 + 2)),
    );
    constraints.push(Constraint::Min(0));
    constraints.push(Constraint::Length(1));
    let rows = Layout::vertical(constraints).split(frame.area());

    frame.render_widget(
        Paragraph::new(TITLE)
            .alignment(Alignment::Center)
            .style(Style::new().add_modifier(Modifier::BOLD | Modifier::UNDERLINED)),
        rows[0],
    );

    for (section, row) in sections.iter().zip(rows.iter().skip(1)) {
        let style = match section.tone {
            Tone::Data => Style::new().fg(Color::Green),
            Tone::Error => Style::new().fg(Color::Red),
            Tone::Emphasis => Style::new().add_modifier(Modifier::BOLD),
        };
        let mut block = Block::bordered();
        if let Some(title) = section.title {
            block = block.title(title);
        }
        let lines: Vec<Line<'_>> = section
            .lines
            .iter()
            .map(|l| Line::styled(format!(" {}", l), style))
            .collect();
        frame.render_widget(Paragraph::new(lines).block(block), centered(*row, BOX_WIDTH));
    }

    if let Some(status_row) = rows.last() {
        frame.render_widget(
            Paragraph::new(STATUS_BAR)
                .style(Style::new().add_modifier(Modifier::REVERSED | Modifier::BOLD)),
            *status_row,
        );
    }
}

/// True for the keys that end the interactive session.
///
/// Raw mode turns Ctrl+C into a key event instead of SIGINT, so it is
/// accepted here as well.
pub fn is_quit_key(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Drains pending terminal events without blocking and reports whether a
/// quit key was among them.
pub fn poll_quit() -> io::Result<bool> {
    let mut quit = false;
    while event::poll(Duration::ZERO)? {
        if let Event::Key(key) = event::read()? {
            quit |= key.kind == KeyEventKind::Press && is_quit_key(&key);
        }
    }
    Ok(quit)
}

pub struct TerminalSink<B: Backend> {
    terminal: Option<Terminal<B>>,
    owns_tty: bool,
}

impl TerminalSink<CrosstermBackend<Stdout>> {
    /// Switches the controlling terminal to raw mode on the alternate screen.
    pub fn open() -> Result<Self, SinkError> {
        let open_err = |source| SinkError::Open {
            target: "terminal".to_string(),
            source,
        };

        enable_raw_mode().map_err(open_err)?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen, cursor::Hide) {
            let _ = restore_tty(&mut io::stdout());
            return Err(open_err(e));
        }

        let terminal = match Terminal::new(CrosstermBackend::new(stdout)) {
            Ok(terminal) => terminal,
            Err(e) => {
                let _ = restore_tty(&mut io::stdout());
                return Err(open_err(e));
            }
        };
        Ok(Self {
            terminal: Some(terminal),
            owns_tty: true,
        })
    }
}

impl<B: Backend> TerminalSink<B> {
    /// Draws on an arbitrary backend without touching the tty.
    pub fn with_backend(backend: B) -> Result<Self, SinkError> {
        Ok(Self {
            terminal: Some(Terminal::new(backend)?),
            owns_tty: false,
        })
    }

    pub fn backend(&self) -> Option<&B> {
        self.terminal.as_ref().map(Terminal::backend)
    }

    pub fn draw_sections(&mut self, sections: &[DashboardSection]) -> Result<(), SinkError> {
        let terminal = self.terminal.as_mut().ok_or(SinkError::Released)?;
        terminal.draw(|frame| render(frame, sections))?;
        Ok(())
    }
}

impl<B: Backend> Sink for TerminalSink<B> {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn present(&mut self, outcome: &FetchOutcome<'_>) -> Result<(), SinkError> {
        let sections = dashboard_sections(outcome, &Local::now());
        self.draw_sections(&sections)
    }
}

impl<B: Backend> Release for TerminalSink<B> {
    fn label(&self) -> &'static str {
        "terminal"
    }

    fn release(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let Some(mut terminal) = self.terminal.take() else {
            return Ok(());
        };
        if !self.owns_tty {
            return Ok(());
        }

        let restored = restore_tty(&mut io::stdout());
        let _ = terminal.show_cursor();
        restored?;
        Ok(())
    }
}

/// Undoes what [`TerminalSink::open`] did to the tty. Every step is
/// attempted and the first failure is returned.
fn restore_tty(out: &mut impl Write) -> io::Result<()> {
    let screen = execute!(out, LeaveAlternateScreen, cursor::Show);
    let raw = disable_raw_mode();
    screen.and(raw)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use gps_monitor_ubus::StatusCode;
    use ratatui::backend::TestBackend;

    use super::*;
    use crate::core::telemetry::{AttrValue, AttributeBuffer, FetchError, Snapshot};

    fn buffer(pairs: &[(&str, &str)]) -> AttributeBuffer {
        let mut buffer = AttributeBuffer::new();
        for (key, value) in pairs {
            buffer.insert(*key, AttrValue::String(value.to_string()));
        }
        buffer
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 17, 8, 30, 5).unwrap()
    }

    fn screen_text(backend: &TestBackend) -> String {
        let buffer = backend.buffer();
        let width = buffer.area.width as usize;
        buffer
            .content()
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_sections_for_full_fix() {
        let buffer = buffer(&[
            ("latitude", "40.000000"),
            ("longitude", "-70.000000"),
            ("speed", "3.000000"),
            ("elevation", "10.0"),
            ("course", "90.0"),
            ("age", "2"),
        ]);
        let sections = dashboard_sections(&Ok(Snapshot::new(&buffer, Some(StatusCode::Ok))), &now());

        assert_eq!(sections.len(), 4);
        assert_eq!(sections[0].title, Some("Location"));
        assert_eq!(sections[0].lines[0], "Latitude:  40.000000° N");
        assert_eq!(sections[0].lines[1], "Longitude: 70.000000° W");
        assert_eq!(
            sections[1].lines,
            vec![
                "Speed:        3.00 m/s  (  5.83 knots)".to_string(),
                "Course:       90.0° (E)".to_string(),
                "Elevation:    10.0 m".to_string(),
            ]
        );
        assert_eq!(sections[2].lines[0], "Data Age: 2 seconds");
        assert_eq!(sections[3].lines[0], "2024-05-17 08:30:05");
        assert_eq!(sections[3].tone, Tone::Emphasis);
    }

    #[test]
    fn test_sections_skip_missing_groups() {
        let buffer = buffer(&[("latitude", "1.0"), ("age", "4")]);
        let sections = dashboard_sections(&Ok(Snapshot::new(&buffer, None)), &now());

        // No longitude means no location box, no speed means no navigation box.
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].lines[0], "Data Age: 4 seconds");
    }

    #[test]
    fn test_sections_for_failures() {
        let timeout = dashboard_sections(&Err(FetchError::Timeout(Duration::from_secs(1))), &now());
        let empty = dashboard_sections(&Err(FetchError::EmptyReply { status: None }), &now());

        assert_eq!(timeout[0].lines[0], "Timeout waiting for GPS response");
        assert_eq!(empty[0].lines[0], "No GPS data available");
        assert_eq!(timeout[0].tone, Tone::Error);
    }

    #[test]
    fn test_sections_show_status_warning() {
        let buffer = buffer(&[("age", "1")]);
        let sections =
            dashboard_sections(&Ok(Snapshot::new(&buffer, Some(StatusCode::NoData))), &now());
        assert!(sections
            .iter()
            .any(|s| s.lines.iter().any(|l| l.contains("NoData (5)"))));
    }

    #[test]
    fn test_render_on_test_backend() {
        let buffer = buffer(&[("latitude", "-33.5"), ("longitude", "151.25")]);
        let mut sink = TerminalSink::with_backend(TestBackend::new(80, 24)).unwrap();
        sink.present(&Ok(Snapshot::new(&buffer, Some(StatusCode::Ok))))
            .unwrap();

        let screen = screen_text(sink.backend().unwrap());
        assert!(screen.contains(TITLE));
        assert!(screen.contains("Latitude:  33.500000° S"));
        assert!(screen.contains("Longitude: 151.250000° E"));
        assert!(screen.lines().last().unwrap().starts_with(STATUS_BAR));
    }

    #[test]
    fn test_release_without_tty_is_idempotent() {
        let mut sink = TerminalSink::with_backend(TestBackend::new(20, 5)).unwrap();
        sink.release().unwrap();
        sink.release().unwrap();
        assert!(matches!(
            sink.present(&Err(FetchError::EmptyReply { status: None })),
            Err(SinkError::Released)
        ));
    }

    #[test]
    fn test_restore_tty_without_raw_mode() {
        let mut out = Vec::new();
        restore_tty(&mut out).unwrap();

        let written = String::from_utf8(out).unwrap();
        assert!(written.contains("\x1b[?1049l"));
        assert!(written.contains("\x1b[?25h"));
    }

    #[test]
    fn test_quit_keys() {
        let key = |code, modifiers| KeyEvent::new(code, modifiers);
        assert!(is_quit_key(&key(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(is_quit_key(&key(KeyCode::Char('Q'), KeyModifiers::SHIFT)));
        assert!(is_quit_key(&key(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(is_quit_key(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_quit_key(&key(KeyCode::Char('c'), KeyModifiers::NONE)));
        assert!(!is_quit_key(&key(KeyCode::Enter, KeyModifiers::NONE)));
    }
}
