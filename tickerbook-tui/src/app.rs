//! Interactive display: full-screen chart plus a one-line status bar.

use std::io::{self, stdout};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::cursor::Show;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::{Frame, Terminal};
use tickerbook_core::data::ClosingSeries;

use crate::chart::PriceChart;
use crate::theme::Theme;

/// Draw the chart and status bar.
pub fn draw(f: &mut Frame, series: &ClosingSeries, theme: &Theme) {
    // Split: chart area + 1-line status bar.
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(f.area());

    f.render_widget(PriceChart::new(series, theme), chunks[0]);
    f.render_widget(
        Paragraph::new(status_line(series, theme)).style(theme.status()),
        chunks[1],
    );
}

fn status_line<'a>(series: &ClosingSeries, theme: &Theme) -> Line<'a> {
    let mut spans = vec![Span::styled(format!(" {} ", series.sheet), theme.title())];
    if let Some((first, last)) = series.date_bounds() {
        spans.push(Span::raw(format!(
            "| {} to {} | {} points ",
            first.format("%Y-%m-%d"),
            last.format("%Y-%m-%d"),
            series.points.len()
        )));
    }
    if let Some(point) = series.points.last() {
        spans.push(Span::raw(format!("| last close {:.2} ", point.close)));
    }
    spans.push(Span::styled("| q/Esc: quit", theme.label()));
    Line::from(spans)
}

/// Keys that close the chart.
pub fn is_quit_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Runs a cleanup action from the panic hook while alive; on drop the
/// previous hook is put back.
struct PanicHookGuard {
    restore_previous: Option<Box<dyn FnOnce() + Send>>,
}

impl PanicHookGuard {
    fn install(on_panic: impl Fn() + Send + Sync + 'static) -> Self {
        let previous = Arc::new(std::panic::take_hook());
        let forward = Arc::clone(&previous);
        std::panic::set_hook(Box::new(move |info| {
            on_panic();
            (*forward)(info);
        }));
        Self {
            restore_previous: Some(Box::new(move || {
                std::panic::set_hook(Box::new(move |info| (*previous)(info)));
            })),
        }
    }
}

impl Drop for PanicHookGuard {
    fn drop(&mut self) {
        if let Some(restore) = self.restore_previous.take() {
            restore();
        }
    }
}

fn restore_terminal() {
    if let Err(e) = disable_raw_mode() {
        log::warn!("failed to leave raw mode: {e}");
    }
    if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen, Show) {
        log::warn!("failed to leave alternate screen: {e}");
    }
}

/// Take over the terminal and show the chart until the user quits.
///
/// The terminal is restored on every exit path, including setup failures
/// and panics.
pub fn run_interactive(series: &ClosingSeries) -> Result<()> {
    let _panic_guard = PanicHookGuard::install(restore_terminal);

    enable_raw_mode()?;
    let result = run_session(series);
    restore_terminal();
    result
}

fn run_session(series: &ClosingSeries) -> Result<()> {
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    event_loop(&mut terminal, series, &Theme::default())
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    series: &ClosingSeries,
    theme: &Theme,
) -> Result<()> {
    loop {
        terminal.draw(|f| draw(f, series, theme))?;

        // Resize events simply fall through to the next redraw.
        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                if is_quit_key(&key) {
                    log::debug!("quit requested");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ratatui::backend::TestBackend;
    use tickerbook_core::data::ClosePoint;

    fn series() -> ClosingSeries {
        let day = |d| {
            NaiveDate::from_ymd_opt(2024, 1, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        };
        ClosingSeries {
            sheet: "MSFT".into(),
            points: vec![
                ClosePoint { date: day(2), close: 370.87 },
                ClosePoint { date: day(3), close: 370.60 },
                ClosePoint { date: day(4), close: 367.94 },
            ],
        }
    }

    #[test]
    fn quit_keys() {
        let press = |code, modifiers| KeyEvent::new(code, modifiers);
        assert!(is_quit_key(&press(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(is_quit_key(&press(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(is_quit_key(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_quit_key(&press(KeyCode::Char('c'), KeyModifiers::NONE)));
        assert!(!is_quit_key(&press(KeyCode::Enter, KeyModifiers::NONE)));

        let mut release = press(KeyCode::Char('q'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert!(!is_quit_key(&release));
    }

    #[test]
    fn panic_hook_guard_restores_previous_hook() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static CLEANUPS: AtomicUsize = AtomicUsize::new(0);

        let guard = PanicHookGuard::install(|| {
            CLEANUPS.fetch_add(1, Ordering::SeqCst);
        });
        let _ = std::panic::catch_unwind(|| panic!("while the chart is up"));
        assert_eq!(CLEANUPS.load(Ordering::SeqCst), 1);

        drop(guard);
        let _ = std::panic::catch_unwind(|| panic!("after the chart closed"));
        assert_eq!(CLEANUPS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn status_bar_summarizes_series() {
        let theme = Theme::default();
        let text: String = status_line(&series(), &theme)
            .spans
            .iter()
            .map(|s| s.content.as_ref())
            .collect();
        assert!(text.contains("MSFT"));
        assert!(text.contains("2024-01-02 to 2024-01-04"));
        assert!(text.contains("3 points"));
        assert!(text.contains("last close 367.94"));
    }

    #[test]
    fn full_frame_draws_chart_and_status() {
        let backend = TestBackend::new(100, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        let series = series();
        terminal
            .draw(|f| draw(f, &series, &Theme::default()))
            .unwrap();

        let buf = terminal.backend().buffer();
        let last_row: String = (0..buf.area.width)
            .map(|x| buf[(x, buf.area.height - 1)].symbol())
            .collect();
        assert!(last_row.contains("q/Esc: quit"), "{last_row}");

        let top_row: String = (0..buf.area.width).map(|x| buf[(x, 0)].symbol()).collect();
        assert!(top_row.contains("Date-wise Closing Price for MSFT"), "{top_row}");
    }
}
