//! Closing-price chart widget
//!
//! Displays:
//! - Closing price over time (x = date, y = price)
//! - Dotted grid at the axis label positions
//! - Legend naming the series
//! - Title naming the sheet

use chrono::{DateTime, NaiveDateTime};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Rect},
    style::Style,
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Block, Borders, Chart, Dataset, GraphType, LegendPosition, Paragraph, Widget, Wrap,
    },
};
use tickerbook_core::data::ClosingSeries;

use crate::theme::Theme;

pub const SERIES_LABEL: &str = "Close Price";
const DATE_LABEL_FORMAT: &str = "%Y-%m-%d";
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Closing-price line chart for one sheet.
pub struct PriceChart<'a> {
    series: &'a ClosingSeries,
    theme: &'a Theme,
    show_grid: bool,
}

impl<'a> PriceChart<'a> {
    pub fn new(series: &'a ClosingSeries, theme: &'a Theme) -> Self {
        Self {
            series,
            theme,
            show_grid: true,
        }
    }

    pub fn show_grid(mut self, show: bool) -> Self {
        self.show_grid = show;
        self
    }

    pub fn title(&self) -> String {
        format!(" Date-wise Closing Price for {} ", self.series.sheet)
    }
}

/// Days since the Unix epoch, as the chart's x coordinate.
pub fn date_to_x(date: NaiveDateTime) -> f64 {
    date.and_utc().timestamp() as f64 / SECONDS_PER_DAY
}

fn x_to_label(x: f64) -> String {
    DateTime::from_timestamp((x * SECONDS_PER_DAY).round() as i64, 0)
        .map(|dt| dt.format(DATE_LABEL_FORMAT).to_string())
        .unwrap_or_default()
}

/// Axis bounds with 5% vertical padding; a flat series still gets a visible band.
pub fn chart_bounds(series: &ClosingSeries) -> Option<([f64; 2], [f64; 2])> {
    let (first, last) = series.date_bounds()?;
    let (lo, hi) = series.close_bounds()?;

    let (x_min, mut x_max) = (date_to_x(first), date_to_x(last));
    if x_max <= x_min {
        x_max = x_min + 1.0;
    }

    let range = hi - lo;
    let pad = if range > 0.0 { range * 0.05 } else { lo.abs().max(1.0) * 0.05 };
    Some(([x_min, x_max], [lo - pad, hi + pad]))
}

impl Widget for PriceChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(Span::styled(self.title(), self.theme.title()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.accent))
            .style(Style::default().bg(self.theme.background));

        let Some((x_bounds, y_bounds)) = chart_bounds(self.series) else {
            let message = vec![
                Line::from(""),
                Line::from(Span::styled(
                    format!("Sheet '{}' has no closing prices to plot.", self.series.sheet),
                    Style::default().fg(self.theme.warning),
                )),
            ];
            Paragraph::new(message)
                .block(block)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .render(area, buf);
            return;
        };

        let [x_min, x_max] = x_bounds;
        let [y_min, y_max] = y_bounds;
        let x_mid = (x_min + x_max) / 2.0;
        let y_mid = (y_min + y_max) / 2.0;

        let price_data: Vec<(f64, f64)> = self
            .series
            .points
            .iter()
            .filter(|p| p.close.is_finite())
            .map(|p| (date_to_x(p.date), p.close))
            .collect();

        // Guide lines at each label position
        let grid_lines: Vec<[(f64, f64); 2]> = if self.show_grid {
            [y_min, y_mid, y_max]
                .iter()
                .map(|&y| [(x_min, y), (x_max, y)])
                .chain([x_min, x_mid, x_max].iter().map(|&x| [(x, y_min), (x, y_max)]))
                .collect()
        } else {
            Vec::new()
        };

        let grid_style = Style::default().fg(self.theme.grid);
        let mut datasets: Vec<Dataset> = grid_lines
            .iter()
            .map(|line| {
                Dataset::default()
                    .marker(symbols::Marker::Dot)
                    .graph_type(GraphType::Line)
                    .style(grid_style)
                    .data(line)
            })
            .collect();

        // Drawn last so it sits on top of the grid
        datasets.push(
            Dataset::default()
                .name(SERIES_LABEL)
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(self.theme.accent))
                .data(&price_data),
        );

        let x_labels = vec![
            Span::styled(x_to_label(x_min), self.theme.label()),
            Span::styled(x_to_label(x_mid), self.theme.label()),
            Span::styled(x_to_label(x_max), self.theme.label()),
        ];
        let y_labels = vec![
            Span::styled(format!("{y_min:.2}"), self.theme.label()),
            Span::styled(format!("{y_mid:.2}"), self.theme.label()),
            Span::styled(format!("{y_max:.2}"), self.theme.label()),
        ];

        let chart = Chart::new(datasets)
            .block(block)
            .legend_position(Some(LegendPosition::TopLeft))
            .hidden_legend_constraints((Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)))
            .x_axis(
                Axis::default()
                    .title(Span::styled("Date", self.theme.label()))
                    .style(self.theme.axis())
                    .bounds([x_min, x_max])
                    .labels(x_labels),
            )
            .y_axis(
                Axis::default()
                    .title(Span::styled("Price", self.theme.label()))
                    .style(self.theme.axis())
                    .bounds([y_min, y_max])
                    .labels(y_labels),
            );

        chart.render(area, buf);
    }
}
