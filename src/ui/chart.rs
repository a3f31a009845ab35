//! Population chart, loading gauge and selection prompt.
//!
//! `ChartView` turns application state into plain chart data (points,
//! bounds, labels, colours) so the layout logic can be tested without a
//! terminal; `render` draws whichever of the three views is current.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, Gauge, GraphType, Paragraph},
    Frame,
};

use crate::app::{App, ContentView};
use crate::models::SeriesPoint;
use crate::ui::styles;
use crate::utils::{format_man, format_people, format_year};

/// Width of the legend panel beside the chart
const LEGEND_WIDTH: u16 = 30;

/// One drawn line
#[derive(Debug, Clone, PartialEq)]
pub struct ChartLine {
    pub label: String,
    pub color: Color,
    pub points: Vec<(f64, f64)>,
    pub headline: Option<SeriesPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartView {
    pub title: String,
    pub lines: Vec<ChartLine>,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub x_labels: Vec<String>,
    pub y_labels: Vec<String>,
    pub boundary_year: Option<i32>,
}

impl ChartView {
    /// Build chart data for the selected, validly cached prefectures.
    pub fn build(app: &App) -> Self {
        let series = app.chart_series();
        let lines: Vec<ChartLine> = series
            .iter()
            .enumerate()
            .map(|(i, s)| ChartLine {
                label: s.region_name.clone(),
                color: styles::series_color(i),
                points: s
                    .points
                    .iter()
                    .map(|p| (p.year as f64, p.value as f64))
                    .collect(),
                headline: s.headline_point(),
            })
            .collect();

        let boundary_year = series
            .iter()
            .filter_map(|s| s.boundary_year)
            .max();

        let years = lines.iter().flat_map(|l| l.points.iter().map(|p| p.0));
        let x_min = years.clone().fold(f64::INFINITY, f64::min);
        let x_max = years.fold(f64::NEG_INFINITY, f64::max);
        let x_bounds = if x_min.is_finite() && x_max > x_min {
            [x_min, x_max]
        } else if x_min.is_finite() {
            [x_min, x_min + 1.0]
        } else {
            [0.0, 1.0]
        };

        let y_max = series.iter().filter_map(|s| s.max_value()).max().unwrap_or(0);
        let y_bounds = [0.0, if y_max > 0 { y_max as f64 } else { 1.0 }];

        let x_mid = (x_bounds[0] + x_bounds[1]) / 2.0;
        let x_labels = [x_bounds[0], x_mid, x_bounds[1]]
            .iter()
            .map(|y| format!("{:.0}", y))
            .collect();
        let y_labels = [0.0, y_bounds[1] / 2.0, y_bounds[1]]
            .iter()
            .map(|v| format_man(*v))
            .collect();

        Self {
            title: format!("{}の人口推移グラフ", app.category.label()),
            lines,
            x_bounds,
            y_bounds,
            x_labels,
            y_labels,
            boundary_year,
        }
    }
}

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    match app.content_view() {
        ContentView::Loading { progress } => render_loading(frame, app, area, progress),
        ContentView::Chart => render_chart(frame, &ChartView::build(app), area),
        ContentView::Prompt => render_prompt(frame, area),
    }
}

fn render_loading(frame: &mut Frame, app: &App, area: Rect, progress: f64) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Length(1), // Status text
            Constraint::Length(1),
            Constraint::Length(3), // Gauge
            Constraint::Min(0),
        ])
        .split(area);

    let text = Paragraph::new(Span::styled("データを取得中...", styles::highlight_style()))
        .alignment(Alignment::Center);
    frame.render_widget(text, chunks[1]);

    let gauge_area = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(50),
            Constraint::Percentage(25),
        ])
        .split(chunks[3])[1];

    let cached = app
        .cache
        .valid_count(app.selection.as_slice(), app.category);
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).border_style(styles::muted_style()))
        .gauge_style(Style::default().fg(styles::PRIMARY))
        .ratio(progress.clamp(0.0, 1.0))
        .label(format!("{} / {}", cached, app.selection.len()));
    frame.render_widget(gauge, gauge_area);
}

fn render_chart(frame: &mut Frame, view: &ChartView, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(LEGEND_WIDTH)])
        .split(area);

    let datasets: Vec<Dataset> = view
        .lines
        .iter()
        .map(|line| {
            Dataset::default()
                .name(line.label.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(line.color))
                .data(&line.points)
        })
        .collect();

    let mut block = Block::default()
        .title(Span::styled(format!(" {} ", view.title), styles::title_style()))
        .borders(Borders::ALL)
        .border_style(styles::muted_style());
    if let Some(year) = view.boundary_year {
        block = block.title_bottom(Line::from(Span::styled(
            format!(" {}以降は推計値 ", format_year(year)),
            styles::muted_style(),
        )));
    }

    let x_labels: Vec<Span> = view.x_labels.iter().map(|l| Span::raw(l.clone())).collect();
    let y_labels: Vec<Span> = view.y_labels.iter().map(|l| Span::raw(l.clone())).collect();

    let chart = Chart::new(datasets)
        .block(block)
        .legend_position(None)
        .x_axis(
            Axis::default()
                .title("年")
                .style(styles::muted_style())
                .bounds(view.x_bounds)
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .title("人口")
                .style(styles::muted_style())
                .bounds(view.y_bounds)
                .labels(y_labels),
        );
    frame.render_widget(chart, chunks[0]);

    render_legend(frame, view, chunks[1]);
}

fn render_legend(frame: &mut Frame, view: &ChartView, area: Rect) {
    let mut lines = Vec::new();
    if view.lines.is_empty() {
        lines.push(Line::from(Span::styled("データがありません", styles::muted_style())));
    }
    for line in &view.lines {
        lines.push(Line::from(vec![
            Span::styled("━━ ", Style::default().fg(line.color)),
            Span::styled(line.label.clone(), styles::list_item_style()),
        ]));
        if let Some(point) = line.headline {
            lines.push(Line::from(Span::styled(
                format!("   {} ({})", format_people(point.value), format_year(point.year)),
                styles::muted_style(),
            )));
        }
    }

    let block = Block::default()
        .title(Span::styled(" 凡例 ", styles::title_style()))
        .borders(Borders::ALL)
        .border_style(styles::muted_style());
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_prompt(frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(45), Constraint::Length(1), Constraint::Min(0)])
        .split(area);

    let prompt = Paragraph::new(Span::styled("都道府県を選択してください。", styles::list_item_style()))
        .alignment(Alignment::Center);
    frame.render_widget(prompt, chunks[1]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{directory, series, test_app};
    use crate::models::{Category, Region};
    use crate::orchestrator::{PassEvent, PassOutcome};

    #[test]
    fn test_single_region_chart() {
        let mut app = test_app();
        app.process_event(PassEvent::Directory(directory()));
        app.toggle_region(13);
        app.process_event(PassEvent::Cached { epoch: 0, code: 13, series: series("東京都", Category::Total) });

        let view = ChartView::build(&app);
        assert_eq!(view.title, "総人口の人口推移グラフ");
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.lines[0].label, "東京都");
        assert_eq!(view.lines[0].color, styles::series_color(0));
        assert_eq!(view.x_bounds, [2015.0, 2020.0]);
        assert_eq!(view.y_bounds, [0.0, 14_047_594.0]);
        assert_eq!(view.y_labels, vec!["0万", "702万", "1405万"]);
        assert_eq!(view.x_labels, vec!["2015", "2018", "2020"]);
        assert_eq!(view.boundary_year, Some(2020));
        assert_eq!(view.lines[0].headline.map(|p| p.value), Some(14_047_594));
    }

    #[test]
    fn test_lines_follow_selection_order_and_skip_missing() {
        let mut app = test_app();
        app.process_event(PassEvent::Directory(directory()));
        for code in [27, 14, 13] {
            app.toggle_region(code);
        }
        app.process_event(PassEvent::Cached { epoch: 0, code: 13, series: series("東京都", Category::Total) });
        app.process_event(PassEvent::Cached { epoch: 0, code: 27, series: series("大阪府", Category::Total) });

        let view = ChartView::build(&app);
        let labels: Vec<&str> = view.lines.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, vec!["大阪府", "東京都"]);
        assert_eq!(view.lines[1].color, styles::series_color(1));
    }

    #[test]
    fn test_colors_cycle_past_palette() {
        let mut app = test_app();
        let regions: Vec<Region> = (1..=18).map(|code| Region::new(code, format!("県{}", code))).collect();
        app.process_event(PassEvent::Directory(regions));
        app.select_all();
        for code in 1..=18u32 {
            app.process_event(PassEvent::Cached {
                epoch: 0,
                code,
                series: series(&format!("県{}", code), Category::Total),
            });
        }
        app.process_event(PassEvent::Finished { generation: app.generation(), outcome: PassOutcome::default() });

        let view = ChartView::build(&app);
        assert_eq!(view.lines.len(), 18);
        assert_eq!(view.lines[17].color, view.lines[0].color);
    }

    #[test]
    fn test_empty_chart_has_sane_bounds() {
        let mut app = test_app();
        app.process_event(PassEvent::Directory(directory()));
        app.toggle_region(13);

        let view = ChartView::build(&app);
        assert!(view.lines.is_empty());
        assert_eq!(view.x_bounds, [0.0, 1.0]);
        assert_eq!(view.y_bounds, [0.0, 1.0]);
        assert_eq!(view.boundary_year, None);
    }
}
