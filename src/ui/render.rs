use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::{App, AppState};

use super::styles;
use super::{chart, selector};

const TITLE: &str = "都道府県別人口推移グラフ";

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),                              // Title bar
            Constraint::Length(selector::region_grid_height(app)), // Prefecture grid
            Constraint::Length(3),                              // Category buttons
            Constraint::Min(10),                                // Chart
            Constraint::Length(2),                              // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, chunks[0]);
    selector::render_regions(frame, app, chunks[1]);
    selector::render_categories(frame, app, chunks[2]);
    chart::render(frame, app, chunks[3]);
    render_status_bar(frame, app, chunks[4]);

    // Render overlays
    if matches!(app.state, AppState::ShowingHelp) {
        render_help_overlay(frame);
    }

    if matches!(app.state, AppState::ConfirmingQuit) {
        render_quit_overlay(frame);
    }
}

fn render_title_bar(frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(12)])
        .split(area);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let title = Paragraph::new(Span::styled(format!("  {}", TITLE), styles::title_style()))
        .block(block.clone());
    frame.render_widget(title, chunks[0]);

    let hint = Paragraph::new(Span::styled("[?] Help  ", styles::muted_style()))
        .alignment(Alignment::Right)
        .block(block);
    frame.render_widget(hint, chunks[1]);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = " [Tab] 切替 | [Space] 選択 | [q] 終了 ";

    let left_text = match app.status_message {
        Some(ref msg) => format!(" {} ", msg),
        None => format!(" {} ", app.selection_summary()),
    };
    let left_style = if app.status_message.is_some() {
        styles::highlight_style()
    } else {
        styles::muted_style()
    };

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(Span::raw(shortcuts).width() as u16),
        ])
        .split(area);

    let left = Paragraph::new(Span::styled(left_text, left_style)).style(styles::status_bar_style());
    frame.render_widget(left, chunks[0]);

    let right = Paragraph::new(Span::styled(shortcuts, styles::muted_style()))
        .alignment(Alignment::Right)
        .style(styles::status_bar_style());
    frame.render_widget(right, chunks[1]);
}

fn help_entry(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<12}", key), styles::help_key_style()),
        Span::styled(desc, styles::help_desc_style()),
    ])
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(52, 22, frame.area());

    // Clear the area
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");

    let help_text = vec![
        Line::from(Span::styled(format!("  {}", TITLE), styles::title_style())),
        Line::from(Span::styled(
            format!("  prefpop version {}", version),
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Navigation", styles::highlight_style())),
        help_entry("Tab", "都道府県 ↔ 人口区分"),
        help_entry("←↑↓→ hjkl", "カーソル移動"),
        help_entry("Space Enter", "選択 / 解除"),
        Line::from(""),
        Line::from(Span::styled(" Actions", styles::highlight_style())),
        help_entry("1-4", "人口区分を切り替え"),
        help_entry("a", "全選択"),
        help_entry("c", "全解除"),
        help_entry("r", "都道府県一覧を再読み込み"),
        help_entry("q", "終了"),
        Line::from(""),
        Line::from(Span::styled(
            "  ※ データ出典: RESAS (地域経済分析システム)",
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    let paragraph = Paragraph::new(help_text).block(block);

    frame.render_widget(paragraph, area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(40, 7, frame.area());

    // Clear the area
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled("   終了しますか?", styles::highlight_style())),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    let paragraph = Paragraph::new(lines).block(block);

    frame.render_widget(paragraph, area);
}
