use ratatui::{
    layout::{Alignment, Rect},
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{App, Focus, GRID_COLUMNS};
use crate::models::Category;
use crate::ui::styles;

/// Height needed to show the whole prefecture grid plus its action row.
pub fn region_grid_height(app: &App) -> u16 {
    let rows = app.regions.len().div_ceil(GRID_COLUMNS).max(1);
    // borders + action row + grid rows
    (rows + 3) as u16
}

pub fn render_regions(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Regions;
    let block = Block::default()
        .title(Span::styled(" 都道府県を選択 ", styles::title_style()))
        .borders(Borders::ALL)
        .border_style(styles::border_style(focused));

    let inner_width = area.width.saturating_sub(2) as usize;
    let cell_width = (inner_width / GRID_COLUMNS).max(1);

    let mut lines = vec![Line::from(vec![
        Span::styled("[a]", styles::help_key_style()),
        Span::styled(" 全選択  ", styles::success_style()),
        Span::styled("[c]", styles::help_key_style()),
        Span::styled(" 全解除  ", styles::error_style()),
        Span::styled(
            format!("選択中: {} / {}", app.selection.len(), app.regions.len()),
            styles::muted_style(),
        ),
    ])];

    if app.regions.is_empty() {
        let message = if app.directory_loading {
            "読み込み中..."
        } else {
            "都道府県がありません"
        };
        lines.push(Line::from(Span::styled(message, styles::muted_style())));
    }

    for (row, chunk) in app.regions.chunks(GRID_COLUMNS).enumerate() {
        let mut spans = Vec::with_capacity(chunk.len());
        for (col, region) in chunk.iter().enumerate() {
            let index = row * GRID_COLUMNS + col;
            let checked = app.selection.contains(region.code);
            let mark = if checked { "[x]" } else { "[ ]" };

            let text = format!("{} {}", mark, region.name);
            let pad = cell_width.saturating_sub(Span::raw(text.as_str()).width());

            let mut style = if checked {
                styles::success_style()
            } else {
                styles::list_item_style()
            };
            if focused && index == app.region_cursor {
                style = style.patch(styles::selected_style());
            }

            spans.push(Span::styled(text, style));
            spans.push(Span::raw(" ".repeat(pad)));
        }
        lines.push(Line::from(spans));
    }

    // Keep the cursor row visible when the grid is taller than the area
    let visible_lines = area.height.saturating_sub(2) as usize;
    let cursor_line = app.region_cursor / GRID_COLUMNS + 1;
    let scroll = if visible_lines > 0 && cursor_line >= visible_lines {
        (cursor_line + 1 - visible_lines) as u16
    } else {
        0
    };

    let paragraph = Paragraph::new(lines).block(block).scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

pub fn render_categories(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Categories;
    let block = Block::default()
        .title(Span::styled(" 表示する人口区分を選択 ", styles::title_style()))
        .borders(Borders::ALL)
        .border_style(styles::border_style(focused));

    let mut spans = Vec::new();
    for (i, category) in Category::ALL.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw("  "));
        }
        let mut style = styles::button_style(*category == app.category);
        if focused && *category == app.category_cursor {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        spans.push(Span::styled(format!(" {} {} ", i + 1, category.label()), style));
    }

    let paragraph = Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .block(block);
    frame.render_widget(paragraph, area);
}
