use ratatui::style::{Color, Modifier, Style};

// Color palette
pub const PRIMARY: Color = Color::Rgb(79, 70, 229);
pub const SECONDARY: Color = Color::Rgb(34, 197, 94);
pub const ACCENT: Color = Color::Rgb(192, 160, 64);
pub const ERROR: Color = Color::Rgb(239, 68, 68);
pub const MUTED: Color = Color::Rgb(128, 128, 128);
pub const HIGHLIGHT: Color = Color::Rgb(48, 48, 64);

/// Line colours, assigned by draw position and cycled.
pub const SERIES_PALETTE: [Color; 17] = [
    Color::Rgb(0x3B, 0x82, 0xF6),
    Color::Rgb(0x10, 0xB9, 0x81),
    Color::Rgb(0xF5, 0x9E, 0x0B),
    Color::Rgb(0xEF, 0x44, 0x44),
    Color::Rgb(0x8B, 0x5C, 0xF6),
    Color::Rgb(0xEC, 0x48, 0x99),
    Color::Rgb(0x63, 0x66, 0xF1),
    Color::Rgb(0x14, 0xB8, 0xA6),
    Color::Rgb(0xF9, 0x73, 0x16),
    Color::Rgb(0x0E, 0xA5, 0xE9),
    Color::Rgb(0xA3, 0xE6, 0x35),
    Color::Rgb(0xD9, 0x46, 0xEF),
    Color::Rgb(0x2D, 0xD4, 0xBF),
    Color::Rgb(0xF4, 0x72, 0xB6),
    Color::Rgb(0xFA, 0xCC, 0x15),
    Color::Rgb(0x4A, 0xDE, 0x80),
    Color::Rgb(0x22, 0xD3, 0xEE),
];

pub fn series_color(draw_index: usize) -> Color {
    SERIES_PALETTE[draw_index % SERIES_PALETTE.len()]
}

// Styles
pub fn title_style() -> Style {
    Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD)
}

pub fn selected_style() -> Style {
    Style::default()
        .bg(HIGHLIGHT)
        .add_modifier(Modifier::BOLD)
}

pub fn list_item_style() -> Style {
    Style::default().fg(Color::White)
}

pub fn muted_style() -> Style {
    Style::default().fg(MUTED)
}

pub fn highlight_style() -> Style {
    Style::default().fg(ACCENT)
}

pub fn success_style() -> Style {
    Style::default().fg(SECONDARY)
}

pub fn error_style() -> Style {
    Style::default().fg(ERROR)
}

/// Category toggle button
pub fn button_style(active: bool) -> Style {
    if active {
        Style::default()
            .fg(Color::White)
            .bg(PRIMARY)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White).bg(HIGHLIGHT)
    }
}

pub fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(PRIMARY)
    } else {
        Style::default().fg(MUTED)
    }
}

pub fn status_bar_style() -> Style {
    Style::default().bg(Color::Rgb(32, 32, 40)).fg(Color::White)
}

pub fn help_key_style() -> Style {
    Style::default()
        .fg(ACCENT)
        .add_modifier(Modifier::BOLD)
}

pub fn help_desc_style() -> Style {
    Style::default().fg(Color::White)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_color_cycles() {
        assert_eq!(series_color(0), Color::Rgb(0x3B, 0x82, 0xF6));
        assert_eq!(series_color(17), series_color(0));
        assert_eq!(series_color(18), Color::Rgb(0x10, 0xB9, 0x81));
    }
}
