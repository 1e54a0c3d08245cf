use ratatui::style::{Color, Modifier, Style};

/// Colors used by the terminal host.
#[derive(Clone, Debug)]
pub struct Theme {
    pub background: Color,

    /// Status bar colors
    pub status_bar_fg: Color,
    pub status_bar_bg: Color,

    /// Color for the current file name in the status bar
    pub filename_color: Color,

    /// Foreground color for hashtags and urls
    pub link_color: Color,

    /// Marker drawn in front of quoted lines
    pub quote_color: Color,

    /// List bullets and numbers
    pub marker_color: Color,

    /// Divider rule and image/custom placeholders
    pub placeholder_fg: Color,

    /// Color for text without an explicit color
    pub text_color: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color::Reset,
            status_bar_fg: Color::White,
            status_bar_bg: Color::Blue,
            filename_color: Color::LightYellow,
            link_color: Color::Blue,
            quote_color: Color::DarkGray,
            marker_color: Color::Cyan,
            placeholder_fg: Color::Gray,
            text_color: Color::Reset,
        }
    }
}

impl Theme {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_bar_style(&self) -> Style {
        Style::default()
            .fg(self.status_bar_fg)
            .bg(self.status_bar_bg)
    }

    pub fn filename_style(&self) -> Style {
        Style::default().fg(self.filename_color)
    }

    pub fn text_style(&self) -> Style {
        Style::default().fg(self.text_color).bg(self.background)
    }

    /// Hashtags and urls
    pub fn link_style(&self) -> Style {
        Style::default()
            .fg(self.link_color)
            .add_modifier(Modifier::UNDERLINED)
    }

    pub fn quote_style(&self) -> Style {
        Style::default().fg(self.quote_color)
    }

    pub fn marker_style(&self) -> Style {
        Style::default().fg(self.marker_color)
    }

    pub fn placeholder_style(&self) -> Style {
        Style::default()
            .fg(self.placeholder_fg)
            .add_modifier(Modifier::DIM)
    }
}
