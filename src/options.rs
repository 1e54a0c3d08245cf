use std::path::Path;
use std::str::FromStr;

use palette::Srgb;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_HIGHLIGHT_COLOR: &str = "#ffeb3b";
pub const DEFAULT_FONT_COLOR: &str = "#000000";

/// Settings for one editor instance, typically loaded from a TOML file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct EditorOptions {
    /// Identifier of the editor root element. Required.
    pub element_id: String,
    pub editable: bool,
    /// Initial markup.
    pub html: String,
    /// Color used by the bare `color` command.
    pub highlight_color: String,
    /// Color text has when no color class applies.
    pub default_color: String,
    /// Keep an empty paragraph at the end of the document.
    pub last_line_blank: bool,
    pub hashtag: bool,
    pub urllink: bool,
    /// Report every reconciled mutation batch through the callback.
    pub log_mutation: bool,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            element_id: String::new(),
            editable: true,
            html: String::new(),
            highlight_color: DEFAULT_HIGHLIGHT_COLOR.to_string(),
            default_color: DEFAULT_FONT_COLOR.to_string(),
            last_line_blank: false,
            hashtag: false,
            urllink: false,
            log_mutation: false,
        }
    }
}

impl EditorOptions {
    pub fn new(element_id: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            ..Self::default()
        }
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = html.into();
        self
    }

    pub fn with_hashtags(mut self, enabled: bool) -> Self {
        self.hashtag = enabled;
        self
    }

    pub fn with_urllinks(mut self, enabled: bool) -> Self {
        self.urllink = enabled;
        self
    }

    pub fn with_last_line_blank(mut self, enabled: bool) -> Self {
        self.last_line_blank = enabled;
        self
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let options: Self = toml::from_str(input)?;
        options.validated()
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_toml_str(&input)
    }

    /// Checks required fields and normalizes colors to `#rrggbb`.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.element_id = self.element_id.trim().to_string();
        if self.element_id.is_empty() || self.element_id.contains(char::is_whitespace) {
            return Err(ConfigError::MissingRootId);
        }
        self.highlight_color = normalize_color(&self.highlight_color)
            .ok_or_else(|| ConfigError::InvalidColor(self.highlight_color.clone()))?;
        self.default_color = normalize_color(&self.default_color)
            .ok_or_else(|| ConfigError::InvalidColor(self.default_color.clone()))?;
        Ok(self)
    }
}

/// Parses a CSS color (hex, `rgb()` or a named color) into lowercase
/// `#rrggbb`.
pub fn normalize_color(value: &str) -> Option<String> {
    let value = value.trim().to_ascii_lowercase();
    if value.is_empty() {
        return None;
    }
    let color: Srgb<u8> = if value.starts_with('#') {
        Srgb::from_str(&value).ok()?
    } else if let Some(arguments) = value
        .strip_prefix("rgb(")
        .or_else(|| value.strip_prefix("rgba("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let mut channels = arguments
            .split(',')
            .map(|channel| channel.trim().parse::<u8>());
        let red = channels.next()?.ok()?;
        let green = channels.next()?.ok()?;
        let blue = channels.next()?.ok()?;
        Srgb::new(red, green, blue)
    } else {
        palette::named::from_str(&value)?
    };
    Some(format!(
        "#{:02x}{:02x}{:02x}",
        color.red, color.green, color.blue
    ))
}
