//! UI colours, with optional overrides from the `[theme]` config table

use ratatui::style::Color;

use crate::config::ThemeConfig;

/// Theme colors for the UI
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub accent: Color,       // Active borders, focused rows, key hints
    pub success: Color,      // Checked selections, done status
    pub warning: Color,      // Status line, pending states
    pub danger: Color,       // Errors, unmapped status, headers
    pub text: Color,         // Primary text
    pub text_dim: Color,     // Secondary text, unchecked selections
    pub bg_selected: Color,  // Selection background
    pub inactive: Color,     // Inactive borders
}

impl Default for Theme {
    fn default() -> Self {
        // Catppuccin-inspired
        Self {
            accent: Color::Rgb(250, 179, 135),
            success: Color::Rgb(166, 218, 149),
            warning: Color::Rgb(249, 226, 175),
            danger: Color::Rgb(243, 139, 168),
            text: Color::Rgb(205, 214, 244),
            text_dim: Color::Rgb(147, 153, 178),
            bg_selected: Color::Rgb(69, 71, 90),
            inactive: Color::Rgb(88, 91, 112),
        }
    }
}

impl Theme {
    /// Defaults with any valid config overrides applied
    pub fn from_config(config: &ThemeConfig) -> Self {
        let mut theme = Self::default();

        let overrides = [
            (&config.accent, &mut theme.accent, "accent"),
            (&config.success, &mut theme.success, "success"),
            (&config.warning, &mut theme.warning, "warning"),
            (&config.danger, &mut theme.danger, "danger"),
            (&config.text, &mut theme.text, "text"),
            (&config.text_dim, &mut theme.text_dim, "text_dim"),
            (&config.bg_selected, &mut theme.bg_selected, "bg_selected"),
        ];

        for (value, slot, key) in overrides {
            if let Some(value) = value {
                match Self::parse_hex_color(value) {
                    Some(color) => *slot = color,
                    None => tracing::warn!("Ignoring invalid theme color {} = {:?}", key, value),
                }
            }
        }

        theme
    }

    /// Parse a hex color string (#RRGGBB or #RGB)
    pub fn parse_hex_color(s: &str) -> Option<Color> {
        let s = s.trim().trim_start_matches('#');

        if !s.is_ascii() {
            return None;
        }

        if s.len() == 6 {
            let r = u8::from_str_radix(&s[0..2], 16).ok()?;
            let g = u8::from_str_radix(&s[2..4], 16).ok()?;
            let b = u8::from_str_radix(&s[4..6], 16).ok()?;
            Some(Color::Rgb(r, g, b))
        } else if s.len() == 3 {
            let r = u8::from_str_radix(&s[0..1], 16).ok()? * 17;
            let g = u8::from_str_radix(&s[1..2], 16).ok()? * 17;
            let b = u8::from_str_radix(&s[2..3], 16).ok()? * 17;
            Some(Color::Rgb(r, g, b))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(Theme::parse_hex_color("#FFC107"), Some(Color::Rgb(255, 193, 7)));
        assert_eq!(Theme::parse_hex_color("fff"), Some(Color::Rgb(255, 255, 255)));
        assert_eq!(Theme::parse_hex_color("#12345"), None);
        assert_eq!(Theme::parse_hex_color("#zzzzzz"), None);
    }

    #[test]
    fn test_overrides_skip_invalid_values() {
        let config = ThemeConfig {
            accent: Some("#112233".to_string()),
            danger: Some("red".to_string()),
            ..Default::default()
        };
        let theme = Theme::from_config(&config);
        assert_eq!(theme.accent, Color::Rgb(0x11, 0x22, 0x33));
        assert_eq!(theme.danger, Theme::default().danger);
    }
}
