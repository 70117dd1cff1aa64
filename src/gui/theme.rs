use iced::Color;

use crate::theme_detect::ThemeVariant;

/// Widget colours for one theme variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    variant: ThemeVariant,
}

impl From<ThemeVariant> for Palette {
    fn from(variant: ThemeVariant) -> Self {
        Self { variant }
    }
}

impl Palette {
    pub fn variant(&self) -> ThemeVariant {
        self.variant
    }

    pub fn is_dark(&self) -> bool {
        self.variant == ThemeVariant::Dark
    }

    pub fn iced_theme(&self) -> iced::Theme {
        match self.variant {
            ThemeVariant::Light => iced::Theme::Light,
            ThemeVariant::Dark => iced::Theme::Dark,
        }
    }

    pub fn background(&self) -> Color {
        match self.variant {
            ThemeVariant::Light => Color::from_rgb(0.94, 0.95, 0.97),
            ThemeVariant::Dark => Color::from_rgb(0.09, 0.10, 0.12),
        }
    }

    pub fn surface(&self) -> Color {
        match self.variant {
            ThemeVariant::Light => Color::from_rgb(0.97, 0.97, 0.98),
            ThemeVariant::Dark => Color::from_rgb(0.15, 0.16, 0.18),
        }
    }

    pub fn card_background(&self) -> Color {
        match self.variant {
            ThemeVariant::Light => Color::WHITE,
            ThemeVariant::Dark => Color::from_rgb(0.20, 0.21, 0.24),
        }
    }

    pub fn text(&self) -> Color {
        match self.variant {
            ThemeVariant::Light => Color::from_rgb(0.06, 0.06, 0.08),
            ThemeVariant::Dark => Color::from_rgb(0.95, 0.95, 0.96),
        }
    }

    pub fn secondary_text(&self) -> Color {
        match self.variant {
            ThemeVariant::Light => Color::from_rgb(0.35, 0.36, 0.42),
            ThemeVariant::Dark => Color::from_rgb(0.72, 0.73, 0.78),
        }
    }

    /// Text drawn on top of [`Palette::primary`].
    pub fn on_primary(&self) -> Color {
        match self.variant {
            ThemeVariant::Light => Color::WHITE,
            ThemeVariant::Dark => Color::from_rgb(0.05, 0.07, 0.12),
        }
    }

    pub fn primary(&self) -> Color {
        match self.variant {
            ThemeVariant::Light => Color::from_rgb(0.16, 0.42, 0.78),
            ThemeVariant::Dark => Color::from_rgb(0.45, 0.68, 0.98),
        }
    }

    pub fn success(&self) -> Color {
        match self.variant {
            ThemeVariant::Light => Color::from_rgb(0.13, 0.55, 0.25),
            ThemeVariant::Dark => Color::from_rgb(0.45, 0.85, 0.55),
        }
    }

    pub fn warning(&self) -> Color {
        match self.variant {
            ThemeVariant::Light => Color::from_rgb(0.85, 0.47, 0.05),
            ThemeVariant::Dark => Color::from_rgb(1.0, 0.68, 0.3),
        }
    }

    pub fn danger(&self) -> Color {
        match self.variant {
            ThemeVariant::Light => Color::from_rgb(0.85, 0.2, 0.2),
            ThemeVariant::Dark => Color::from_rgb(1.0, 0.42, 0.42),
        }
    }
}
