use iced::widget::button::{Appearance as ButtonAppearance, StyleSheet as ButtonStyleSheet};
use iced::widget::container::{Appearance as ContainerAppearance, StyleSheet as ContainerStyleSheet};
use iced::widget::scrollable::{Appearance as ScrollableAppearance, StyleSheet as ScrollableStyleSheet};
use iced::widget::text_input::{Appearance as TextInputAppearance, StyleSheet as TextInputStyleSheet};
use iced::{Background, Border, Color, Shadow, Vector};

fn scale(color: Color, factor: f32) -> Color {
    Color {
        r: (color.r * factor).clamp(0.0, 1.0),
        g: (color.g * factor).clamp(0.0, 1.0),
        b: (color.b * factor).clamp(0.0, 1.0),
        a: color.a,
    }
}

fn with_alpha(color: Color, a: f32) -> Color {
    Color { a, ..color }
}

pub struct RoundedButtonStyle {
    pub is_primary: bool,
    pub radius: f32,
    pub primary_color: Color,
    pub text_color: Color,
    /// Fill of secondary buttons.
    pub background_color: Color,
}

impl ButtonStyleSheet for RoundedButtonStyle {
    type Style = iced::Theme;

    fn active(&self, _style: &Self::Style) -> ButtonAppearance {
        let background = if self.is_primary {
            self.primary_color
        } else {
            self.background_color
        };

        ButtonAppearance {
            background: Some(Background::Color(background)),
            border: Border {
                radius: self.radius.into(),
                width: if self.is_primary { 0.0 } else { 1.0 },
                color: with_alpha(self.primary_color, 0.45),
            },
            text_color: self.text_color,
            shadow: Shadow {
                color: Color::from_rgba(0.0, 0.0, 0.0, 0.25),
                offset: Vector::new(0.0, if self.is_primary { 3.0 } else { 1.0 }),
                blur_radius: if self.is_primary { 8.0 } else { 4.0 },
            },
            shadow_offset: Vector::default(),
        }
    }

    fn hovered(&self, style: &Self::Style) -> ButtonAppearance {
        let mut appearance = self.active(style);
        if self.is_primary {
            appearance.background = Some(Background::Color(scale(self.primary_color, 1.12)));
        } else {
            appearance.border.color = self.primary_color;
        }
        appearance.shadow.blur_radius += 4.0;
        appearance
    }

    fn pressed(&self, style: &Self::Style) -> ButtonAppearance {
        let mut appearance = self.active(style);
        if self.is_primary {
            appearance.background = Some(Background::Color(scale(self.primary_color, 0.85)));
        }
        appearance.shadow = Shadow {
            color: Color::from_rgba(0.0, 0.0, 0.0, 0.2),
            offset: Vector::new(0.0, 1.0),
            blur_radius: 2.0,
        };
        appearance
    }

    fn disabled(&self, style: &Self::Style) -> ButtonAppearance {
        let mut appearance = self.active(style);
        appearance.background = Some(Background::Color(Color::from_rgba(0.5, 0.5, 0.5, 0.12)));
        appearance.text_color = with_alpha(self.text_color, 0.4);
        appearance.border.color = Color::TRANSPARENT;
        appearance.shadow = Shadow::default();
        appearance
    }
}

pub struct RoundedContainerStyle {
    pub radius: f32,
    pub background: Option<Color>,
    /// 0.0 is flat; cards sit around 1.0.
    pub elevation: f32,
    pub border_color: Option<Color>,
}

impl Default for RoundedContainerStyle {
    fn default() -> Self {
        Self {
            radius: 12.0,
            background: None,
            elevation: 0.0,
            border_color: None,
        }
    }
}

impl ContainerStyleSheet for RoundedContainerStyle {
    type Style = iced::Theme;

    fn appearance(&self, style: &Self::Style) -> ContainerAppearance {
        let background = self.background.unwrap_or(style.palette().background);
        let flat = self.elevation == 0.0;

        ContainerAppearance {
            background: Some(Background::Color(background)),
            border: Border {
                radius: self.radius.into(),
                width: if flat && self.border_color.is_none() { 0.0 } else { 1.0 },
                color: self
                    .border_color
                    .unwrap_or_else(|| Color::from_rgba(0.5, 0.5, 0.55, 0.25)),
            },
            shadow: Shadow {
                color: Color::from_rgba(0.0, 0.0, 0.0, if flat { 0.0 } else { (0.15 * self.elevation).min(0.45) }),
                offset: Vector::new(0.0, self.elevation * 2.0),
                blur_radius: if flat { 0.0 } else { 6.0 + self.elevation * 4.0 },
            },
            text_color: None,
        }
    }
}

pub struct CustomScrollableStyle {
    pub scroller_color: Color,
    pub border_radius: f32,
}

impl CustomScrollableStyle {
    fn with_scroller_alpha(&self, style: &iced::Theme, alpha: f32) -> ScrollableAppearance {
        let mut appearance = self.active(style);
        appearance.scrollbar.scroller.color = with_alpha(self.scroller_color, alpha);
        appearance
    }
}

impl ScrollableStyleSheet for CustomScrollableStyle {
    type Style = iced::Theme;

    fn active(&self, _style: &Self::Style) -> ScrollableAppearance {
        ScrollableAppearance {
            container: ContainerAppearance::default(),
            scrollbar: iced::widget::scrollable::Scrollbar {
                background: Some(Background::Color(Color::TRANSPARENT)),
                border: Border::default(),
                scroller: iced::widget::scrollable::Scroller {
                    color: with_alpha(self.scroller_color, 0.45),
                    border: Border {
                        radius: (self.border_radius * 0.5).into(),
                        width: 0.0,
                        color: Color::TRANSPARENT,
                    },
                },
            },
            gap: None,
        }
    }

    fn hovered(&self, style: &Self::Style, is_mouse_over_scrollbar: bool) -> ScrollableAppearance {
        self.with_scroller_alpha(style, if is_mouse_over_scrollbar { 0.8 } else { 0.6 })
    }

    fn dragging(&self, style: &Self::Style) -> ScrollableAppearance {
        self.with_scroller_alpha(style, 0.9)
    }
}

pub struct AccentTextInputStyle {
    pub radius: f32,
    pub accent: Color,
    pub background_color: Color,
    pub text_color: Color,
}

impl TextInputStyleSheet for AccentTextInputStyle {
    type Style = iced::Theme;

    fn active(&self, _style: &Self::Style) -> TextInputAppearance {
        TextInputAppearance {
            background: Background::Color(self.background_color),
            border: Border {
                radius: self.radius.into(),
                width: 1.0,
                color: with_alpha(self.accent, 0.6),
            },
            icon_color: self.text_color,
        }
    }

    fn focused(&self, style: &Self::Style) -> TextInputAppearance {
        let mut appearance = self.active(style);
        appearance.border.width = 2.0;
        appearance.border.color = self.accent;
        appearance
    }

    fn placeholder_color(&self, _style: &Self::Style) -> Color {
        with_alpha(self.text_color, 0.5)
    }

    fn value_color(&self, _style: &Self::Style) -> Color {
        self.text_color
    }

    fn disabled_color(&self, _style: &Self::Style) -> Color {
        with_alpha(self.text_color, 0.4)
    }

    fn selection_color(&self, _style: &Self::Style) -> Color {
        with_alpha(self.accent, 0.35)
    }

    fn disabled(&self, style: &Self::Style) -> TextInputAppearance {
        let mut appearance = self.active(style);
        appearance.background = Background::Color(with_alpha(self.background_color, 0.5));
        appearance
    }
}
