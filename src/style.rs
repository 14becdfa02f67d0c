// Style functions available to templates.
//
// Each color/weight token wraps its argument in a fixed SGR pair built from
// crossterm commands. `spin` ignores its arguments and returns the next glyph
// of the braille animation, advancing a cursor owned by [`Styles`].

use crossterm::style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::Command;

/// Braille dot animation, one step per `spin` call.
pub const SPIN_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Name of the animation function.
pub const SPIN: &str = "spin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Bold,
    Green,
    Cyan,
    Blue,
    Yellow,
}

impl Style {
    pub const ALL: [Style; 5] = [Style::Bold, Style::Green, Style::Cyan, Style::Blue, Style::Yellow];

    pub fn from_name(name: &str) -> Option<Style> {
        Style::ALL.into_iter().find(|style| style.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Style::Bold => "bold",
            Style::Green => "green",
            Style::Cyan => "cyan",
            Style::Blue => "blue",
            Style::Yellow => "yellow",
        }
    }

    /// The (set, reset) escape pair for this token.
    pub fn pair(self) -> (String, String) {
        match self {
            Style::Bold => (
                ansi(SetAttribute(Attribute::Bold)),
                ansi(SetAttribute(Attribute::NormalIntensity)),
            ),
            Style::Green => (ansi(SetForegroundColor(Color::Green)), ansi(ResetColor)),
            Style::Cyan => (ansi(SetForegroundColor(Color::Cyan)), ansi(ResetColor)),
            Style::Blue => (ansi(SetForegroundColor(Color::Blue)), ansi(ResetColor)),
            Style::Yellow => (ansi(SetForegroundColor(Color::Yellow)), ansi(ResetColor)),
        }
    }

    pub fn apply(self, text: &str) -> String {
        let (set, reset) = self.pair();
        format!("{set}{text}{reset}")
    }
}

/// Render a crossterm command to its escape sequence.
pub(crate) fn ansi(command: impl Command) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = command.write_ansi(&mut out);
    out
}

/// The function set handed to the template evaluator.
///
/// The spin cursor is plain state: the screen buffer only evaluates templates
/// while holding its own lock, so no extra synchronization lives here.
#[derive(Debug, Default)]
pub struct Styles {
    frame: usize,
}

impl Styles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` is a function this set can call.
    pub fn is_defined(name: &str) -> bool {
        name == SPIN || Style::from_name(name).is_some()
    }

    /// Invoke a style function. Style tokens use the last argument as their
    /// text; `spin` ignores arguments. Returns `None` for unknown names.
    pub fn call(&mut self, name: &str, text: Option<&str>) -> Option<String> {
        if name == SPIN {
            return Some(self.spin().to_string());
        }
        Style::from_name(name).map(|style| style.apply(text.unwrap_or_default()))
    }

    /// Return the current glyph and advance the cursor.
    pub fn spin(&mut self) -> &'static str {
        let glyph = SPIN_FRAMES[self.frame];
        self.frame = (self.frame + 1) % SPIN_FRAMES.len();
        glyph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_uses_sgr_intensity_pair() {
        assert_eq!(Style::Bold.apply("x"), "\x1b[1mx\x1b[22m");
    }

    #[test]
    fn every_token_resolves_by_name() {
        for name in ["bold", "green", "cyan", "blue", "yellow", "spin"] {
            assert!(Styles::is_defined(name), "{name} should be defined");
        }
        assert!(!Styles::is_defined("red"));
    }

    #[test]
    fn color_wraps_text_in_its_pair() {
        let (set, reset) = Style::Green.pair();
        let out = Styles::new().call("green", Some("ok")).unwrap();
        assert_eq!(out, format!("{set}ok{reset}"));
        assert!(set.starts_with('\x1b'));
        assert_ne!(set, reset);
    }

    #[test]
    fn spin_cycles_back_to_first_glyph() {
        let mut styles = Styles::new();
        let first = styles.spin();
        for _ in 1..SPIN_FRAMES.len() {
            assert_ne!(styles.spin(), first);
        }
        assert_eq!(styles.spin(), first);
    }

    #[test]
    fn spin_ignores_arguments() {
        let mut styles = Styles::new();
        assert_eq!(styles.call("spin", Some("ignored")).unwrap(), SPIN_FRAMES[0]);
        assert_eq!(styles.call("spin", None).unwrap(), SPIN_FRAMES[1]);
    }
}
