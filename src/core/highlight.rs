//! Pattern highlighting for device output
//!
//! Rules are written `<regex>=><colour>`, e.g. `ERROR=>red` or
//! `\+C[A-Z]+:=>bright_cyan`. Matches are wrapped in ANSI colour codes.

use regex::Regex;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between pattern and colour in a rule
pub const RULE_SEPARATOR: &str = "=>";

/// Highlight rule errors
#[derive(Error, Debug)]
pub enum HighlightError {
    /// Rule is not `<regex>=><colour>`
    #[error("expected <pattern>=><colour>, got {0:?}")]
    Syntax(String),

    /// Colour name not recognised
    #[error("unknown colour {0:?}")]
    UnknownColour(String),

    /// Pattern is not a valid regex
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// ANSI foreground colours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colour {
    /// `black`
    Black,
    /// `red`
    Red,
    /// `green`
    Green,
    /// `yellow`
    Yellow,
    /// `blue`
    Blue,
    /// `magenta`
    Magenta,
    /// `cyan`
    Cyan,
    /// `white`
    White,
    /// `bright_black`
    BrightBlack,
    /// `bright_red`
    BrightRed,
    /// `bright_green`
    BrightGreen,
    /// `bright_yellow`
    BrightYellow,
    /// `bright_blue`
    BrightBlue,
    /// `bright_magenta`
    BrightMagenta,
    /// `bright_cyan`
    BrightCyan,
    /// `bright_white`
    BrightWhite,
}

impl Colour {
    const ALL: [Colour; 16] = [
        Colour::Black,
        Colour::Red,
        Colour::Green,
        Colour::Yellow,
        Colour::Blue,
        Colour::Magenta,
        Colour::Cyan,
        Colour::White,
        Colour::BrightBlack,
        Colour::BrightRed,
        Colour::BrightGreen,
        Colour::BrightYellow,
        Colour::BrightBlue,
        Colour::BrightMagenta,
        Colour::BrightCyan,
        Colour::BrightWhite,
    ];

    /// Name accepted in rules
    pub fn name(&self) -> &'static str {
        match self {
            Self::Black => "black",
            Self::Red => "red",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Blue => "blue",
            Self::Magenta => "magenta",
            Self::Cyan => "cyan",
            Self::White => "white",
            Self::BrightBlack => "bright_black",
            Self::BrightRed => "bright_red",
            Self::BrightGreen => "bright_green",
            Self::BrightYellow => "bright_yellow",
            Self::BrightBlue => "bright_blue",
            Self::BrightMagenta => "bright_magenta",
            Self::BrightCyan => "bright_cyan",
            Self::BrightWhite => "bright_white",
        }
    }

    /// SGR foreground code
    pub fn ansi_code(&self) -> u8 {
        match self {
            Self::Black => 30,
            Self::Red => 31,
            Self::Green => 32,
            Self::Yellow => 33,
            Self::Blue => 34,
            Self::Magenta => 35,
            Self::Cyan => 36,
            Self::White => 37,
            Self::BrightBlack => 90,
            Self::BrightRed => 91,
            Self::BrightGreen => 92,
            Self::BrightYellow => 93,
            Self::BrightBlue => 94,
            Self::BrightMagenta => 95,
            Self::BrightCyan => 96,
            Self::BrightWhite => 97,
        }
    }
}

impl FromStr for Colour {
    type Err = HighlightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| HighlightError::UnknownColour(s.to_string()))
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One pattern and its colour
#[derive(Debug, Clone)]
pub struct HighlightRule {
    regex: Regex,
    colour: Colour,
}

impl HighlightRule {
    /// Compile a rule
    pub fn new(pattern: &str, colour: Colour) -> Result<Self, HighlightError> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            colour,
        })
    }

    /// Source pattern
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Colour applied to matches
    pub fn colour(&self) -> Colour {
        self.colour
    }
}

impl FromStr for HighlightRule {
    type Err = HighlightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (pattern, colour) = s
            .rsplit_once(RULE_SEPARATOR)
            .filter(|(pattern, _)| !pattern.is_empty())
            .ok_or_else(|| HighlightError::Syntax(s.to_string()))?;
        Self::new(pattern, colour.parse()?)
    }
}

impl fmt::Display for HighlightRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.pattern(), RULE_SEPARATOR, self.colour)
    }
}

/// Ordered set of highlight rules, one per pattern
#[derive(Debug, Clone, Default)]
pub struct Highlights {
    rules: Vec<HighlightRule>,
}

impl Highlights {
    /// No rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, replacing any rule with the same pattern
    pub fn insert(&mut self, rule: HighlightRule) {
        match self.rules.iter_mut().find(|r| r.pattern() == rule.pattern()) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    /// Remove the rule for `pattern`
    pub fn remove(&mut self, pattern: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.pattern() != pattern);
        self.rules.len() != before
    }

    /// Current rules
    pub fn rules(&self) -> &[HighlightRule] {
        &self.rules
    }

    /// Whether there are no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Wrap every match in colour codes
    pub fn paint<'a>(&self, line: &'a str) -> Cow<'a, str> {
        let mut painted = Cow::Borrowed(line);
        for rule in &self.rules {
            if !rule.regex.is_match(&painted) {
                continue;
            }
            let replacement = format!("\x1b[{}m$0\x1b[0m", rule.colour.ansi_code());
            painted = Cow::Owned(
                rule.regex
                    .replace_all(&painted, replacement.as_str())
                    .into_owned(),
            );
        }
        painted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rule() {
        let rule: HighlightRule = "ERROR=>red".parse().unwrap();
        assert_eq!(rule.pattern(), "ERROR");
        assert_eq!(rule.colour(), Colour::Red);
        assert_eq!(rule.to_string(), "ERROR=>red");

        let rule: HighlightRule = r"\+C[A-Z]+:=>Bright_Cyan".parse().unwrap();
        assert_eq!(rule.colour(), Colour::BrightCyan);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!("ERROR".parse::<HighlightRule>(), Err(HighlightError::Syntax(_))));
        assert!(matches!("=>red".parse::<HighlightRule>(), Err(HighlightError::Syntax(_))));
        assert!(matches!(
            "ERROR=>mauve".parse::<HighlightRule>(),
            Err(HighlightError::UnknownColour(_))
        ));
        assert!(matches!("(=>red".parse::<HighlightRule>(), Err(HighlightError::Pattern(_))));
    }

    #[test]
    fn test_colour_names() {
        for colour in Colour::ALL {
            assert_eq!(colour.name().parse::<Colour>().unwrap(), colour);
        }
        assert_eq!("bright_white".parse::<Colour>().unwrap().ansi_code(), 97);
        assert_eq!(" Black ".parse::<Colour>().unwrap(), Colour::Black);
    }

    #[test]
    fn test_paint() {
        let mut highlights = Highlights::new();
        assert_eq!(highlights.paint("OK"), "OK");

        highlights.insert("OK=>green".parse().unwrap());
        assert_eq!(highlights.paint("OK"), "\x1b[32mOK\x1b[0m");
        assert_eq!(highlights.paint("ERROR"), "ERROR");
    }

    #[test]
    fn test_insert_replaces_and_remove() {
        let mut highlights = Highlights::new();
        highlights.insert("OK=>green".parse().unwrap());
        highlights.insert("OK=>blue".parse().unwrap());
        assert_eq!(highlights.rules().len(), 1);
        assert_eq!(highlights.rules()[0].colour(), Colour::Blue);

        assert!(highlights.remove("OK"));
        assert!(!highlights.remove("OK"));
        assert!(highlights.is_empty());
    }
}
