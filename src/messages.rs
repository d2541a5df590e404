use std::fmt;

use serde::Serialize;

use crate::token::Region;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Error => "error",
            Level::Warn => "warning",
            Level::Info => "info",
            Level::Debug => "debug",
        })
    }
}

/// One diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub text: String,
    pub level: Level,
    pub region: Option<Region>,
}

impl Message {
    /// `file:line:col: level: text` when a region is known.
    pub fn render(&self, file: &str, source: &str) -> String {
        match self.region {
            Some(region) => {
                let (line, col) = region.line_col(source);
                format!("{file}:{line}:{col}: {}: {}", self.level, self.text)
            }
            None => format!("{file}: {}: {}", self.level, self.text),
        }
    }
}

/// Diagnostics of one compilation, in the order they were raised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompilationMessages {
    messages: Vec<Message>,
}

impl CompilationMessages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, level: Level, text: impl Into<String>, region: Option<Region>) {
        self.messages.push(Message {
            text: text.into(),
            level,
            region,
        });
    }

    pub fn error(&mut self, text: impl Into<String>, region: Region) {
        self.push(Level::Error, text, Some(region));
    }

    pub fn warn(&mut self, text: impl Into<String>, region: Region) {
        self.push(Level::Warn, text, Some(region));
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|m| m.level == Level::Error)
    }

    pub fn error_count(&self) -> usize {
        self.messages.iter().filter(|m| m.level == Level::Error).count()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages at `level` or more severe.
    pub fn at_least(&self, level: Level) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(move |m| m.level <= level)
    }
}

impl<'a> IntoIterator for &'a CompilationMessages {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_are_not_errors() {
        let mut messages = CompilationMessages::new();
        messages.warn("no effect", Region::new(0, 2));
        assert!(!messages.has_errors());
        messages.error("undefined symbol `x`", Region::new(3, 1));
        assert!(messages.has_errors());
        assert_eq!(messages.error_count(), 1);
        assert_eq!(messages.at_least(Level::Warn).count(), 2);
    }

    #[test]
    fn render_uses_line_and_column() {
        let msg = Message {
            text: "bad".into(),
            level: Level::Error,
            region: Some(Region::new(4, 3)),
        };
        assert_eq!(msg.render("a.s", "nop\nfoo\n"), "a.s:2:1: error: bad");
    }
}
