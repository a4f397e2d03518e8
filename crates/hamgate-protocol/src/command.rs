//! Command model for the `> ` prompt

use std::fmt;

/// Value argument of a `SET` command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl CommandValue {
    /// Parse a raw token, preferring integer, then float, then text
    pub fn from_token(token: &str) -> Self {
        if let Ok(value) = token.parse::<i64>() {
            Self::Integer(value)
        } else if let Some(value) = token.parse::<f64>().ok().filter(|v| v.is_finite()) {
            Self::Float(value)
        } else {
            Self::Text(token.to_string())
        }
    }

    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for CommandValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{}", value),
            Self::Float(value) => write!(f, "{}", value),
            Self::Text(value) => write!(f, "{}", value),
        }
    }
}

/// A parsed operator command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// List devices, optionally at a page
    List { page: Option<u32> },
    /// Show one device in detail
    Show { id: u32 },
    /// Turn a device on
    On { id: u32 },
    /// Turn a device off
    Off { id: u32 },
    /// Set a device value (brightness, position, temperature...)
    Set { id: u32, value: CommandValue },
    /// List automations, optionally at a page
    Automations { page: Option<u32> },
    /// Trigger an automation
    Trigger { id: u32 },
    /// Show the command menu
    Help,
    /// Disconnect
    Quit,
    /// Re-fetch entities from the backend
    Refresh,
}

impl Command {
    /// Whether this command changes backend state
    ///
    /// Write commands require a fresh one-time code before they run.
    pub fn is_write_operation(&self) -> bool {
        matches!(
            self,
            Self::On { .. } | Self::Off { .. } | Self::Set { .. } | Self::Trigger { .. }
        )
    }

    /// Canonical command name
    pub fn name(&self) -> &'static str {
        match self {
            Self::List { .. } => "LIST",
            Self::Show { .. } => "SHOW",
            Self::On { .. } => "ON",
            Self::Off { .. } => "OFF",
            Self::Set { .. } => "SET",
            Self::Automations { .. } => "AUTOMATIONS",
            Self::Trigger { .. } => "TRIGGER",
            Self::Help => "HELP",
            Self::Quit => "QUIT",
            Self::Refresh => "REFRESH",
        }
    }
}

/// A rejected command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// What was wrong
    pub message: String,
    /// Optional hint shown on a second line
    pub suggestion: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Render as response lines: `ERR: message` plus the hint
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("ERR: {}", self.message)];
        if let Some(suggestion) = &self.suggestion {
            lines.push(suggestion.clone());
        }
        lines
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_operations() {
        assert!(Command::On { id: 1 }.is_write_operation());
        assert!(Command::Off { id: 1 }.is_write_operation());
        assert!(Command::Trigger { id: 3 }.is_write_operation());
        assert!(Command::Set {
            id: 2,
            value: CommandValue::Integer(50)
        }
        .is_write_operation());

        assert!(!Command::List { page: None }.is_write_operation());
        assert!(!Command::Show { id: 1 }.is_write_operation());
        assert!(!Command::Automations { page: Some(2) }.is_write_operation());
        assert!(!Command::Help.is_write_operation());
        assert!(!Command::Quit.is_write_operation());
        assert!(!Command::Refresh.is_write_operation());
    }

    #[test]
    fn test_value_from_token() {
        assert_eq!(CommandValue::from_token("50"), CommandValue::Integer(50));
        assert_eq!(CommandValue::from_token("21.5"), CommandValue::Float(21.5));
        assert_eq!(
            CommandValue::from_token("heat"),
            CommandValue::Text("heat".to_string())
        );
        assert_eq!(
            CommandValue::from_token("NaN"),
            CommandValue::Text("NaN".to_string())
        );
    }

    #[test]
    fn test_parse_error_lines() {
        let err = ParseError::new("SHOW requires device ID").with_suggestion("Usage: S <id>");
        assert_eq!(
            err.to_lines(),
            vec!["ERR: SHOW requires device ID", "Usage: S <id>"]
        );
        assert_eq!(ParseError::new("Empty command").to_lines().len(), 1);
    }
}
