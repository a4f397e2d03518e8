//! Parser for the compact command grammar
//!
//! Commands are a verb followed by whitespace-separated arguments, e.g.
//! `L 2`, `ON 5`, `SET 3 128`. Verbs are case-insensitive and have short
//! aliases so operators send as few characters as possible over the air.
//! Parsing never panics: any input yields either a [`Command`] or a
//! [`ParseError`] suitable for sending back to the operator.

use crate::command::{Command, CommandValue, ParseError};

/// Longest piece of operator input echoed back in an error
const MAX_ECHO_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    List,
    Show,
    On,
    Off,
    Set,
    Automations,
    Trigger,
    Help,
    Quit,
    Refresh,
}

fn lookup_verb(token: &str) -> Option<Verb> {
    let verb = match token {
        "L" | "LIST" => Verb::List,
        "S" | "SHOW" => Verb::Show,
        "ON" => Verb::On,
        "OFF" => Verb::Off,
        "SET" => Verb::Set,
        "A" | "AUTO" | "AUTOMATIONS" => Verb::Automations,
        "T" | "TRIGGER" => Verb::Trigger,
        "H" | "HELP" | "?" => Verb::Help,
        "Q" | "QUIT" | "EXIT" | "BYE" => Verb::Quit,
        "R" | "REFRESH" => Verb::Refresh,
        _ => return None,
    };
    Some(verb)
}

/// Parse one line of operator input
pub fn parse(input: &str) -> Result<Command, ParseError> {
    let normalized = input.trim().to_uppercase();
    let tokens: Vec<&str> = normalized.split_whitespace().collect();

    let Some(first) = tokens.first() else {
        return Err(ParseError::new("Empty command"));
    };

    let verb = lookup_verb(first).ok_or_else(|| {
        ParseError::new(format!("Unknown command: {}", echo(first)))
            .with_suggestion("Type H for help")
    })?;

    let args = &tokens[1..];
    match verb {
        Verb::List => Ok(Command::List {
            page: parse_page(args)?,
        }),
        Verb::Automations => Ok(Command::Automations {
            page: parse_page(args)?,
        }),
        Verb::Show => Ok(Command::Show {
            id: parse_device_id(args, "SHOW", "S")?,
        }),
        Verb::On => Ok(Command::On {
            id: parse_device_id(args, "ON", "ON")?,
        }),
        Verb::Off => Ok(Command::Off {
            id: parse_device_id(args, "OFF", "OFF")?,
        }),
        Verb::Set => {
            if args.len() < 2 {
                return Err(ParseError::new("SET requires device ID and value")
                    .with_suggestion("Usage: SET <id> <value>"));
            }
            let id = parse_positive(args[0], "device ID", "Device ID")?;
            Ok(Command::Set {
                id,
                value: CommandValue::from_token(args[1]),
            })
        }
        Verb::Trigger => {
            let token = args.first().ok_or_else(|| {
                ParseError::new("TRIGGER requires automation ID").with_suggestion("Usage: T <id>")
            })?;
            Ok(Command::Trigger {
                id: parse_positive(token, "automation ID", "Automation ID")?,
            })
        }
        Verb::Help => Ok(Command::Help),
        Verb::Quit => Ok(Command::Quit),
        Verb::Refresh => Ok(Command::Refresh),
    }
}

fn parse_page(args: &[&str]) -> Result<Option<u32>, ParseError> {
    match args.first() {
        None => Ok(None),
        Some(token) => {
            parse_positive(token, "page number", "Page number").map(Some)
        }
    }
}

fn parse_device_id(args: &[&str], verb: &str, alias: &str) -> Result<u32, ParseError> {
    let token = args.first().ok_or_else(|| {
        ParseError::new(format!("{} requires device ID", verb))
            .with_suggestion(format!("Usage: {} <id>", alias))
    })?;
    parse_positive(token, "device ID", "Device ID")
}

fn parse_positive(token: &str, field: &str, label: &str) -> Result<u32, ParseError> {
    let value: i64 = token
        .parse()
        .map_err(|_| ParseError::new(format!("Invalid {}: {}", field, echo(token))))?;

    if value < 1 {
        return Err(ParseError::new(format!("{} must be >= 1", label)));
    }

    u32::try_from(value).map_err(|_| ParseError::new(format!("Invalid {}: {}", field, echo(token))))
}

fn echo(token: &str) -> String {
    if token.chars().count() <= MAX_ECHO_LEN {
        token.to_string()
    } else {
        let head: String = token.chars().take(MAX_ECHO_LEN - 1).collect();
        format!("{}…", head)
    }
}
