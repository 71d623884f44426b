//! Operator light commands.
//!
//! A command is the raw text `<color> <brightness>` that the hub forwards
//! verbatim to the device. The hub also parses it to update its own view of
//! the device before the device confirms.

use lamphub_core::OFF_COLOR;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Brightness and color implied by an operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightCommand {
    pub color: String,
    pub brightness: i64,
}

impl LightCommand {
    /// Values assumed when a command cannot be parsed: dark and "off".
    pub fn fallback() -> Self {
        Self {
            color: OFF_COLOR.to_string(),
            brightness: 0,
        }
    }
}

/// What to do with a command string that does not parse.
///
/// `UseDefault` keeps the long-standing behaviour of forwarding the raw
/// text anyway and recording the device as dark/"off". `Reject` refuses the
/// command before anything is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailurePolicy {
    #[default]
    UseDefault,
    Reject,
}

impl std::str::FromStr for ParseFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "use_default" | "use-default" => Ok(Self::UseDefault),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "unknown parse failure policy {other:?} (expected \"use_default\" or \"reject\")"
            )),
        }
    }
}

/// Errors produced while parsing a command string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("command {command:?} must be exactly \"<color> <brightness>\"")]
    WrongArity { command: String },

    #[error("command brightness {value:?} is not an integer")]
    InvalidBrightness { value: String },
}

/// Parses `<color> <brightness>` separated by any whitespace.
pub fn parse_command(raw: &str) -> Result<LightCommand, CommandError> {
    let mut tokens = raw.split_whitespace();
    let (color, brightness) = match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(color), Some(brightness), None) => (color, brightness),
        _ => {
            return Err(CommandError::WrongArity {
                command: raw.to_string(),
            })
        }
    };

    let brightness = brightness
        .parse::<i64>()
        .map_err(|_| CommandError::InvalidBrightness {
            value: brightness.to_string(),
        })?;

    Ok(LightCommand {
        color: color.to_string(),
        brightness,
    })
}

/// Parses a command and applies the configured failure policy.
pub fn resolve_command(
    raw: &str,
    policy: ParseFailurePolicy,
) -> Result<LightCommand, CommandError> {
    match (parse_command(raw), policy) {
        (Ok(command), _) => Ok(command),
        (Err(_), ParseFailurePolicy::UseDefault) => Ok(LightCommand::fallback()),
        (Err(e), ParseFailurePolicy::Reject) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color_then_brightness() {
        assert_eq!(
            parse_command("Blue 80"),
            Ok(LightCommand {
                color: "Blue".to_string(),
                brightness: 80
            })
        );
        assert_eq!(parse_command("  B1\t300 ").unwrap().brightness, 300);
    }

    #[test]
    fn test_parse_rejects_wrong_arity() {
        assert!(matches!(
            parse_command("justonetoken"),
            Err(CommandError::WrongArity { .. })
        ));
        assert!(matches!(
            parse_command("Blue 80 extra"),
            Err(CommandError::WrongArity { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_non_integer_brightness() {
        assert!(matches!(
            parse_command("Blue bright"),
            Err(CommandError::InvalidBrightness { .. })
        ));
    }

    #[test]
    fn test_resolve_uses_fallback() {
        let command = resolve_command("justonetoken", ParseFailurePolicy::UseDefault).unwrap();
        assert_eq!(command, LightCommand::fallback());
        assert_eq!(command.color, "off");
        assert_eq!(command.brightness, 0);
    }

    #[test]
    fn test_resolve_rejects_when_configured() {
        assert!(resolve_command("justonetoken", ParseFailurePolicy::Reject).is_err());
        assert!(resolve_command("Red 10", ParseFailurePolicy::Reject).is_ok());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("reject".parse::<ParseFailurePolicy>(), Ok(ParseFailurePolicy::Reject));
        assert_eq!(
            "use-default".parse::<ParseFailurePolicy>(),
            Ok(ParseFailurePolicy::UseDefault)
        );
        assert!("lenient".parse::<ParseFailurePolicy>().is_err());
    }
}
