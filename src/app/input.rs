use crate::domain::Event;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlCommand {
    Background,
    Foreground,
    Flush,
    /// Host is going away; later sends prefer the beacon.
    Unload,
}

/// One line of NDJSON input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputLine {
    Control(ControlCommand),
    Event(Box<Event>),
}

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Malformed input line: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct ControlLine {
    control: ControlCommand,
}

/// Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<InputLine>, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: serde_json::Value = serde_json::from_str(line)?;
    if value.get("control").is_some() {
        let control: ControlLine = serde_json::from_value(value)?;
        return Ok(Some(InputLine::Control(control.control)));
    }

    let event: Event = serde_json::from_value(value)?;
    Ok(Some(InputLine::Event(Box::new(event))))
}
