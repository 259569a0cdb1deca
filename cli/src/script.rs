//! Text commands for driving a looper without a host: one per line in batch
//! scripts, or typed at the terminal in live mode.

use std::str::FromStr;

use looper::{LooperError, LooperProcessor, ParamDispatch, ParamId, ParseError, TransportClock};

#[derive(Clone)]
#[derive(Copy)]
#[derive(Debug)]
#[derive(PartialEq)]
pub enum Command {
    Param(ParamId, f32),
    Play,
    Stop,
    Tempo(f64),
}

/// A command scheduled at a beat, counted from the start of the render.
#[derive(Debug)]
#[derive(PartialEq)]
pub struct Event {
    pub beat: f64,
    pub command: Command,
}

fn parse_value<T: FromStr>(parts: &[&str], index: usize, what: &str) -> Result<T, ParseError>
    where ParseError: From<T::Err> {
    match parts.get(index) {
        Some(text) => Ok(text.parse::<T>()?),
        None => Err(ParseError::new(format!("'{}' needs a {}", parts.join(" "), what))),
    }
}

impl Command {
    fn from_parts(parts: &[&str]) -> Result<Command, ParseError> {
        match parts[0].to_ascii_lowercase().as_str() {
            "play" => Ok(Command::Play),
            "stop" => Ok(Command::Stop),
            "tempo" => {
                let bpm: f64 = parse_value(parts, 1, "tempo in BPM")?;
                if !(bpm > 0.0) {
                    return Err(ParseError::new(format!("invalid tempo {}", bpm)));
                }
                Ok(Command::Tempo(bpm))
            },
            _ => {
                let id = parts[0].parse::<ParamId>()?;
                let value: f32 = parse_value(parts, 1, "value")?;
                Ok(Command::Param(id, value))
            }
        }
    }

    /// Parse a command typed without a beat, e.g. `VOLUME2 0.5`. Blank lines
    /// give `None`.
    pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
        let parts: Vec<&str> = line.split_ascii_whitespace().collect();
        if parts.is_empty() {
            return Ok(None);
        }
        Command::from_parts(&parts).map(Some)
    }

    pub fn apply(self: &Self,
                 processor: &mut LooperProcessor,
                 params: &mut ParamDispatch,
                 clock: &mut TransportClock) -> Result<(), LooperError> {
        match *self {
            Command::Param(id, value) => params.dispatch(processor, id, value)?,
            Command::Play => clock.play(),
            Command::Stop => clock.stop(),
            Command::Tempo(bpm) => clock.set_bpm(bpm),
        }
        Ok(())
    }
}

fn parse_event(line: &str) -> Result<Option<Event>, ParseError> {
    let line = match line.find('#') {
        Some(start) => &line[..start],
        None => line,
    };
    let parts: Vec<&str> = line.split_ascii_whitespace().collect();
    if parts.is_empty() {
        return Ok(None);
    }
    if parts.len() < 2 {
        return Err(ParseError::new(format!("'{}' has no command", line.trim())));
    }

    let beat = parts[0].parse::<f64>()?;
    if !(beat >= 0.0) {
        return Err(ParseError::new(format!("invalid beat {}", beat)));
    }
    let command = Command::from_parts(&parts[1..])?;
    Ok(Some(Event { beat, command }))
}

/// Parse a whole script. Events are returned in beat order; events on the
/// same beat keep the order they were written in.
pub fn parse_script(text: &str) -> Result<Vec<Event>, ParseError> {
    let mut events = Vec::new();
    for (number, line) in text.lines().enumerate() {
        match parse_event(line) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => (),
            Err(error) => {
                return Err(ParseError::new(format!("line {}: {}", number + 1, error.message)));
            }
        }
    }
    events.sort_by(|a, b| a.beat.partial_cmp(&b.beat).unwrap_or(std::cmp::Ordering::Equal));
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_script_lines() {
        let script = "
            # Record the first loop, then bring it down.
            0 LOOP1 1
            8 LOOP1 0   # stop
            16 volume1 0.5
            12 tempo 90
            12 stop
            14 play
        ";
        let events = parse_script(script).unwrap();
        assert_eq!(events, vec![
            Event { beat: 0.0, command: Command::Param(ParamId::Loop(0), 1.0) },
            Event { beat: 8.0, command: Command::Param(ParamId::Loop(0), 0.0) },
            Event { beat: 12.0, command: Command::Tempo(90.0) },
            Event { beat: 12.0, command: Command::Stop },
            Event { beat: 14.0, command: Command::Play },
            Event { beat: 16.0, command: Command::Param(ParamId::Volume(0), 0.5) },
        ]);
    }

    #[test]
    fn parse_errors_name_the_line() {
        let error = parse_script("0 LOOP1 1\n4 LOOP9 1\n").unwrap_err();
        assert!(error.message.starts_with("line 2:"), "{}", error.message);

        assert!(parse_script("x LOOP1 1").is_err());
        assert!(parse_script("4").is_err());
        assert!(parse_script("4 VOLUME1").is_err());
        assert!(parse_script("4 tempo -3").is_err());
        assert!(parse_script("-1 play").is_err());
    }

    #[test]
    fn parse_typed_commands() {
        assert_eq!(Command::parse("  ").unwrap(), None);
        assert_eq!(Command::parse("MONITOR2 1").unwrap(), Some(Command::Param(ParamId::Monitor(1), 1.0)));
        assert_eq!(Command::parse("MUTEINPUT 0").unwrap(), Some(Command::Param(ParamId::MuteInput, 0.0)));
        assert_eq!(Command::parse("Stop").unwrap(), Some(Command::Stop));
        assert!(Command::parse("LOOP1").is_err());
    }
}
