//! Host-facing parameters and the table that routes their changes to the
//! looper's state transitions.

use std::fmt;
use std::str::FromStr;

use log::*;

use crate::error::{LooperError, ParseError};
use crate::processor::LooperProcessor;
use crate::units::Volume;
use crate::{TrackIndex, NUM_TRACKS};

pub const NUM_PARAMS: usize = 3 * NUM_TRACKS + 1;

#[derive(Clone)]
#[derive(Copy)]
#[derive(Debug)]
#[derive(PartialEq)]
#[derive(Eq)]
#[derive(Hash)]
pub enum ParamId {
    /// Record button. Every change of value is one press.
    Loop(TrackIndex),
    Volume(TrackIndex),
    Monitor(TrackIndex),
    MuteInput,
}

impl ParamId {
    pub fn all() -> impl Iterator<Item = ParamId> {
        (0..NUM_PARAMS).filter_map(ParamId::from_index)
    }

    /// Position in the flat parameter list exposed to hosts.
    pub fn index(self: &Self) -> usize {
        match *self {
            ParamId::Loop(track) => track,
            ParamId::Volume(track) => NUM_TRACKS + track,
            ParamId::Monitor(track) => 2 * NUM_TRACKS + track,
            ParamId::MuteInput => 3 * NUM_TRACKS,
        }
    }

    pub fn from_index(index: usize) -> Option<ParamId> {
        match index / NUM_TRACKS {
            0 => Some(ParamId::Loop(index)),
            1 => Some(ParamId::Volume(index - NUM_TRACKS)),
            2 => Some(ParamId::Monitor(index - 2 * NUM_TRACKS)),
            _ if index == 3 * NUM_TRACKS => Some(ParamId::MuteInput),
            _ => None,
        }
    }

    pub fn track(self: &Self) -> Option<TrackIndex> {
        match *self {
            ParamId::Loop(track) | ParamId::Volume(track) | ParamId::Monitor(track) => Some(track),
            ParamId::MuteInput => None,
        }
    }

    pub fn default_value(self: &Self) -> f32 {
        match self {
            ParamId::Volume(_) => 1.0,
            _ => 0.0,
        }
    }

    /// Human readable name, for host parameter lists.
    pub fn label(self: &Self) -> String {
        match self {
            ParamId::Loop(track) => format!("Loop {}", track + 1),
            ParamId::Volume(track) => format!("Volume {}", track + 1),
            ParamId::Monitor(track) => format!("Monitor {}", track + 1),
            ParamId::MuteInput => "Mute input".to_string(),
        }
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParamId::Loop(track) => write!(f, "LOOP{}", track + 1),
            ParamId::Volume(track) => write!(f, "VOLUME{}", track + 1),
            ParamId::Monitor(track) => write!(f, "MONITOR{}", track + 1),
            ParamId::MuteInput => write!(f, "MUTEINPUT"),
        }
    }
}

fn parse_track(number: &str, name: &str) -> Result<TrackIndex, ParseError> {
    let number: usize = number.parse()?;
    if number < 1 || number > NUM_TRACKS {
        return Err(ParseError::new(format!("{}: track must be between 1 and {}", name, NUM_TRACKS)));
    }
    Ok(number - 1)
}

impl FromStr for ParamId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_uppercase();
        if name == "MUTEINPUT" {
            return Ok(ParamId::MuteInput);
        }

        let split = name.find(|c: char| c.is_ascii_digit()).unwrap_or(name.len());
        let (prefix, number) = name.split_at(split);
        match prefix {
            "LOOP" => Ok(ParamId::Loop(parse_track(number, s)?)),
            "VOLUME" => Ok(ParamId::Volume(parse_track(number, s)?)),
            "MONITOR" => Ok(ParamId::Monitor(parse_track(number, s)?)),
            _ => Err(ParseError::new(format!("Unknown parameter: {}", s))),
        }
    }
}

type ParamHandler = fn(&mut LooperProcessor, Option<TrackIndex>, f32) -> Result<(), LooperError>;

fn track_or_err(track: Option<TrackIndex>) -> Result<TrackIndex, LooperError> {
    track.ok_or_else(|| LooperError { message: "parameter has no track".to_string() })
}

fn press_record(processor: &mut LooperProcessor, track: Option<TrackIndex>, _value: f32) -> Result<(), LooperError> {
    processor.toggle_record(track_or_err(track)?).map(|_| ())
}

fn change_volume(processor: &mut LooperProcessor, track: Option<TrackIndex>, value: f32) -> Result<(), LooperError> {
    processor.set_volume(track_or_err(track)?, Volume::new(value))
}

fn change_monitor(processor: &mut LooperProcessor, track: Option<TrackIndex>, value: f32) -> Result<(), LooperError> {
    processor.set_monitor(track_or_err(track)?, value >= 0.5)
}

fn change_mute_input(processor: &mut LooperProcessor, _track: Option<TrackIndex>, value: f32) -> Result<(), LooperError> {
    processor.set_mute_input(value >= 0.5);
    Ok(())
}

/// Routes parameter changes to `LooperProcessor`.
///
/// Remembers the last value of each parameter so that hosts which resend
/// unchanged values don't trigger anything.
pub struct ParamDispatch {
    table: Vec<(ParamId, ParamHandler)>,
    values: [f32; NUM_PARAMS],
}

impl ParamDispatch {
    pub fn new() -> Self {
        let table: Vec<(ParamId, ParamHandler)> = ParamId::all()
            .map(|id| {
                let handler: ParamHandler = match id {
                    ParamId::Loop(_) => press_record,
                    ParamId::Volume(_) => change_volume,
                    ParamId::Monitor(_) => change_monitor,
                    ParamId::MuteInput => change_mute_input,
                };
                (id, handler)
            })
            .collect();

        let mut values = [0.0; NUM_PARAMS];
        for (id, _) in table.iter() {
            values[id.index()] = id.default_value();
        }
        ParamDispatch { table, values }
    }

    pub fn value(self: &Self, id: ParamId) -> Option<f32> {
        self.values.get(id.index()).copied()
    }

    /// Apply a new value for `id`. Does nothing if the value is unchanged.
    pub fn dispatch(self: &mut Self, processor: &mut LooperProcessor, id: ParamId, value: f32) -> Result<(), LooperError> {
        let index = id.index();
        let handler = match self.table.get(index) {
            Some((entry, handler)) if *entry == id => *handler,
            _ => {
                return Err(LooperError {
                    message: format!("parameter {:?} does not exist", id),
                })
            }
        };

        if self.values[index] == value {
            return Ok(());
        }
        self.values[index] = value;
        debug!("{} = {}", id, value);
        handler(processor, id.track(), value)
    }
}

impl Default for ParamDispatch {
    fn default() -> Self {
        ParamDispatch::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_text_and_index() {
        assert_eq!(ParamId::all().count(), NUM_PARAMS);
        for (index, id) in ParamId::all().enumerate() {
            assert_eq!(id.index(), index);
            assert_eq!(id.to_string().parse::<ParamId>().unwrap(), id);
        }
        assert_eq!(ParamId::Loop(0).to_string(), "LOOP1");
        assert_eq!(ParamId::Volume(5).to_string(), "VOLUME6");
        assert_eq!("monitor3".parse::<ParamId>().unwrap(), ParamId::Monitor(2));
        assert_eq!(ParamId::from_index(NUM_PARAMS), None);
    }

    #[test]
    fn bad_ids_are_rejected() {
        assert!("LOOP0".parse::<ParamId>().is_err());
        assert!("LOOP7".parse::<ParamId>().is_err());
        assert!("VOLUME".parse::<ParamId>().is_err());
        assert!("PAN1".parse::<ParamId>().is_err());
    }
}
