use std::fmt;
use std::num;

/// Failure to parse a parameter id, value or script line.
#[derive(Debug)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError { message: message.into() }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

impl From<num::ParseFloatError> for ParseError {
    fn from(error: num::ParseFloatError) -> Self {
        ParseError { message: error.to_string() }
    }
}

impl From<num::ParseIntError> for ParseError {
    fn from(error: num::ParseIntError) -> Self {
        ParseError { message: error.to_string() }
    }
}

/// A state change or sync event that was rejected before reaching the loops.
#[derive(Debug)]
pub struct LooperError {
    pub message: String,
}

impl LooperError {
    pub fn track_out_of_range(track: usize, count: usize) -> Self {
        LooperError {
            message: format!("track index {} out of range (instance has {} tracks)", track, count),
        }
    }
}

impl fmt::Display for LooperError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for LooperError {}

impl From<ParseError> for LooperError {
    fn from(error: ParseError) -> Self {
        LooperError { message: error.to_string() }
    }
}
