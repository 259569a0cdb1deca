use std::fmt;
use std::io;
use std::num;

use looper::{LooperError, ParseError};

#[derive(Debug)]
pub struct AppError {
    pub message: String,
}

impl AppError {
    pub fn new(message: impl Into<String>) -> Self {
        AppError { message: message.into() }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<io::Error> for AppError {
    fn from(error: io::Error) -> Self {
        AppError {
            message: error.to_string(),
        }
    }
}

impl From<hound::Error> for AppError {
    fn from(error: hound::Error) -> Self {
        AppError {
            message: error.to_string(),
        }
    }
}

impl From<ParseError> for AppError {
    fn from(error: ParseError) -> Self {
        AppError {
            message: error.to_string(),
        }
    }
}

impl From<num::ParseFloatError> for AppError {
    fn from(error: num::ParseFloatError) -> Self {
        AppError::from(ParseError::from(error))
    }
}

impl From<num::ParseIntError> for AppError {
    fn from(error: num::ParseIntError) -> Self {
        AppError::from(ParseError::from(error))
    }
}

impl From<LooperError> for AppError {
    fn from(error: LooperError) -> Self {
        AppError {
            message: error.to_string(),
        }
    }
}

#[cfg(feature = "live")]
mod cpal_errors {
    use super::AppError;

    macro_rules! from_cpal_error {
        ($error:ty) => {
            impl From<$error> for AppError {
                fn from(error: $error) -> Self {
                    AppError {
                        message: error.to_string(),
                    }
                }
            }
        };
    }

    from_cpal_error!(cpal::DevicesError);
    from_cpal_error!(cpal::DeviceNameError);
    from_cpal_error!(cpal::DefaultStreamConfigError);
    from_cpal_error!(cpal::BuildStreamError);
    from_cpal_error!(cpal::PlayStreamError);
}
