use std::{error, fmt, io};

// -------------------------------------------------------------------------------------------------

/// Provides an enumeration of all possible errors reported by grainfield.
#[derive(Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    ConfigError(String),
    ParameterError(String),
    StreamNotFoundError(usize),
    SourceNotFoundError(usize),
    EffectNotFoundError(usize),
    SendError(String),
    OutputDeviceError(Box<dyn error::Error + Send + Sync>),
    IoError(io::Error),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError(str) => write!(f, "Invalid engine configuration: {str}"),
            Self::ParameterError(str) => write!(f, "Invalid parameter: {str}"),
            Self::StreamNotFoundError(stream_id) => {
                write!(f, "Grain stream with id {stream_id} not found")
            }
            Self::SourceNotFoundError(source_index) => {
                write!(f, "Grain source with index {source_index} not found")
            }
            Self::EffectNotFoundError(effect_id) => {
                write!(f, "Effect with id {effect_id} not found")
            }
            Self::SendError(str) => write!(f, "Failed to send mixer message: {str}"),
            Self::OutputDeviceError(err) => err.fmt(f),
            Self::IoError(err) => err.fmt(f),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}
