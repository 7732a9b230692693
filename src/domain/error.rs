use thiserror::Error;

/// Domain-level errors for the hearing-loss engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Synthesis would produce an empty buffer for duration {duration_secs} s")]
    EmptyBuffer { duration_secs: f32 },

    #[error("Audio output device error: {message}")]
    OutputDevice { message: String },

    #[error("Audio output is not available")]
    OutputUnavailable,

    #[error("Speech synthesis error: {0}")]
    Speech(String),
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
