//! Error types for sparsh-cal

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Calibration engine error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parse error
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration serialize error
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Machine has not been homed
    #[error("Axes not homed; home the machine before calibrating")]
    NotHomed,

    /// Tool index outside the machine's tool table
    #[error("Invalid tool index {index} (machine has {count} tools)")]
    InvalidTool {
        /// Requested tool index
        index: usize,
        /// Number of tools on the machine
        count: usize,
    },

    /// Unrecognized or malformed calibration argument
    #[error("Invalid calibration argument: {0}")]
    InvalidArgument(String),
}
