use thiserror::Error;

/// Main player error type
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Track not found: {name}")]
    TrackNotFound { name: String },

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Scheduling error: {0}")]
    Scheduling(#[from] SinkError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    #[error("CLI parse error: {0}")]
    Parse(#[from] crate::cli::ParseError),
}

impl PlayerError {
    /// Get user-friendly error message with suggested solutions
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::TrackNotFound { name } => {
                format!("No track named '{}' exists in the playlist", name)
            }
            PlayerError::Metadata(err) => err.user_message(),
            PlayerError::Scheduling(err) => err.user_message(),
            PlayerError::Decode(err) => err.user_message(),
            PlayerError::Config(err) => err.user_message(),
            PlayerError::File(err) => Self::format_file_error(err),
            PlayerError::Parse(err) => format!("Command error: {}", err),
        }
    }

    /// Get suggested recovery actions for the error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PlayerError::TrackNotFound { .. } => vec![
                "Use 'tracks' to list the names in the loaded playlist".to_string(),
                "Track names are case-sensitive".to_string(),
            ],
            PlayerError::Metadata(err) => err.recovery_suggestions(),
            PlayerError::Scheduling(err) => err.recovery_suggestions(),
            PlayerError::Decode(err) => err.recovery_suggestions(),
            PlayerError::Config(err) => err.recovery_suggestions(),
            PlayerError::File(_) => vec![
                "Check that the file path is correct".to_string(),
                "Check file permissions".to_string(),
            ],
            PlayerError::Parse(_) => vec!["Type 'help' to see available commands".to_string()],
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PlayerError::TrackNotFound { .. } => ErrorSeverity::Warning,
            PlayerError::Metadata(_) => ErrorSeverity::Error,
            PlayerError::Scheduling(SinkError::InvalidVoice { .. }) => ErrorSeverity::Error,
            PlayerError::Scheduling(_) => ErrorSeverity::Critical,
            PlayerError::Decode(DecodeError::UnsupportedFormat { .. }) => ErrorSeverity::Warning,
            PlayerError::Decode(_) => ErrorSeverity::Error,
            PlayerError::Config(_) => ErrorSeverity::Warning,
            PlayerError::File(_) => ErrorSeverity::Error,
            PlayerError::Parse(_) => ErrorSeverity::Info,
        }
    }

    fn format_file_error(err: &std::io::Error) -> String {
        match err.kind() {
            std::io::ErrorKind::NotFound => "File or directory not found".to_string(),
            std::io::ErrorKind::PermissionDenied => "Permission denied - cannot access file".to_string(),
            _ => format!("File system error: {}", err),
        }
    }
}

/// Error severity levels for logging and user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error => log::Level::Error,
            ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// Embedded loop tag errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetadataError {
    #[error("Tag {tag} has non-integer value '{value}'")]
    InvalidTag { tag: String, value: String },
}

impl MetadataError {
    pub fn user_message(&self) -> String {
        match self {
            MetadataError::InvalidTag { tag, value } => {
                format!("Loop tag {} must be a whole number of samples, found '{}'", tag, value)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            MetadataError::InvalidTag { tag, .. } => vec![
                format!("Fix or remove the {} tag in the audio file", tag),
                "Set loop_start/loop_length explicitly in the playlist to override the tag".to_string(),
            ],
        }
    }
}

/// Audio sink errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SinkError {
    #[error("Invalid voice handle: {voice}")]
    InvalidVoice { voice: u64 },

    #[error("Device not found: {device}")]
    DeviceNotFound { device: String },

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Audio initialization failed: {0}")]
    InitializationFailed(String),
}

impl SinkError {
    pub fn user_message(&self) -> String {
        match self {
            SinkError::InvalidVoice { voice } => {
                format!("Audio output rejected voice {} - it was released or never created", voice)
            }
            SinkError::DeviceNotFound { device } => {
                format!("Audio device '{}' is not available or has been disconnected", device)
            }
            SinkError::StreamError(msg) => {
                format!("Audio playback interrupted: {}", msg)
            }
            SinkError::InitializationFailed(msg) => {
                format!("Failed to initialize audio system: {}", msg)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            SinkError::InvalidVoice { .. } => vec![
                "Start playback again with 'play <name>'".to_string(),
            ],
            SinkError::DeviceNotFound { .. } => vec![
                "Check that your audio device is connected and powered on".to_string(),
                "Start without --device to use the default output".to_string(),
            ],
            SinkError::StreamError(_) => vec![
                "Check audio device connections".to_string(),
                "Restart playback with 'stop' then 'play'".to_string(),
            ],
            SinkError::InitializationFailed(_) => vec![
                "Restart the application".to_string(),
                "Check that no other applications are using exclusive audio access".to_string(),
            ],
        }
    }
}

/// Decoding-related errors
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Corrupted file: {0}")]
    CorruptedFile(String),

    #[error("Decode failed: {0}")]
    DecodeFailed(String),
}

impl DecodeError {
    pub fn user_message(&self) -> String {
        match self {
            DecodeError::UnsupportedFormat { format } => {
                format!("Audio format '{}' is not supported by this player", format)
            }
            DecodeError::CorruptedFile(msg) => {
                format!("Audio file appears to be corrupted or damaged: {}", msg)
            }
            DecodeError::DecodeFailed(msg) => {
                format!("Failed to decode audio data: {}", msg)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            DecodeError::UnsupportedFormat { .. } => vec![
                "Supported formats: FLAC, WAV, MP3, OGG/Vorbis".to_string(),
                "Check if the file extension matches the actual format".to_string(),
            ],
            DecodeError::CorruptedFile(_) => vec![
                "Try re-exporting or re-copying the file".to_string(),
            ],
            DecodeError::DecodeFailed(_) => vec![
                "Check if the file is completely downloaded".to_string(),
                "Verify the file is not corrupted".to_string(),
            ],
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),

    #[error("Duplicate track name in playlist: {name}")]
    DuplicateTrack { name: String },
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigDirNotFound => {
                "Cannot find or create configuration directory".to_string()
            }
            ConfigError::IoError(err) => {
                format!("Cannot access configuration file: {}", err)
            }
            ConfigError::SerializationError(_) => {
                "Failed to save configuration settings".to_string()
            }
            ConfigError::DeserializationError(_) => {
                "Configuration file is corrupted or has invalid format".to_string()
            }
            ConfigError::DuplicateTrack { name } => {
                format!("The playlist lists '{}' more than once", name)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ConfigError::ConfigDirNotFound => vec![
                "Check that you have write permissions to your home directory".to_string(),
            ],
            ConfigError::IoError(_) => vec![
                "Check file permissions for the configuration directory".to_string(),
                "Ensure the disk is not full".to_string(),
            ],
            ConfigError::SerializationError(_) => vec![
                "Try resetting configuration to defaults".to_string(),
            ],
            ConfigError::DeserializationError(_) => vec![
                "Delete the configuration file to reset to defaults".to_string(),
                "Check the file format manually".to_string(),
            ],
            ConfigError::DuplicateTrack { .. } => vec![
                "Give every [[tracks]] entry a unique name".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ConfigError::DuplicateTrack { .. })
    }
}
