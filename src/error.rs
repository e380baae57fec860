use thiserror::Error;

#[derive(Error, Debug)]
pub enum PbapDumpError {
    #[error("Failed to spawn control program '{program}'")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid device address: {address}")]
    InvalidAddress { address: String },

    #[error("Connection to {address} failed")]
    ConnectionFailed { address: String },

    #[error("Remote directory selection failed: {directory}")]
    DirectorySelectFailed { directory: String },

    #[error("Control channel closed unexpectedly")]
    ChannelClosed,

    #[error("Operation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("No records extracted after {attempts} attempts")]
    NoRecordsExtracted { attempts: u32 },

    #[error("Session retrieved no files from /{directory}")]
    EmptySession { directory: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Operation was cancelled by user")]
    Cancelled,
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for PbapDumpError {
    fn user_message(&self) -> String {
        match self {
            PbapDumpError::Spawn { program, .. } => {
                format!("Could not start the control program: {}", program)
            }
            PbapDumpError::InvalidAddress { address } => {
                format!("Invalid device address: {}", address)
            }
            PbapDumpError::ConnectionFailed { address } => {
                format!("Could not establish an OBEX connection to {}", address)
            }
            PbapDumpError::DirectorySelectFailed { directory } => {
                format!("The device refused selection of the /{} directory", directory)
            }
            PbapDumpError::ChannelClosed => {
                "The control program terminated mid-session".to_string()
            }
            PbapDumpError::Timeout { seconds } => {
                format!("The device stopped responding ({}s timeout)", seconds)
            }
            PbapDumpError::NoRecordsExtracted { attempts } => {
                format!("No records could be extracted after {} attempts", attempts)
            }
            PbapDumpError::EmptySession { directory } => {
                format!("The session completed but no files were copied from /{}", directory)
            }
            PbapDumpError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            PbapDumpError::Spawn { .. } => Some(
                "Ensure obexctl (bluez-obexd) is installed and on your PATH, or point --control-program at it.".to_string()
            ),
            PbapDumpError::InvalidAddress { .. } => Some(
                "Provide a six-octet hexadecimal address such as 12:34:56:78:90:AB (hyphens are also accepted).".to_string()
            ),
            PbapDumpError::ConnectionFailed { .. } => Some(
                "Verify the device is powered on, in range, paired with this host, and exposes the PBAP profile.".to_string()
            ),
            PbapDumpError::DirectorySelectFailed { .. } => Some(
                "Some devices only expose the phonebook after confirming a prompt on the handset. Accept any pending prompt and retry.".to_string()
            ),
            PbapDumpError::ChannelClosed => Some(
                "Check that the obexd service is running and retry.".to_string()
            ),
            PbapDumpError::Timeout { .. } => Some(
                "Move the device closer or increase the wait with --transfer-timeout.".to_string()
            ),
            PbapDumpError::NoRecordsExtracted { .. } => Some(
                "The device may require pairing confirmation, or its phonebook may be empty. Check the handset screen during the next run.".to_string()
            ),
            PbapDumpError::Config { .. } => Some(
                "Check your configuration file syntax and ensure all required fields are present.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for PbapDumpError {
    fn from(error: toml::de::Error) -> Self {
        PbapDumpError::Config {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PbapDumpError>;
