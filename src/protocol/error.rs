use tokio_util::codec::LinesCodecError;

#[derive(Debug)]
pub enum ProtocolError {
    InvalidJson(String),
    UnsupportedCommand(String),
    MissingField(String),
    LineTooLong(usize),
    IoError(std::io::Error),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::InvalidJson(msg) => write!(f, "Invalid JSON: {}", msg),
            ProtocolError::UnsupportedCommand(cmd) => write!(f, "Unsupported command: {}", cmd),
            ProtocolError::MissingField(field) => write!(f, "Missing required field: {}", field),
            ProtocolError::LineTooLong(max) => {
                write!(f, "Request exceeds the maximum line length of {} bytes", max)
            }
            ProtocolError::IoError(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::InvalidJson(err.to_string())
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        ProtocolError::IoError(err)
    }
}

impl ProtocolError {
    /// Maps a line framing failure, given the configured maximum line length.
    pub fn from_codec(err: LinesCodecError, max_length: usize) -> Self {
        match err {
            LinesCodecError::MaxLineLengthExceeded => ProtocolError::LineTooLong(max_length),
            LinesCodecError::Io(err) => ProtocolError::IoError(err),
        }
    }

    /// Whether the connection can keep serving requests after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ProtocolError::IoError(_))
    }
}
