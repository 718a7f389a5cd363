//! Error types for the rover

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Rover error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Camera or motor I/O hiccup; the caller logs it and carries on.
    #[error("Transient hardware fault: {0}")]
    TransientHardware(String),

    /// Malformed or unrecognized request from the peer.
    #[error("Protocol fault: {0}")]
    Protocol(String),

    /// Camera or motor controller could not be opened at startup.
    #[error("Initialization failed: {0}")]
    FatalInit(String),

    /// No frame has been captured yet.
    #[error("No camera frame available yet")]
    Unavailable,

    /// The camera failed too many times in a row.
    #[error("Camera gave up after {0} consecutive capture failures")]
    CameraExhausted(u32),

    /// ZeroMQ socket error
    #[error("Transport error: {0}")]
    Transport(#[from] zmq::Error),

    /// The peer side of an in-process endpoint went away.
    #[error("Endpoint disconnected")]
    Disconnected,

    /// A worker thread panicked.
    #[error("{0} thread panicked")]
    ThreadPanic(&'static str),
}

impl Error {
    /// Short machine-readable tag used in error replies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::TransientHardware(_) => "hardware",
            Error::Protocol(_) => "protocol",
            Error::FatalInit(_) => "init",
            Error::Unavailable => "unavailable",
            Error::CameraExhausted(_) => "camera",
            Error::Transport(_) | Error::Disconnected => "transport",
            Error::ThreadPanic(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Protocol(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        let cases = [
            (Error::TransientHardware("i2c nack".into()), "hardware"),
            (Error::Protocol("bad json".into()), "protocol"),
            (Error::FatalInit("no camera".into()), "init"),
            (Error::Unavailable, "unavailable"),
            (Error::CameraExhausted(10), "camera"),
            (Error::Transport(zmq::Error::EAGAIN), "transport"),
            (Error::Disconnected, "transport"),
            (Error::ThreadPanic("camera"), "internal"),
        ];
        for (error, kind) in cases {
            assert_eq!(error.kind(), kind, "{error}");
        }
    }

    #[test]
    fn test_json_errors_are_protocol_faults() {
        let err: Error = serde_json::from_str::<u8>("nope").unwrap_err().into();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
