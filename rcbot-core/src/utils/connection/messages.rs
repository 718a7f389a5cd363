//! Wire messages.
//!
//! Requests are a single JSON frame. Every reply is two frames: a JSON header
//! and a binary payload.
//!
//! ```text
//! frame reply:  {"dtype":"uint8","shape":[80,60,3]}   <14400 pixel bytes>
//! error reply:  {"error":"...","kind":"protocol"}     <empty>
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    utils::controllers::Command,
};

/// Header of a frame reply, enough to rebuild the array on the other side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub dtype: String,
    pub shape: Vec<usize>,
}

impl FrameHeader {
    /// Size in bytes of one element of `dtype`, for the numpy names we know.
    pub fn element_size(&self) -> Option<usize> {
        match self.dtype.as_str() {
            "uint8" | "int8" | "bool" => Some(1),
            "uint16" | "int16" | "float16" => Some(2),
            "uint32" | "int32" | "float32" => Some(4),
            "uint64" | "int64" | "float64" => Some(8),
            _ => None,
        }
    }

    /// Expected payload length in bytes.
    pub fn payload_len(&self) -> Option<usize> {
        Some(self.shape.iter().product::<usize>() * self.element_size()?)
    }
}

/// Header of an error reply. The payload frame is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
    pub kind: String,
}

impl From<&Error> for ErrorReply {
    fn from(e: &Error) -> Self {
        ErrorReply {
            error: e.to_string(),
            kind: e.kind().to_string(),
        }
    }
}

/// Parse one request frame.
pub fn parse_command(bytes: &[u8]) -> Result<Command> {
    serde_json::from_slice(bytes).map_err(|e| {
        Error::Protocol(format!(
            "invalid request {:?}: {}",
            String::from_utf8_lossy(bytes),
            e
        ))
    })
}

/// Serialize a reply header.
pub fn encode_header<T: Serialize>(header: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(header)?)
}
