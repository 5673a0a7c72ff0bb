use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Position of a chunk within a message, as carried by `Mex-Chunk-Range`.
///
/// The server's value is authoritative: when it disagrees with client
/// bookkeeping, the client recomputes its total from this header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRange {
    pub current: u32,
    pub total: u32,
}

impl ChunkRange {
    pub fn new(current: u32, total: u32) -> Self {
        Self { current, total }
    }

    /// `true` when this is the last chunk of the message.
    pub fn is_final(&self) -> bool {
        self.current >= self.total
    }
}

impl FromStr for ChunkRange {
    type Err = ProtocolError;

    /// Parses the `"current:total"` wire form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidChunkRange(s.to_string());
        let (current, total) = s.split_once(':').ok_or_else(invalid)?;
        let current: u32 = current.trim().parse().map_err(|_| invalid())?;
        let total: u32 = total.trim().parse().map_err(|_| invalid())?;
        if current == 0 || total == 0 || current > total {
            return Err(invalid());
        }
        Ok(Self { current, total })
    }
}

impl fmt::Display for ChunkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.current, self.total)
    }
}

/// Message classification from the `Mex-Messagetype` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageType {
    /// File payload, possibly chunked.
    #[default]
    Data,
    /// Delivery status notification; always single-chunk, the payload is
    /// the response header set itself.
    Report,
}

impl MessageType {
    /// Classifies a header value. Unknown values are treated as data.
    pub fn from_header(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("REPORT") {
            MessageType::Report
        } else {
            MessageType::Data
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_range_parses_wire_form() {
        let r: ChunkRange = "1:2".parse().unwrap();
        assert_eq!(r, ChunkRange::new(1, 2));
        assert!(!r.is_final());

        let r: ChunkRange = "4:4".parse().unwrap();
        assert!(r.is_final());
    }

    #[test]
    fn chunk_range_rejects_malformed() {
        for bad in ["", "1", "1:", ":2", "a:b", "0:2", "3:2", "1:0"] {
            assert!(bad.parse::<ChunkRange>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn chunk_range_display_roundtrip() {
        let r = ChunkRange::new(3, 7);
        assert_eq!(r.to_string(), "3:7");
        assert_eq!(r.to_string().parse::<ChunkRange>().unwrap(), r);
    }

    #[test]
    fn message_type_classification() {
        assert_eq!(MessageType::from_header("DATA"), MessageType::Data);
        assert_eq!(MessageType::from_header("report"), MessageType::Report);
        assert_eq!(MessageType::from_header(" REPORT "), MessageType::Report);
        assert_eq!(MessageType::from_header("unknown"), MessageType::Data);
        assert_eq!(MessageType::from_header(""), MessageType::Data);
    }
}
