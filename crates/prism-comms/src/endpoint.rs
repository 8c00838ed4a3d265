//! # Endpoints
//!
//! Destinations for serialized telemetry.

use std::io::Write;

use prism_core::{Error, Result};
use spin::Mutex;

/// A telemetry sink
///
/// `send` is fire-and-forget from the layer's point of view: an error is
/// logged by the caller and never reaches the application.
pub trait Endpoint: Send + Sync {
    /// Transmit one serialized message
    fn send(&self, bytes: Vec<u8>) -> Result<()>;
}

// =============================================================================
// MEMORY
// =============================================================================

/// Keeps every message in memory, for tools and tests
#[derive(Debug, Default)]
pub struct MemoryEndpoint {
    messages: Mutex<Vec<Vec<u8>>>,
}

impl MemoryEndpoint {
    /// Create an empty endpoint
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages held
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Check if no message is held
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Remove and return every message held
    pub fn take(&self) -> Vec<Vec<u8>> {
        core::mem::take(&mut *self.messages.lock())
    }

    /// Parse every held message as JSON, leaving them in place
    ///
    /// Messages that are not valid JSON are skipped.
    pub fn json(&self) -> Vec<serde_json::Value> {
        self.messages
            .lock()
            .iter()
            .filter_map(|bytes| serde_json::from_slice(bytes).ok())
            .collect()
    }
}

impl Endpoint for MemoryEndpoint {
    fn send(&self, bytes: Vec<u8>) -> Result<()> {
        self.messages.lock().push(bytes);
        Ok(())
    }
}

// =============================================================================
// STREAM
// =============================================================================

/// Writes newline-delimited JSON to any writer (file, pipe, socket)
#[derive(Debug)]
pub struct StreamEndpoint<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> StreamEndpoint<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> Endpoint for StreamEndpoint<W> {
    fn send(&self, bytes: Vec<u8>) -> Result<()> {
        let write_line = |writer: &mut W| -> std::io::Result<()> {
            writer.write_all(&bytes)?;
            writer.write_all(b"\n")?;
            writer.flush()
        };
        write_line(&mut *self.writer.lock()).map_err(|err| {
            log::debug!("Endpoint: write failed: {}", err);
            Error::EndpointFailed
        })
    }
}

// =============================================================================
// NULL
// =============================================================================

/// Discards every message
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEndpoint;

impl Endpoint for NullEndpoint {
    fn send(&self, _bytes: Vec<u8>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_memory_endpoint_collects_in_order() {
        let endpoint = MemoryEndpoint::new();
        endpoint.send(br#"{"type":"start_frame","frame":0}"#.to_vec()).unwrap();
        endpoint.send(b"not json".to_vec()).unwrap();
        endpoint.send(br#"{"type":"end_frame","frame":0}"#.to_vec()).unwrap();

        assert_eq!(endpoint.len(), 3);
        let parsed = endpoint.json();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1]["type"], "end_frame");

        assert_eq!(endpoint.take().len(), 3);
        assert!(endpoint.is_empty());
    }

    #[test]
    fn test_stream_endpoint_writes_lines() {
        let endpoint = StreamEndpoint::new(Vec::new());
        endpoint.send(b"{\"a\":1}".to_vec()).unwrap();
        endpoint.send(b"{\"b\":2}".to_vec()).unwrap();
        assert_eq!(endpoint.into_inner(), b"{\"a\":1}\n{\"b\":2}\n");
    }

    #[test]
    fn test_stream_endpoint_reports_failure() {
        let endpoint = StreamEndpoint::new(Broken);
        assert_eq!(endpoint.send(b"{}".to_vec()), Err(Error::EndpointFailed));
    }

    #[test]
    fn test_null_endpoint_accepts_everything() {
        assert!(NullEndpoint.send(vec![0xff]).is_ok());
    }
}
