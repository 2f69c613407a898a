//! Captured frames

use std::time::SystemTime;

/// A frame read from the wire
#[derive(Debug, Clone)]
pub struct Packet {
    /// When the frame was captured
    pub timestamp: SystemTime,
    /// Interface the frame was received on
    pub interface: String,
    /// Frame data (including the Ethernet header)
    pub data: Vec<u8>,
}

impl Packet {
    pub fn new(interface: String, data: Vec<u8>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            interface,
            data,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
