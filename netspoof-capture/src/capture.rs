//! Live capture on top of pcap

use netspoof_core::{CancelToken, Error, Packet, Result};
use pcap::{Active, Capture, Device};
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Default snapshot length (maximum bytes per packet)
const DEFAULT_SNAPLEN: i32 = 65535;

/// Read timeout; bounds how long a cancelled capture thread lingers
const DEFAULT_TIMEOUT_MS: i32 = 250;

/// Frames buffered between the capture thread and the consumer
const CHANNEL_CAPACITY: usize = 1024;

/// Configuration for packet capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Maximum bytes to capture per packet
    pub snaplen: i32,
    /// Timeout in milliseconds
    pub timeout_ms: i32,
    /// Enable promiscuous mode
    pub promiscuous: bool,
    /// Deliver packets as soon as they arrive
    pub immediate_mode: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            snaplen: DEFAULT_SNAPLEN,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            promiscuous: true,
            immediate_mode: true,
        }
    }
}

/// Something that yields frames until cancelled.
///
/// The live implementation is [`PacketCapture`]; tests feed frames through
/// a channel instead.
pub trait PacketSource: Send + Sync {
    /// Start delivering frames matching `filter`. The returned stream ends
    /// once `cancel` fires or the source fails.
    fn open(&self, filter: &str, cancel: CancelToken) -> Result<Frames>;
}

/// Stream of frames handed out by a [`PacketSource`]
pub struct Frames {
    rx: mpsc::Receiver<Packet>,
    reader: Option<thread::JoinHandle<()>>,
}

impl Frames {
    /// Frames pushed into a channel by the caller
    pub fn from_channel(rx: mpsc::Receiver<Packet>) -> Self {
        Self { rx, reader: None }
    }

    fn with_reader(rx: mpsc::Receiver<Packet>, reader: thread::JoinHandle<()>) -> Self {
        Self {
            rx,
            reader: Some(reader),
        }
    }

    pub async fn recv(&mut self) -> Option<Packet> {
        self.rx.recv().await
    }

    /// Stop receiving and wait until the reader thread has let go of the
    /// capture handle.
    pub async fn close(self) {
        let Frames { rx, reader } = self;
        drop(rx);

        let Some(reader) = reader else {
            return;
        };
        match tokio::task::spawn_blocking(move || reader.join()).await {
            Ok(Ok(())) => debug!("Capture released"),
            Ok(Err(_)) => error!("Capture thread panicked"),
            Err(e) => warn!(error = %e, "Failed to join capture thread"),
        }
    }
}

/// pcap capture bound to one interface
pub struct PacketCapture {
    interface: String,
    config: CaptureConfig,
}

impl PacketCapture {
    pub fn new(interface: &str) -> Self {
        Self::with_config(interface, CaptureConfig::default())
    }

    pub fn with_config(interface: &str, config: CaptureConfig) -> Self {
        Self {
            interface: interface.to_string(),
            config,
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    fn init_capture(&self, filter: &str) -> Result<Capture<Active>> {
        debug!(interface = %self.interface, filter, "Initializing pcap capture");

        let device = Device::from(self.interface.as_str());
        let mut capture = Capture::from_device(device)
            .map_err(|e| Error::Capture(format!("Failed to create capture: {}", e)))?
            .promisc(self.config.promiscuous)
            .snaplen(self.config.snaplen)
            .timeout(self.config.timeout_ms)
            .immediate_mode(self.config.immediate_mode)
            .open()
            .map_err(|e| Error::Capture(format!("Failed to open capture: {}", e)))?;

        if !filter.is_empty() {
            capture
                .filter(filter, true)
                .map_err(|e| Error::Capture(format!("Invalid BPF filter '{}': {}", filter, e)))?;
        }

        Ok(capture)
    }
}

impl PacketSource for PacketCapture {
    fn open(&self, filter: &str, cancel: CancelToken) -> Result<Frames> {
        let mut capture = self.init_capture(filter)?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        info!(interface = %self.interface, filter, "Starting packet capture");

        let interface = self.interface.clone();
        let reader = thread::Builder::new()
            .name(format!("capture-{}", self.interface))
            .spawn(move || {
                let mut received = 0u64;
                let mut dropped = 0u64;

                while !cancel.is_cancelled() {
                    match capture.next_packet() {
                        Ok(frame) => {
                            received += 1;
                            let packet = Packet::new(interface.clone(), frame.data.to_vec());
                            match tx.try_send(packet) {
                                Ok(()) => {}
                                Err(mpsc::error::TrySendError::Full(_)) => {
                                    dropped += 1;
                                    warn!(interface = %interface, "Consumer lagging, frame dropped");
                                }
                                Err(mpsc::error::TrySendError::Closed(_)) => {
                                    debug!("Frame consumer went away");
                                    break;
                                }
                            }
                        }
                        Err(pcap::Error::TimeoutExpired) => continue,
                        Err(e) => {
                            error!(interface = %interface, "Packet capture error: {}", e);
                            break;
                        }
                    }
                }

                info!(interface = %interface, received, dropped, "Capture thread finished");
            })
            .map_err(|e| Error::Capture(format!("Failed to spawn capture thread: {}", e)))?;

        Ok(Frames::with_reader(rx, reader))
    }
}
