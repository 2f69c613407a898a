//! Packet capture for netspoof
//!
//! Wraps pcap behind the [`PacketSource`] trait: a source is opened with a
//! BPF filter and a [`CancelToken`](netspoof_core::CancelToken) and hands
//! back a stream of [`Frames`] that ends when the token fires.
//!
//! ```no_run
//! use netspoof_capture::{filters, PacketCapture, PacketSource};
//! use netspoof_core::CancelToken;
//!
//! # async fn run() -> netspoof_core::Result<()> {
//! let capture = PacketCapture::new("eth0");
//! let cancel = CancelToken::new();
//! let mut frames = capture.open(&filters::dns_filter(), cancel.clone())?;
//! while let Some(packet) = frames.recv().await {
//!     println!("{} bytes", packet.len());
//! }
//! frames.close().await;
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod filters;

pub use capture::{CaptureConfig, Frames, PacketCapture, PacketSource};
