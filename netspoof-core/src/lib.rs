//! netspoof core library
//!
//! Fundamental types, error handling and the collaborator interfaces the
//! spoofing modules are written against:
//!
//! - [`PacketSender`]: raw frame transmission
//! - [`AddressResolver`]: IP to MAC resolution (and back) with probing
//! - [`Forwarding`]: kernel IP forwarding switch
//! - [`Session`]: interface, gateway, skip predicate and aliases

pub mod cancel;
pub mod error;
pub mod forwarding;
pub mod interface;
pub mod packet;
pub mod parameter;
pub mod resolver;
pub mod sender;
pub mod session;
pub mod types;

pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use forwarding::{Forwarding, ProcForwarding};
pub use interface::Interface;
pub use packet::Packet;
pub use parameter::{split_list, ParamDescriptor, ParameterType, Parameters};
pub use resolver::{AddressResolver, SystemResolver};
pub use sender::{LinkSender, PacketSender, SendCounters, SendStats};
pub use session::Session;
pub use types::*;
