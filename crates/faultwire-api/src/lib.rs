// faultwire-api: Async wire clients for alarm sources (REST fault APIs, block-framed TCP streams, SNMP traps)

pub mod error;
pub mod rest;
pub mod stream;
pub mod transport;
pub mod trap;

pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
