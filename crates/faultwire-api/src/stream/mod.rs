// Block-framed TCP alarm stream
//
// Wire side of the streaming source: framing, login prompts, block parsing,
// reconnect backoff, the long-lived connection task, and a one-shot probe.

pub mod backoff;
pub mod client;
pub mod framing;
pub mod login;
pub mod message;
pub mod probe;

pub use backoff::Backoff;
pub use client::{StreamClient, StreamEvent, StreamSettings, StreamState};
pub use framing::BlockBuffer;
pub use login::{LoginState, LoginTracker};
pub use message::{BlockMessage, FieldMap, parse_block};
pub use probe::probe;
