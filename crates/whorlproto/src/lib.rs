//! Protocol types for the whorl enrollment channel.
//!
//! These types define the JSON wire format spoken over the realtime
//! WebSocket channel and the fallback status endpoint. JSON
//! conversion happens only at the gateway edge; internal layers pass
//! the typed values around.
//!
//! ## Design Principles
//!
//! 1. **Rich types** - Use domain types, not primitives
//! 2. **Option for optional** - Use `Option<T>` instead of nullable JSON
//! 3. **Enums for variants** - Use Rust enums, not string discriminators

mod command;
mod event;
mod types;

pub use command::ClientCommand;
pub use event::{CommandErrorCode, ServerEvent};
pub use types::{
    CaptureMetrics, ExpiryReason, FingerName, ScanStatus, SessionId, StatusSnapshot,
};
