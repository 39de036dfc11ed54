//! whorl - enrollment session orchestrator for the fingerprint kiosk.
//!
//! One session at a time walks an ordered queue of fingers through a
//! hardware capture driver, streaming progress over a realtime channel.
//! Sessions survive brief disconnects, expire on privacy deadlines,
//! and leave no biometric data behind after any terminal state.

pub mod driver;
pub mod error;
pub mod events;
pub mod gateway;
pub mod grace;
pub mod registry;
pub mod runner;
pub mod telemetry;
pub mod watchdog;
pub mod web;

pub use driver::{Artifact, CaptureDriver, CaptureError, CaptureOutcome, CaptureProgress, NullDriver, ProgressSink};
pub use error::SessionError;
pub use events::{EventSink, RegistrySink};
pub use gateway::Gateway;
pub use registry::{ConnectionHandle, SessionRegistry, SessionState, SessionTiming};
