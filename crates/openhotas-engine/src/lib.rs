//! OpenHotas fusion engine
//!
//! Fuses events from several physical HOTAS controllers (stick, throttle,
//! rudder) into one stable virtual Xbox-360-compatible game controller via
//! uinput. The engine is single-threaded and event-driven: one `poll(2)`
//! loop multiplexes all source descriptors, every decoded input event runs
//! through the binding resolver, and each non-empty batch of virtual events
//! is closed by exactly one sync marker.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod daemon;
pub mod error;
pub mod output;
pub mod resolver;
pub mod source;

pub use config::{Config, ConfigError};
pub use daemon::Daemon;
pub use error::{EngineError, EngineResult};
pub use output::VirtualOutput;
pub use resolver::{BindingResolver, BindingTable};
pub use source::{InputSource, ReadOutcome};
