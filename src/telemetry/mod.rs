//! Telemetry for vlanprobe.
//!
//! Only the binary installs a subscriber; library code just emits `tracing`
//! events and spans.
//!
//! ```rust,ignore
//! use vlanprobe::telemetry::{LogFormat, LoggingBuilder};
//!
//! LoggingBuilder::new()
//!     .with_verbosity(1)
//!     .with_format(LogFormat::Json)
//!     .init()?;
//! ```

pub mod logging;

pub use logging::{LogFormat, LogLevel, LoggingBuilder, LoggingConfig};
