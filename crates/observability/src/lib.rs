//! # chatrelay-observability
//!
//! Structured Logging via tracing-subscriber (Text oder JSON).

pub mod logging;

pub use logging::{logging_initialisieren, LogEinstellungen, LogFormat, LoggingFehler};
