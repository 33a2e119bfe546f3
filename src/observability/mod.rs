//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured logs)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → logging.rs subscriber (binary only)
//!     → whatever metrics recorder the host installs
//! ```
//!
//! # Design Decisions
//! - Correlation key and route are attached as fields, not baked into messages
//! - Handler failures log their script trace at error level

pub mod logging;
pub mod metrics;
