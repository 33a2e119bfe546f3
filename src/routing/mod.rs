//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (operator):
//!     route text + handler source
//!     → identity.rs (literal URL or /BODY/FLAGS pattern)
//!     → script engine compiles handler
//!     → table.rs (append, replacing an equal identity)
//!
//! Lookup (per response):
//!     request URL (always with explicit port)
//!     → matcher.rs (URL + default-port variant)
//!     → table.rs (first registered handler that matches)
//!     → Return: Arc<Handler> or None
//! ```
//!
//! # Design Decisions
//! - Routes are mutable at runtime and live only in memory
//! - Deterministic: same table and URL always select the same handler
//! - First match wins (ordered by registration)

pub mod identity;
pub mod matcher;
pub mod table;

pub use identity::{RouteError, RouteIdentity};
pub use matcher::{Matcher, PatternFlags};
pub use table::{RegistrationError, RouteListing, RouteTable};
