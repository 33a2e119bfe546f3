//! Response tinkering library for an intercepting HTTP proxy.
//!
//! Operators register script handlers against URL routes. When the host
//! proxy relays a response whose originating request matches a route, the
//! handler's `do_<METHOD>` entry point may rewrite status, headers and body
//! before the response reaches the client.

// Core subsystems
pub mod http;
pub mod interception;
pub mod routing;
pub mod script;

// Cross-cutting concerns
pub mod config;
pub mod observability;

pub use config::TinkerConfig;
pub use interception::{
    CorrelationKey, EngineContext, ExchangeOutcome, InterceptedMessage, InterceptionEngine,
    PassthroughReason, ProxyListener,
};
pub use routing::{RegistrationError, RouteIdentity, RouteTable};
