//! Interception subsystem.
//!
//! # Data Flow
//! ```text
//! Host proxy (request observed)
//!     → engine.rs on_request
//!     → pending.rs (key → raw request + service)
//!
//! Host proxy (response observed)
//!     → engine.rs on_response
//!     → pending.rs (take by key)        miss → PASSTHROUGH
//!     → http (parse response, request)
//!     → routing (lookup by request URL) none → PASSTHROUGH
//!     → Handler do_<METHOD>             absent / failed → PASSTHROUGH
//!     → http (rebuild) → replacement bytes → HANDLED
//! ```
//!
//! # Design Decisions
//! - The engine owns no threads; the host's callback threads do the work
//! - The failure-containment unit is one request/response pair
//! - The engine can only replace response bytes, never the request

pub mod engine;
pub mod pending;

pub use engine::{EngineContext, InterceptionEngine};
pub use pending::{CorrelationKey, PendingRequest, PendingRequestStore};

use crate::http::HttpService;

/// A message delivered by the host proxy, in either phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedMessage {
    pub key: CorrelationKey,
    pub service: HttpService,
    /// Raw request bytes on the request phase, raw response bytes on the
    /// response phase. Replaced in place when a handler rewrites a response.
    pub bytes: Vec<u8>,
}

impl InterceptedMessage {
    pub fn new(key: CorrelationKey, service: HttpService, bytes: Vec<u8>) -> Self {
        Self { key, service, bytes }
    }
}

/// Callback surface the host proxy drives.
pub trait ProxyListener: Send + Sync {
    fn process_proxy_message(&self, message_is_request: bool, message: &mut InterceptedMessage);
}

/// How a response-phase event was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// A handler ran and the response bytes were replaced.
    Handled,
    /// The response was forwarded untouched.
    Passthrough(PassthroughReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughReason {
    Disabled,
    CorrelationMiss,
    MalformedResponse,
    MalformedRequest,
    NoRoute,
    MethodNotHandled,
    HandlerFailed,
}

impl ExchangeOutcome {
    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            ExchangeOutcome::Handled => "handled",
            ExchangeOutcome::Passthrough(reason) => match reason {
                PassthroughReason::Disabled => "disabled",
                PassthroughReason::CorrelationMiss => "correlation_miss",
                PassthroughReason::MalformedResponse => "malformed_response",
                PassthroughReason::MalformedRequest => "malformed_request",
                PassthroughReason::NoRoute => "no_route",
                PassthroughReason::MethodNotHandled => "method_not_handled",
                PassthroughReason::HandlerFailed => "handler_failed",
            },
        }
    }

    pub fn is_handled(&self) -> bool {
        matches!(self, ExchangeOutcome::Handled)
    }
}
