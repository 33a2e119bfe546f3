//! The two-phase interception engine.
//!
//! # Responsibilities
//! - Request phase: remember the request under its correlation key
//! - Response phase: correlate, route, run the handler, rebuild the bytes
//! - Contain every failure inside the exchange that caused it
//!
//! # Design Decisions
//! - Each exchange resolves synchronously on the thread that delivered it
//! - Handlers run with no table lock held and with no timeout
//! - The response is replaced only when a handler ran to completion

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::TinkerConfig;
use crate::http::{ParsedRequest, ParsedResponse};
use crate::interception::pending::{PendingRequest, PendingRequestStore};
use crate::interception::{ExchangeOutcome, InterceptedMessage, PassthroughReason, ProxyListener};
use crate::observability::metrics;
use crate::routing::RouteTable;
use crate::script::{InvokeError, RhaiScriptEngine, ScriptEngine};

/// Everything an engine is built from.
#[derive(Clone)]
pub struct EngineContext {
    pub config: TinkerConfig,
    pub scripts: Arc<dyn ScriptEngine>,
}

impl EngineContext {
    /// Context using the Rhai script engine configured from `config`.
    pub fn new(config: TinkerConfig) -> Self {
        let scripts = Arc::new(RhaiScriptEngine::new(&config.script));
        Self { config, scripts }
    }

    pub fn with_scripts(config: TinkerConfig, scripts: Arc<dyn ScriptEngine>) -> Self {
        Self { config, scripts }
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(TinkerConfig::default())
    }
}

/// Orchestrates the request/response cycle for every exchange.
pub struct InterceptionEngine {
    routes: Arc<RouteTable>,
    pending: PendingRequestStore,
    enabled: AtomicBool,
}

impl InterceptionEngine {
    pub fn new(context: &EngineContext) -> Self {
        let interception = &context.config.interception;
        Self {
            routes: Arc::new(RouteTable::new(Arc::clone(&context.scripts))),
            pending: PendingRequestStore::new(interception.pending_ttl()),
            enabled: AtomicBool::new(interception.enabled),
        }
    }

    /// The route table, shared with whoever registers handlers.
    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    pub fn pending(&self) -> &PendingRequestStore {
        &self.pending
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
        tracing::info!("Interception enabled");
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        tracing::info!("Interception disabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Request phase: store the request for its response to find.
    pub fn on_request(&self, message: &InterceptedMessage) {
        if !self.is_enabled() {
            return;
        }
        let previous = self.pending.insert(
            message.key,
            message.bytes.clone(),
            message.service.clone(),
        );
        if previous.is_some() {
            tracing::warn!(key = %message.key, "Correlation key reused before its response arrived");
        }
    }

    /// Response phase: possibly rewrite `message.bytes` in place.
    pub fn on_response(&self, message: &mut InterceptedMessage) -> ExchangeOutcome {
        let outcome = if self.is_enabled() {
            let span = tracing::debug_span!("exchange", key = %message.key);
            let _enter = span.enter();
            self.process_response(message)
        } else {
            ExchangeOutcome::Passthrough(PassthroughReason::Disabled)
        };
        metrics::record_exchange(outcome.label());
        outcome
    }

    fn process_response(&self, message: &mut InterceptedMessage) -> ExchangeOutcome {
        let Some(stored) = self.pending.take(message.key) else {
            tracing::warn!(key = %message.key, "Response with no matching request");
            return ExchangeOutcome::Passthrough(PassthroughReason::CorrelationMiss);
        };

        match self.rewrite(&stored, &message.bytes) {
            Ok(bytes) => {
                message.bytes = bytes;
                ExchangeOutcome::Handled
            }
            Err(reason) => ExchangeOutcome::Passthrough(reason),
        }
    }

    fn rewrite(&self, stored: &PendingRequest, raw_response: &[u8]) -> Result<Vec<u8>, PassthroughReason> {
        let mut response = ParsedResponse::parse(raw_response).map_err(|e| {
            tracing::warn!(error = %e, "Unparseable response");
            PassthroughReason::MalformedResponse
        })?;

        let request = ParsedRequest::parse(&stored.raw, &stored.service).map_err(|e| {
            tracing::warn!(error = %e, service = %stored.service, "Unparseable request");
            PassthroughReason::MalformedRequest
        })?;

        let handler = self
            .routes
            .lookup(&request.url)
            .ok_or(PassthroughReason::NoRoute)?;

        if !handler.handles(&request.method) {
            tracing::debug!(
                method = %request.method,
                route = %handler.identity(),
                "Route has no handler for method"
            );
            return Err(PassthroughReason::MethodNotHandled);
        }

        tracing::info!(
            method = %request.method,
            route = %handler.identity(),
            url = %request.url,
            "Handling response"
        );

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            handler.invoke(&request.method, &request, &mut response)
        }))
        .unwrap_or_else(|payload| {
            Err(InvokeError::Runtime {
                message: format!("handler panicked: {}", panic_message(payload.as_ref())),
                trace: None,
            })
        });

        if let Err(e) = result {
            tracing::error!(
                method = %request.method,
                route = %handler.identity(),
                error = %e,
                trace = e.trace().unwrap_or("unavailable"),
                "Handler failed; response passed through unmodified"
            );
            return Err(PassthroughReason::HandlerFailed);
        }

        Ok(response.to_bytes())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

impl ProxyListener for InterceptionEngine {
    fn process_proxy_message(&self, message_is_request: bool, message: &mut InterceptedMessage) {
        if message_is_request {
            self.on_request(message);
        } else {
            self.on_response(message);
        }
    }
}
