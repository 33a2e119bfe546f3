//! Route registration and lookup.
//!
//! # Responsibilities
//! - Compile and store one handler per route identity
//! - Replace a handler when its route is registered again
//! - Look up the handler for a request URL
//! - List registered routes for display
//!
//! # Design Decisions
//! - One mutex guards the whole table; reads and writes share it
//! - Handler source is compiled before the lock is taken
//! - Handlers are handed out as `Arc` so invocation happens after unlock
//! - Registration order is the tie-break: first match wins
//! - Re-registration removes the old entry and appends the new one

use std::slice;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::observability::metrics;
use crate::routing::identity::{RouteError, RouteIdentity};
use crate::routing::matcher::{url_candidates, Matcher};
use crate::script::{CompileError, Handler, ScriptEngine};

/// Why a route could not be registered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("invalid route: {0}")]
    Validation(#[from] RouteError),

    #[error("handler failed to compile: {0}")]
    Compile(#[from] CompileError),
}

/// Guarded, ordered collection of route handlers.
pub struct RouteTable {
    scripts: Arc<dyn ScriptEngine>,
    handlers: Mutex<Vec<Arc<Handler>>>,
}

impl RouteTable {
    pub fn new(scripts: Arc<dyn ScriptEngine>) -> Self {
        Self {
            scripts,
            handlers: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Handler>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Compile `source` and install it under `identity`, replacing any
    /// handler already registered there. On error the table is unchanged.
    pub fn register(
        &self,
        identity: RouteIdentity,
        source: &str,
    ) -> Result<Arc<Handler>, CompileError> {
        let handler = match Handler::compile(self.scripts.as_ref(), identity, source) {
            Ok(handler) => Arc::new(handler),
            Err(e) => {
                metrics::record_registration("compile_error");
                return Err(e);
            }
        };

        let (replaced, count) = {
            let mut handlers = self.lock();
            let before = handlers.len();
            handlers.retain(|h| h.identity() != handler.identity());
            let replaced = handlers.len() < before;
            handlers.push(Arc::clone(&handler));
            (replaced, handlers.len())
        };

        metrics::record_registration(if replaced { "replaced" } else { "added" });
        metrics::record_route_count(count);
        tracing::info!(
            route = %handler.identity(),
            engine = self.scripts.name(),
            methods = ?handler.methods(),
            replaced,
            "Route registered"
        );
        Ok(handler)
    }

    /// Parse operator route text, then [`register`](Self::register).
    pub fn register_route(
        &self,
        route: &str,
        source: &str,
    ) -> Result<Arc<Handler>, RegistrationError> {
        let identity = RouteIdentity::parse(route).inspect_err(|e| {
            metrics::record_registration("invalid_route");
            tracing::warn!(route, error = %e, "Rejected route");
        })?;
        Ok(self.register(identity, source)?)
    }

    /// Remove the handler registered under `identity`.
    /// Returns whether one was found.
    pub fn unregister(&self, identity: &RouteIdentity) -> bool {
        let (removed, count) = {
            let mut handlers = self.lock();
            let before = handlers.len();
            handlers.retain(|h| h.identity() != identity);
            (handlers.len() < before, handlers.len())
        };

        if removed {
            metrics::record_route_count(count);
            tracing::info!(route = %identity, "Route removed");
        }
        removed
    }

    /// Parse operator route text, then [`unregister`](Self::unregister).
    pub fn unregister_route(&self, route: &str) -> Result<bool, RegistrationError> {
        let identity = RouteIdentity::parse(route)?;
        Ok(self.unregister(&identity))
    }

    /// The first-registered handler matching `url` or its default-port form.
    pub fn lookup(&self, url: &str) -> Option<Arc<Handler>> {
        let candidates = url_candidates(url);
        let handlers = self.lock();
        handlers
            .iter()
            .find(|h| candidates.iter().any(|c| h.identity().matches(c)))
            .cloned()
    }

    /// The handler whose identity displays as `route`.
    pub fn get(&self, route: &str) -> Option<Arc<Handler>> {
        self.lock()
            .iter()
            .find(|h| h.identity().to_string() == route)
            .cloned()
    }

    /// Snapshot of the registered routes, in registration order.
    pub fn enumerate(&self) -> RouteListing {
        RouteListing {
            handlers: self.lock().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Route display strings captured at one point in time.
///
/// Strings are rendered lazily; iterate as many times as needed.
#[derive(Debug, Clone)]
pub struct RouteListing {
    handlers: Vec<Arc<Handler>>,
}

type DisplayFn = fn(&Arc<Handler>) -> String;

fn display(handler: &Arc<Handler>) -> String {
    handler.identity().to_string()
}

impl RouteListing {
    pub fn iter(&self) -> std::iter::Map<slice::Iter<'_, Arc<Handler>>, DisplayFn> {
        self.handlers.iter().map(display as DisplayFn)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<'a> IntoIterator for &'a RouteListing {
    type Item = String;
    type IntoIter = std::iter::Map<slice::Iter<'a, Arc<Handler>>, DisplayFn>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::RhaiScriptEngine;

    const SOURCE_A: &str = "fn do_GET(req, rsp) { rsp.body = \"a\"; }";
    const SOURCE_B: &str = "fn do_GET(req, rsp) { rsp.body = \"b\"; }";

    fn table() -> RouteTable {
        RouteTable::new(Arc::new(RhaiScriptEngine::default()))
    }

    #[test]
    fn test_register_and_lookup_literal() {
        let table = table();
        table.register_route("https://a.com/x", SOURCE_A).unwrap();
        table.register_route("https://b.com/y", SOURCE_B).unwrap();

        let found = table.lookup("https://a.com/x").unwrap();
        assert_eq!(found.source(), SOURCE_A);
        let found = table.lookup("https://b.com/y").unwrap();
        assert_eq!(found.source(), SOURCE_B);
        assert!(table.lookup("https://c.com/z").is_none());
    }

    #[test]
    fn test_default_port_normalization() {
        let table = table();
        table.register_route("https://example.com/path", SOURCE_A).unwrap();
        table.register_route("http://example.com/path", SOURCE_B).unwrap();

        assert_eq!(table.lookup("https://example.com:443/path").unwrap().source(), SOURCE_A);
        assert_eq!(table.lookup("http://example.com:80/path").unwrap().source(), SOURCE_B);
        assert!(table.lookup("https://example.com:8443/path").is_none());
    }

    #[test]
    fn test_first_registered_wins() {
        let table = table();
        table.register_route(r"/https://a\.com/.*/", SOURCE_A).unwrap();
        table.register_route("https://a.com/x", SOURCE_B).unwrap();

        assert_eq!(table.lookup("https://a.com/x").unwrap().source(), SOURCE_A);
    }

    #[test]
    fn test_reregister_replaces_and_moves_to_end() {
        let table = table();
        table.register_route("https://a.com/x", SOURCE_A).unwrap();
        table.register_route("/.*/", SOURCE_A).unwrap();
        table.register_route("https://a.com/x", SOURCE_B).unwrap();

        assert_eq!(table.len(), 2);
        let routes: Vec<String> = table.enumerate().iter().collect();
        assert_eq!(routes, vec!["/.*/", "https://a.com/x"]);
        assert_eq!(table.get("https://a.com/x").unwrap().source(), SOURCE_B);
    }

    #[test]
    fn test_failed_compile_leaves_table_unchanged() {
        let table = table();
        table.register_route("https://a.com/x", SOURCE_A).unwrap();

        let err = table.register_route("https://a.com/x", "fn do_GET( {").unwrap_err();
        assert!(matches!(err, RegistrationError::Compile(_)));
        assert_eq!(table.lookup("https://a.com/x").unwrap().source(), SOURCE_A);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_invalid_route_rejected() {
        let table = table();
        let err = table.register_route("/a/q", SOURCE_A).unwrap_err();
        assert_eq!(err, RegistrationError::Validation(RouteError::InvalidFlag('q')));
        assert!(table.is_empty());
    }

    #[test]
    fn test_unregister() {
        let table = table();
        table.register_route("/foo/i", SOURCE_A).unwrap();

        assert!(!table.unregister_route("/foo/").unwrap());
        assert!(table.unregister_route("/foo/i").unwrap());
        assert!(!table.unregister_route("/foo/i").unwrap());
        assert!(table.is_empty());
    }

    #[test]
    fn test_listing_is_restartable_snapshot() {
        let table = table();
        table.register_route("https://a.com/", SOURCE_A).unwrap();
        table.register_route("/foo/xi", SOURCE_A).unwrap();

        let listing = table.enumerate();
        table.register_route("https://later.com/", SOURCE_A).unwrap();

        let first: Vec<String> = listing.iter().collect();
        let second: Vec<String> = (&listing).into_iter().collect();
        assert_eq!(first, vec!["https://a.com/", "/foo/ix"]);
        assert_eq!(first, second);
        assert_eq!(listing.len(), 2);
    }
}
