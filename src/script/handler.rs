//! A compiled handler bound to its route.

use std::collections::BTreeSet;
use std::fmt;

use crate::http::{ParsedRequest, ParsedResponse};
use crate::routing::RouteIdentity;
use crate::script::{CompileError, CompiledUnit, InvokeError, ScriptEngine};

/// Operator logic registered for one route identity.
///
/// Handlers are never edited in place: re-registering a route builds a new
/// `Handler` and the table drops the old one.
pub struct Handler {
    identity: RouteIdentity,
    source: String,
    unit: Box<dyn CompiledUnit>,
}

impl Handler {
    pub fn compile(
        engine: &dyn ScriptEngine,
        identity: RouteIdentity,
        source: impl Into<String>,
    ) -> Result<Self, CompileError> {
        let source = source.into();
        let unit = engine.compile(&source)?;
        Ok(Self {
            identity,
            source,
            unit,
        })
    }

    pub fn identity(&self) -> &RouteIdentity {
        &self.identity
    }

    /// The source text exactly as registered.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn methods(&self) -> &BTreeSet<String> {
        self.unit.methods()
    }

    pub fn handles(&self, method: &str) -> bool {
        self.unit.supports(method)
    }

    pub fn invoke(
        &self,
        method: &str,
        request: &ParsedRequest,
        response: &mut ParsedResponse,
    ) -> Result<(), InvokeError> {
        if !self.handles(method) {
            return Err(InvokeError::NotSupported(method.to_string()));
        }
        self.unit.invoke(method, request, response)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("identity", &self.identity.to_string())
            .field("methods", self.methods())
            .finish()
    }
}
