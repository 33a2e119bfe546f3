//! Handler scripting subsystem.
//!
//! # Data Flow
//! ```text
//! Registration:
//!     operator source text
//!     → ScriptEngine::compile (parse + run top-level once)
//!     → CompiledUnit (queryable do_<METHOD> entry points)
//!     → Handler { identity, source, unit } → RouteTable
//!
//! Exchange:
//!     Handler::invoke(method, &ParsedRequest, &mut ParsedResponse)
//!     → CompiledUnit runs do_<METHOD>(request, response)
//!     → edits land in ParsedResponse only on success
//! ```
//!
//! # Design Decisions
//! - The core only sees the two traits below; Rhai is one implementation
//! - Method support is an explicit query, not a dynamic lookup at call time
//! - Operator code runs in-process with full privilege (no sandbox)

pub mod handler;
pub mod rhai_engine;

use std::collections::BTreeSet;

use thiserror::Error;

use crate::http::{ParsedRequest, ParsedResponse};

pub use handler::Handler;
pub use rhai_engine::RhaiScriptEngine;

/// Prefix of every method entry point in handler source.
pub const ENTRY_POINT_PREFIX: &str = "do_";

/// Handler source failed to parse or to load.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
    /// Best-effort location of the failure.
    pub trace: Option<String>,
}

/// Failure while running an entry point.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvokeError {
    #[error("handler has no entry point do_{0}")]
    NotSupported(String),

    #[error("{message}")]
    Runtime {
        message: String,
        trace: Option<String>,
    },
}

impl InvokeError {
    pub fn trace(&self) -> Option<&str> {
        match self {
            InvokeError::NotSupported(_) => None,
            InvokeError::Runtime { trace, .. } => trace.as_deref(),
        }
    }
}

/// Compiles handler source text into executable units.
pub trait ScriptEngine: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    fn compile(&self, source: &str) -> Result<Box<dyn CompiledUnit>, CompileError>;
}

/// Executable form of one handler's source.
pub trait CompiledUnit: Send + Sync + std::fmt::Debug {
    /// Method names `M` for which `do_M(request, response)` is defined.
    fn methods(&self) -> &BTreeSet<String>;

    /// Run `do_<method>`.
    ///
    /// On error `response` is left exactly as it was passed in.
    fn invoke(
        &self,
        method: &str,
        request: &ParsedRequest,
        response: &mut ParsedResponse,
    ) -> Result<(), InvokeError>;

    fn supports(&self, method: &str) -> bool {
        self.methods().contains(method)
    }
}
