//! Rhai-backed handler compiler.
//!
//! Handler source is a Rhai script defining `do_<METHOD>(req, rsp)`
//! functions. `req` is a read-only object map; `rsp` is a host object whose
//! `status`, `headers` and `body` can be read and assigned either as
//! properties (`rsp.status = 202`) or by string index (`rsp["status"]`).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use rhai::{
    Array, Blob, CallFnOptions, Dynamic, Engine, EvalAltResult, ImmutableString, Map, Position,
    Scope, AST, INT,
};

use crate::config::ScriptConfig;
use crate::http::{ParsedRequest, ParsedResponse};
use crate::script::{CompileError, CompiledUnit, InvokeError, ScriptEngine, ENTRY_POINT_PREFIX};

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

/// Compiles handler source with a shared Rhai [`Engine`].
pub struct RhaiScriptEngine {
    engine: Arc<Engine>,
}

impl RhaiScriptEngine {
    pub fn new(config: &ScriptConfig) -> Self {
        let mut engine = Engine::new();
        engine.set_strict_variables(config.strict_variables);
        engine.on_print(|text| tracing::info!(target: "script", "{}", text));
        engine.on_debug(|text, source, pos| {
            tracing::debug!(target: "script", source = source.unwrap_or(""), position = %pos, "{}", text)
        });
        register_response_type(&mut engine);

        Self {
            engine: Arc::new(engine),
        }
    }
}

impl Default for RhaiScriptEngine {
    fn default() -> Self {
        Self::new(&ScriptConfig::default())
    }
}

impl ScriptEngine for RhaiScriptEngine {
    fn name(&self) -> &'static str {
        "rhai"
    }

    fn compile(&self, source: &str) -> Result<Box<dyn CompiledUnit>, CompileError> {
        let ast = self.engine.compile(source).map_err(|err| CompileError {
            message: err.to_string(),
            trace: describe_position(err.position()),
        })?;

        // Top-level statements run once, so load-time failures surface here.
        self.engine.run_ast(&ast).map_err(|err| CompileError {
            message: err.to_string(),
            trace: describe_position(err.position()),
        })?;

        let methods = ast
            .iter_functions()
            .filter(|f| f.params.len() == 2)
            .filter_map(|f| f.name.strip_prefix(ENTRY_POINT_PREFIX))
            .filter(|method| !method.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Box::new(RhaiUnit {
            engine: Arc::clone(&self.engine),
            ast,
            methods,
        }))
    }
}

struct RhaiUnit {
    engine: Arc<Engine>,
    ast: AST,
    methods: BTreeSet<String>,
}

impl fmt::Debug for RhaiUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RhaiUnit")
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

impl CompiledUnit for RhaiUnit {
    fn methods(&self) -> &BTreeSet<String> {
        &self.methods
    }

    fn invoke(
        &self,
        method: &str,
        request: &ParsedRequest,
        response: &mut ParsedResponse,
    ) -> Result<(), InvokeError> {
        if !self.methods.contains(method) {
            return Err(InvokeError::NotSupported(method.to_string()));
        }

        let rsp = ScriptResponse::from_parsed(response);
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        let mut scope = Scope::new();

        let _returned = self
            .engine
            .call_fn_with_options::<Dynamic>(
                options,
                &mut scope,
                &self.ast,
                format!("{ENTRY_POINT_PREFIX}{method}"),
                (request_map(request), rsp.clone()),
            )
            .map_err(|err| InvokeError::Runtime {
                message: err.to_string(),
                trace: describe_position(err.position()),
            })?;

        rsp.apply_to(response);
        Ok(())
    }
}

fn describe_position(pos: Position) -> Option<String> {
    if pos.is_none() {
        None
    } else {
        Some(pos.to_string())
    }
}

fn request_map(request: &ParsedRequest) -> Map {
    let mut map = Map::new();
    map.insert("method".into(), Dynamic::from(request.method.clone()));
    map.insert("url".into(), Dynamic::from(request.url.clone()));
    map.insert("version".into(), Dynamic::from(request.version.clone()));
    map.insert("body".into(), body_value(&request.body));
    map.insert("headers".into(), Dynamic::from_map(string_map(&request.headers)));
    map.insert("cookies".into(), Dynamic::from_map(string_map(&request.cookies())));
    map.insert(
        "parameters".into(),
        Dynamic::from_map(string_map(&request.query_and_form())),
    );
    map
}

fn string_map(source: &BTreeMap<String, String>) -> Map {
    source
        .iter()
        .map(|(k, v)| (k.as_str().into(), Dynamic::from(v.clone())))
        .collect()
}

/// Bodies are exposed as strings when they are valid UTF-8, as blobs otherwise.
fn body_value(body: &[u8]) -> Dynamic {
    match std::str::from_utf8(body) {
        Ok(text) => Dynamic::from(text.to_string()),
        Err(_) => Dynamic::from_blob(body.to_vec()),
    }
}

#[derive(Debug)]
struct ResponseFields {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

/// The `rsp` object handed to scripts.
///
/// Clones share one set of fields, so edits made through the copy Rhai
/// passes into the function are visible to the host afterwards.
#[derive(Debug, Clone)]
struct ScriptResponse(Arc<Mutex<ResponseFields>>);

impl ScriptResponse {
    fn from_parsed(response: &ParsedResponse) -> Self {
        Self(Arc::new(Mutex::new(ResponseFields {
            status: response.status,
            headers: response.headers.clone(),
            body: response.body.clone(),
        })))
    }

    fn apply_to(&self, response: &mut ParsedResponse) {
        let fields = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        response.status = fields.status;
        response.headers = fields.headers.clone();
        response.body = fields.body.clone();
    }

    fn get(&mut self, key: &str) -> ScriptResult<Dynamic> {
        let fields = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        match key {
            "status" => Ok(Dynamic::from(INT::from(fields.status))),
            "body" => Ok(body_value(&fields.body)),
            "headers" => {
                let pairs: Array = fields
                    .headers
                    .iter()
                    .map(|(name, value)| {
                        let pair: Array =
                            vec![Dynamic::from(name.clone()), Dynamic::from(value.clone())];
                        Dynamic::from_array(pair)
                    })
                    .collect();
                Ok(Dynamic::from_array(pairs))
            }
            other => Err(format!("response has no field '{other}'").into()),
        }
    }

    fn set(&mut self, key: &str, value: Dynamic) -> ScriptResult<()> {
        let mut fields = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        match key {
            "status" => fields.status = to_status(value)?,
            "body" => fields.body = to_body(value)?,
            "headers" => fields.headers = to_headers(value)?,
            other => return Err(format!("response has no field '{other}'").into()),
        }
        Ok(())
    }
}

fn to_status(value: Dynamic) -> ScriptResult<u16> {
    let code = match value.as_int() {
        Ok(code) => Some(code),
        Err(_) => value
            .clone()
            .into_immutable_string()
            .ok()
            .and_then(|s| s.trim().parse::<INT>().ok()),
    };
    match code {
        Some(code @ 100..=999) => Ok(code as u16),
        Some(code) => Err(format!("status code {code} out of range").into()),
        None => Err(format!("status must be an integer, got {}", value.type_name()).into()),
    }
}

fn to_body(value: Dynamic) -> ScriptResult<Vec<u8>> {
    if value.is_string() {
        let text = value.into_immutable_string()?;
        return Ok(text.as_bytes().to_vec());
    }
    let type_name = value.type_name();
    value
        .try_cast::<Blob>()
        .ok_or_else(|| format!("body must be a string or blob, got {type_name}").into())
}

fn to_headers(value: Dynamic) -> ScriptResult<Vec<(String, String)>> {
    let type_name = value.type_name();
    let entries = value
        .try_cast::<Array>()
        .ok_or_else(|| format!("headers must be an array of [name, value], got {type_name}"))?;

    entries
        .into_iter()
        .map(|entry| -> ScriptResult<(String, String)> {
            let pair = entry
                .try_cast::<Array>()
                .filter(|pair| pair.len() == 2)
                .ok_or("each header must be a [name, value] pair")?;
            let name = pair[0]
                .clone()
                .into_string()
                .map_err(|_| "header name must be a string")?;
            Ok((name, pair[1].to_string()))
        })
        .collect()
}

fn register_response_type(engine: &mut Engine) {
    engine.register_type_with_name::<ScriptResponse>("Response");

    for field in ["status", "headers", "body"] {
        engine.register_get_set(
            field,
            move |rsp: &mut ScriptResponse| rsp.get(field),
            move |rsp: &mut ScriptResponse, value: Dynamic| rsp.set(field, value),
        );
    }

    engine.register_indexer_get_set(
        |rsp: &mut ScriptResponse, key: ImmutableString| rsp.get(&key),
        |rsp: &mut ScriptResponse, key: ImmutableString, value: Dynamic| rsp.set(&key, value),
    );
}
