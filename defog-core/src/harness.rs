//! Evaluation harness: assemble a self-contained program from the
//! initializer blocks, the extracted helper definitions and one driver line
//! per pure call site, then run it in the sandbox and collect results.
//!
//! The assembled program has three sections, in order:
//!
//! 1. preamble - the results map, the call log and the `__safeCall` wrapper;
//! 2. context body - initializer blocks verbatim, then helper definitions
//!    in resolver order (forward references are permitted);
//! 3. driver - `__safeCall(name, [args...], "key");` per pure call.

use crate::ast::Literal;
use crate::classify::Helpers;
use crate::config::Config;
use crate::deps::Resolution;
use crate::extract::Extraction;
use crate::printer;
use crate::sandbox::{self, Limits, SandboxStatus, Value};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::Serialize;

/// A captured evaluation result of representable kind.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    Undefined,
    /// The helper returned something no literal can encode (object, array,
    /// function, NaN, infinity). Defensive: such calls are omitted from
    /// the result map before the rewriter ever sees them.
    Unrepresentable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvalStatus {
    Ok,
    /// Nothing to evaluate (no pure calls, or call processing disabled).
    Skipped,
    Timeout,
    Fatal(String),
}

/// One line of the call trace, mirroring the JSON side channel shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub call: String,
    pub args: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: f64,
}

#[derive(Debug)]
pub struct EvalOutcome {
    pub status: EvalStatus,
    /// Result map: printed call form -> captured value. Unrepresentable
    /// results are dropped here, not stored.
    pub results: IndexMap<String, CapturedValue>,
    pub call_log: Vec<CallRecord>,
}

impl Default for EvalOutcome {
    fn default() -> Self {
        EvalOutcome::with_status(EvalStatus::Skipped)
    }
}

impl EvalOutcome {
    fn with_status(status: EvalStatus) -> Self {
        EvalOutcome {
            status,
            results: IndexMap::new(),
            call_log: Vec::new(),
        }
    }
}

/// Build the evaluator program text.
pub fn assemble_program(
    helpers: &Helpers,
    extraction: &Extraction,
    resolution: &Resolution,
) -> String {
    let mut out = String::new();

    // Preamble
    out.push_str("var __results = {};\n");
    out.push_str("var __calls = [];\n");
    out.push_str("function __safeCall(f, args, key) {\n");
    out.push_str("  var start = Date.now();\n");
    out.push_str("  try {\n");
    out.push_str("    var value = f.apply(null, args);\n");
    out.push_str("    __results[key] = value;\n");
    out.push_str(
        "    __calls.push({ call: key, args: args, result: value, elapsedMs: Date.now() - start });\n",
    );
    out.push_str("  } catch (e) {\n");
    out.push_str(
        "    __calls.push({ call: key, args: args, error: \"\" + e, elapsedMs: Date.now() - start });\n",
    );
    out.push_str("  }\n");
    out.push_str("}\n");

    // Context body: initializer blocks first, emitted verbatim
    for block in &extraction.init_blocks {
        out.push_str(&printer::print_statement(block));
        out.push('\n');
    }

    // Helper definitions in resolver order; the language allows forward
    // references, so any linearization of a cycle is fine
    for name in &resolution.extracted {
        if let Some(def) = helpers.get(name) {
            out.push_str(&printer::print_statement(&def.def_stmt));
            out.push('\n');
        }
    }

    // Driver
    for site in extraction.pure_calls.values() {
        let args: Vec<String> = site.args.iter().map(printer::print_literal).collect();
        out.push_str(&format!(
            "__safeCall({}, [{}], {});\n",
            site.name,
            args.join(", "),
            printer::print_literal(&Literal::String(site.key.clone()))
        ));
    }

    out
}

/// Assemble, evaluate and capture. On sandbox failure the result map is
/// empty and the pipeline proceeds as a no-op rewrite.
pub fn evaluate(
    helpers: &Helpers,
    extraction: &Extraction,
    resolution: &Resolution,
    config: &Config,
) -> EvalOutcome {
    if extraction.pure_calls.is_empty() {
        debug!("no pure call sites; skipping evaluation");
        return EvalOutcome::with_status(EvalStatus::Skipped);
    }

    let program = assemble_program(helpers, extraction, resolution);
    if config.debug {
        debug!("assembled evaluator program:\n{}", program);
    }
    if config.trace_lines {
        for site in extraction.pure_calls.values() {
            log::trace!("driver line: {} <- {:?}", site.name, site.key);
        }
    }

    let limits = Limits {
        timeout: config.eval_timeout,
        ..Limits::default()
    };
    let run = sandbox::evaluate(&program, &limits);

    let mut outcome = match run.status {
        SandboxStatus::Ok => EvalOutcome::with_status(EvalStatus::Ok),
        SandboxStatus::Timeout => {
            warn!("sandbox evaluation timed out; emitting source unchanged");
            return EvalOutcome::with_status(EvalStatus::Timeout);
        }
        SandboxStatus::Fatal(message) => {
            warn!("sandbox evaluation failed: {}; emitting source unchanged", message);
            return EvalOutcome::with_status(EvalStatus::Fatal(message));
        }
    };

    for (key, value) in &run.results {
        match capture(value) {
            CapturedValue::Unrepresentable => {
                debug!("result for {} is not representable; dropping", key);
            }
            captured => {
                outcome.results.insert(key.clone(), captured);
            }
        }
    }

    outcome.call_log = run.calls.iter().map(call_record).collect();
    debug!(
        "evaluation captured {} of {} call(s)",
        outcome.results.len(),
        extraction.pure_calls.len()
    );
    outcome
}

/// Map a sandbox value onto a representable result kind.
fn capture(value: &Value) -> CapturedValue {
    match value {
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 9e18 => {
            CapturedValue::Int(*n as i64)
        }
        Value::Number(n) if n.is_finite() => CapturedValue::Float(*n),
        Value::Number(_) => CapturedValue::Unrepresentable,
        Value::Str(s) => CapturedValue::Str(s.clone()),
        Value::Bool(b) => CapturedValue::Bool(*b),
        Value::Null => CapturedValue::Null,
        Value::Undefined => CapturedValue::Undefined,
        Value::Object(_) | Value::Array(_) | Value::Function(_) => CapturedValue::Unrepresentable,
    }
}

/// Decode one `__calls` entry written by the preamble.
fn call_record(entry: &Value) -> CallRecord {
    let get = |key: &str| -> Option<Value> {
        match entry {
            Value::Object(map) => map.borrow().get(key).cloned(),
            _ => None,
        }
    };

    CallRecord {
        call: get("call").map(|v| sandbox::to_js_string(&v)).unwrap_or_default(),
        args: get("args")
            .map(|v| sandbox::value_to_json(&v))
            .unwrap_or(serde_json::Value::Null),
        result: get("result").map(|v| sandbox::value_to_json(&v)),
        error: get("error").map(|v| sandbox::to_js_string(&v)),
        elapsed_ms: get("elapsedMs").map(|v| sandbox::to_number(&v)).unwrap_or(0.0),
    }
}
