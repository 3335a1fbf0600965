//! Error types for the deobfuscation pipeline.

use crate::ast::Span;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// The source (or the normalized source) could not be parsed.
    #[error("Parse error{}: {message}", span_suffix(.span))]
    Parse { message: String, span: Option<Span> },

    /// The sandbox rejected the assembled evaluator program.
    /// Non-fatal for the run: the caller emits the input unchanged.
    #[error("Assembly error: {0}")]
    Assembly(String),

    /// The sandbox exceeded its wall-clock budget.
    #[error("Sandbox timeout after {0:?}")]
    SandboxTimeout(std::time::Duration),

    /// The sandbox aborted (step budget, call depth, internal failure).
    #[error("Sandbox crash: {0}")]
    SandboxCrash(String),

    /// Failure writing the debug trace side channel.
    #[error("Trace output error: {0}")]
    Trace(#[from] std::io::Error),
}

fn span_suffix(span: &Option<Span>) -> String {
    match span {
        Some(s) => format!(" at {}", s),
        None => String::new(),
    }
}

/// Construct a [`CoreError::Parse`] without location information.
#[macro_export]
macro_rules! err_parse {
    ($($arg:tt)*) => {
        $crate::error::CoreError::Parse {
            message: format!($($arg)*),
            span: None,
        }
    };
}

/// Construct a [`CoreError::Parse`] carrying a span.
#[macro_export]
macro_rules! err_parse_at {
    ($span:expr, $($arg:tt)*) => {
        $crate::error::CoreError::Parse {
            message: format!($($arg)*),
            span: Some($span),
        }
    };
}

/// Return early with a parse error.
#[macro_export]
macro_rules! bail_parse {
    ($($arg:tt)*) => {
        return Err($crate::err_parse!($($arg)*))
    };
}

/// Return early with a spanned parse error.
#[macro_export]
macro_rules! bail_parse_at {
    ($span:expr, $($arg:tt)*) => {
        return Err($crate::err_parse_at!($span, $($arg)*))
    };
}
