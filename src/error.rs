// ABOUTME: Error types for flatfile loading plus the in-band softcode error tokens

use thiserror::Error;

// ===== In-band error tokens (part of the compatibility contract) =====
//
// These are user-visible output, written in place of a function's result.
// Evaluation always continues past them.

pub const ERR_RECURSION_LIMIT: &str = "#-1 FUNCTION RECURSION LIMIT EXCEEDED";
pub const ERR_INVOCATION_LIMIT: &str = "#-1 FUNCTION INVOCATION LIMIT EXCEEDED";
pub const ERR_DIVIDE_BY_ZERO: &str = "#-1 DIVIDE BY ZERO";
pub const ERR_SQRT_NEGATIVE: &str = "#-1 SQUARE ROOT OF NEGATIVE";
pub const ERR_INVALID_GRID: &str = "#-1 INVALID GRID LOCATION";
pub const ERR_INVALID_ARGUMENT: &str = "#-1 INVALID ARGUMENT";
pub const ERR_NOT_FOUND: &str = "#-1 NOT FOUND";
pub const ERR_AMBIGUOUS: &str = "#-2 AMBIGUOUS";
pub const ERR_PERMISSION_DENIED: &str = "#-1 PERMISSION DENIED";
pub const ERR_STRING_LENGTHS: &str = "#-1 STRING LENGTHS MUST BE EQUAL";
pub const ERR_VECTOR_DIMENSIONS: &str = "#-1 VECTORS MUST BE SAME DIMENSIONS";

/// Token for an unresolvable function name under mandatory lookup.
pub fn err_function_not_found(name: &str) -> String {
    format!("#-1 FUNCTION ({}) NOT FOUND", name)
}

/// Token for an arity mismatch. The declared count is printed as its
/// absolute value, matching the historical output.
pub fn err_function_arity(name: &str, expected: i32, got: usize) -> String {
    format!(
        "#-1 FUNCTION ({}) EXPECTS {} ARGUMENTS BUT GOT {}",
        name,
        expected.abs(),
        got
    )
}

// ===== Fatal errors (structural corruption found while loading) =====

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("line {line}: bad lock expression: {message}")]
    Boolexp { line: usize, message: String },

    #[error("unrecognized version header: {0}")]
    BadVersion(String),

    #[error("dump ended without ***END OF DUMP*** terminator")]
    MissingTerminator,
}

impl LoadError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        LoadError::Parse {
            line,
            message: message.into(),
        }
    }
}
