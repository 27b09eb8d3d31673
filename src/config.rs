// ABOUTME: Configuration and constants for the softcode evaluator
// This module contains version info, identity strings, and the numeric budgets
// that bound every evaluation.

pub const VERSION: &str = "1.0.0";
pub const WELCOME_MESSAGE: &str = "softmush v1.0";
pub const WELCOME_SUBTITLE: &str = "A TinyMUSH-family softcode evaluator in Rust";

/// Identity string reported by the version() softcode function.
pub const DEFAULT_VERSION_STRING: &str = "softmush 1.0.0";

/// Identity string reported by the mudname() softcode function.
pub const DEFAULT_MUD_NAME: &str = "softmush";

// ============================================================================
// Evaluation Budgets
// ============================================================================

/// Maximum function nesting depth for one evaluation.
pub const DEFAULT_FUNCTION_NEST_LIMIT: usize = 50;

/// Cumulative function invocation cap for one evaluation.
pub const DEFAULT_FUNCTION_INVOCATION_LIMIT: usize = 2500;

/// Iteration cap for the while()/until() loop helpers.
pub const LOOP_ITERATION_LIMIT: usize = 10_000;

/// Parent-chain walks stop silently past this depth.
pub const PARENT_DEPTH_LIMIT: usize = 10;

/// Contents and exits chains longer than this are treated as corrupt.
pub const CHAIN_LENGTH_LIMIT: usize = 50_000;

/// Attribute numbers at or above this belong to user-defined attributes.
pub const USER_ATTR_START: i32 = 256;

#[allow(dead_code)]
pub const HELP_TEXT: &str = r#"
Available commands:
  .quit                - Exit the REPL
  .help                - Show this help message
  .validate            - Run the softcode validator over the loaded database
  .executor <#dbref>   - Switch the executing object

Type any softcode expression to evaluate it. Use Ctrl-D or .quit to exit.
"#;
