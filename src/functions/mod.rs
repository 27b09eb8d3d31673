//! # Built-in Softcode Functions
//!
//! The function registry and the shared plumbing every category module uses:
//! permissive numeric parsing, list splitting, target/attribute resolution,
//! and the user-function invocation engine.
//!
//! ## Categories
//!
//! - **[arithmetic]** - add, sub, mul, div, mod, rounding, rand, lnum
//! - **[logic]** - boolean ops, comparisons, if/ifelse, type predicates
//! - **[strings]** - case, slicing, justification, edit/merge, encodings
//! - **[lists]** - word lists, extraction, sets, sorting
//! - **[iteration]** - iter/list/parse and the attribute-driven loop family
//! - **[control]** - registers, let/localize, u/ulocal, switch/case, stack
//! - **[objects]** - the object graph surface plus side effects
//! - **[matching]** - wildcard and regex matching, grep
//! - **[misc]** - identity, time, vectors, grid, host queries
//! - **[structure_fns]** - the typed record system
//!
//! Each category module exposes `register`, which installs its functions
//! into the shared table.

use crate::attr;
use crate::db::{Db, Dbref, AMBIGUOUS, NOTHING};
use crate::error::ERR_NOT_FOUND;
use crate::eval::{exec, EvalContext, EV_FCHECK, EV_FMAND, EV_INHERIT, EV_STRIP};
use std::collections::HashMap;

pub mod arithmetic;
pub mod control;
pub mod iteration;
pub mod lists;
pub mod logic;
pub mod matching;
pub mod misc;
pub mod objects;
pub mod strings;
pub mod structure_fns;

// ============================================================================
// Registry Types
// ============================================================================

/// Uniform handler shape: context, evaluated-or-raw arguments, output sink.
/// Caller and enactor ride on the context. Handlers report argument errors
/// as in-band `#-1` tokens and never bypass the evaluator for output.
pub type Handler = fn(&mut EvalContext, &[String], &mut String);

pub const FN_VARARGS: u32 = 1 << 0;
pub const FN_NO_EVAL: u32 = 1 << 1;
/// Reserved.
pub const FN_PRIV: u32 = 1 << 2;
/// Reserved.
pub const FN_NO_REGS: u32 = 1 << 3;
/// Registers preserved across the call.
pub const FN_PRES: u32 = 1 << 4;

#[derive(Clone, Copy)]
pub struct FnRecord {
    pub handler: Handler,
    pub nargs: i32,
    pub flags: u32,
}

pub type FuncMap = HashMap<String, FnRecord>;

/// A user-defined function installed by the host's @function machinery.
#[derive(Clone, Copy, Debug)]
pub struct UserFn {
    pub obj: Dbref,
    pub attr: i32,
    pub flags: u32,
}

pub const UFN_PRIV: u32 = 1 << 0;
pub const UFN_PRES: u32 = 1 << 1;

pub type UserFnMap = HashMap<String, UserFn>;

macro_rules! fun {
    ($map:expr, $name:literal, $handler:path, $nargs:expr) => {
        fun!($map, $name, $handler, $nargs, 0)
    };
    ($map:expr, $name:literal, $handler:path, $nargs:expr, $flags:expr) => {
        $map.insert(
            $name.to_string(),
            crate::functions::FnRecord {
                handler: $handler,
                nargs: $nargs,
                flags: $flags,
            },
        )
    };
}
pub(crate) use fun;

/// Build the complete built-in function table.
pub fn builtin_table() -> FuncMap {
    let mut map = FuncMap::new();
    arithmetic::register(&mut map);
    logic::register(&mut map);
    strings::register(&mut map);
    lists::register(&mut map);
    iteration::register(&mut map);
    control::register(&mut map);
    objects::register(&mut map);
    matching::register(&mut map);
    misc::register(&mut map);
    structure_fns::register(&mut map);
    map
}

// ============================================================================
// Numeric Parsing (permissive by contract)
// ============================================================================

/// C atoi semantics: optional sign, leading digits, stop at the first
/// non-digit, zero on empty. Attribute text commonly carries trailing prose.
pub fn atoi(s: &str) -> i64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut negative = false;
    if i < bytes.len() && (bytes[i] == b'-' || bytes[i] == b'+') {
        negative = bytes[i] == b'-';
        i += 1;
    }
    let mut value: i64 = 0;
    let mut any = false;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        any = true;
        value = value
            .saturating_mul(10)
            .saturating_add((bytes[i] - b'0') as i64);
        i += 1;
    }
    if !any {
        return 0;
    }
    if negative {
        -value
    } else {
        value
    }
}

/// Permissive float prefix parse: sign, digits, optional fraction.
pub fn atof(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'-' || bytes[end] == b'+') {
        end += 1;
    }
    let mut seen_digit = false;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        seen_digit = true;
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        let mut frac = end + 1;
        while frac < bytes.len() && bytes[frac].is_ascii_digit() {
            seen_digit = true;
            frac += 1;
        }
        if frac > end + 1 {
            end = frac;
        }
    }
    if !seen_digit {
        return 0.0;
    }
    s[..end].parse().unwrap_or(0.0)
}

/// Format a float the way softcode expects: integral values drop the point,
/// everything else keeps up to six places with trailing zeros trimmed.
pub fn fmt_float(value: f64) -> String {
    if !value.is_finite() {
        return crate::error::ERR_INVALID_ARGUMENT.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let mut s = format!("{:.6}", value);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

/// Softcode truth: empty is false, numbers are their non-zero-ness, error
/// tokens are false, other text is true.
pub fn is_true(s: &str) -> bool {
    let t = s.trim();
    if t.is_empty() {
        return false;
    }
    if t.starts_with("#-") {
        return false;
    }
    let bytes = t.as_bytes();
    let numberish = bytes
        .iter()
        .all(|b| b.is_ascii_digit() || *b == b'-' || *b == b'+' || *b == b'.');
    if numberish {
        return atof(t) != 0.0;
    }
    true
}

pub fn bool01(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

// ============================================================================
// List Plumbing
// ============================================================================

/// Split a list on its delimiter. The default space delimiter collapses
/// whitespace runs; an explicit delimiter splits on every occurrence.
pub fn list_words(list: &str, sep: &str) -> Vec<String> {
    if sep == " " || sep.is_empty() {
        list.split_whitespace().map(|w| w.to_string()).collect()
    } else {
        if list.is_empty() {
            return Vec::new();
        }
        list.split(sep).map(|w| w.to_string()).collect()
    }
}

/// Delimiter argument at `idx`, defaulting to a space.
pub fn sep_arg(args: &[String], idx: usize) -> String {
    match args.get(idx) {
        Some(s) if !s.is_empty() => s.clone(),
        _ => " ".to_string(),
    }
}

/// Output delimiter at `idx`; defaults to the input delimiter.
pub fn osep_arg(args: &[String], idx: usize, default: &str) -> String {
    match args.get(idx) {
        Some(s) => s.clone(),
        None => default.to_string(),
    }
}

// ============================================================================
// Recursive Evaluation Helpers
// ============================================================================

/// Evaluate raw text the way the dispatcher evaluates arguments.
pub fn eval_sub(ctx: &mut EvalContext, raw: &str) -> String {
    let mut out = String::new();
    eval_sub_into(ctx, &mut out, raw);
    out
}

pub fn eval_sub_into(ctx: &mut EvalContext, out: &mut String, raw: &str) {
    let flags = (ctx.cur_flags & (EV_INHERIT | EV_FMAND)) | EV_FCHECK | EV_STRIP;
    exec(ctx, out, raw, flags, None);
}

// ============================================================================
// Reference Resolution
// ============================================================================

fn name_matches(db: &Db, dbref: Dbref, target: &str) -> bool {
    match db.get(dbref) {
        Some(obj) => {
            obj.display_name().eq_ignore_ascii_case(target)
                || obj.aliases().any(|a| a.eq_ignore_ascii_case(target))
        }
        None => false,
    }
}

/// Resolve an object specifier: me, here, #N, *player, player name, or a
/// nearby name match (inventory, then the location's contents and exits).
pub fn match_thing(ctx: &EvalContext, name: &str) -> Dbref {
    let name = name.trim();
    if name.is_empty() {
        return NOTHING;
    }
    if name.eq_ignore_ascii_case("me") {
        return ctx.executor;
    }
    if name.eq_ignore_ascii_case("here") {
        return ctx
            .db
            .get(ctx.executor)
            .map(|o| o.location)
            .unwrap_or(NOTHING);
    }
    if let Some(rest) = name.strip_prefix('#') {
        let dbref = atoi(rest) as Dbref;
        return if ctx.db.exists(dbref) { dbref } else { NOTHING };
    }
    if let Some(player) = name.strip_prefix('*') {
        return ctx.db.find_player(player);
    }
    let mut hits: Vec<Dbref> = Vec::new();
    let inventory = ctx
        .db
        .get(ctx.executor)
        .map(|o| o.contents)
        .unwrap_or(NOTHING);
    let location = ctx
        .db
        .get(ctx.executor)
        .map(|o| o.location)
        .unwrap_or(NOTHING);
    let mut candidates = ctx.db.chain(inventory);
    if let Some(room) = ctx.db.get(location) {
        candidates.extend(ctx.db.chain(room.contents));
        candidates.extend(ctx.db.chain(room.exits));
    }
    for dbref in candidates {
        if name_matches(ctx.db, dbref, name) && !hits.contains(&dbref) {
            hits.push(dbref);
        }
    }
    match hits.len() {
        0 => ctx.db.find_player(name),
        1 => hits[0],
        _ => AMBIGUOUS,
    }
}

/// Split an `obj/attr` specifier. Without a slash the executor holds the
/// attribute.
pub fn parse_objattr(ctx: &EvalContext, spec: &str) -> (Dbref, String) {
    match spec.split_once('/') {
        Some((obj, attr_name)) => (match_thing(ctx, obj), attr_name.trim().to_uppercase()),
        None => (ctx.executor, spec.trim().to_uppercase()),
    }
}

// ============================================================================
// User-Function Invocation
// ============================================================================

/// Fetch the text behind an `obj/attr` specifier with the executor's read
/// permission, or None when the target is bad.
pub fn fetch_ufun_text(ctx: &EvalContext, spec: &str) -> Option<String> {
    let (obj, attr_name) = parse_objattr(ctx, spec);
    if !ctx.db.exists(obj) {
        return None;
    }
    let num = ctx.db.attr_number(&attr_name)?;
    Some(attr::attr_text(ctx.db, ctx.host, ctx.executor, obj, num))
}

/// The shared engine behind u()/ulocal() and the attribute-driven iteration
/// family. `swap_executor` is the u() contract (the callback runs as the
/// attribute's object); iteration callbacks leave it false and run as the
/// caller. `preserve` snapshots and restores the register file.
pub fn ufun_call(
    ctx: &mut EvalContext,
    out: &mut String,
    spec: &str,
    args: &[String],
    swap_executor: bool,
    preserve: bool,
) {
    let (obj, attr_name) = parse_objattr(ctx, spec);
    if obj == NOTHING || obj == AMBIGUOUS || !ctx.db.exists(obj) {
        out.push_str(ERR_NOT_FOUND);
        return;
    }
    let text = match ctx.db.attr_number(&attr_name) {
        Some(num) => attr::attr_text(ctx.db, ctx.host, ctx.executor, obj, num),
        None => return,
    };
    if text.is_empty() {
        return;
    }
    let saved_regs = if preserve { Some(ctx.regs.clone()) } else { None };
    let saved_executor = ctx.executor;
    let saved_caller = ctx.caller;
    if swap_executor {
        ctx.caller = ctx.executor;
        ctx.executor = obj;
    }
    let flags = (ctx.cur_flags & EV_INHERIT) | EV_FCHECK | EV_FMAND;
    exec(ctx, out, &text, flags, Some(args));
    ctx.executor = saved_executor;
    ctx.caller = saved_caller;
    if let Some(regs) = saved_regs {
        ctx.regs = regs;
    }
}

/// Evaluate a ufun into a fresh buffer and return it.
pub fn ufun_result(
    ctx: &mut EvalContext,
    spec: &str,
    args: &[String],
    swap_executor: bool,
) -> String {
    let mut out = String::new();
    ufun_call(ctx, &mut out, spec, args, swap_executor, false);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atoi_permissive() {
        assert_eq!(atoi("12abc"), 12);
        assert_eq!(atoi("  -4 hats"), -4);
        assert_eq!(atoi("+7"), 7);
        assert_eq!(atoi("abc"), 0);
        assert_eq!(atoi(""), 0);
    }

    #[test]
    fn test_atof_permissive() {
        assert_eq!(atof("12.5abc"), 12.5);
        assert_eq!(atof("-0.25xyz"), -0.25);
        assert_eq!(atof("3"), 3.0);
        assert_eq!(atof("junk"), 0.0);
    }

    #[test]
    fn test_fmt_float() {
        assert_eq!(fmt_float(6.0), "6");
        assert_eq!(fmt_float(2.5), "2.5");
        assert_eq!(fmt_float(1.0 / 3.0), "0.333333");
        assert_eq!(fmt_float(-0.0), "0");
    }

    #[test]
    fn test_is_true() {
        assert!(!is_true(""));
        assert!(!is_true("0"));
        assert!(!is_true("0.0"));
        assert!(!is_true("#-1 NOT FOUND"));
        assert!(is_true("1"));
        assert!(is_true("-2"));
        assert!(is_true("yes"));
    }

    #[test]
    fn test_list_words_default_sep_collapses() {
        assert_eq!(list_words("a  b   c", " "), vec!["a", "b", "c"]);
        assert_eq!(list_words("", " "), Vec::<String>::new());
    }

    #[test]
    fn test_list_words_explicit_sep() {
        assert_eq!(list_words("a||b", "|"), vec!["a", "", "b"]);
        assert_eq!(list_words("", "|"), Vec::<String>::new());
    }
}
