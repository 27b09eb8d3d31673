// ABOUTME: Evaluator core - the recursive substitution loop over softcode text

use crate::ansi;
use crate::attr;
use crate::config::{
    DEFAULT_FUNCTION_INVOCATION_LIMIT, DEFAULT_FUNCTION_NEST_LIMIT, DEFAULT_MUD_NAME,
    DEFAULT_VERSION_STRING,
};
use crate::db::{fmt_dbref, Db, Dbref, A_SEX, A_VA, FLAG_TRACE, GOD};
use crate::error::{err_function_arity, err_function_not_found, ERR_INVOCATION_LIMIT,
    ERR_RECURSION_LIMIT};
use crate::functions::{
    self, FuncMap, UserFnMap, FN_NO_EVAL, FN_PRES, FN_VARARGS, UFN_PRES, UFN_PRIV,
};
use crate::host::{Host, Notification, NotifyKind};
use crate::registers::{LoopState, RegisterData};
use crate::scan::{scan_args, scan_to};

// ============================================================================
// Evaluation Flags
// ============================================================================

/// Function invocation is checked.
pub const EV_FCHECK: u32 = 1 << 0;
/// An unknown function is fatal (set inside bracket groups).
pub const EV_FMAND: u32 = 1 << 1;
/// Outer brace groups are stripped.
pub const EV_STRIP: u32 = 1 << 2;
/// Suppress space compression.
pub const EV_NO_COMPRESS: u32 = 1 << 3;
/// Keep leading/trailing spaces at the top level.
pub const EV_NO_TRIM: u32 = 1 << 4;
/// Backslash is an ordinary character.
pub const EV_NO_ESCAPE: u32 = 1 << 5;
/// Suppress tracing.
pub const EV_NOTRACE: u32 = 1 << 6;
/// Suppress location resolution for %l.
pub const EV_NO_LOCATION: u32 = 1 << 7;
/// Top-level call: trims, auto-closes ANSI, and reports traces.
pub const EV_TOP: u32 = 1 << 8;

/// The flag bits recursive calls inherit from their caller.
pub const EV_INHERIT: u32 =
    EV_NO_COMPRESS | EV_NO_TRIM | EV_NO_ESCAPE | EV_NOTRACE | EV_NO_LOCATION;

// ============================================================================
// Evaluation Context
// ============================================================================

/// Everything one evaluation owns: the graph handle, the host callbacks, the
/// executor/caller/enactor triple, registers, loop state, budgets, and the
/// pending side-effect notifications.
pub struct EvalContext<'a> {
    pub db: &'a mut Db,
    pub host: &'a dyn Host,
    pub executor: Dbref,
    pub caller: Dbref,
    pub enactor: Dbref,
    pub regs: RegisterData,
    pub loops: LoopState,
    pub func_nest: usize,
    pub func_invocations: usize,
    pub nest_limit: usize,
    pub invocation_limit: usize,
    pub curr_cmd: String,
    pub pipe: String,
    pub notifications: Vec<Notification>,
    pub space_compress: bool,
    pub ansi_enabled: bool,
    pub funcs: FuncMap,
    pub ufuncs: UserFnMap,
    pub version: String,
    pub mudname: String,
    pub cargs: Vec<String>,
    /// Object stack for push()/pop()/peek().
    pub stack: Vec<String>,
    /// Flags of the innermost dispatching exec call; handlers compose their
    /// recursive flags from this.
    pub cur_flags: u32,
    pub ansi_used: bool,
}

impl<'a> EvalContext<'a> {
    pub fn new(db: &'a mut Db, host: &'a dyn Host) -> EvalContext<'a> {
        EvalContext {
            db,
            host,
            executor: GOD,
            caller: GOD,
            enactor: GOD,
            regs: RegisterData::new(),
            loops: LoopState::new(),
            func_nest: 0,
            func_invocations: 0,
            nest_limit: DEFAULT_FUNCTION_NEST_LIMIT,
            invocation_limit: DEFAULT_FUNCTION_INVOCATION_LIMIT,
            curr_cmd: String::new(),
            pipe: String::new(),
            notifications: Vec::new(),
            space_compress: true,
            ansi_enabled: true,
            funcs: functions::builtin_table(),
            ufuncs: UserFnMap::new(),
            version: DEFAULT_VERSION_STRING.to_string(),
            mudname: DEFAULT_MUD_NAME.to_string(),
            cargs: Vec::new(),
            stack: Vec::new(),
            cur_flags: 0,
            ansi_used: false,
        }
    }

    /// Use `who` for executor, caller, and enactor alike.
    pub fn with_actor(mut self, who: Dbref) -> EvalContext<'a> {
        self.executor = who;
        self.caller = who;
        self.enactor = who;
        self
    }

    pub fn notify(&mut self, target: Dbref, kind: NotifyKind, message: String) {
        self.notifications.push(Notification {
            target,
            message,
            kind,
        });
    }

    /// Drain the queued notifications for delivery by the host.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }
}

/// Evaluate one top-level softcode string, resetting the per-call budgets.
pub fn eval_top(ctx: &mut EvalContext, input: &str) -> String {
    ctx.func_nest = 0;
    ctx.func_invocations = 0;
    let mut out = String::new();
    exec(ctx, &mut out, input, EV_FCHECK | EV_TOP, None);
    out
}

// ============================================================================
// The Core Loop
// ============================================================================

// The special set the mundane-run classifier tests against.
#[inline]
fn is_special(c: u8) -> bool {
    matches!(
        c,
        0 | 0x1b | b' ' | b'\\' | b'[' | b'{' | b'(' | b'%' | b'#'
    )
}

/// The recursive evaluator. Reads `input` once, left to right, appending to
/// `out`. When `cargs` is given, it replaces the context's %0-%9 vector for
/// the duration; a nil vector inherits the caller's.
pub fn exec(
    ctx: &mut EvalContext,
    out: &mut String,
    input: &str,
    flags: u32,
    cargs: Option<&[String]>,
) {
    let saved_cargs = cargs.map(|v| std::mem::replace(&mut ctx.cargs, v.to_vec()));
    if flags & EV_TOP != 0 {
        ctx.ansi_used = false;
    }

    let out_base = out.len();
    let bytes = input.as_bytes();
    let compress = ctx.space_compress && flags & EV_NO_COMPRESS == 0;
    let mut fcheck = flags & EV_FCHECK != 0;
    let mut at_space = false;
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i];
        if c == b' ' {
            if !compress || !at_space {
                out.push(' ');
            }
            at_space = true;
            i += 1;
            continue;
        }
        at_space = false;
        match c {
            0 => break,
            0x1b => {
                out.push('\x1b');
                i += 1;
            }
            b'\\' => {
                if flags & EV_NO_ESCAPE != 0 {
                    out.push('\\');
                    i += 1;
                } else {
                    i += 1;
                    if let Some(next) = input[i..].chars().next() {
                        out.push(next);
                        i += next.len_utf8();
                    }
                }
            }
            b'[' => {
                let res = scan_to(&input[i + 1..], b']');
                if !res.found {
                    out.push('[');
                    i += 1;
                } else {
                    let content = res.content;
                    let after = i + 1 + res.position + 1;
                    ctx.func_nest += 1;
                    if ctx.func_nest > ctx.nest_limit {
                        out.push_str(ERR_RECURSION_LIMIT);
                    } else {
                        let child = (flags & EV_INHERIT) | EV_FCHECK | EV_FMAND;
                        exec(ctx, out, content, child, None);
                    }
                    ctx.func_nest -= 1;
                    i = after;
                }
            }
            b'{' => {
                let res = scan_to(&input[i + 1..], b'}');
                if !res.found {
                    out.push('{');
                    i += 1;
                } else {
                    let content = res.content;
                    let after = i + 1 + res.position + 1;
                    if flags & EV_STRIP != 0 {
                        let child = flags & !(EV_STRIP | EV_TOP);
                        exec(ctx, out, content, child, None);
                    } else {
                        // Function parsing is off inside preserved braces;
                        // compression still keeps a single leading space.
                        out.push('{');
                        let child = flags & !(EV_FCHECK | EV_FMAND | EV_TOP);
                        exec(ctx, out, content, child, None);
                        out.push('}');
                    }
                    i = after;
                }
            }
            b'%' => {
                i = percent_sub(ctx, out, input, i, flags);
            }
            b'#' => {
                i = hash_token(ctx, out, bytes, i);
            }
            b'(' if fcheck => {
                match try_function(ctx, out, out_base, input, i, flags) {
                    FunctionOutcome::Consumed(next) => i = next,
                    FunctionOutcome::Literal => {
                        out.push('(');
                        i += 1;
                    }
                    FunctionOutcome::Unknown => {
                        out.push('(');
                        fcheck = false;
                        i += 1;
                    }
                }
            }
            _ => {
                let start = i;
                i += 1;
                while i < bytes.len() && !is_special(bytes[i]) {
                    i += 1;
                }
                out.push_str(&input[start..i]);
            }
        }
    }

    if flags & EV_TOP != 0 {
        if flags & EV_NO_TRIM == 0 {
            while out.len() > out_base && out.ends_with(' ') {
                out.pop();
            }
            let lead = {
                let region = &out[out_base..];
                region.len() - region.trim_start_matches(' ').len()
            };
            if lead > 0 {
                out.replace_range(out_base..out_base + lead, "");
            }
        }
        if ctx.ansi_used {
            out.push_str(ansi::ANSI_NORMAL);
            ctx.ansi_used = false;
        }
        if flags & EV_NOTRACE == 0 {
            let traced = ctx
                .db
                .get(ctx.executor)
                .map(|o| o.has_flag(0, FLAG_TRACE))
                .unwrap_or(false);
            if traced {
                let owner = ctx.db.owner_of(ctx.executor);
                let msg = format!(
                    "{}(#{})}} '{}' -> '{}'",
                    ctx.db
                        .get(ctx.executor)
                        .map(|o| o.display_name().to_string())
                        .unwrap_or_default(),
                    ctx.executor,
                    input,
                    &out[out_base..]
                );
                ctx.notify(owner, NotifyKind::Pemit, msg);
            }
        }
    }

    if let Some(saved) = saved_cargs {
        ctx.cargs = saved;
    }
}

// ============================================================================
// Function Invocation
// ============================================================================

enum FunctionOutcome {
    /// The call (or its error token) was emitted; continue at this index.
    Consumed(usize),
    /// Emit the paren literally and keep checking functions.
    Literal,
    /// Unknown name under non-mandatory lookup: paren is literal and
    /// function checking turns off for the rest of this invocation.
    Unknown,
}

fn try_function(
    ctx: &mut EvalContext,
    out: &mut String,
    out_base: usize,
    input: &str,
    paren: usize,
    flags: u32,
) -> FunctionOutcome {
    // The name is the run of output since the last name-breaking delimiter.
    let region = &out[out_base..];
    let name_rel = region
        .rfind([')', ']', ' ', ','])
        .map(|p| p + 1)
        .unwrap_or(0);
    let name = region[name_rel..].to_string();
    if name.is_empty() {
        return FunctionOutcome::Literal;
    }
    let upper = name.to_uppercase();

    let (raw_args, close) = scan_args(&input[paren + 1..], b')');
    if !close.found {
        return FunctionOutcome::Literal;
    }
    let after = paren + 1 + close.position + 1;

    let builtin = ctx.funcs.get(&upper).copied();
    let user = if builtin.is_none() {
        ctx.ufuncs.get(&upper).copied()
    } else {
        None
    };
    if builtin.is_none() && user.is_none() {
        if flags & EV_FMAND != 0 {
            out.truncate(out_base + name_rel);
            out.push_str(&err_function_not_found(&upper));
            return FunctionOutcome::Consumed(after);
        }
        return FunctionOutcome::Unknown;
    }

    out.truncate(out_base + name_rel);
    ctx.func_nest += 1;
    ctx.func_invocations += 1;
    if ctx.func_nest > ctx.nest_limit {
        out.push_str(ERR_RECURSION_LIMIT);
    } else if ctx.func_invocations > ctx.invocation_limit {
        out.push_str(ERR_INVOCATION_LIMIT);
    } else if let Some(rec) = builtin {
        // A bare `()` is an empty argument list, not one empty argument.
        let empty_call = raw_args.len() == 1 && raw_args[0].is_empty();
        let no_eval = rec.flags & FN_NO_EVAL != 0;
        let args: Vec<String> = if empty_call {
            Vec::new()
        } else if no_eval {
            raw_args.iter().map(|s| s.to_string()).collect()
        } else {
            raw_args
                .iter()
                .map(|raw| {
                    let mut buf = String::new();
                    let child =
                        (flags & (EV_INHERIT | EV_FMAND)) | EV_FCHECK | EV_STRIP;
                    exec(ctx, &mut buf, raw, child, None);
                    buf
                })
                .collect()
        };
        if rec.flags & FN_VARARGS == 0 && args.len() != rec.nargs.unsigned_abs() as usize {
            out.push_str(&err_function_arity(&upper, rec.nargs, args.len()));
        } else {
            ctx.cur_flags = flags;
            let saved_regs = if rec.flags & FN_PRES != 0 {
                Some(ctx.regs.clone())
            } else {
                None
            };
            (rec.handler)(ctx, &args, out);
            if let Some(regs) = saved_regs {
                ctx.regs = regs;
            }
        }
    } else if let Some(ufn) = user {
        // User-function arguments are always evaluated.
        let args: Vec<String> = raw_args
            .iter()
            .map(|raw| {
                let mut buf = String::new();
                let child = (flags & (EV_INHERIT | EV_FMAND)) | EV_FCHECK | EV_STRIP;
                exec(ctx, &mut buf, raw, child, None);
                buf
            })
            .collect();
        let text = attr::attr_text(ctx.db, ctx.host, ctx.executor, ufn.obj, ufn.attr);
        let saved_executor = ctx.executor;
        if ufn.flags & UFN_PRIV != 0 {
            ctx.executor = ufn.obj;
        }
        let saved_regs = if ufn.flags & UFN_PRES != 0 {
            Some(ctx.regs.clone())
        } else {
            None
        };
        let child = (flags & EV_INHERIT) | EV_FCHECK | EV_FMAND;
        exec(ctx, out, &text, child, Some(&args));
        if let Some(regs) = saved_regs {
            ctx.regs = regs;
        }
        ctx.executor = saved_executor;
    }
    ctx.func_nest -= 1;
    FunctionOutcome::Consumed(after)
}

// ============================================================================
// Percent Substitution
// ============================================================================

#[derive(Clone, Copy)]
pub enum Pronoun {
    Subjective,
    Objective,
    Possessive,
    Absolute,
}

/// Gendered pronoun for an object, driven by its SEX attribute. Unrecognized
/// values are neuter; a missing value falls back to the object's name.
pub fn pronoun_for(db: &Db, who: Dbref, which: Pronoun) -> String {
    let sex = attr::attr_text_unchecked(db, who, A_SEX)
        .trim()
        .to_lowercase();
    let table: Option<[&str; 4]> = match sex.chars().next() {
        Some('m') => Some(["he", "him", "his", "his"]),
        Some('f') | Some('w') => Some(["she", "her", "her", "hers"]),
        Some('p') => Some(["they", "them", "their", "theirs"]),
        Some(_) => Some(["it", "it", "its", "its"]),
        None => None,
    };
    match table {
        Some(t) => t[which as usize].to_string(),
        None => {
            let name = db
                .get(who)
                .map(|o| o.display_name().to_string())
                .unwrap_or_default();
            match which {
                Pronoun::Subjective | Pronoun::Objective => name,
                Pronoun::Possessive | Pronoun::Absolute => format!("{}s", name),
            }
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

// Returns the index after the consumed substitution.
fn percent_sub(
    ctx: &mut EvalContext,
    out: &mut String,
    input: &str,
    at: usize,
    flags: u32,
) -> usize {
    let bytes = input.as_bytes();
    let mut i = at + 1;
    let c = match bytes.get(i) {
        Some(c) => *c,
        None => return i,
    };
    i += 1;
    match c {
        b'0'..=b'9' => {
            let idx = (c - b'0') as usize;
            if let Some(arg) = ctx.cargs.get(idx) {
                out.push_str(&arg.clone());
            }
        }
        b'r' | b'R' => out.push('\n'),
        b't' | b'T' => out.push('\t'),
        b'b' | b'B' => out.push(' '),
        b'%' => out.push('%'),
        b'!' => out.push_str(&fmt_dbref(ctx.executor)),
        b'@' => out.push_str(&fmt_dbref(ctx.caller)),
        b'#' => out.push_str(&fmt_dbref(ctx.enactor)),
        b'n' | b'N' => {
            let name = ctx
                .db
                .get(ctx.enactor)
                .map(|o| o.display_name().to_string())
                .unwrap_or_default();
            if c == b'N' {
                out.push_str(&capitalize(&name));
            } else {
                out.push_str(&name);
            }
        }
        b'l' | b'L' => {
            if flags & EV_NO_LOCATION == 0 {
                let loc = ctx
                    .db
                    .get(ctx.enactor)
                    .map(|o| o.location)
                    .unwrap_or(crate::db::NOTHING);
                out.push_str(&fmt_dbref(loc));
            }
        }
        b's' | b'S' | b'o' | b'O' | b'p' | b'P' | b'a' | b'A' => {
            let which = match c.to_ascii_lowercase() {
                b's' => Pronoun::Subjective,
                b'o' => Pronoun::Objective,
                b'p' => Pronoun::Possessive,
                _ => Pronoun::Absolute,
            };
            let word = pronoun_for(ctx.db, ctx.enactor, which);
            if c.is_ascii_uppercase() {
                out.push_str(&capitalize(&word));
            } else {
                out.push_str(&word);
            }
        }
        b'q' | b'Q' => {
            if bytes.get(i) == Some(&b'<') {
                match input[i + 1..].find('>') {
                    Some(end) => {
                        let name = input[i + 1..i + 1 + end].to_string();
                        out.push_str(&ctx.regs.get(name.trim()).to_string());
                        i += 1 + end + 1;
                    }
                    None => i = bytes.len(),
                }
            } else if let Some(&reg) = bytes.get(i) {
                if reg.is_ascii_alphanumeric() {
                    let name = (reg as char).to_string();
                    out.push_str(&ctx.regs.get(&name).to_string());
                }
                i += 1;
            }
        }
        b'v' | b'V' => {
            if let Some(&slot) = bytes.get(i) {
                if slot.is_ascii_alphabetic() {
                    let num = A_VA + (slot.to_ascii_lowercase() - b'a') as i32;
                    let text =
                        attr::attr_text(ctx.db, ctx.host, ctx.executor, ctx.executor, num);
                    out.push_str(&text);
                }
                i += 1;
            }
        }
        b'x' | b'X' => {
            i = ansi_sub(ctx, out, input, i);
        }
        b'i' | b'I' => {
            let mut from_outer = false;
            let mut j = i;
            if bytes.get(j) == Some(&b'-') {
                from_outer = true;
                j += 1;
            }
            match bytes.get(j) {
                Some(d) if d.is_ascii_digit() => {
                    let n = (d - b'0') as usize;
                    let frame = if from_outer {
                        ctx.loops.frame_from_outer(n)
                    } else {
                        ctx.loops.frame_from_inner(n)
                    };
                    if let Some(frame) = frame {
                        out.push_str(&frame.token.clone());
                    }
                    i = j + 1;
                }
                _ => out.push(c as char),
            }
        }
        b'j' | b'J' => {
            if let Some(frame) = ctx.loops.frame_from_inner(0) {
                out.push_str(&frame.token2.clone());
            }
        }
        b'm' | b'M' => out.push_str(&ctx.curr_cmd.clone()),
        b'+' => out.push_str(&ctx.cargs.len().to_string()),
        b'|' => out.push_str(&ctx.pipe.clone()),
        other => out.push(other as char),
    }
    i
}

// %x dispatch: single letter, <spec>, or /<spec> for background.
fn ansi_sub(ctx: &mut EvalContext, out: &mut String, input: &str, mut i: usize) -> usize {
    let bytes = input.as_bytes();
    let (code, next) = match bytes.get(i) {
        Some(b'<') => match input[i + 1..].find('>') {
            Some(end) => {
                let spec = &input[i + 1..i + 1 + end];
                (ansi::color_spec(spec, false), i + 1 + end + 1)
            }
            None => (None, bytes.len()),
        },
        Some(b'/') => {
            if bytes.get(i + 1) == Some(&b'<') {
                match input[i + 2..].find('>') {
                    Some(end) => {
                        let spec = &input[i + 2..i + 2 + end];
                        (ansi::color_spec(spec, true), i + 2 + end + 1)
                    }
                    None => (None, bytes.len()),
                }
            } else {
                (None, i + 1)
            }
        }
        Some(_) => {
            let letter = input[i..].chars().next().unwrap_or('\0');
            i += letter.len_utf8();
            (ansi::letter_code(letter), i)
        }
        None => (None, i),
    };
    if let Some(code) = code {
        if ctx.ansi_enabled {
            out.push_str(&code);
            ctx.ansi_used = true;
        }
    }
    next
}

// ============================================================================
// Loop/Switch Tokens
// ============================================================================

fn hash_token(ctx: &mut EvalContext, out: &mut String, bytes: &[u8], at: usize) -> usize {
    let next = bytes.get(at + 1).copied();
    match next {
        Some(b'#') if ctx.loops.in_loop() => {
            if let Some(frame) = ctx.loops.frame_from_inner(0) {
                out.push_str(&frame.token.clone());
            }
            at + 2
        }
        Some(b'+') if ctx.loops.in_loop() => {
            if let Some(frame) = ctx.loops.frame_from_inner(0) {
                out.push_str(&frame.token2.clone());
            }
            at + 2
        }
        Some(b'@') if ctx.loops.in_loop() => {
            if let Some(frame) = ctx.loops.frame_from_inner(0) {
                out.push_str(&frame.index.to_string());
            }
            at + 2
        }
        Some(b'$') if ctx.loops.switch_token().is_some() => {
            let token = ctx.loops.switch_token().unwrap_or("").to_string();
            out.push_str(&token);
            at + 2
        }
        Some(b'!') if ctx.loops.in_loop() => {
            out.push_str(&ctx.loops.depth().to_string());
            at + 2
        }
        _ => {
            out.push('#');
            at + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Db, ObjectType};
    use crate::host::NullHost;

    fn run(input: &str) -> String {
        let mut db = Db::minimal();
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        eval_top(&mut ctx, input)
    }

    #[test]
    fn test_plain_text_passthrough() {
        assert_eq!(run("hello world"), "hello world");
    }

    #[test]
    fn test_space_compression() {
        assert_eq!(run("a    b"), "a b");
    }

    #[test]
    fn test_escape_copies_next_byte() {
        assert_eq!(run(r"a\[b"), "a[b");
        assert_eq!(run(r"100\%"), "100%");
    }

    #[test]
    fn test_terminal_backslash_dropped() {
        assert_eq!(run("abc\\"), "abc");
    }

    #[test]
    fn test_unmatched_bracket_is_literal() {
        assert_eq!(run("a[b"), "a[b");
    }

    #[test]
    fn test_brace_group_suppresses_functions() {
        assert_eq!(run("{add(1,2)}"), "{add(1,2)}");
    }

    #[test]
    fn test_bracket_evaluates() {
        assert_eq!(run("[add(1,2)]"), "3");
    }

    #[test]
    fn test_unknown_function_top_level_is_literal() {
        assert_eq!(run("nosuchfn(1,2)"), "nosuchfn(1,2)");
    }

    #[test]
    fn test_unknown_function_in_brackets_is_fatal() {
        assert_eq!(run("[nosuchfn(1,2)]"), "#-1 FUNCTION (NOSUCHFN) NOT FOUND");
    }

    #[test]
    fn test_percent_literals() {
        assert_eq!(run("%%"), "%");
        assert_eq!(run("a%bb"), "a b");
    }

    #[test]
    fn test_unknown_percent_emits_char() {
        assert_eq!(run("%e"), "e");
    }

    #[test]
    fn test_executor_substitutions() {
        assert_eq!(run("%!"), "#1");
        assert_eq!(run("%#"), "#1");
        assert_eq!(run("%@"), "#1");
    }

    #[test]
    fn test_enactor_name() {
        assert_eq!(run("%n"), "God");
        assert_eq!(run("%N"), "God");
    }

    #[test]
    fn test_pronoun_fallback_to_name() {
        // God has no SEX attribute; possessives take an s suffix.
        assert_eq!(run("%p"), "Gods");
        assert_eq!(run("%s"), "God");
    }

    #[test]
    fn test_pronoun_tables() {
        let mut db = Db::minimal();
        db.get_mut(crate::db::GOD)
            .unwrap()
            .attr_set(A_SEX, "male".to_string());
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        assert_eq!(eval_top(&mut ctx, "%s waves."), "he waves.");
        assert_eq!(eval_top(&mut ctx, "%S waves."), "He waves.");
        ctx.db
            .get_mut(crate::db::GOD)
            .unwrap()
            .attr_set(A_SEX, "plural".to_string());
        assert_eq!(eval_top(&mut ctx, "%p"), "their");
        ctx.db
            .get_mut(crate::db::GOD)
            .unwrap()
            .attr_set(A_SEX, "spivak".to_string());
        assert_eq!(eval_top(&mut ctx, "%a"), "its");
    }

    #[test]
    fn test_q_register_sub() {
        let mut db = Db::minimal();
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        ctx.regs.set("0", "zero".to_string());
        ctx.regs.set("total", "12".to_string());
        assert_eq!(eval_top(&mut ctx, "%q0"), "zero");
        assert_eq!(eval_top(&mut ctx, "%q<total>"), "12");
        assert_eq!(eval_top(&mut ctx, "%q<TOTAL>"), "12");
    }

    #[test]
    fn test_nesting_limit_boundary() {
        let mut db = Db::minimal();
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        ctx.nest_limit = 5;
        let ok = "[[[[[x]]]]]";
        assert_eq!(eval_top(&mut ctx, ok), "x");
        let too_deep = "[[[[[[x]]]]]]";
        assert_eq!(eval_top(&mut ctx, too_deep), ERR_RECURSION_LIMIT);
    }

    #[test]
    fn test_invocation_limit() {
        let mut db = Db::minimal();
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        ctx.invocation_limit = 3;
        let out = eval_top(&mut ctx, "[add(1,1)][add(1,1)][add(1,1)][add(1,1)]");
        assert_eq!(out, format!("222{}", ERR_INVOCATION_LIMIT));
    }

    #[test]
    fn test_cargs_substitution() {
        let mut db = Db::minimal();
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        ctx.cargs = vec!["first".to_string(), "second".to_string()];
        assert_eq!(eval_top(&mut ctx, "%0-%1-%2"), "first-second-");
        assert_eq!(eval_top(&mut ctx, "%+"), "2");
    }

    #[test]
    fn test_ansi_autoclose() {
        let out = run("%xcblue");
        assert_eq!(out, "\x1b[36mblue\x1b[0m");
    }

    #[test]
    fn test_ansi_extended_specs() {
        assert_eq!(run("%x<208>hot"), "\x1b[38;5;208mhot\x1b[0m");
        assert_eq!(run("%x/<#102030>bg"), "\x1b[48;2;16;32;48mbg\x1b[0m");
    }

    #[test]
    fn test_ansi_disabled_consumes_spec() {
        let mut db = Db::minimal();
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        ctx.ansi_enabled = false;
        assert_eq!(eval_top(&mut ctx, "%xcplain"), "plain");
    }

    #[test]
    fn test_hash_literal_outside_loops() {
        assert_eq!(run("##"), "##");
        assert_eq!(run("#5"), "#5");
    }

    #[test]
    fn test_v_attribute_slots() {
        let mut db = Db::minimal();
        db.get_mut(crate::db::GOD)
            .unwrap()
            .attr_set(A_VA, "va-value".to_string());
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        assert_eq!(eval_top(&mut ctx, "%va"), "va-value");
        assert_eq!(eval_top(&mut ctx, "%vb"), "");
    }

    #[test]
    fn test_location_substitution() {
        let mut db = Db::minimal();
        let room = db.create("Hall", ObjectType::Room, GOD, crate::db::NOTHING);
        db.chain_remove(GOD);
        db.chain_insert(room, GOD);
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        assert_eq!(eval_top(&mut ctx, "%l"), format!("#{}", room));
    }

    #[test]
    fn test_loop_stack_empty_after_top_level() {
        let mut db = Db::minimal();
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        eval_top(&mut ctx, "[iter(a b c,[iter(x y,##)])]");
        assert_eq!(ctx.loops.depth(), 0);
        eval_top(&mut ctx, "[iter(a b c,[ibreak(1)]##)]");
        assert_eq!(ctx.loops.depth(), 0);
        assert!(!ctx.loops.breaking());
    }
}
