//! Wildcard and regex matching over strings and word lists.

use super::{fun, list_words, osep_arg, sep_arg, FuncMap, FN_VARARGS};
use crate::error::ERR_INVALID_ARGUMENT;
use crate::eval::EvalContext;
use crate::wild::{wild_capture, wild_match};
use regex::Regex;

fn compile(pattern: &str, insensitive: bool) -> Option<Regex> {
    let source = if insensitive {
        format!("(?i){}", pattern)
    } else {
        pattern.to_string()
    };
    Regex::new(&source).ok()
}

/// strmatch(string, pattern): whole-string wildcard test.
pub fn fun_strmatch(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(super::bool01(wild_match(&args[1], &args[0])));
}

/// match(list, pattern[, sep]): 1-based index of the first matching word.
pub fn fun_match(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        out.push('0');
        return;
    }
    let sep = sep_arg(args, 2);
    let pos = list_words(&args[0], &sep)
        .iter()
        .position(|w| wild_match(&args[1], w))
        .map(|p| p + 1)
        .unwrap_or(0);
    out.push_str(&pos.to_string());
}

/// matchall(list, pattern[, sep]): every matching index.
pub fn fun_matchall(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let sep = sep_arg(args, 2);
    let hits: Vec<String> = list_words(&args[0], &sep)
        .iter()
        .enumerate()
        .filter(|(_, w)| wild_match(&args[1], w))
        .map(|(i, _)| (i + 1).to_string())
        .collect();
    out.push_str(&hits.join(" "));
}

/// grab(list, pattern[, sep]): the first matching word itself.
pub fn fun_grab(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let sep = sep_arg(args, 2);
    if let Some(word) = list_words(&args[0], &sep)
        .into_iter()
        .find(|w| wild_match(&args[1], w))
    {
        out.push_str(&word);
    }
}

/// graball(list, pattern[, sep[, osep]])
pub fn fun_graball(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let sep = sep_arg(args, 2);
    let osep = osep_arg(args, 3, &sep);
    let hits: Vec<String> = list_words(&args[0], &sep)
        .into_iter()
        .filter(|w| wild_match(&args[1], w))
        .collect();
    out.push_str(&hits.join(&osep));
}

/// wildparse(string, pattern, registers): assign each `*` capture to the
/// named registers in order.
pub fn fun_wildparse(ctx: &mut EvalContext, args: &[String], _out: &mut String) {
    let names = list_words(&args[2], " ");
    if let Some(captures) = wild_capture(&args[1], &args[0]) {
        for (name, value) in names.iter().zip(captures) {
            ctx.regs.set(name.trim(), value);
        }
    }
}

fn store_captures(ctx: &mut EvalContext, caps: &regex::Captures<'_>, reglist: &str) {
    for (name, group) in list_words(reglist, " ").iter().zip(caps.iter()) {
        let value = group.map(|m| m.as_str().to_string()).unwrap_or_default();
        ctx.regs.set(name.trim(), value);
    }
}

fn regmatch_engine(
    ctx: &mut EvalContext,
    args: &[String],
    out: &mut String,
    insensitive: bool,
) {
    let Some(re) = compile(&args[1], insensitive) else {
        out.push_str(ERR_INVALID_ARGUMENT);
        return;
    };
    match re.captures(&args[0]) {
        Some(caps) => {
            if let Some(reglist) = args.get(2) {
                store_captures(ctx, &caps, reglist);
            }
            out.push('1');
        }
        None => out.push('0'),
    }
}

/// regmatch(string, pattern[, registers]): 0/1, numbered groups to
/// registers.
pub fn fun_regmatch(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        out.push('0');
        return;
    }
    regmatch_engine(ctx, args, out, false);
}

pub fn fun_regmatchi(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        out.push('0');
        return;
    }
    regmatch_engine(ctx, args, out, true);
}

/// regparse(string, pattern, registers): capture-only regmatch.
pub fn fun_regparse(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let Some(re) = compile(&args[1], false) else {
        out.push_str(ERR_INVALID_ARGUMENT);
        return;
    };
    if let Some(caps) = re.captures(&args[0]) {
        store_captures(ctx, &caps, &args[2]);
    }
}

pub fn fun_regparsei(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let Some(re) = compile(&args[1], true) else {
        out.push_str(ERR_INVALID_ARGUMENT);
        return;
    };
    if let Some(caps) = re.captures(&args[0]) {
        store_captures(ctx, &caps, &args[2]);
    }
}

fn regedit_engine(args: &[String], out: &mut String, all: bool, insensitive: bool) {
    let Some(re) = compile(&args[1], insensitive) else {
        out.push_str(ERR_INVALID_ARGUMENT);
        return;
    };
    let replaced = if all {
        re.replace_all(&args[0], args[2].as_str())
    } else {
        re.replace(&args[0], args[2].as_str())
    };
    out.push_str(&replaced);
}

/// regedit(string, pattern, replacement): first-match rewrite; `$N` refers
/// to capture groups.
pub fn fun_regedit(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    regedit_engine(args, out, false, false);
}

pub fn fun_regediti(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    regedit_engine(args, out, false, true);
}

pub fn fun_regeditall(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    regedit_engine(args, out, true, false);
}

pub fn fun_regeditalli(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    regedit_engine(args, out, true, true);
}

fn regrab_engine(args: &[String], out: &mut String, all: bool, insensitive: bool) {
    if args.len() < 2 {
        return;
    }
    let Some(re) = compile(&args[1], insensitive) else {
        out.push_str(ERR_INVALID_ARGUMENT);
        return;
    };
    let sep = sep_arg(args, 2);
    let osep = osep_arg(args, 3, &sep);
    let words = list_words(&args[0], &sep);
    if all {
        let hits: Vec<String> = words.into_iter().filter(|w| re.is_match(w)).collect();
        out.push_str(&hits.join(&osep));
    } else if let Some(word) = words.into_iter().find(|w| re.is_match(w)) {
        out.push_str(&word);
    }
}

/// regrab(list, pattern[, sep]): first word matching the regex.
pub fn fun_regrab(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    regrab_engine(args, out, false, false);
}

pub fn fun_regrabi(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    regrab_engine(args, out, false, true);
}

pub fn fun_regraball(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    regrab_engine(args, out, true, false);
}

pub fn fun_regraballi(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    regrab_engine(args, out, true, true);
}

pub fn register(map: &mut FuncMap) {
    fun!(map, "STRMATCH", fun_strmatch, 2);
    fun!(map, "MATCH", fun_match, 0, FN_VARARGS);
    fun!(map, "MATCHALL", fun_matchall, 0, FN_VARARGS);
    fun!(map, "GRAB", fun_grab, 0, FN_VARARGS);
    fun!(map, "GRABALL", fun_graball, 0, FN_VARARGS);
    fun!(map, "WILDPARSE", fun_wildparse, 3);
    fun!(map, "REGMATCH", fun_regmatch, 0, FN_VARARGS);
    fun!(map, "REGMATCHI", fun_regmatchi, 0, FN_VARARGS);
    fun!(map, "REGPARSE", fun_regparse, 3);
    fun!(map, "REGPARSEI", fun_regparsei, 3);
    fun!(map, "REGEDIT", fun_regedit, 3);
    fun!(map, "REGEDITI", fun_regediti, 3);
    fun!(map, "REGEDITALL", fun_regeditall, 3);
    fun!(map, "REGEDITALLI", fun_regeditalli, 3);
    fun!(map, "REGRAB", fun_regrab, 0, FN_VARARGS);
    fun!(map, "REGRABI", fun_regrabi, 0, FN_VARARGS);
    fun!(map, "REGRABALL", fun_regraball, 0, FN_VARARGS);
    fun!(map, "REGRABALLI", fun_regraballi, 0, FN_VARARGS);
}

#[cfg(test)]
mod tests {
    use crate::db::Db;
    use crate::eval::{eval_top, EvalContext};
    use crate::host::NullHost;

    fn run(input: &str) -> String {
        let mut db = Db::minimal();
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        eval_top(&mut ctx, input)
    }

    #[test]
    fn test_strmatch() {
        assert_eq!(run("[strmatch(hello there,hello*)]"), "1");
        assert_eq!(run("[strmatch(HELLO,hello)]"), "1");
        assert_eq!(run("[strmatch(hi,hello*)]"), "0");
    }

    #[test]
    fn test_match_positions() {
        assert_eq!(run("[match(red blue green,b*)]"), "2");
        assert_eq!(run("[match(red blue green,z*)]"), "0");
        assert_eq!(run("[matchall(ab bb cb,?b)]"), "1 2 3");
    }

    #[test]
    fn test_grab_family() {
        assert_eq!(run("[grab(red blue green,g*)]"), "green");
        assert_eq!(run("[graball(red blue green,*e*)]"), "red blue green");
        assert_eq!(run("[graball(red blue green,*r*)]"), "red green");
    }

    #[test]
    fn test_wildparse_sets_registers() {
        assert_eq!(
            run("[wildparse(Pat pokes Sam,* pokes *,0 who)][r(0)]/[r(who)]"),
            "Pat/Sam"
        );
    }

    #[test]
    fn test_regmatch_and_captures() {
        assert_eq!(run("[regmatch(abc123,[a-z]+[0-9]+)]"), "1");
        assert_eq!(run("[regmatch(abc,[0-9]+)]"), "0");
        assert_eq!(
            run("[regmatch(user@host,([a-z]+)@([a-z]+),all u h)][r(u)]:[r(h)]"),
            "1user:host"
        );
        assert_eq!(run("[regmatchi(ABC,abc)]"), "1");
    }

    #[test]
    fn test_regedit() {
        assert_eq!(run("[regedit(a1b2,[0-9],#)]"), "a#b2");
        assert_eq!(run("[regeditall(a1b2,[0-9],#)]"), "a#b#");
        assert_eq!(run("[regeditalli(AxA,a,-)]"), "-x-");
    }

    #[test]
    fn test_regrab() {
        assert_eq!(run("[regrab(cat dog cow,^c)]"), "cat");
        assert_eq!(run("[regraball(cat dog cow,^c)]"), "cat cow");
        assert_eq!(run("[regrabi(CAT dog,^c)]"), "CAT");
    }

    #[test]
    fn test_regparse() {
        assert_eq!(
            run("[regparse(2026-08-01,([0-9]+)-([0-9]+),all y m)][r(y)]/[r(m)]"),
            "2026/08"
        );
    }
}
