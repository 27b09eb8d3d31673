//! String manipulation: case, slicing, padding, editing, and encodings.

use super::{atoi, fun, FuncMap, FN_VARARGS};
use crate::ansi;
use crate::error::ERR_STRING_LENGTHS;
use crate::eval::EvalContext;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

pub fn fun_strcat(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    for arg in args {
        out.push_str(arg);
    }
}

/// cat(): concatenate with single spaces.
pub fn fun_cat(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&args.join(" "));
}

pub fn fun_ucstr(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&args[0].to_uppercase());
}

pub fn fun_lcstr(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&args[0].to_lowercase());
}

pub fn fun_capstr(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let mut chars = args[0].chars();
    match chars.next() {
        Some(first) => {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
        None => {}
    }
}

pub fn fun_strlen(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&args[0].chars().count().to_string());
}

/// mid(string, start, count) - rune-indexed slice.
pub fn fun_mid(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let start = atoi(&args[1]).max(0) as usize;
    let count = atoi(&args[2]).max(0) as usize;
    out.extend(args[0].chars().skip(start).take(count));
}

pub fn fun_left(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let count = atoi(&args[1]).max(0) as usize;
    out.extend(args[0].chars().take(count));
}

pub fn fun_right(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let count = atoi(&args[1]).max(0) as usize;
    let total = args[0].chars().count();
    out.extend(args[0].chars().skip(total.saturating_sub(count)));
}

/// pos(needle, haystack): 1-based position, or #-1.
pub fn fun_pos(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    match args[1].find(&args[0]) {
        Some(byte_pos) => {
            let rune_pos = args[1][..byte_pos].chars().count() + 1;
            out.push_str(&rune_pos.to_string());
        }
        None => out.push_str("#-1"),
    }
}

pub fn fun_repeat(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let times = atoi(&args[1]).clamp(0, 10_000) as usize;
    out.push_str(&args[0].repeat(times));
}

pub fn fun_space(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let count = atoi(&args[0]).clamp(0, 10_000) as usize;
    out.push_str(&" ".repeat(count));
}

fn pad_char(args: &[String], idx: usize) -> char {
    args.get(idx)
        .and_then(|s| s.chars().next())
        .unwrap_or(' ')
}

/// ljust(string, width[, fill])
pub fn fun_ljust(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let width = atoi(&args[1]).max(0) as usize;
    let fill = pad_char(args, 2);
    let len = args[0].chars().count();
    out.push_str(&args[0]);
    for _ in len..width {
        out.push(fill);
    }
}

pub fn fun_rjust(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let width = atoi(&args[1]).max(0) as usize;
    let fill = pad_char(args, 2);
    let len = args[0].chars().count();
    for _ in len..width {
        out.push(fill);
    }
    out.push_str(&args[0]);
}

pub fn fun_center(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let width = atoi(&args[1]).max(0) as usize;
    let fill = pad_char(args, 2);
    let len = args[0].chars().count();
    if len >= width {
        out.push_str(&args[0]);
        return;
    }
    let left = (width - len) / 2;
    let right = width - len - left;
    for _ in 0..left {
        out.push(fill);
    }
    out.push_str(&args[0]);
    for _ in 0..right {
        out.push(fill);
    }
}

/// reverse(): rune-wise reversal.
pub fn fun_reverse(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.extend(args[0].chars().rev());
}

/// trim(string[, side[, char]]) - side is l, r, or b (default both).
pub fn fun_trim(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.is_empty() {
        return;
    }
    let side = args.get(1).map(|s| s.as_str()).unwrap_or("b");
    let trim_char = args
        .get(2)
        .and_then(|s| s.chars().next())
        .unwrap_or(' ');
    let mut result = args[0].as_str();
    if side != "r" {
        result = result.trim_start_matches(trim_char);
    }
    if side != "l" {
        result = result.trim_end_matches(trim_char);
    }
    out.push_str(result);
}

pub fn fun_before(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    match args[0].find(&args[1]) {
        Some(pos) => out.push_str(&args[0][..pos]),
        None => out.push_str(&args[0]),
    }
}

pub fn fun_after(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if let Some(pos) = args[0].find(&args[1]) {
        out.push_str(&args[0][pos + args[1].len()..]);
    }
}

/// edit(string, from, to): replace every occurrence. `$` appends, `^`
/// prepends.
pub fn fun_edit(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let (text, from, to) = (&args[0], &args[1], &args[2]);
    if from == "$" {
        out.push_str(text);
        out.push_str(to);
    } else if from == "^" {
        out.push_str(to);
        out.push_str(text);
    } else if from.is_empty() {
        out.push_str(text);
    } else {
        out.push_str(&text.replace(from.as_str(), to));
    }
}

/// merge(s1, s2, c): where s1 holds `c`, take s2's character instead.
pub fn fun_merge(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let a: Vec<char> = args[0].chars().collect();
    let b: Vec<char> = args[1].chars().collect();
    if a.len() != b.len() {
        out.push_str(ERR_STRING_LENGTHS);
        return;
    }
    let marker = args[2].chars().next().unwrap_or(' ');
    for (ca, cb) in a.iter().zip(b.iter()) {
        out.push(if *ca == marker { *cb } else { *ca });
    }
}

/// escape(): leading backslash plus a backslash before every character the
/// evaluator treats specially.
pub fn fun_escape(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push('\\');
    for c in args[0].chars() {
        if matches!(c, '%' | '\\' | '[' | ']' | '{' | '}' | ';') {
            out.push('\\');
        }
        out.push(c);
    }
}

/// secure(): flatten the dangerous characters to spaces.
pub fn fun_secure(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    for c in args[0].chars() {
        if matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | '$' | '%' | ',' | ';' | '\\') {
            out.push(' ');
        } else {
            out.push(c);
        }
    }
}

pub fn fun_stripansi(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&ansi::strip_ansi(&args[0]));
}

/// ansi(codes, text): paint text and reset after.
pub fn fun_ansi(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if !ctx.ansi_enabled {
        out.push_str(&args[1]);
        return;
    }
    let codes = ansi::letters_to_codes(&args[0]);
    if codes.is_empty() {
        out.push_str(&args[1]);
        return;
    }
    ctx.ansi_used = true;
    out.push_str(&codes);
    out.push_str(&args[1]);
    out.push_str(ansi::ANSI_NORMAL);
}

// ===== Encodings =====

pub fn fun_encode64(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&STANDARD.encode(args[0].as_bytes()));
}

pub fn fun_decode64(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    match STANDARD
        .decode(args[0].trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
    {
        Some(decoded) => out.push_str(&decoded),
        None => out.push_str(crate::error::ERR_INVALID_ARGUMENT),
    }
}

// Everything but the RFC 3986 unreserved characters gets escaped.
const URL_ESCAPED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub fn fun_urlescape(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&utf8_percent_encode(&args[0], URL_ESCAPED).to_string());
}

pub fn fun_urlunescape(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    // Form encoding spells spaces as '+'; fold those first.
    let plussed = args[0].replace('+', " ");
    match percent_decode_str(&plussed).decode_utf8() {
        Ok(decoded) => out.push_str(&decoded),
        Err(_) => out.push_str(crate::error::ERR_INVALID_ARGUMENT),
    }
}

/// strtrunc(string, length): left() under its historical name.
pub fn fun_strtrunc(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    fun_left(ctx, args, out);
}

pub fn register(map: &mut FuncMap) {
    fun!(map, "STRCAT", fun_strcat, 0, FN_VARARGS);
    fun!(map, "CAT", fun_cat, 0, FN_VARARGS);
    fun!(map, "UCSTR", fun_ucstr, 1);
    fun!(map, "LCSTR", fun_lcstr, 1);
    fun!(map, "CAPSTR", fun_capstr, 1);
    fun!(map, "STRLEN", fun_strlen, 1);
    fun!(map, "MID", fun_mid, 3);
    fun!(map, "LEFT", fun_left, 2);
    fun!(map, "RIGHT", fun_right, 2);
    fun!(map, "POS", fun_pos, 2);
    fun!(map, "REPEAT", fun_repeat, 2);
    fun!(map, "SPACE", fun_space, 1);
    fun!(map, "LJUST", fun_ljust, 0, FN_VARARGS);
    fun!(map, "RJUST", fun_rjust, 0, FN_VARARGS);
    fun!(map, "CENTER", fun_center, 0, FN_VARARGS);
    fun!(map, "REVERSE", fun_reverse, 1);
    fun!(map, "TRIM", fun_trim, 0, FN_VARARGS);
    fun!(map, "BEFORE", fun_before, 2);
    fun!(map, "AFTER", fun_after, 2);
    fun!(map, "EDIT", fun_edit, 3);
    fun!(map, "MERGE", fun_merge, 3);
    fun!(map, "ESCAPE", fun_escape, 1);
    fun!(map, "SECURE", fun_secure, 1);
    fun!(map, "STRIPANSI", fun_stripansi, 1);
    fun!(map, "ANSI", fun_ansi, 2);
    fun!(map, "ENCODE64", fun_encode64, 1);
    fun!(map, "DECODE64", fun_decode64, 1);
    fun!(map, "URLESCAPE", fun_urlescape, 1);
    fun!(map, "URLUNESCAPE", fun_urlunescape, 1);
    fun!(map, "STRTRUNC", fun_strtrunc, 2);
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
    fn test_case_functions() {
        assert_eq!(run("[ucstr(hello)]"), "HELLO");
        assert_eq!(run("[lcstr(HeLLo)]"), "hello");
        assert_eq!(run("[capstr(hello world)]"), "Hello world");
    }

    #[test]
    fn test_slicing() {
        assert_eq!(run("[mid(abcdef,2,3)]"), "cde");
        assert_eq!(run("[left(abcdef,2)]"), "ab");
        assert_eq!(run("[right(abcdef,2)]"), "ef");
        assert_eq!(run("[strlen(abcdef)]"), "6");
    }

    #[test]
    fn test_justification() {
        assert_eq!(run("[ljust(ab,5,.)]"), "ab...");
        assert_eq!(run("[rjust(ab,5,.)]"), "...ab");
        assert_eq!(run("[center(ab,6,-)]"), "--ab--");
    }

    #[test]
    fn test_reverse_is_involutive() {
        assert_eq!(run("[reverse(reverse(hello there))]"), "hello there");
        assert_eq!(run("[reverse(abc)]"), "cba");
    }

    #[test]
    fn test_edit_specials() {
        assert_eq!(run("[edit(a-b-c,-,+)]"), "a+b+c");
        assert_eq!(run("[edit(tail,$,!)]"), "tail!");
        assert_eq!(run("[edit(head,^,>)]"), ">head");
    }

    #[test]
    fn test_merge_lengths() {
        assert_eq!(run("[merge(AB_DE,12345,_)]"), "AB3DE");
        assert_eq!(run("[merge(abc,ab,_)]"), "#-1 STRING LENGTHS MUST BE EQUAL");
    }

    #[test]
    fn test_before_after() {
        assert_eq!(run("[before(user@host,@)]"), "user");
        assert_eq!(run("[after(user@host,@)]"), "host");
        assert_eq!(run("[before(nomatch,@)]"), "nomatch");
        assert_eq!(run("[after(nomatch,@)]"), "");
    }

    #[test]
    fn test_base64_roundtrip() {
        assert_eq!(run("[encode64(hello)]"), "aGVsbG8=");
        assert_eq!(run("[decode64(aGVsbG8=)]"), "hello");
        assert_eq!(run("[decode64(encode64(round trip data))]"), "round trip data");
    }

    #[test]
    fn test_urlescape_roundtrip() {
        assert_eq!(run("[urlescape(a b&c)]"), "a%20b%26c");
        assert_eq!(run("[urlunescape(a%20b%26c)]"), "a b&c");
    }

    #[test]
    fn test_escape_and_secure() {
        assert_eq!(run(r"[escape(a\%b)]"), r"\a\%b");
        assert_eq!(run(r"[secure(a\%b;c)]"), "a b c");
    }

    #[test]
    fn test_pos_one_based() {
        assert_eq!(run("[pos(c,abcdef)]"), "3");
        assert_eq!(run("[pos(z,abcdef)]"), "#-1");
    }
}
