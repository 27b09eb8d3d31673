//! Arithmetic: add, sub, mul, div, rounding, bounds, randomness, number lists.
//!
//! Arithmetic is soft-typed: every argument goes through the permissive
//! numeric parse, so `add(1, 2 fish)` is 3.

use super::{atof, atoi, fmt_float, fun, sep_arg, FuncMap, FN_VARARGS};
use crate::error::{ERR_DIVIDE_BY_ZERO, ERR_SQRT_NEGATIVE};
use crate::eval::EvalContext;
use rand::Rng;

/// Sum of all arguments.
///
/// ```text
/// [add(1,2,3)] => 6
/// ```
pub fn fun_add(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let sum: f64 = args.iter().map(|a| atof(a)).sum();
    out.push_str(&fmt_float(sum));
}

pub fn fun_sub(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&fmt_float(atof(&args[0]) - atof(&args[1])));
}

pub fn fun_mul(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let product: f64 = args.iter().map(|a| atof(a)).product();
    out.push_str(&fmt_float(product));
}

/// Integer division; the float flavor lives in fdiv().
pub fn fun_div(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let denom = atoi(&args[1]);
    if denom == 0 {
        out.push_str(ERR_DIVIDE_BY_ZERO);
        return;
    }
    out.push_str(&(atoi(&args[0]) / denom).to_string());
}

pub fn fun_fdiv(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let denom = atof(&args[1]);
    if denom == 0.0 {
        out.push_str(ERR_DIVIDE_BY_ZERO);
        return;
    }
    out.push_str(&fmt_float(atof(&args[0]) / denom));
}

/// Floor division: rounds toward negative infinity, like modulo arithmetic.
pub fn fun_floordiv(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let denom = atoi(&args[1]);
    if denom == 0 {
        out.push_str(ERR_DIVIDE_BY_ZERO);
        return;
    }
    out.push_str(&atoi(&args[0]).div_euclid(denom).to_string());
}

/// Remainder with the sign of the divisor.
pub fn fun_mod(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let denom = atoi(&args[1]);
    if denom == 0 {
        out.push_str(ERR_DIVIDE_BY_ZERO);
        return;
    }
    out.push_str(&atoi(&args[0]).rem_euclid(denom.abs()).to_string());
}

/// C-style remainder with the sign of the dividend.
pub fn fun_remainder(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let denom = atoi(&args[1]);
    if denom == 0 {
        out.push_str(ERR_DIVIDE_BY_ZERO);
        return;
    }
    out.push_str(&(atoi(&args[0]) % denom).to_string());
}

pub fn fun_abs(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&fmt_float(atof(&args[0]).abs()));
}

pub fn fun_sign(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let v = atof(&args[0]);
    out.push_str(if v > 0.0 {
        "1"
    } else if v < 0.0 {
        "-1"
    } else {
        "0"
    });
}

pub fn fun_min(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let m = args.iter().map(|a| atof(a)).fold(f64::INFINITY, f64::min);
    out.push_str(&fmt_float(if m.is_finite() { m } else { 0.0 }));
}

pub fn fun_max(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let m = args
        .iter()
        .map(|a| atof(a))
        .fold(f64::NEG_INFINITY, f64::max);
    out.push_str(&fmt_float(if m.is_finite() { m } else { 0.0 }));
}

pub fn fun_inc(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&(atoi(&args[0]) + 1).to_string());
}

pub fn fun_dec(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&(atoi(&args[0]) - 1).to_string());
}

pub fn fun_sqrt(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let v = atof(&args[0]);
    if v < 0.0 {
        out.push_str(ERR_SQRT_NEGATIVE);
        return;
    }
    out.push_str(&fmt_float(v.sqrt()));
}

pub fn fun_power(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&fmt_float(atof(&args[0]).powf(atof(&args[1]))));
}

pub fn fun_ln(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let v = atof(&args[0]);
    if v <= 0.0 {
        out.push_str(crate::error::ERR_INVALID_ARGUMENT);
        return;
    }
    out.push_str(&fmt_float(v.ln()));
}

pub fn fun_log(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let v = atof(&args[0]);
    if v <= 0.0 {
        out.push_str(crate::error::ERR_INVALID_ARGUMENT);
        return;
    }
    out.push_str(&fmt_float(v.log10()));
}

pub fn fun_exp(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&fmt_float(atof(&args[0]).exp()));
}

pub fn fun_floor(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&fmt_float(atof(&args[0]).floor()));
}

pub fn fun_ceil(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&fmt_float(atof(&args[0]).ceil()));
}

/// round(number, places)
pub fn fun_round(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let places = atoi(&args[1]).clamp(0, 6) as usize;
    let mut s = format!("{:.*}", places, atof(&args[0]));
    if places == 0 && s == "-0" {
        s = "0".to_string();
    }
    out.push_str(&s);
}

pub fn fun_trunc(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&fmt_float(atof(&args[0]).trunc()));
}

pub fn fun_pi(_ctx: &mut EvalContext, _args: &[String], out: &mut String) {
    out.push_str("3.141593");
}

pub fn fun_e(_ctx: &mut EvalContext, _args: &[String], out: &mut String) {
    out.push_str("2.718282");
}

/// bound(value, lower, upper)
pub fn fun_bound(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let v = atof(&args[0]);
    let lo = atof(&args[1]);
    let hi = atof(&args[2]);
    out.push_str(&fmt_float(v.max(lo).min(hi)));
}

pub fn fun_dist2d(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let dx = atof(&args[0]) - atof(&args[2]);
    let dy = atof(&args[1]) - atof(&args[3]);
    out.push_str(&fmt_float((dx * dx + dy * dy).sqrt()));
}

pub fn fun_dist3d(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let dx = atof(&args[0]) - atof(&args[3]);
    let dy = atof(&args[1]) - atof(&args[4]);
    let dz = atof(&args[2]) - atof(&args[5]);
    out.push_str(&fmt_float((dx * dx + dy * dy + dz * dz).sqrt()));
}

/// rand(n): uniform integer in [0, n).
pub fn fun_rand(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let n = atoi(&args[0]);
    if n <= 0 {
        out.push('0');
        return;
    }
    out.push_str(&rand::thread_rng().gen_range(0..n).to_string());
}

/// die(count, sides): sum of `count` rolls of a `sides`-sided die.
pub fn fun_die(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let count = atoi(&args[0]).clamp(0, 100);
    let sides = atoi(&args[1]);
    if sides <= 0 {
        out.push('0');
        return;
    }
    let mut rng = rand::thread_rng();
    let mut total: i64 = 0;
    for _ in 0..count {
        total += rng.gen_range(1..=sides);
    }
    out.push_str(&total.to_string());
}

/// lnum(n) or lnum(start, end[, sep]): a list of consecutive integers.
pub fn fun_lnum(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.is_empty() {
        return;
    }
    let sep = sep_arg(args, 2);
    let (start, end) = if args.len() >= 2 {
        (atoi(&args[0]), atoi(&args[1]))
    } else {
        let n = atoi(&args[0]);
        if n <= 0 {
            return;
        }
        (0, n - 1)
    };
    let step: i64 = if start <= end { 1 } else { -1 };
    let mut cur = start;
    let mut first = true;
    loop {
        if !first {
            out.push_str(&sep);
        }
        first = false;
        out.push_str(&cur.to_string());
        if cur == end {
            break;
        }
        cur += step;
    }
}

pub fn register(map: &mut FuncMap) {
    fun!(map, "ADD", fun_add, 0, FN_VARARGS);
    fun!(map, "SUB", fun_sub, 2);
    fun!(map, "MUL", fun_mul, 0, FN_VARARGS);
    fun!(map, "DIV", fun_div, 2);
    fun!(map, "FDIV", fun_fdiv, 2);
    fun!(map, "FLOORDIV", fun_floordiv, 2);
    fun!(map, "MOD", fun_mod, 2);
    fun!(map, "MODULO", fun_mod, 2);
    fun!(map, "REMAINDER", fun_remainder, 2);
    fun!(map, "ABS", fun_abs, 1);
    fun!(map, "SIGN", fun_sign, 1);
    fun!(map, "MIN", fun_min, 0, FN_VARARGS);
    fun!(map, "MAX", fun_max, 0, FN_VARARGS);
    fun!(map, "INC", fun_inc, 1);
    fun!(map, "DEC", fun_dec, 1);
    fun!(map, "SQRT", fun_sqrt, 1);
    fun!(map, "POWER", fun_power, 2);
    fun!(map, "LN", fun_ln, 1);
    fun!(map, "LOG", fun_log, 1);
    fun!(map, "EXP", fun_exp, 1);
    fun!(map, "FLOOR", fun_floor, 1);
    fun!(map, "CEIL", fun_ceil, 1);
    fun!(map, "ROUND", fun_round, 2);
    fun!(map, "TRUNC", fun_trunc, 1);
    fun!(map, "PI", fun_pi, 0);
    fun!(map, "E", fun_e, 0);
    fun!(map, "BOUND", fun_bound, 3);
    fun!(map, "DIST2D", fun_dist2d, 4);
    fun!(map, "DIST3D", fun_dist3d, 6);
    fun!(map, "RAND", fun_rand, 1);
    fun!(map, "DIE", fun_die, 2);
    fun!(map, "LNUM", fun_lnum, 0, FN_VARARGS);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;
    use crate::eval::eval_top;
    use crate::host::NullHost;

    fn run(input: &str) -> String {
        let mut db = Db::minimal();
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        eval_top(&mut ctx, input)
    }

    #[test]
    fn test_add_is_soft_typed() {
        assert_eq!(run("[add(1,2,3)]"), "6");
        assert_eq!(run("[add(1.5,2.25)]"), "3.75");
        assert_eq!(run("[add(2 fish,3)]"), "5");
    }

    #[test]
    fn test_integer_division_and_mod() {
        assert_eq!(run("[div(17,5)]"), "3");
        assert_eq!(run("[div(5,0)]"), "#-1 DIVIDE BY ZERO");
        assert_eq!(run("[mod(-7,3)]"), "2");
        assert_eq!(run("[remainder(-7,3)]"), "-1");
        assert_eq!(run("[floordiv(-7,3)]"), "-3");
    }

    #[test]
    fn test_sqrt_negative() {
        assert_eq!(run("[sqrt(16)]"), "4");
        assert_eq!(run("[sqrt(-1)]"), "#-1 SQUARE ROOT OF NEGATIVE");
    }

    #[test]
    fn test_arity_error_token() {
        assert_eq!(run("[sub(1)]"), "#-1 FUNCTION (SUB) EXPECTS 2 ARGUMENTS BUT GOT 1");
    }

    #[test]
    fn test_zero_arity_accepts_empty_parens() {
        assert_eq!(run("[pi()]"), "3.141593");
    }

    #[test]
    fn test_bounds_and_sign() {
        assert_eq!(run("[bound(12,1,10)]"), "10");
        assert_eq!(run("[bound(-3,1,10)]"), "1");
        assert_eq!(run("[sign(-2.5)]"), "-1");
        assert_eq!(run("[sign(0)]"), "0");
    }

    #[test]
    fn test_lnum_forms() {
        assert_eq!(run("[lnum(4)]"), "0 1 2 3");
        assert_eq!(run("[lnum(2,5)]"), "2 3 4 5");
        assert_eq!(run("[lnum(5,2)]"), "5 4 3 2");
        assert_eq!(run("[lnum(1,3,|)]"), "1|2|3");
    }

    #[test]
    fn test_rand_in_range() {
        for _ in 0..20 {
            let v: i64 = run("[rand(6)]").parse().unwrap();
            assert!((0..6).contains(&v));
        }
        assert_eq!(run("[rand(0)]"), "0");
    }

    #[test]
    fn test_rounding_family() {
        assert_eq!(run("[floor(2.7)]"), "2");
        assert_eq!(run("[ceil(2.1)]"), "3");
        assert_eq!(run("[round(2.456,2)]"), "2.46");
        assert_eq!(run("[trunc(-2.7)]"), "-2");
    }
}
