//! Boolean logic, comparisons, conditionals, and type predicates.

use super::{atof, bool01, fun, is_true, FuncMap, FN_NO_EVAL, FN_VARARGS};
use crate::eval::EvalContext;

pub fn fun_and(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(bool01(!args.is_empty() && args.iter().all(|a| is_true(a))));
}

pub fn fun_or(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(bool01(args.iter().any(|a| is_true(a))));
}

pub fn fun_xor(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let count = args.iter().filter(|a| is_true(a)).count();
    out.push_str(bool01(count % 2 == 1));
}

pub fn fun_not(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(bool01(!is_true(&args[0])));
}

/// t(): the canonical truth test.
pub fn fun_t(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(bool01(is_true(&args[0])));
}

pub fn fun_gt(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(bool01(atof(&args[0]) > atof(&args[1])));
}

pub fn fun_gte(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(bool01(atof(&args[0]) >= atof(&args[1])));
}

pub fn fun_lt(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(bool01(atof(&args[0]) < atof(&args[1])));
}

pub fn fun_lte(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(bool01(atof(&args[0]) <= atof(&args[1])));
}

pub fn fun_eq(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(bool01(atof(&args[0]) == atof(&args[1])));
}

pub fn fun_neq(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(bool01(atof(&args[0]) != atof(&args[1])));
}

/// comp(): string comparison, -1/0/1.
pub fn fun_comp(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(match args[0].cmp(&args[1]) {
        std::cmp::Ordering::Less => "-1",
        std::cmp::Ordering::Equal => "0",
        std::cmp::Ordering::Greater => "1",
    });
}

/// streq(): case-insensitive string equality.
pub fn fun_streq(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(bool01(args[0].eq_ignore_ascii_case(&args[1])));
}

/// if(cond, then[, else]) - only the chosen branch is evaluated.
pub fn fun_if(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let cond = super::eval_sub(ctx, &args[0]);
    if is_true(&cond) {
        super::eval_sub_into(ctx, out, &args[1]);
    } else if args.len() > 2 {
        super::eval_sub_into(ctx, out, &args[2]);
    }
}

pub fn fun_isnum(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let t = args[0].trim();
    out.push_str(bool01(!t.is_empty() && t.parse::<f64>().is_ok()));
}

pub fn fun_isint(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let t = args[0].trim();
    out.push_str(bool01(!t.is_empty() && t.parse::<i64>().is_ok()));
}

pub fn fun_isdbref(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let t = args[0].trim();
    let ok = t
        .strip_prefix('#')
        .and_then(|rest| rest.parse::<i32>().ok())
        .map(|d| ctx.db.exists(d))
        .unwrap_or(false);
    out.push_str(bool01(ok));
}

/// isword(): true when every character is a letter.
pub fn fun_isword(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let t = args[0].trim();
    out.push_str(bool01(!t.is_empty() && t.chars().all(|c| c.is_alphabetic())));
}

pub fn register(map: &mut FuncMap) {
    fun!(map, "AND", fun_and, 0, FN_VARARGS);
    fun!(map, "OR", fun_or, 0, FN_VARARGS);
    fun!(map, "XOR", fun_xor, 0, FN_VARARGS);
    fun!(map, "NOT", fun_not, 1);
    fun!(map, "T", fun_t, 1);
    fun!(map, "GT", fun_gt, 2);
    fun!(map, "GTE", fun_gte, 2);
    fun!(map, "LT", fun_lt, 2);
    fun!(map, "LTE", fun_lte, 2);
    fun!(map, "EQ", fun_eq, 2);
    fun!(map, "NEQ", fun_neq, 2);
    fun!(map, "COMP", fun_comp, 2);
    fun!(map, "STREQ", fun_streq, 2);
    fun!(map, "IF", fun_if, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "IFELSE", fun_if, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "ISNUM", fun_isnum, 1);
    fun!(map, "ISINT", fun_isint, 1);
    fun!(map, "ISDBREF", fun_isdbref, 1);
    fun!(map, "ISWORD", fun_isword, 1);
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
    fn test_boolean_basics() {
        assert_eq!(run("[and(1,1,1)]"), "1");
        assert_eq!(run("[and(1,0)]"), "0");
        assert_eq!(run("[or(0,0,1)]"), "1");
        assert_eq!(run("[xor(1,1)]"), "0");
        assert_eq!(run("[xor(1,0)]"), "1");
        assert_eq!(run("[not(0)]"), "1");
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(run("[gt(3,2)]"), "1");
        assert_eq!(run("[lte(2,2)]"), "1");
        assert_eq!(run("[eq(2.0,2)]"), "1");
        assert_eq!(run("[comp(apple,banana)]"), "-1");
        assert_eq!(run("[streq(ABC,abc)]"), "1");
    }

    #[test]
    fn test_if_lazy_branches() {
        assert_eq!(run("[if(1,yes,no)]"), "yes");
        assert_eq!(run("[if(0,yes,no)]"), "no");
        assert_eq!(run("[if(0,yes)]"), "");
        // The untaken branch must not evaluate: div by zero would token.
        assert_eq!(run("[if(1,ok,[div(1,0)])]"), "ok");
    }

    #[test]
    fn test_predicates() {
        assert_eq!(run("[isnum(12abc)]"), "0");
        assert_eq!(run("[isnum(12.5)]"), "1");
        assert_eq!(run("[isint(12.5)]"), "0");
        assert_eq!(run("[isint(-3)]"), "1");
        assert_eq!(run("[isdbref(#1)]"), "1");
        assert_eq!(run("[isdbref(#9999)]"), "0");
        assert_eq!(run("[isword(hello)]"), "1");
        assert_eq!(run("[isword(hi there)]"), "0");
    }
}
