//! Registers, scoping wrappers, user-function invocation, and switch/case.

use super::{atoi, eval_sub, eval_sub_into, fun, ufun_call, FuncMap, FN_NO_EVAL, FN_VARARGS};
use crate::eval::EvalContext;
use crate::wild::wild_match;

// ===== Registers =====

/// setq(name, value[, name, value]...): silent register assignment.
pub fn fun_setq(ctx: &mut EvalContext, args: &[String], _out: &mut String) {
    for pair in args.chunks(2) {
        if let [name, value] = pair {
            ctx.regs.set(name.trim(), value.clone());
        }
    }
}

/// setr(name, value): assign and echo the value.
pub fn fun_setr(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    ctx.regs.set(args[0].trim(), args[1].clone());
    out.push_str(&args[1]);
}

pub fn fun_r(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&ctx.regs.get(args[0].trim()).to_string());
}

/// let(name, value, ..., expr): scoped assignments; the whole register
/// file is restored afterward.
pub fn fun_let(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.is_empty() {
        return;
    }
    let snapshot = ctx.regs.clone();
    let pairs = args.len() - 1;
    for pair in args[..pairs].chunks(2) {
        if let [name, value] = pair {
            let name = eval_sub(ctx, name);
            let value = eval_sub(ctx, value);
            ctx.regs.set(name.trim(), value);
        }
    }
    eval_sub_into(ctx, out, &args[pairs]);
    ctx.regs = snapshot;
}

/// localize(expr): evaluate with the register file saved and restored.
pub fn fun_localize(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.is_empty() {
        return;
    }
    let snapshot = ctx.regs.clone();
    eval_sub_into(ctx, out, &args[0]);
    ctx.regs = snapshot;
}

// ===== User-function invocation =====

/// u(obj/attr, args...): run the attribute as the target object.
pub fn fun_u(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.is_empty() {
        return;
    }
    ufun_call(ctx, out, &args[0], &args[1..], true, false);
}

/// ulocal(): u() with the register file preserved.
pub fn fun_ulocal(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.is_empty() {
        return;
    }
    ufun_call(ctx, out, &args[0], &args[1..], true, true);
}

/// s(text): one extra pass through the evaluator.
pub fn fun_s(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    eval_sub_into(ctx, out, &args[0]);
}

/// objeval(obj, expr): evaluate as another executor, when controlled.
pub fn fun_objeval(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let spec = eval_sub(ctx, &args[0]);
    let target = super::match_thing(ctx, &spec);
    let saved = ctx.executor;
    if ctx.db.exists(target) && ctx.db.controls(saved, target) {
        ctx.executor = target;
    }
    eval_sub_into(ctx, out, &args[1]);
    ctx.executor = saved;
}

/// null(args...): evaluate for side effects, emit nothing.
pub fn fun_null(_ctx: &mut EvalContext, _args: &[String], _out: &mut String) {}

// ===== Switch =====

fn switch_engine(ctx: &mut EvalContext, args: &[String], out: &mut String, all: bool) {
    if args.len() < 2 {
        return;
    }
    let expr = eval_sub(ctx, &args[0]);
    ctx.loops.push_switch(expr.clone());
    let mut matched = false;
    let mut idx = 1;
    while idx + 1 < args.len() {
        let pattern = eval_sub(ctx, &args[idx]);
        if wild_match(&pattern, &expr) {
            if matched {
                out.push_str(" ");
            }
            eval_sub_into(ctx, out, &args[idx + 1]);
            matched = true;
            if !all {
                break;
            }
        }
        idx += 2;
    }
    if !matched && args.len() % 2 == 0 {
        // Trailing odd argument is the default.
        eval_sub_into(ctx, out, &args[args.len() - 1]);
    }
    ctx.loops.pop_switch();
}

/// switch(expr, pat, result, ..., default): first wildcard match wins.
pub fn fun_switch(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    switch_engine(ctx, args, out, false);
}

/// switchall(): every matching pair emits its result.
pub fn fun_switchall(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    switch_engine(ctx, args, out, true);
}

/// case(): switch with case-insensitive equality instead of wildcards.
pub fn fun_case(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let expr = eval_sub(ctx, &args[0]);
    ctx.loops.push_switch(expr.clone());
    let mut idx = 1;
    let mut matched = false;
    while idx + 1 < args.len() {
        let pattern = eval_sub(ctx, &args[idx]);
        if pattern.eq_ignore_ascii_case(&expr) {
            eval_sub_into(ctx, out, &args[idx + 1]);
            matched = true;
            break;
        }
        idx += 2;
    }
    if !matched && args.len() % 2 == 0 {
        eval_sub_into(ctx, out, &args[args.len() - 1]);
    }
    ctx.loops.pop_switch();
}

// ===== Lazy attribute defaults =====

/// default(obj/attr, default): attribute text, or the default when the
/// attribute is missing or empty. The default is only evaluated on demand.
pub fn fun_default(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let spec = eval_sub(ctx, &args[0]);
    match super::fetch_ufun_text(ctx, &spec) {
        Some(text) if !text.is_empty() => out.push_str(&text),
        _ => eval_sub_into(ctx, out, &args[1]),
    }
}

/// edefault(): like default(), but the attribute text is evaluated.
pub fn fun_edefault(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let spec = eval_sub(ctx, &args[0]);
    match super::fetch_ufun_text(ctx, &spec) {
        Some(text) if !text.is_empty() => {
            let mut buf = String::new();
            crate::eval::exec(
                ctx,
                &mut buf,
                &text,
                crate::eval::EV_FCHECK | crate::eval::EV_FMAND,
                None,
            );
            out.push_str(&buf);
        }
        _ => eval_sub_into(ctx, out, &args[1]),
    }
}

/// udefault(obj/attr, default, args...): u() with a fallback.
pub fn fun_udefault(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let spec = eval_sub(ctx, &args[0]);
    match super::fetch_ufun_text(ctx, &spec) {
        Some(text) if !text.is_empty() => {
            let uargs: Vec<String> = args[2..].iter().map(|a| eval_sub(ctx, a)).collect();
            ufun_call(ctx, out, &spec, &uargs, true, false);
        }
        _ => eval_sub_into(ctx, out, &args[1]),
    }
}

// ===== The per-context stack =====

pub fn fun_push(ctx: &mut EvalContext, args: &[String], _out: &mut String) {
    let value = args.first().cloned().unwrap_or_default();
    ctx.stack.push(value);
}

pub fn fun_pop(ctx: &mut EvalContext, _args: &[String], out: &mut String) {
    if let Some(top) = ctx.stack.pop() {
        out.push_str(&top);
    }
}

pub fn fun_peek(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let depth = args.first().map(|a| atoi(a)).unwrap_or(0).max(0) as usize;
    let len = ctx.stack.len();
    if depth < len {
        out.push_str(&ctx.stack[len - 1 - depth].clone());
    }
}

/// toss(): discard the top of the stack.
pub fn fun_toss(ctx: &mut EvalContext, _args: &[String], _out: &mut String) {
    ctx.stack.pop();
}

pub fn fun_lstack(ctx: &mut EvalContext, _args: &[String], out: &mut String) {
    let items: Vec<String> = ctx.stack.iter().rev().cloned().collect();
    out.push_str(&items.join(" "));
}

pub fn fun_empty(ctx: &mut EvalContext, _args: &[String], out: &mut String) {
    out.push_str(super::bool01(ctx.stack.is_empty()));
}

pub fn register(map: &mut FuncMap) {
    fun!(map, "SETQ", fun_setq, 0, FN_VARARGS);
    fun!(map, "SETR", fun_setr, 2);
    fun!(map, "R", fun_r, 1);
    fun!(map, "LET", fun_let, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "LOCALIZE", fun_localize, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "PRIVATE", fun_localize, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "U", fun_u, 0, FN_VARARGS);
    fun!(map, "ULOCAL", fun_ulocal, 0, FN_VARARGS);
    fun!(map, "UPRIVATE", fun_ulocal, 0, FN_VARARGS);
    fun!(map, "S", fun_s, 1);
    fun!(map, "OBJEVAL", fun_objeval, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "NULL", fun_null, 0, FN_VARARGS);
    fun!(map, "SWITCH", fun_switch, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "SWITCHALL", fun_switchall, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "CASE", fun_case, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "DEFAULT", fun_default, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "EDEFAULT", fun_edefault, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "UDEFAULT", fun_udefault, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "PUSH", fun_push, 0, FN_VARARGS);
    fun!(map, "POP", fun_pop, 0, FN_VARARGS);
    fun!(map, "PEEK", fun_peek, 0, FN_VARARGS);
    fun!(map, "TOSS", fun_toss, 0, FN_VARARGS);
    fun!(map, "LSTACK", fun_lstack, 0, FN_VARARGS);
    fun!(map, "EMPTY", fun_empty, 0, FN_VARARGS);
}

#[cfg(test)]
mod tests {
    use crate::db::{Db, ObjectType, GOD};
    use crate::eval::{eval_top, EvalContext};
    use crate::host::NullHost;

    fn run(input: &str) -> String {
        let mut db = Db::minimal();
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        eval_top(&mut ctx, input)
    }

    #[test]
    fn test_setq_r_setr() {
        assert_eq!(run("[setq(0,hello)][r(0)] [r(0)]"), "hello hello");
        assert_eq!(run("[setr(a,word)]-[r(a)]"), "word-word");
        assert_eq!(run("[setq(total,9)][r(total)]"), "9");
    }

    #[test]
    fn test_let_restores_registers() {
        let mut db = Db::minimal();
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        let out = eval_top(&mut ctx, "[let(x,foo,y,bar,[r(x)]-[r(y)])]");
        assert_eq!(out, "foo-bar");
        assert_eq!(eval_top(&mut ctx, "[r(x)][r(y)]"), "");
    }

    #[test]
    fn test_localize_restores() {
        let mut db = Db::minimal();
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        ctx.regs.set("0", "outer".to_string());
        let out = eval_top(&mut ctx, "[localize([setq(0,inner)][r(0)])]-[r(0)]");
        assert_eq!(out, "inner-outer");
    }

    #[test]
    fn test_switch_first_match() {
        assert_eq!(run("[switch(5,1,one,2,two,*,other)]"), "other");
        assert_eq!(run("[switch(2,1,one,2,two,*,other)]"), "two");
        assert_eq!(run("[switch(hat,h*,hats,*,other)]"), "hats");
    }

    #[test]
    fn test_switch_token() {
        assert_eq!(run("[switch(boo,b*,[ucstr(#$)]!,nope)]"), "BOO!");
    }

    #[test]
    fn test_switch_no_match_no_default() {
        assert_eq!(run("[switch(5,1,one,2,two)]"), "");
    }

    #[test]
    fn test_switchall_takes_every_match() {
        assert_eq!(run("[switchall(abc,a*,one,*c,two,x,three)]"), "one two");
        assert_eq!(run("[switchall(zzz,a*,one,b*,two,fallback)]"), "fallback");
    }

    #[test]
    fn test_case_equality_not_wildcard() {
        assert_eq!(run("[case(A*,a*,star,other)]"), "star");
        assert_eq!(run("[case(abc,a*,star,other)]"), "other");
    }

    #[test]
    fn test_u_swaps_executor() {
        let mut db = Db::minimal();
        let num = db.define_user_attr("WHOAMI", 0);
        let obj = db.create("widget", ObjectType::Thing, GOD, 0);
        db.get_mut(obj).unwrap().attr_set(num, "%!".to_string());
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        // u() runs as the widget; map() runs as the caller.
        assert_eq!(eval_top(&mut ctx, "[u(widget/whoami)]"), format!("#{}", obj));
        assert_eq!(eval_top(&mut ctx, "[map(widget/whoami,x)]"), "#1");
    }

    #[test]
    fn test_ulocal_preserves_registers() {
        let mut db = Db::minimal();
        let num = db.define_user_attr("CLOBBER", 0);
        let obj = db.create("widget", ObjectType::Thing, GOD, 0);
        db.get_mut(obj)
            .unwrap()
            .attr_set(num, "[setq(0,clobbered)]done".to_string());
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        ctx.regs.set("0", "safe".to_string());
        assert_eq!(eval_top(&mut ctx, "[ulocal(widget/clobber)]-[r(0)]"), "done-safe");
        assert_eq!(eval_top(&mut ctx, "[u(widget/clobber)]-[r(0)]"), "done-clobbered");
    }

    #[test]
    fn test_u_passes_cargs() {
        let mut db = Db::minimal();
        let num = db.define_user_attr("GREET", 0);
        let obj = db.create("widget", ObjectType::Thing, GOD, 0);
        db.get_mut(obj)
            .unwrap()
            .attr_set(num, "hi %0 and %1".to_string());
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        assert_eq!(
            eval_top(&mut ctx, "[u(widget/greet,alpha,beta)]"),
            "hi alpha and beta"
        );
    }

    #[test]
    fn test_default_family() {
        let mut db = Db::minimal();
        let num = db.define_user_attr("SET", 0);
        let obj = db.create("widget", ObjectType::Thing, GOD, 0);
        db.get_mut(obj)
            .unwrap()
            .attr_set(num, "[add(1,1)]".to_string());
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        // default() returns raw text; edefault() evaluates it.
        assert_eq!(eval_top(&mut ctx, "[default(widget/set,fallback)]"), "[add(1,1)]");
        assert_eq!(eval_top(&mut ctx, "[edefault(widget/set,fallback)]"), "2");
        assert_eq!(eval_top(&mut ctx, "[default(widget/unset,fallback)]"), "fallback");
        assert_eq!(
            eval_top(&mut ctx, "[udefault(widget/unset,fallback)]"),
            "fallback"
        );
    }

    #[test]
    fn test_stack_push_pop_balance() {
        let mut db = Db::minimal();
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        assert_eq!(eval_top(&mut ctx, "[empty()]"), "1");
        eval_top(&mut ctx, "[push(a)][push(b)]");
        assert_eq!(eval_top(&mut ctx, "[peek()]"), "b");
        assert_eq!(eval_top(&mut ctx, "[peek(1)]"), "a");
        assert_eq!(eval_top(&mut ctx, "[lstack()]"), "b a");
        assert_eq!(eval_top(&mut ctx, "[pop()]"), "b");
        assert_eq!(eval_top(&mut ctx, "[pop()]"), "a");
        assert_eq!(eval_top(&mut ctx, "[empty()]"), "1");
    }

    #[test]
    fn test_s_reevaluates() {
        assert_eq!(run(r"[setq(0,\[add(2,3)\])][s(%q0)]"), "5");
    }

    #[test]
    fn test_null_swallows_output() {
        assert_eq!(run("[null(add(1,2))]"), "");
    }
}
