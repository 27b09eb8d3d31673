//! The loop family: iter/list/parse, the attribute-driven iteration helpers,
//! and the break machinery.
//!
//! Iteration callbacks run as the caller; only u()/ulocal() swap the
//! executor. That asymmetry is part of the contract.

use super::{atoi, eval_sub, eval_sub_into, fun, is_true, list_words, ufun_result, FuncMap,
    FN_NO_EVAL, FN_VARARGS};
use crate::config::LOOP_ITERATION_LIMIT;
use crate::eval::EvalContext;
use crate::host::NotifyKind;

fn loop_seps(ctx: &mut EvalContext, args: &[String], isep_idx: usize) -> (String, String) {
    let isep = match args.get(isep_idx) {
        Some(raw) => {
            let s = eval_sub(ctx, raw);
            if s.is_empty() {
                " ".to_string()
            } else {
                s
            }
        }
        None => " ".to_string(),
    };
    let osep = match args.get(isep_idx + 1) {
        Some(raw) => eval_sub(ctx, raw),
        None => " ".to_string(),
    };
    (isep, osep)
}

// The shared iter engine. `second` carries the paired list for the
// two-list variants; `emit` posts each result to the executor instead of
// the output buffer (the list() behavior); `stop_when` turns iteration
// off after the first body result with that truth value (whentrue /
// whenfalse).
fn iter_engine(
    ctx: &mut EvalContext,
    args: &[String],
    out: &mut String,
    second: bool,
    emit: bool,
    stop_when: Option<bool>,
) {
    if args.len() < 2 {
        return;
    }
    let list1 = eval_sub(ctx, &args[0]);
    let (body_idx, list2) = if second {
        if args.len() < 3 {
            return;
        }
        (2, eval_sub(ctx, &args[1]))
    } else {
        (1, String::new())
    };
    let (isep, osep) = loop_seps(ctx, args, body_idx + 1);
    let words = list_words(&list1, &isep);
    let pairs = list_words(&list2, &isep);
    ctx.loops.push();
    let mut first = true;
    for (idx, word) in words.iter().enumerate() {
        if ctx.loops.breaking() {
            break;
        }
        if let Some(frame) = ctx.loops.top_mut() {
            frame.token = word.clone();
            frame.token2 = pairs.get(idx).cloned().unwrap_or_default();
            frame.index = idx;
        }
        let mut piece = String::new();
        eval_sub_into(ctx, &mut piece, &args[body_idx]);
        if let Some(stop) = stop_when {
            if is_true(&piece) == stop {
                ctx.loops.pop();
                return;
            }
        }
        if emit {
            let target = ctx.executor;
            ctx.notify(target, NotifyKind::Pemit, piece);
        } else {
            if !first {
                out.push_str(&osep);
            }
            out.push_str(&piece);
        }
        first = false;
    }
    ctx.loops.pop();
}

/// iter(list, body[, isep[, osep]]) - body sees ##, #@, %i0.
pub fn fun_iter(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    iter_engine(ctx, args, out, false, false, None);
}

/// list(): iter whose results are posted to the executor one per element.
pub fn fun_list(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    iter_engine(ctx, args, out, false, true, None);
}

/// iter2(list1, list2, body[, isep[, osep]]) - #+ carries list2's element.
pub fn fun_iter2(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    iter_engine(ctx, args, out, true, false, None);
}

pub fn fun_list2(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    iter_engine(ctx, args, out, true, true, None);
}

/// whentrue(list, body...): stop after the first false body result.
pub fn fun_whentrue(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    iter_engine(ctx, args, out, false, false, Some(false));
}

pub fn fun_whenfalse(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    iter_engine(ctx, args, out, false, false, Some(true));
}

pub fn fun_whentrue2(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    iter_engine(ctx, args, out, true, false, Some(false));
}

pub fn fun_whenfalse2(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    iter_engine(ctx, args, out, true, false, Some(true));
}

/// ibreak([levels]): stop the innermost loop; extra levels unwind outward.
pub fn fun_ibreak(ctx: &mut EvalContext, args: &[String], _out: &mut String) {
    let levels = args.first().map(|a| atoi(a)).unwrap_or(1).max(1) as usize;
    if ctx.loops.in_loop() {
        ctx.loops.break_count = levels.min(ctx.loops.depth());
    }
}

/// ilev(): current loop nesting level, -1 outside any loop.
pub fn fun_ilev(ctx: &mut EvalContext, _args: &[String], out: &mut String) {
    out.push_str(&(ctx.loops.depth() as i64 - 1).to_string());
}

/// itext(n): loop token n levels out from the innermost.
pub fn fun_itext(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let n = atoi(&args[0]).max(0) as usize;
    if let Some(frame) = ctx.loops.frame_from_inner(n) {
        out.push_str(&frame.token.clone());
    }
}

pub fn fun_inum(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let n = atoi(&args[0]).max(0) as usize;
    if let Some(frame) = ctx.loops.frame_from_inner(n) {
        out.push_str(&frame.index.to_string());
    }
}

// ===== Attribute-driven helpers (no executor swap) =====

/// map(obj/attr, list[, isep[, osep]]): the callback sees each element
/// as %0.
pub fn fun_map(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let isep = super::sep_arg(args, 2);
    let osep = super::osep_arg(args, 3, &isep);
    let words = list_words(&args[1], &isep);
    let mut first = true;
    for word in words {
        let result = ufun_result(ctx, &args[0], &[word], false);
        if !first {
            out.push_str(&osep);
        }
        first = false;
        out.push_str(&result);
    }
}

/// filter(obj/attr, list[, isep[, osep]]): keep elements the callback
/// calls true.
pub fn fun_filter(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let isep = super::sep_arg(args, 2);
    let osep = super::osep_arg(args, 3, &isep);
    let words = list_words(&args[1], &isep);
    let mut first = true;
    for word in words {
        let verdict = ufun_result(ctx, &args[0], std::slice::from_ref(&word), false);
        if is_true(&verdict) {
            if !first {
                out.push_str(&osep);
            }
            first = false;
            out.push_str(&word);
        }
    }
}

/// fold(obj/attr, list[, base[, sep]]): %0 is the accumulator, %1 the
/// element.
pub fn fun_fold(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let sep = super::sep_arg(args, 3);
    let words = list_words(&args[1], &sep);
    let mut iter = words.into_iter();
    let mut accum = match args.get(2) {
        Some(base) if !base.is_empty() => base.clone(),
        _ => match iter.next() {
            Some(first) => first,
            None => return,
        },
    };
    for word in iter {
        accum = ufun_result(ctx, &args[0], &[accum, word], false);
    }
    out.push_str(&accum);
}

/// foreach(obj/attr, string): per-character map.
pub fn fun_foreach(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    for c in args[1].chars() {
        let result = ufun_result(ctx, &args[0], &[c.to_string()], false);
        out.push_str(&result);
    }
}

/// step(obj/attr, list, n[, isep[, osep]]): walk the list n elements at a
/// time, passed as %0..%9.
pub fn fun_step(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 3 {
        return;
    }
    let n = atoi(&args[2]).clamp(1, 10) as usize;
    let isep = super::sep_arg(args, 3);
    let osep = super::osep_arg(args, 4, " ");
    let words = list_words(&args[1], &isep);
    let mut first = true;
    for chunk in words.chunks(n) {
        let result = ufun_result(ctx, &args[0], chunk, false);
        if !first {
            out.push_str(&osep);
        }
        first = false;
        out.push_str(&result);
    }
}

/// while(cond, body[, osep]): re-evaluate body while cond is true, capped.
pub fn fun_while(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let osep = match args.get(2) {
        Some(raw) => eval_sub(ctx, raw),
        None => " ".to_string(),
    };
    let mut first = true;
    for _ in 0..LOOP_ITERATION_LIMIT {
        let cond = eval_sub(ctx, &args[0]);
        if !is_true(&cond) {
            break;
        }
        let mut piece = String::new();
        eval_sub_into(ctx, &mut piece, &args[1]);
        if !first {
            out.push_str(&osep);
        }
        first = false;
        out.push_str(&piece);
    }
}

/// until(cond, body[, osep]): while's complement.
pub fn fun_until(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let osep = match args.get(2) {
        Some(raw) => eval_sub(ctx, raw),
        None => " ".to_string(),
    };
    let mut first = true;
    for _ in 0..LOOP_ITERATION_LIMIT {
        let cond = eval_sub(ctx, &args[0]);
        if is_true(&cond) {
            break;
        }
        let mut piece = String::new();
        eval_sub_into(ctx, &mut piece, &args[1]);
        if !first {
            out.push_str(&osep);
        }
        first = false;
        out.push_str(&piece);
    }
}

/// mix(obj/attr, list1, list2[, sep]): pairwise map over two lists.
pub fn fun_mix(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 3 {
        return;
    }
    let sep = super::sep_arg(args, 3);
    let a = list_words(&args[1], &sep);
    let b = list_words(&args[2], &sep);
    if a.len() != b.len() {
        out.push_str(crate::error::ERR_VECTOR_DIMENSIONS);
        return;
    }
    let mut first = true;
    for (wa, wb) in a.into_iter().zip(b) {
        let result = ufun_result(ctx, &args[0], &[wa, wb], false);
        if !first {
            out.push_str(&sep);
        }
        first = false;
        out.push_str(&result);
    }
}

/// munge(obj/attr, list1, list2[, sep]): the callback reorders list1; the
/// same reordering is applied to list2.
pub fn fun_munge(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 3 {
        return;
    }
    let sep = super::sep_arg(args, 3);
    let list1 = list_words(&args[1], &sep);
    let list2 = list_words(&args[2], &sep);
    if list1.len() != list2.len() {
        out.push_str(crate::error::ERR_STRING_LENGTHS);
        return;
    }
    let reordered = ufun_result(ctx, &args[0], &[args[1].clone(), sep.clone()], false);
    let mut used = vec![false; list1.len()];
    let mut first = true;
    for word in list_words(&reordered, &sep) {
        if let Some(idx) = list1
            .iter()
            .enumerate()
            .position(|(i, w)| !used[i] && *w == word)
        {
            used[idx] = true;
            if !first {
                out.push_str(&sep);
            }
            first = false;
            out.push_str(&list2[idx]);
        }
    }
}

/// sortby(obj/attr, list[, sep]): comparator sort; the callback sees %0
/// and %1 and answers negative, zero, or positive.
pub fn fun_sortby(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let sep = super::sep_arg(args, 2);
    let mut words = list_words(&args[1], &sep);
    // Insertion sort keeps comparator invocations predictable under the
    // invocation budget.
    for i in 1..words.len() {
        let mut j = i;
        while j > 0 {
            let verdict = ufun_result(
                ctx,
                &args[0],
                &[words[j - 1].clone(), words[j].clone()],
                false,
            );
            if atoi(&verdict) > 0 {
                words.swap(j - 1, j);
                j -= 1;
            } else {
                break;
            }
        }
    }
    out.push_str(&words.join(&sep));
}

pub fn register(map: &mut FuncMap) {
    fun!(map, "ITER", fun_iter, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "PARSE", fun_iter, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "LIST", fun_list, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "ITER2", fun_iter2, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "LIST2", fun_list2, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "WHENTRUE", fun_whentrue, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "WHENFALSE", fun_whenfalse, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "WHENTRUE2", fun_whentrue2, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "WHENFALSE2", fun_whenfalse2, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "IBREAK", fun_ibreak, 0, FN_VARARGS);
    fun!(map, "ILEV", fun_ilev, 0);
    fun!(map, "ITEXT", fun_itext, 1);
    fun!(map, "INUM", fun_inum, 1);
    fun!(map, "MAP", fun_map, 0, FN_VARARGS);
    fun!(map, "FILTER", fun_filter, 0, FN_VARARGS);
    fun!(map, "FOLD", fun_fold, 0, FN_VARARGS);
    fun!(map, "FOREACH", fun_foreach, 2);
    fun!(map, "STEP", fun_step, 0, FN_VARARGS);
    fun!(map, "WHILE", fun_while, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "UNTIL", fun_until, 0, FN_VARARGS | FN_NO_EVAL);
    fun!(map, "MIX", fun_mix, 0, FN_VARARGS);
    fun!(map, "MUNGE", fun_munge, 0, FN_VARARGS);
    fun!(map, "SORTBY", fun_sortby, 0, FN_VARARGS);
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

    fn run_with_attr(attr_name: &str, attr_text: &str, input: &str) -> String {
        let mut db = Db::minimal();
        let num = db.define_user_attr(attr_name, 0);
        let obj = db.create("widget", ObjectType::Thing, GOD, 0);
        db.get_mut(obj)
            .unwrap()
            .attr_set(num, attr_text.to_string());
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        eval_top(&mut ctx, input)
    }

    #[test]
    fn test_iter_tokens() {
        assert_eq!(run("[iter(a b c,##-#@)]"), "a-0 b-1 c-2");
    }

    #[test]
    fn test_iter_custom_seps() {
        assert_eq!(run("[iter(a|b|c,##,|,+)]"), "a+b+c");
    }

    #[test]
    fn test_iter_nesting_and_itext() {
        assert_eq!(
            run("[iter(a b,[iter(1 2,[itext(1)][itext(0)])])]"),
            "a1 a2 b1 b2"
        );
        assert_eq!(run("[iter(x,%i0[ilev()])]"), "x0");
    }

    #[test]
    fn test_iter2_pairs() {
        assert_eq!(run("[iter2(a b c,1 2 3,###+)]"), "a1 b2 c3");
        assert_eq!(run("[iter2(a b,1 2,%j)]"), "1 2");
    }

    #[test]
    fn test_ibreak_stops_innermost() {
        assert_eq!(run("[iter(a b c,##[if(eq(#@,1),[ibreak()])])]"), "a b");
    }

    #[test]
    fn test_ibreak_multilevel() {
        // Breaking two levels from the inner loop stops the outer one too.
        assert_eq!(
            run("[iter(a b,[iter(1 2,[if(streq(##,1),[ibreak(2)])]##)])]"),
            "1"
        );
    }

    #[test]
    fn test_whentrue_stops_on_false() {
        assert_eq!(run("[whentrue(1 2 0 4,##)]"), "1 2");
    }

    #[test]
    fn test_map_runs_as_caller() {
        assert_eq!(run_with_attr("DOUBLE", "[mul(%0,2)]", "[map(widget/double,1 2 3)]"), "2 4 6");
    }

    #[test]
    fn test_filter() {
        assert_eq!(
            run_with_attr("BIG", "[gt(%0,2)]", "[filter(widget/big,1 2 3 4)]"),
            "3 4"
        );
    }

    #[test]
    fn test_fold_with_base() {
        assert_eq!(
            run_with_attr("SUM", "[add(%0,%1)]", "[fold(widget/sum,1 2 3,10)]"),
            "16"
        );
        assert_eq!(
            run_with_attr("SUM", "[add(%0,%1)]", "[fold(widget/sum,1 2 3)]"),
            "6"
        );
    }

    #[test]
    fn test_foreach_per_char() {
        assert_eq!(
            run_with_attr("DOT", "%0.", "[foreach(widget/dot,abc)]"),
            "a.b.c."
        );
    }

    #[test]
    fn test_step_chunks() {
        assert_eq!(
            run_with_attr("PAIR", "%0+%1", "[step(widget/pair,a b c d,2)]"),
            "a+b c+d"
        );
    }

    #[test]
    fn test_while_and_cap() {
        assert_eq!(
            run("[setq(0,0)][while(lt(%q0,3),[setq(0,inc(%q0))]%q0)]"),
            "1 2 3"
        );
        // An always-true condition stops silently at the cap.
        let out = run("[setq(0,0)][while(1,[setq(0,inc(%q0))])]");
        assert!(out.trim_end().len() <= crate::config::LOOP_ITERATION_LIMIT);
    }

    #[test]
    fn test_until() {
        assert_eq!(
            run("[setq(0,0)][until(gte(%q0,2),[setq(0,inc(%q0))]%q0)]"),
            "1 2"
        );
    }

    #[test]
    fn test_mix_pairwise() {
        assert_eq!(
            run_with_attr("JOIN", "%0%1", "[mix(widget/join,a b,1 2)]"),
            "a1 b2"
        );
        assert_eq!(
            run_with_attr("JOIN", "%0%1", "[mix(widget/join,a b,1 2 3)]"),
            "#-1 VECTORS MUST BE SAME DIMENSIONS"
        );
    }

    #[test]
    fn test_sortby_comparator() {
        assert_eq!(
            run_with_attr("CMP", "[sub(%0,%1)]", "[sortby(widget/cmp,3 1 2)]"),
            "1 2 3"
        );
    }

    #[test]
    fn test_munge_reorders_pair_list() {
        assert_eq!(
            run_with_attr("SRT", "[sort(%0,n)]", "[munge(widget/srt,3 1 2,c a b)]"),
            "a b c"
        );
    }

    #[test]
    fn test_list_posts_notifications() {
        let mut db = Db::minimal();
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        let out = eval_top(&mut ctx, "[list(a b,##!)]");
        assert_eq!(out, "");
        let notes = ctx.take_notifications();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].message, "a!");
        assert_eq!(notes[1].message, "b!");
    }
}
