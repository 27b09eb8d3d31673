// ABOUTME: End-to-end evaluator scenarios over a small world

use softmush::db::{Db, ObjectType, A_DESC, A_SEX, GOD};
use softmush::eval::{eval_top, EvalContext};
use softmush::host::NullHost;

fn world() -> Db {
    let mut db = Db::minimal();
    let brick = db.create("brick wall thing", ObjectType::Thing, GOD, 0);
    db.get_mut(brick)
        .unwrap()
        .attr_set(A_DESC, "brick wall".to_string());
    db
}

fn run(input: &str) -> String {
    let mut db = world();
    let host = NullHost;
    let mut ctx = EvalContext::new(&mut db, &host);
    eval_top(&mut ctx, input)
}

#[test]
fn scenario_add() {
    assert_eq!(run("[add(1,2,3)]"), "6");
}

#[test]
fn scenario_iter_tokens() {
    assert_eq!(run("[iter(a b c,##-#@)]"), "a-0 b-1 c-2");
}

#[test]
fn scenario_switch_default() {
    assert_eq!(run("[switch(5,1,one,2,two,*,other)]"), "other");
}

#[test]
fn scenario_setq_reuse() {
    assert_eq!(run("[setq(0,hello)][r(0)] [r(0)]"), "hello hello");
}

#[test]
fn scenario_get_attribute() {
    // #10 in the spec's phrasing; here the brick is #2.
    assert_eq!(run("[get(#2/desc)]"), "brick wall");
}

#[test]
fn scenario_pronouns_follow_sex() {
    let mut db = world();
    db.get_mut(GOD)
        .unwrap()
        .attr_set(A_SEX, "male".to_string());
    let host = NullHost;
    let mut ctx = EvalContext::new(&mut db, &host);
    assert_eq!(eval_top(&mut ctx, "%s waves."), "he waves.");
    assert_eq!(eval_top(&mut ctx, "%S waves."), "He waves.");
}

#[test]
fn scenario_let_scopes_registers() {
    let mut db = world();
    let host = NullHost;
    let mut ctx = EvalContext::new(&mut db, &host);
    assert_eq!(
        eval_top(&mut ctx, "[let(x,foo,y,bar,[r(x)]-[r(y)])]"),
        "foo-bar"
    );
    assert_eq!(eval_top(&mut ctx, "[r(x)][r(y)]"), "");
}

// ===== Boundary behaviors =====

#[test]
fn empty_parens_zero_vs_one_arity() {
    assert_eq!(run("[pi()]"), "3.141593");
    assert_eq!(
        run("[strlen()]"),
        "#-1 FUNCTION (STRLEN) EXPECTS 1 ARGUMENTS BUT GOT 0"
    );
}

#[test]
fn bracket_nesting_at_and_past_the_limit() {
    let mut db = world();
    let host = NullHost;
    let mut ctx = EvalContext::new(&mut db, &host);
    ctx.nest_limit = 10;
    let at_limit = format!("{}x{}", "[".repeat(10), "]".repeat(10));
    assert_eq!(eval_top(&mut ctx, &at_limit), "x");
    let past_limit = format!("{}x{}", "[".repeat(11), "]".repeat(11));
    assert_eq!(
        eval_top(&mut ctx, &past_limit),
        "#-1 FUNCTION RECURSION LIMIT EXCEEDED"
    );
}

#[test]
fn uncontrolled_set_is_silent() {
    let mut db = world();
    let intruder = db.create("Mallory", ObjectType::Player, GOD, 0);
    db.get_mut(intruder).unwrap().owner = intruder;
    let host = NullHost;
    let mut ctx = EvalContext::new(&mut db, &host).with_actor(intruder);
    assert_eq!(eval_top(&mut ctx, "[set(#2/graffiti,was here)]"), "");
    assert_eq!(eval_top(&mut ctx, "[get(#2/graffiti)]"), "");
}

#[test]
fn wildcard_star_and_question() {
    assert_eq!(run("[strmatch(,*)]"), "1");
    assert_eq!(run("[strmatch(,?)]"), "0");
    assert_eq!(run("[strmatch(ABC,abc)]"), "1");
}

#[test]
fn permissive_number_parsing() {
    assert_eq!(run("[isnum(12abc)]"), "0");
    assert_eq!(run("[add(12abc,0)]"), "12");
    assert_eq!(run("[add(12.5abc,0)]"), "12.5");
}

// ===== Invariants =====

#[test]
fn registers_restore_after_every_scoping_form() {
    let mut db = world();
    let num = db.define_user_attr("CLOB", 0);
    db.get_mut(2)
        .unwrap()
        .attr_set(num, "[setq(z,gone)][setq(named,gone)]x".to_string());
    let host = NullHost;
    let mut ctx = EvalContext::new(&mut db, &host);
    ctx.regs.set("z", "kept".to_string());
    ctx.regs.set("named", "kept".to_string());
    let before = ctx.regs.clone();

    for expr in [
        "[let(z,tmp,[r(z)])]",
        "[localize([setq(z,tmp)][setq(named,tmp)])]",
        "[private([setq(z,tmp)])]",
        "[ulocal(#2/clob)]",
        "[uprivate(#2/clob)]",
    ] {
        eval_top(&mut ctx, expr);
        assert_eq!(ctx.regs, before, "register file changed after {}", expr);
    }
}

#[test]
fn loop_frames_empty_after_breaks() {
    let mut db = world();
    let host = NullHost;
    let mut ctx = EvalContext::new(&mut db, &host);
    eval_top(
        &mut ctx,
        "[iter(a b c,[iter(1 2 3,[if(1,[ibreak(2)])]##)])]",
    );
    assert_eq!(ctx.loops.depth(), 0);
    assert!(!ctx.loops.breaking());
}

#[test]
fn notifications_preserve_order() {
    let mut db = world();
    let host = NullHost;
    let mut ctx = EvalContext::new(&mut db, &host);
    eval_top(
        &mut ctx,
        "[pemit(#1,first)][pemit(#1,second)][pemit(#1,third)]",
    );
    let messages: Vec<String> = ctx
        .take_notifications()
        .into_iter()
        .map(|n| n.message)
        .collect();
    assert_eq!(messages, vec!["first", "second", "third"]);
}

#[test]
fn carg_propagation_through_noeval_functions() {
    let mut db = world();
    let host = NullHost;
    let mut ctx = EvalContext::new(&mut db, &host);
    ctx.cargs = vec!["outer".to_string()];
    // iter re-invokes the evaluator without an explicit vector, so %0
    // still reaches the body.
    assert_eq!(eval_top(&mut ctx, "[iter(a b,%0)]"), "outer outer");
    // A user function replaces the vector for its duration.
    let num = ctx.db.define_user_attr("SHOW", 0);
    ctx.db
        .get_mut(2)
        .unwrap()
        .attr_set(num, "%0".to_string());
    assert_eq!(eval_top(&mut ctx, "[u(#2/show,inner)]-%0"), "inner-outer");
}

#[test]
fn user_defined_functions_dispatch_like_builtins() {
    use softmush::functions::{UserFn, UFN_PRES, UFN_PRIV};
    let mut db = world();
    let num = db.define_user_attr("DOUBLER", 0);
    db.get_mut(2)
        .unwrap()
        .attr_set(num, "[mul(%0,2)]".to_string());
    let who = db.define_user_attr("WHOAMI", 0);
    db.get_mut(2).unwrap().attr_set(who, "%!".to_string());
    let clob = db.define_user_attr("CLOB", 0);
    db.get_mut(2)
        .unwrap()
        .attr_set(clob, "[setq(0,gone)]x".to_string());
    let host = NullHost;
    let mut ctx = EvalContext::new(&mut db, &host);
    ctx.ufuncs.insert(
        "DOUBLE".to_string(),
        UserFn {
            obj: 2,
            attr: num,
            flags: 0,
        },
    );
    ctx.ufuncs.insert(
        "WHO".to_string(),
        UserFn {
            obj: 2,
            attr: who,
            flags: UFN_PRIV,
        },
    );
    ctx.ufuncs.insert(
        "SAFECLOB".to_string(),
        UserFn {
            obj: 2,
            attr: clob,
            flags: UFN_PRES,
        },
    );
    assert_eq!(eval_top(&mut ctx, "[double(21)]"), "42");
    // The privileged flag swaps the executor to the owning object.
    assert_eq!(eval_top(&mut ctx, "[who()]"), "#2");
    // The preserve flag restores the register file.
    ctx.regs.set("0", "kept".to_string());
    assert_eq!(eval_top(&mut ctx, "[safeclob()]-[r(0)]"), "x-kept");
    // Built-ins shadow user functions of the same name.
    ctx.ufuncs.insert(
        "ADD".to_string(),
        UserFn {
            obj: 2,
            attr: num,
            flags: 0,
        },
    );
    assert_eq!(eval_top(&mut ctx, "[add(1,1)]"), "2");
}

#[test]
fn escaped_brackets_do_not_evaluate() {
    assert_eq!(run(r"\[add(1,2)\]"), "[add(1,2)]");
}

#[test]
fn braces_suppress_and_strip() {
    assert_eq!(run("{add(1,2)}"), "{add(1,2)}");
    // As a function argument, outer braces strip.
    assert_eq!(run("[strlen({abcd})]"), "4");
    assert_eq!(run("[words({a b,c d})]"), "3");
}

#[test]
fn deep_stack_of_evaluations_stays_bounded() {
    let mut db = world();
    let host = NullHost;
    let mut ctx = EvalContext::new(&mut db, &host);
    ctx.invocation_limit = 200;
    let out = eval_top(&mut ctx, "[iter(lnum(1000),[add(##,1)])]");
    assert!(out.contains("#-1 FUNCTION INVOCATION LIMIT EXCEEDED"));
}
