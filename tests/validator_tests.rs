// ABOUTME: Validator findings and repairs over realistic legacy databases

use softmush::db::{Db, ObjectType, A_DESC, GOD};
use softmush::eval::{eval_top, EvalContext};
use softmush::functions::builtin_table;
use softmush::host::NullHost;
use softmush::validator::{Validator, CAT_DOUBLE_ESCAPE, CAT_INTEGRITY};

fn legacy_world() -> Db {
    let mut db = Db::minimal();
    let monitor = db.create("monitor", ObjectType::Thing, GOD, 0);
    db.get_mut(monitor)
        .unwrap()
        .attr_set(A_DESC, r"[ansi(c,\\[Monitor\\])]".to_string());
    db
}

#[test]
fn test_double_escape_scenario() {
    let db = legacy_world();
    let funcs = builtin_table();
    let validator = Validator::run(&db, &funcs);
    let findings: Vec<_> = validator
        .findings()
        .iter()
        .filter(|f| f.category == CAT_DOUBLE_ESCAPE)
        .collect();
    assert_eq!(findings.len(), 1);
    let finding = findings[0];
    assert!(finding.fixable);
    assert!(!finding.fixed);
    assert_eq!(finding.object, 2);
    assert_eq!(
        finding.fix.as_ref().unwrap().new_value,
        r"[ansi(c,\[Monitor\])]"
    );
    // Highlights land on the doubled escape.
    let [start, end] = finding.current_highlight;
    assert_eq!(&finding.current[start..end], r"\\[");
}

#[test]
fn test_fix_then_evaluate_cleanly() {
    let mut db = legacy_world();
    let funcs = builtin_table();
    let mut validator = Validator::run(&db, &funcs);
    assert_eq!(validator.apply_category(&mut db, CAT_DOUBLE_ESCAPE), 1);

    let host = NullHost;
    let mut ctx = EvalContext::new(&mut db, &host);
    ctx.ansi_enabled = false;
    // The repaired text now renders literal brackets around Monitor.
    assert_eq!(eval_top(&mut ctx, "[u(#2/desc)]"), "[Monitor]");
}

#[test]
fn test_integrity_names_the_missing_object() {
    let mut db = legacy_world();
    db.get_mut(2).unwrap().contents = 99;
    let funcs = builtin_table();
    let validator = Validator::run(&db, &funcs);
    let finding = validator
        .findings()
        .iter()
        .find(|f| f.category == CAT_INTEGRITY)
        .expect("expected an integrity finding");
    assert!(finding.description.contains("#99"));
    assert!(!finding.fixable);
}

#[test]
fn test_findings_sorted_by_object_then_attr() {
    let mut db = Db::minimal();
    for name in ["zed", "abe"] {
        let t = db.create(name, ObjectType::Thing, GOD, 0);
        db.get_mut(t)
            .unwrap()
            .attr_set(A_DESC, r"say \%n".to_string());
        let num = db.define_user_attr("NOTE", 0);
        db.get_mut(t)
            .unwrap()
            .attr_set(num, r"say \%n again".to_string());
    }
    let funcs = builtin_table();
    let validator = Validator::run(&db, &funcs);
    let keys: Vec<(i32, i32)> = validator
        .findings()
        .iter()
        .map(|f| (f.object, f.attr))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    assert_eq!(keys.len(), 4);
}

#[test]
fn test_report_json_contract() {
    let db = legacy_world();
    let funcs = builtin_table();
    let validator = Validator::run(&db, &funcs);
    let report: serde_json::Value = serde_json::from_str(&validator.report_json()).unwrap();
    assert_eq!(report["total"], report["findings"].as_array().unwrap().len());
    for finding in report["findings"].as_array().unwrap() {
        for key in [
            "id",
            "category",
            "severity",
            "object",
            "attr",
            "description",
            "current",
            "proposed",
            "current_highlight",
            "proposed_highlight",
            "effect",
            "explanation",
            "fixable",
            "fixed",
        ] {
            assert!(
                finding.get(key).is_some(),
                "finding is missing the '{}' key",
                key
            );
        }
    }
    for entry in report["summary"].as_array().unwrap() {
        for key in ["label", "total", "fixable", "fixed"] {
            assert!(entry.get(key).is_some());
        }
    }
}
