// ABOUTME: Pre-load softcode validator - legacy escape detection and integrity checks

use crate::config::CHAIN_LENGTH_LIMIT;
use crate::db::{Db, Dbref, ObjectType, GOD, NOTHING};
use crate::functions::FuncMap;
use serde::Serialize;

pub const CAT_DOUBLE_ESCAPE: &str = "double-escape";
pub const CAT_BACKSLASH_PERCENT: &str = "backslash-percent";
pub const CAT_BRACE_ESCAPE: &str = "brace-escape";
pub const CAT_UNUSUAL_ESCAPE: &str = "unusual-escape";
pub const CAT_INTEGRITY: &str = "integrity";

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// The in-place rewrite a fixable finding performs.
#[derive(Debug, Clone)]
pub struct FixAction {
    pub object: Dbref,
    pub attr: i32,
    pub new_value: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct Finding {
    pub id: String,
    pub category: String,
    pub severity: Severity,
    pub object: Dbref,
    pub attr: i32,
    pub description: String,
    /// Windowed slice of the current text.
    pub current: String,
    /// Same window after the proposed rewrite.
    pub proposed: String,
    /// `[start, end)` byte offsets into the current window.
    pub current_highlight: [usize; 2],
    /// `[start, end)` byte offsets into the proposed window.
    pub proposed_highlight: [usize; 2],
    pub effect: String,
    pub explanation: String,
    pub fixable: bool,
    pub fixed: bool,
    #[serde(skip)]
    pub fix: Option<FixAction>,
}

#[derive(Serialize, Debug, Clone)]
pub struct CategorySummary {
    pub label: String,
    pub total: usize,
    pub fixable: usize,
    pub fixed: usize,
}

#[derive(Serialize)]
struct Report<'a> {
    total: usize,
    summary: Vec<CategorySummary>,
    findings: &'a [Finding],
}

// ============================================================================
// Text Scanning
// ============================================================================

// Byte spans of interest in an attribute value, plus the whole-value rewrite.
struct ScanHit {
    spans: Vec<(usize, usize)>,
    rewritten: String,
}

fn is_subst_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'!' | b'@' | b'#' | b'$' | b'+' | b'|' | b'<')
}

fn known_fn_before(text: &[u8], paren: usize, funcs: &FuncMap) -> bool {
    let mut start = paren;
    while start > 0 && (text[start - 1].is_ascii_alphanumeric() || text[start - 1] == b'_') {
        start -= 1;
    }
    if start == paren {
        return false;
    }
    let name = String::from_utf8_lossy(&text[start..paren]).to_uppercase();
    funcs.contains_key(&name)
}

// Double-escaped bracket groups inside known-function arguments. Top-level
// occurrences are the legitimate single-escape idiom and stay untouched.
fn scan_double_escape(value: &str, funcs: &FuncMap) -> Option<ScanHit> {
    let bytes = value.as_bytes();
    let mut spans = Vec::new();
    let mut rewritten = String::with_capacity(value.len());
    let mut paren_stack: Vec<bool> = Vec::new();
    let mut fn_depth = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' {
            if i + 2 < bytes.len()
                && bytes[i + 1] == b'\\'
                && (bytes[i + 2] == b'[' || bytes[i + 2] == b']')
                && fn_depth > 0
            {
                spans.push((i, i + 3));
                rewritten.push('\\');
                rewritten.push(bytes[i + 2] as char);
                i += 3;
                continue;
            }
            rewritten.push('\\');
            if i + 1 < bytes.len() {
                rewritten.push(bytes[i + 1] as char);
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }
        if b == b'(' {
            let known = known_fn_before(bytes, i, funcs);
            paren_stack.push(known);
            if known {
                fn_depth += 1;
            }
        } else if b == b')' {
            if let Some(known) = paren_stack.pop() {
                if known {
                    fn_depth = fn_depth.saturating_sub(1);
                }
            }
        }
        rewritten.push(b as char);
        i += 1;
    }
    if spans.is_empty() {
        None
    } else {
        Some(ScanHit { spans, rewritten })
    }
}

// Backslash-percent: the escape eats the percent sign, so the substitution
// never runs under single evaluation.
fn scan_backslash_percent(value: &str) -> Option<ScanHit> {
    let bytes = value.as_bytes();
    let mut spans = Vec::new();
    let mut rewritten = String::with_capacity(value.len());
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            if bytes.get(i + 1) == Some(&b'%')
                && bytes.get(i + 2).copied().map(is_subst_char).unwrap_or(false)
            {
                spans.push((i, i + 2));
                rewritten.push('%');
                i += 2;
                continue;
            }
            rewritten.push('\\');
            if let Some(next) = bytes.get(i + 1) {
                rewritten.push(*next as char);
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }
        rewritten.push(bytes[i] as char);
        i += 1;
    }
    if spans.is_empty() {
        None
    } else {
        Some(ScanHit { spans, rewritten })
    }
}

// Brace-escape: `\{` survived only because the old host evaluated twice.
fn scan_brace_escape(value: &str) -> Option<ScanHit> {
    let bytes = value.as_bytes();
    let mut spans = Vec::new();
    let mut rewritten = String::with_capacity(value.len());
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            if bytes.get(i + 1) == Some(&b'{') {
                spans.push((i, i + 2));
                rewritten.push('{');
                i += 2;
                continue;
            }
            rewritten.push('\\');
            if let Some(next) = bytes.get(i + 1) {
                rewritten.push(*next as char);
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }
        rewritten.push(bytes[i] as char);
        i += 1;
    }
    if spans.is_empty() {
        None
    } else {
        Some(ScanHit { spans, rewritten })
    }
}

const USUAL_ESCAPES: &[u8] = b"\\%[]{}();, ";

// Escapes of bytes the evaluator gives no meaning to. Harmless but often a
// sign of text imported from another dialect.
fn scan_unusual_escape(value: &str) -> Option<Vec<(usize, usize)>> {
    let bytes = value.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            match bytes.get(i + 1) {
                Some(next) => {
                    if !USUAL_ESCAPES.contains(next) && !next.is_ascii_alphanumeric() {
                        spans.push((i, i + 2));
                    }
                    i += 2;
                }
                None => i += 1,
            }
            continue;
        }
        if bytes[i] == b'%' {
            i += 2;
            continue;
        }
        i += 1;
    }
    if spans.is_empty() {
        None
    } else {
        Some(spans)
    }
}

// ============================================================================
// Windowing
// ============================================================================

const WINDOW_CONTEXT: usize = 30;

fn clamp_to_char(text: &str, mut pos: usize) -> usize {
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Window `text` around `span`, returning the window and the span offsets
/// relative to it.
fn window(text: &str, span: (usize, usize)) -> (String, [usize; 2]) {
    let start = clamp_to_char(text, span.0.saturating_sub(WINDOW_CONTEXT));
    let end = clamp_to_char(text, (span.1 + WINDOW_CONTEXT).min(text.len()));
    let end = if end < span.1 { text.len() } else { end };
    (
        text[start..end].to_string(),
        [span.0 - start, span.1 - start],
    )
}

// ============================================================================
// The Validator
// ============================================================================

#[derive(Default)]
pub struct Validator {
    findings: Vec<Finding>,
}

impl Validator {
    /// Scan every attribute of every live object, then the graph itself.
    /// Findings come back sorted by object, then attribute number.
    pub fn run(db: &Db, funcs: &FuncMap) -> Validator {
        let mut findings = Vec::new();
        for dbref in db.dbrefs() {
            let obj = match db.get(dbref) {
                Some(o) => o,
                None => continue,
            };
            if obj.is_garbage() {
                continue;
            }
            for (num, value) in &obj.attrs {
                check_attribute(&mut findings, funcs, dbref, *num, value);
            }
        }
        check_integrity(&mut findings, db);
        findings.sort_by_key(|f| (f.object, f.attr));
        for (seq, finding) in findings.iter_mut().enumerate() {
            finding.id = format!("{}-{}", finding.id, seq);
        }
        Validator { findings }
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn total(&self) -> usize {
        self.findings.len()
    }

    pub fn summary(&self) -> Vec<CategorySummary> {
        let mut summary: Vec<CategorySummary> = Vec::new();
        for finding in &self.findings {
            match summary.iter_mut().find(|s| s.label == finding.category) {
                Some(entry) => {
                    entry.total += 1;
                    entry.fixable += finding.fixable as usize;
                    entry.fixed += finding.fixed as usize;
                }
                None => summary.push(CategorySummary {
                    label: finding.category.clone(),
                    total: 1,
                    fixable: finding.fixable as usize,
                    fixed: finding.fixed as usize,
                }),
            }
        }
        summary
    }

    /// Apply one fix by finding id. Returns whether a rewrite happened.
    pub fn apply_fix(&mut self, db: &mut Db, id: &str) -> bool {
        let Some(finding) = self
            .findings
            .iter_mut()
            .find(|f| f.id == id && f.fixable && !f.fixed)
        else {
            return false;
        };
        let Some(fix) = finding.fix.clone() else {
            return false;
        };
        match db.get_mut(fix.object) {
            Some(obj) => {
                obj.attr_set(fix.attr, fix.new_value);
                finding.fixed = true;
                true
            }
            None => false,
        }
    }

    /// Apply every pending fix in a category. Returns the count applied.
    pub fn apply_category(&mut self, db: &mut Db, category: &str) -> usize {
        let ids: Vec<String> = self
            .findings
            .iter()
            .filter(|f| f.category == category && f.fixable && !f.fixed)
            .map(|f| f.id.clone())
            .collect();
        ids.iter().filter(|id| self.apply_fix(db, id)).count()
    }

    /// The JSON report: total, per-category summary, findings.
    pub fn report_json(&self) -> String {
        let report = Report {
            total: self.total(),
            summary: self.summary(),
            findings: &self.findings,
        };
        serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
    }
}

fn push_text_finding(
    findings: &mut Vec<Finding>,
    category: &str,
    severity: Severity,
    object: Dbref,
    attr: i32,
    value: &str,
    hit: ScanHit,
    description: String,
    effect: &str,
    explanation: &str,
) {
    let first = hit.spans[0];
    let (current, current_highlight) = window(value, first);
    // Every rewrite drops one byte; the first span's start is unshifted.
    let new_len = first.1 - first.0 - 1;
    let (proposed, proposed_highlight) = window(&hit.rewritten, (first.0, first.0 + new_len));
    findings.push(Finding {
        id: category.to_string(),
        category: category.to_string(),
        severity,
        object,
        attr,
        description,
        current,
        proposed,
        current_highlight,
        proposed_highlight,
        effect: effect.to_string(),
        explanation: explanation.to_string(),
        fixable: true,
        fixed: false,
        fix: Some(FixAction {
            object,
            attr,
            new_value: hit.rewritten.clone(),
        }),
    });
}

fn check_attribute(
    findings: &mut Vec<Finding>,
    funcs: &FuncMap,
    object: Dbref,
    attr: i32,
    value: &str,
) {
    if let Some(hit) = scan_double_escape(value, funcs) {
        let count = hit.spans.len();
        push_text_finding(
            findings,
            CAT_DOUBLE_ESCAPE,
            Severity::Warning,
            object,
            attr,
            value,
            hit,
            format!(
                "{} double-escaped bracket group marker{} inside function arguments",
                count,
                if count == 1 { "" } else { "s" }
            ),
            "a stray backslash reaches the output",
            "Doubled escapes before brackets needed two evaluation passes; \
             under single evaluation one backslash survives into the visible text.",
        );
    }
    if let Some(hit) = scan_backslash_percent(value) {
        let count = hit.spans.len();
        push_text_finding(
            findings,
            CAT_BACKSLASH_PERCENT,
            Severity::Warning,
            object,
            attr,
            value,
            hit,
            format!(
                "{} escaped percent substitution{}",
                count,
                if count == 1 { "" } else { "s" }
            ),
            "the substitution is emitted literally instead of expanding",
            "An escape in front of a percent substitution copies the percent \
             sign verbatim, so the token never expands under single evaluation.",
        );
    }
    if let Some(hit) = scan_brace_escape(value) {
        let count = hit.spans.len();
        push_text_finding(
            findings,
            CAT_BRACE_ESCAPE,
            Severity::Warning,
            object,
            attr,
            value,
            hit,
            format!(
                "{} escaped brace group{}",
                count,
                if count == 1 { "" } else { "s" }
            ),
            "the brace group is not stripped",
            "Escaped braces relied on a second evaluation pass to strip the \
             group; under single evaluation the literal brace remains.",
        );
    }
    if let Some(spans) = scan_unusual_escape(value) {
        let first = spans[0];
        let (current, current_highlight) = window(value, first);
        findings.push(Finding {
            id: CAT_UNUSUAL_ESCAPE.to_string(),
            category: CAT_UNUSUAL_ESCAPE.to_string(),
            severity: Severity::Info,
            object,
            attr,
            description: format!("{} unusual escape sequence(s)", spans.len()),
            current: current.clone(),
            proposed: current,
            current_highlight,
            proposed_highlight: current_highlight,
            effect: "the backslash is dropped and the next character kept".to_string(),
            explanation: "The escaped character has no special meaning; the \
                          escape is probably imported from another dialect."
                .to_string(),
            fixable: false,
            fixed: false,
            fix: None,
        });
    }
}

fn integrity_finding(object: Dbref, description: String) -> Finding {
    Finding {
        id: CAT_INTEGRITY.to_string(),
        category: CAT_INTEGRITY.to_string(),
        severity: Severity::Error,
        object,
        attr: -1,
        description,
        current: String::new(),
        proposed: String::new(),
        current_highlight: [0, 0],
        proposed_highlight: [0, 0],
        effect: "the object graph is corrupt; evaluation may misbehave".to_string(),
        explanation: "Referential integrity failures cannot be repaired \
                      automatically; fix the dump by hand."
            .to_string(),
        fixable: false,
        fixed: false,
        fix: None,
    }
}

fn check_ref(findings: &mut Vec<Finding>, db: &Db, object: Dbref, field: &str, value: Dbref) {
    if value <= NOTHING {
        // Sentinels are fine.
        return;
    }
    if !db.exists(value) {
        findings.push(integrity_finding(
            object,
            format!("{} points at #{} which does not exist", field, value),
        ));
    }
}

fn check_chain(findings: &mut Vec<Finding>, db: &Db, object: Dbref, field: &str, head: Dbref) {
    let mut seen = std::collections::HashSet::new();
    let mut cur = head;
    let mut count = 0usize;
    while cur != NOTHING {
        if !db.exists(cur) {
            findings.push(integrity_finding(
                object,
                format!("{} chain reaches #{} which does not exist", field, cur),
            ));
            return;
        }
        if !seen.insert(cur) {
            findings.push(integrity_finding(
                object,
                format!("{} chain loops at #{}", field, cur),
            ));
            return;
        }
        count += 1;
        if count > CHAIN_LENGTH_LIMIT {
            findings.push(integrity_finding(
                object,
                format!("{} chain exceeds {} entries", field, CHAIN_LENGTH_LIMIT),
            ));
            return;
        }
        cur = db.get(cur).map(|o| o.next).unwrap_or(NOTHING);
    }
}

fn check_integrity(findings: &mut Vec<Finding>, db: &Db) {
    for dbref in db.dbrefs() {
        let obj = match db.get(dbref) {
            Some(o) => o,
            None => continue,
        };
        if obj.is_garbage() {
            continue;
        }
        check_ref(findings, db, dbref, "location", obj.location);
        check_ref(findings, db, dbref, "owner", obj.owner);
        check_ref(findings, db, dbref, "parent", obj.parent);
        check_ref(findings, db, dbref, "zone", obj.zone);
        check_ref(findings, db, dbref, "link", obj.link);
        check_ref(findings, db, dbref, "next", obj.next);
        check_chain(findings, db, dbref, "contents", obj.contents);
        check_chain(findings, db, dbref, "exits", obj.exits);
        if dbref != GOD && db.exists(obj.owner) {
            let owner_kind = db.get(obj.owner).map(|o| o.kind());
            if owner_kind != Some(ObjectType::Player) {
                findings.push(integrity_finding(
                    dbref,
                    format!("owner #{} is not a player", obj.owner),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Db, ObjectType, A_DESC, GOD};
    use crate::functions::builtin_table;

    fn world_with_attr(value: &str) -> Db {
        let mut db = Db::minimal();
        let thing = db.create("widget", ObjectType::Thing, GOD, 0);
        db.get_mut(thing)
            .unwrap()
            .attr_set(A_DESC, value.to_string());
        db
    }

    #[test]
    fn test_double_escape_finding_and_fix() {
        let mut db = world_with_attr(r"[ansi(c,\\[Monitor\\])]");
        let funcs = builtin_table();
        let mut validator = Validator::run(&db, &funcs);
        let findings: Vec<&Finding> = validator
            .findings()
            .iter()
            .filter(|f| f.category == CAT_DOUBLE_ESCAPE)
            .collect();
        assert_eq!(findings.len(), 1);
        let finding = findings[0];
        assert!(finding.fixable);
        assert_eq!(
            finding.fix.as_ref().unwrap().new_value,
            r"[ansi(c,\[Monitor\])]"
        );
        let id = finding.id.clone();
        assert!(validator.apply_fix(&mut db, &id));
        assert_eq!(
            db.get(2).unwrap().attr_raw(A_DESC),
            Some(r"[ansi(c,\[Monitor\])]")
        );
        assert!(!validator.apply_fix(&mut db, &id));
    }

    #[test]
    fn test_double_escape_needs_function_context() {
        // At top level the doubled escape is legitimate and stays.
        let db = world_with_attr(r"\\[add(1,2)\\]");
        let funcs = builtin_table();
        let validator = Validator::run(&db, &funcs);
        assert!(validator
            .findings()
            .iter()
            .all(|f| f.category != CAT_DOUBLE_ESCAPE));
    }

    #[test]
    fn test_backslash_percent() {
        let db = world_with_attr(r"Hello \%n!");
        let funcs = builtin_table();
        let validator = Validator::run(&db, &funcs);
        let finding = validator
            .findings()
            .iter()
            .find(|f| f.category == CAT_BACKSLASH_PERCENT)
            .expect("expected a backslash-percent finding");
        assert!(finding.fixable);
        assert_eq!(finding.fix.as_ref().unwrap().new_value, "Hello %n!");
    }

    #[test]
    fn test_brace_escape() {
        let db = world_with_attr(r"\{group}");
        let funcs = builtin_table();
        let validator = Validator::run(&db, &funcs);
        let finding = validator
            .findings()
            .iter()
            .find(|f| f.category == CAT_BRACE_ESCAPE)
            .expect("expected a brace-escape finding");
        assert_eq!(finding.fix.as_ref().unwrap().new_value, "{group}");
    }

    #[test]
    fn test_unusual_escape_not_fixable() {
        let db = world_with_attr(r"weird \~ escape");
        let funcs = builtin_table();
        let validator = Validator::run(&db, &funcs);
        let finding = validator
            .findings()
            .iter()
            .find(|f| f.category == CAT_UNUSUAL_ESCAPE)
            .expect("expected an unusual-escape finding");
        assert!(!finding.fixable);
        assert_eq!(finding.severity, Severity::Info);
    }

    #[test]
    fn test_clean_attribute_yields_nothing() {
        let db = world_with_attr(r"[add(1,2)] and \[literal\] text");
        let funcs = builtin_table();
        let validator = Validator::run(&db, &funcs);
        assert_eq!(validator.total(), 0);
    }

    #[test]
    fn test_integrity_missing_contents_target() {
        let mut db = world_with_attr("plain");
        db.get_mut(2).unwrap().contents = 99;
        let funcs = builtin_table();
        let validator = Validator::run(&db, &funcs);
        let finding = validator
            .findings()
            .iter()
            .find(|f| f.category == CAT_INTEGRITY)
            .expect("expected an integrity finding");
        assert_eq!(finding.severity, Severity::Error);
        assert!(finding.description.contains("#99"));
        assert!(!finding.fixable);
    }

    #[test]
    fn test_integrity_contents_loop() {
        let mut db = Db::minimal();
        let a = db.create("a", ObjectType::Thing, GOD, 0);
        let b = db.create("b", ObjectType::Thing, GOD, 0);
        db.get_mut(a).unwrap().next = b;
        db.get_mut(b).unwrap().next = a;
        db.get_mut(0).unwrap().contents = a;
        let funcs = builtin_table();
        let validator = Validator::run(&db, &funcs);
        assert!(validator
            .findings()
            .iter()
            .any(|f| f.category == CAT_INTEGRITY && f.description.contains("loops")));
    }

    #[test]
    fn test_owner_must_be_player() {
        let mut db = Db::minimal();
        let rock = db.create("rock", ObjectType::Thing, GOD, 0);
        let pebble = db.create("pebble", ObjectType::Thing, GOD, 0);
        db.get_mut(pebble).unwrap().owner = rock;
        let funcs = builtin_table();
        let validator = Validator::run(&db, &funcs);
        assert!(validator
            .findings()
            .iter()
            .any(|f| f.category == CAT_INTEGRITY && f.description.contains("not a player")));
    }

    #[test]
    fn test_report_json_shape() {
        let db = world_with_attr(r"Hello \%n!");
        let funcs = builtin_table();
        let validator = Validator::run(&db, &funcs);
        let report: serde_json::Value =
            serde_json::from_str(&validator.report_json()).unwrap();
        assert_eq!(report["total"], 1);
        assert_eq!(report["summary"][0]["label"], CAT_BACKSLASH_PERCENT);
        assert_eq!(report["summary"][0]["fixable"], 1);
        assert_eq!(report["findings"][0]["severity"], "warning");
        assert!(report["findings"][0]["current"].is_string());
    }

    #[test]
    fn test_apply_category_bulk() {
        let mut db = Db::minimal();
        for i in 0..3 {
            let t = db.create(format!("t{}", i).as_str(), ObjectType::Thing, GOD, 0);
            db.get_mut(t)
                .unwrap()
                .attr_set(A_DESC, r"say \%n".to_string());
        }
        let funcs = builtin_table();
        let mut validator = Validator::run(&db, &funcs);
        let applied = validator.apply_category(&mut db, CAT_BACKSLASH_PERCENT);
        assert_eq!(applied, 3);
        assert_eq!(validator.summary()[0].fixed, 3);
    }
}
