//! The object-graph surface: attribute reads, object introspection, locks,
//! and the side-effect functions.

use super::{atoi, fun, match_thing, parse_objattr, sep_arg, FuncMap, FN_VARARGS};
use crate::attr;
use crate::boolexp::parse_boolexp;
use crate::db::{
    fmt_dbref, flag_by_name, Dbref, ObjectType, AMBIGUOUS, HOME, NOTHING, POWER_NAMES,
};
use crate::error::{ERR_AMBIGUOUS, ERR_NOT_FOUND, ERR_PERMISSION_DENIED};
use crate::eval::{pronoun_for, EvalContext, Pronoun};
use crate::host::NotifyKind;
use crate::wild::wild_match;

fn resolve(ctx: &EvalContext, spec: &str, out: &mut String) -> Option<Dbref> {
    match match_thing(ctx, spec) {
        NOTHING => {
            out.push_str(ERR_NOT_FOUND);
            None
        }
        AMBIGUOUS => {
            out.push_str(ERR_AMBIGUOUS);
            None
        }
        dbref => Some(dbref),
    }
}

// ===== Attribute reads =====

/// get(obj/attr): attribute text with the parent walk and permission gate.
pub fn fun_get(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let (obj, attr_name) = parse_objattr(ctx, &args[0]);
    if obj == NOTHING || obj == AMBIGUOUS {
        out.push_str(ERR_NOT_FOUND);
        return;
    }
    out.push_str(&attr::attr_by_name(
        ctx.db,
        ctx.host,
        ctx.executor,
        obj,
        &attr_name,
    ));
}

/// xget(obj, attr): two-argument get().
pub fn fun_xget(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let Some(obj) = resolve(ctx, &args[0], out) else {
        return;
    };
    out.push_str(&attr::attr_by_name(
        ctx.db,
        ctx.host,
        ctx.executor,
        obj,
        args[1].trim(),
    ));
}

/// eval(obj, attr): fetch and evaluate as the target.
pub fn fun_eval(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let spec = format!("{}/{}", args[0], args[1]);
    super::ufun_call(ctx, out, &spec, &[], true, false);
}

/// raw(obj, attr): the stored value, ownership header included. Wizards only.
pub fn fun_raw(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if !ctx.db.is_wizard(ctx.executor) {
        out.push_str(ERR_PERMISSION_DENIED);
        return;
    }
    let Some(obj) = resolve(ctx, &args[0], out) else {
        return;
    };
    if let Some(num) = ctx.db.attr_number(args[1].trim()) {
        out.push_str(&attr::attr_raw(ctx.db, obj, num));
    }
}

pub fn fun_hasattr(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let Some(obj) = resolve(ctx, &args[0], out) else {
        return;
    };
    let present = ctx
        .db
        .attr_number(args[1].trim())
        .and_then(|num| ctx.db.get(obj).and_then(|o| o.attr_raw(num)))
        .is_some();
    out.push_str(super::bool01(present));
}

/// hasattrp(): hasattr() with the parent walk.
pub fn fun_hasattrp(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let Some(obj) = resolve(ctx, &args[0], out) else {
        return;
    };
    let present = ctx
        .db
        .attr_number(args[1].trim())
        .map(|num| !attr::attr_text_unchecked(ctx.db, obj, num).is_empty())
        .unwrap_or(false);
    out.push_str(super::bool01(present));
}

/// lattr(obj[/pattern]): readable attribute names, wildcard filtered.
pub fn fun_lattr(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let (spec, pattern) = match args[0].split_once('/') {
        Some((obj, pat)) => (obj.to_string(), pat.to_string()),
        None => (args[0].clone(), "*".to_string()),
    };
    let Some(obj) = resolve(ctx, &spec, out) else {
        return;
    };
    let attrs: Vec<(i32, String)> = match ctx.db.get(obj) {
        Some(o) => o.attrs.clone(),
        None => return,
    };
    let mut first = true;
    for (num, raw) in attrs {
        if !ctx.host.can_read_attr(ctx.db, ctx.executor, obj, num, &raw) {
            continue;
        }
        if let Some(name) = ctx.db.attr_name(num) {
            if wild_match(&pattern, &name) {
                if !first {
                    out.push(' ');
                }
                first = false;
                out.push_str(&name);
            }
        }
    }
}

pub fn fun_nattr(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let mut names = String::new();
    fun_lattr(ctx, args, &mut names);
    if names.starts_with("#-") {
        out.push_str(&names);
        return;
    }
    out.push_str(&names.split_whitespace().count().to_string());
}

// ===== Attribute grep =====

fn grep_engine(
    ctx: &mut EvalContext,
    args: &[String],
    out: &mut String,
    matcher: impl Fn(&str, &str) -> bool,
) {
    let Some(obj) = resolve(ctx, &args[0], out) else {
        return;
    };
    let attrs: Vec<(i32, String)> = match ctx.db.get(obj) {
        Some(o) => o.attrs.clone(),
        None => return,
    };
    let mut first = true;
    for (num, raw) in attrs {
        if !ctx.host.can_read_attr(ctx.db, ctx.executor, obj, num, &raw) {
            continue;
        }
        let name = match ctx.db.attr_name(num) {
            Some(n) => n,
            None => continue,
        };
        if !wild_match(&args[1], &name) {
            continue;
        }
        if matcher(attr::strip_header(&raw), &args[2]) {
            if !first {
                out.push(' ');
            }
            first = false;
            out.push_str(&name);
        }
    }
}

/// grep(obj, attr-pattern, text): substring search over attribute values.
pub fn fun_grep(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    grep_engine(ctx, args, out, |text, needle| text.contains(needle));
}

/// wildgrep(): wildcard match over attribute values.
pub fn fun_wildgrep(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    grep_engine(ctx, args, out, |text, pat| wild_match(pat, text));
}

/// regrep() / regrepi(): regex search over attribute values.
pub fn fun_regrep(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    match regex::Regex::new(&args[2]) {
        Ok(re) => grep_engine(ctx, args, out, move |text, _| re.is_match(text)),
        Err(_) => out.push_str(crate::error::ERR_INVALID_ARGUMENT),
    }
}

pub fn fun_regrepi(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    match regex::Regex::new(&format!("(?i){}", args[2])) {
        Ok(re) => grep_engine(ctx, args, out, move |text, _| re.is_match(text)),
        Err(_) => out.push_str(crate::error::ERR_INVALID_ARGUMENT),
    }
}

// ===== Object introspection =====

pub fn fun_name(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let Some(obj) = resolve(ctx, &args[0], out) else {
        return;
    };
    if let Some(o) = ctx.db.get(obj) {
        out.push_str(o.display_name());
    }
}

/// fullname(): the name with its alias list.
pub fn fun_fullname(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let Some(obj) = resolve(ctx, &args[0], out) else {
        return;
    };
    if let Some(o) = ctx.db.get(obj) {
        out.push_str(&o.name);
    }
}

pub fn fun_num(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    match match_thing(ctx, &args[0]) {
        AMBIGUOUS => out.push_str(ERR_AMBIGUOUS),
        dbref => out.push_str(&fmt_dbref(dbref)),
    }
}

pub fn fun_pmatch(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&fmt_dbref(ctx.db.find_player(&args[0])));
}

macro_rules! field_fun {
    ($name:ident, $field:ident) => {
        pub fn $name(ctx: &mut EvalContext, args: &[String], out: &mut String) {
            let Some(obj) = resolve(ctx, &args[0], out) else {
                return;
            };
            if let Some(o) = ctx.db.get(obj) {
                out.push_str(&fmt_dbref(o.$field));
            }
        }
    };
}

field_fun!(fun_loc, location);
field_fun!(fun_owner, owner);
field_fun!(fun_parent, parent);
field_fun!(fun_zone, zone);
field_fun!(fun_next, next);
field_fun!(fun_con, contents);
field_fun!(fun_exit, exits);

/// home(): where the object is linked.
pub fn fun_home(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let Some(obj) = resolve(ctx, &args[0], out) else {
        return;
    };
    if let Some(o) = ctx.db.get(obj) {
        out.push_str(&fmt_dbref(o.link));
    }
}

/// room(): walk locations upward until a room.
pub fn fun_room(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let Some(mut obj) = resolve(ctx, &args[0], out) else {
        return;
    };
    for _ in 0..crate::config::PARENT_DEPTH_LIMIT {
        match ctx.db.get(obj) {
            Some(o) if o.kind() == ObjectType::Room => {
                out.push_str(&fmt_dbref(obj));
                return;
            }
            Some(o) => obj = o.location,
            None => break,
        }
    }
    out.push_str(&fmt_dbref(NOTHING));
}

pub fn fun_type(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let Some(obj) = resolve(ctx, &args[0], out) else {
        return;
    };
    if let Some(o) = ctx.db.get(obj) {
        out.push_str(o.kind().label());
    }
}

pub fn fun_money(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let Some(obj) = resolve(ctx, &args[0], out) else {
        return;
    };
    if let Some(o) = ctx.db.get(obj) {
        out.push_str(&o.pennies.to_string());
    }
}

/// flags(): the set flag names, space-joined.
pub fn fun_flags(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let Some(obj) = resolve(ctx, &args[0], out) else {
        return;
    };
    let Some(o) = ctx.db.get(obj) else { return };
    let names: Vec<&str> = crate::db::FLAG_NAMES
        .iter()
        .filter(|(_, word, bit)| o.flags[*word] & bit != 0)
        .map(|(name, _, _)| *name)
        .collect();
    out.push_str(&names.join(" "));
}

pub fn fun_hasflag(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let Some(obj) = resolve(ctx, &args[0], out) else {
        return;
    };
    let result = match flag_by_name(args[1].trim()) {
        Some((word, bit)) => ctx
            .db
            .get(obj)
            .map(|o| o.flags[word] & bit != 0)
            .unwrap_or(false),
        None => {
            // Type names test as quasi-flags.
            ctx.db
                .get(obj)
                .map(|o| o.kind().label().eq_ignore_ascii_case(args[1].trim()))
                .unwrap_or(false)
        }
    };
    out.push_str(super::bool01(result));
}

pub fn fun_haspower(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let Some(obj) = resolve(ctx, &args[0], out) else {
        return;
    };
    let upper = args[1].trim().to_uppercase();
    let result = POWER_NAMES
        .iter()
        .find(|(name, _, _)| *name == upper)
        .map(|(_, word, bit)| {
            ctx.db
                .get(obj)
                .map(|o| o.powers[*word] & bit != 0)
                .unwrap_or(false)
        })
        .unwrap_or(false);
    out.push_str(super::bool01(result));
}

pub fn fun_controls(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let Some(who) = resolve(ctx, &args[0], out) else {
        return;
    };
    let Some(what) = resolve(ctx, &args[1], out) else {
        return;
    };
    out.push_str(super::bool01(ctx.db.controls(who, what)));
}

/// lcon(obj[, sep]): the contents chain as dbrefs.
pub fn fun_lcon(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.is_empty() {
        return;
    }
    let Some(obj) = resolve(ctx, &args[0], out) else {
        return;
    };
    let sep = sep_arg(args, 1);
    let head = ctx.db.get(obj).map(|o| o.contents).unwrap_or(NOTHING);
    let refs: Vec<String> = ctx.db.chain(head).iter().map(|d| fmt_dbref(*d)).collect();
    out.push_str(&refs.join(&sep));
}

pub fn fun_lexits(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.is_empty() {
        return;
    }
    let Some(obj) = resolve(ctx, &args[0], out) else {
        return;
    };
    let sep = sep_arg(args, 1);
    let head = ctx.db.get(obj).map(|o| o.exits).unwrap_or(NOTHING);
    let refs: Vec<String> = ctx.db.chain(head).iter().map(|d| fmt_dbref(*d)).collect();
    out.push_str(&refs.join(&sep));
}

// ===== Locks =====

/// lock(obj): the lock expression, unparsed.
pub fn fun_lock(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let Some(obj) = resolve(ctx, &args[0], out) else {
        return;
    };
    if let Some(lock) = ctx.db.get(obj).and_then(|o| o.lock.clone()) {
        out.push_str(&lock.to_string());
    }
}

/// elock(obj, victim): evaluate obj's lock against the victim.
pub fn fun_elock(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let Some(obj) = resolve(ctx, &args[0], out) else {
        return;
    };
    let Some(victim) = resolve(ctx, &args[1], out) else {
        return;
    };
    let lock = ctx.db.get(obj).and_then(|o| o.lock.clone());
    let passed = match lock {
        Some(lock) => lock.check(ctx, victim, obj),
        None => true,
    };
    out.push_str(super::bool01(passed));
}

// ===== Pronoun accessors =====

fn pronoun_fun(ctx: &mut EvalContext, args: &[String], out: &mut String, which: Pronoun) {
    let Some(obj) = resolve(ctx, &args[0], out) else {
        return;
    };
    out.push_str(&pronoun_for(ctx.db, obj, which));
}

pub fn fun_subj(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    pronoun_fun(ctx, args, out, Pronoun::Subjective);
}

pub fn fun_obj(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    pronoun_fun(ctx, args, out, Pronoun::Objective);
}

pub fn fun_poss(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    pronoun_fun(ctx, args, out, Pronoun::Possessive);
}

pub fn fun_aposs(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    pronoun_fun(ctx, args, out, Pronoun::Absolute);
}

// ===== Side effects =====

/// create(name[, cost[, type]]): make an object owned by the executor.
pub fn fun_create(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.is_empty() || args[0].trim().is_empty() {
        out.push_str(crate::error::ERR_INVALID_ARGUMENT);
        return;
    }
    let kind = match args.get(2).map(|s| s.trim().to_lowercase()) {
        Some(word) if word == "room" => ObjectType::Room,
        Some(word) if word == "exit" => ObjectType::Exit,
        _ => ObjectType::Thing,
    };
    let cost = args.get(1).map(|a| atoi(a)).unwrap_or(0).max(0);
    let loc = match kind {
        ObjectType::Room => NOTHING,
        _ => ctx
            .db
            .get(ctx.executor)
            .map(|o| o.location)
            .unwrap_or(NOTHING),
    };
    let owner = ctx.db.owner_of(ctx.executor);
    let executor = ctx.executor;
    let dbref = ctx.db.create(args[0].trim(), kind, owner, loc);
    if let Some(payer) = ctx.db.get_mut(executor) {
        payer.pennies -= cost;
    }
    out.push_str(&fmt_dbref(dbref));
}

/// set(obj, flag) or set(obj/attr, value). Uncontrolled targets are a
/// silent no-op.
pub fn fun_set(ctx: &mut EvalContext, args: &[String], _out: &mut String) {
    if args.len() < 2 {
        return;
    }
    if let Some((obj_spec, attr_name)) = args[0].split_once('/') {
        let obj = match_thing(ctx, obj_spec);
        if !ctx.db.exists(obj) || !ctx.db.controls(ctx.executor, obj) {
            return;
        }
        let num = ctx.db.define_user_attr(attr_name.trim(), 0);
        if let Some(o) = ctx.db.get_mut(obj) {
            o.attr_set(num, args[1].clone());
        }
        return;
    }
    let obj = match_thing(ctx, &args[0]);
    if !ctx.db.exists(obj) || !ctx.db.controls(ctx.executor, obj) {
        return;
    }
    let (name, clear) = match args[1].trim().strip_prefix('!') {
        Some(rest) => (rest, true),
        None => (args[1].trim(), false),
    };
    if let Some((word, bit)) = flag_by_name(name) {
        if let Some(o) = ctx.db.get_mut(obj) {
            if clear {
                o.flags[word] &= !bit;
            } else {
                o.flags[word] |= bit;
            }
        }
    }
}

/// tel(obj, dest): teleport with control checks.
pub fn fun_tel(ctx: &mut EvalContext, args: &[String], _out: &mut String) {
    let what = match_thing(ctx, &args[0]);
    let mut dest = match_thing(ctx, &args[1]);
    if dest == HOME {
        dest = ctx.db.get(what).map(|o| o.link).unwrap_or(NOTHING);
    }
    if !ctx.db.exists(what) || !ctx.db.exists(dest) {
        return;
    }
    if !ctx.db.controls(ctx.executor, what) {
        return;
    }
    let jump_ok = ctx
        .db
        .get(dest)
        .map(|o| o.has_flag(0, crate::db::FLAG_JUMP_OK))
        .unwrap_or(false);
    if !jump_ok && !ctx.db.controls(ctx.executor, dest) {
        return;
    }
    ctx.db.chain_remove(what);
    ctx.db.chain_insert(dest, what);
}

/// link(obj, dest): set the home/destination reference.
pub fn fun_link(ctx: &mut EvalContext, args: &[String], _out: &mut String) {
    let what = match_thing(ctx, &args[0]);
    let dest = match_thing(ctx, &args[1]);
    if !ctx.db.exists(what) || !ctx.db.exists(dest) {
        return;
    }
    if !ctx.db.controls(ctx.executor, what) {
        return;
    }
    if let Some(o) = ctx.db.get_mut(what) {
        o.link = dest;
    }
}

/// setlock(obj, lock expression): parse and install a lock.
pub fn fun_setlock(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let obj = match_thing(ctx, &args[0]);
    if !ctx.db.exists(obj) || !ctx.db.controls(ctx.executor, obj) {
        out.push_str(ERR_PERMISSION_DENIED);
        return;
    }
    match parse_boolexp(&args[1]) {
        Ok(lock) => {
            if let Some(o) = ctx.db.get_mut(obj) {
                o.lock = lock;
            }
        }
        Err(_) => out.push_str(crate::error::ERR_INVALID_ARGUMENT),
    }
}

pub fn fun_pemit(ctx: &mut EvalContext, args: &[String], _out: &mut String) {
    let target = match_thing(ctx, &args[0]);
    if ctx.db.exists(target) {
        ctx.notify(target, NotifyKind::Pemit, args[1].clone());
    }
}

pub fn fun_remit(ctx: &mut EvalContext, args: &[String], _out: &mut String) {
    let target = match_thing(ctx, &args[0]);
    if ctx.db.exists(target) {
        ctx.notify(target, NotifyKind::Remit, args[1].clone());
    }
}

pub fn fun_oemit(ctx: &mut EvalContext, args: &[String], _out: &mut String) {
    let target = match_thing(ctx, &args[0]);
    if ctx.db.exists(target) {
        ctx.notify(target, NotifyKind::Oemit, args[1].clone());
    }
}

/// emit(message): remit to the executor's location.
pub fn fun_emit(ctx: &mut EvalContext, args: &[String], _out: &mut String) {
    let loc = ctx
        .db
        .get(ctx.executor)
        .map(|o| o.location)
        .unwrap_or(NOTHING);
    if ctx.db.exists(loc) {
        ctx.notify(loc, NotifyKind::Remit, args[0].clone());
    }
}

/// wipe(obj[/pattern]): erase matching attributes on a controlled object.
pub fn fun_wipe(ctx: &mut EvalContext, args: &[String], _out: &mut String) {
    let (spec, pattern) = match args[0].split_once('/') {
        Some((obj, pat)) => (obj.to_string(), pat.to_string()),
        None => (args[0].clone(), "*".to_string()),
    };
    let obj = match_thing(ctx, &spec);
    if !ctx.db.exists(obj) || !ctx.db.controls(ctx.executor, obj) {
        return;
    }
    let names: Vec<(i32, String)> = ctx
        .db
        .get(obj)
        .map(|o| {
            o.attrs
                .iter()
                .filter_map(|(num, _)| ctx.db.attr_name(*num).map(|n| (*num, n)))
                .collect()
        })
        .unwrap_or_default();
    if let Some(o) = ctx.db.get_mut(obj) {
        for (num, name) in names {
            if wild_match(&pattern, &name) {
                o.attr_set(num, String::new());
            }
        }
    }
}

pub fn register(map: &mut FuncMap) {
    fun!(map, "GET", fun_get, 1);
    fun!(map, "XGET", fun_xget, 2);
    fun!(map, "EVAL", fun_eval, 2);
    fun!(map, "RAW", fun_raw, 2);
    fun!(map, "HASATTR", fun_hasattr, 2);
    fun!(map, "HASATTRP", fun_hasattrp, 2);
    fun!(map, "LATTR", fun_lattr, 1);
    fun!(map, "NATTR", fun_nattr, 1);
    fun!(map, "GREP", fun_grep, 3);
    fun!(map, "WILDGREP", fun_wildgrep, 3);
    fun!(map, "REGREP", fun_regrep, 3);
    fun!(map, "REGREPI", fun_regrepi, 3);
    fun!(map, "NAME", fun_name, 1);
    fun!(map, "FULLNAME", fun_fullname, 1);
    fun!(map, "NUM", fun_num, 1);
    fun!(map, "PMATCH", fun_pmatch, 1);
    fun!(map, "LOC", fun_loc, 1);
    fun!(map, "OWNER", fun_owner, 1);
    fun!(map, "PARENT", fun_parent, 1);
    fun!(map, "ZONE", fun_zone, 1);
    fun!(map, "NEXT", fun_next, 1);
    fun!(map, "CON", fun_con, 1);
    fun!(map, "EXIT", fun_exit, 1);
    fun!(map, "HOME", fun_home, 1);
    fun!(map, "ROOM", fun_room, 1);
    fun!(map, "TYPE", fun_type, 1);
    fun!(map, "MONEY", fun_money, 1);
    fun!(map, "FLAGS", fun_flags, 1);
    fun!(map, "HASFLAG", fun_hasflag, 2);
    fun!(map, "HASPOWER", fun_haspower, 2);
    fun!(map, "CONTROLS", fun_controls, 2);
    fun!(map, "LCON", fun_lcon, 0, FN_VARARGS);
    fun!(map, "LEXITS", fun_lexits, 0, FN_VARARGS);
    fun!(map, "LOCK", fun_lock, 1);
    fun!(map, "ELOCK", fun_elock, 2);
    fun!(map, "SETLOCK", fun_setlock, 2);
    fun!(map, "SUBJ", fun_subj, 1);
    fun!(map, "OBJ", fun_obj, 1);
    fun!(map, "POSS", fun_poss, 1);
    fun!(map, "APOSS", fun_aposs, 1);
    fun!(map, "CREATE", fun_create, 0, FN_VARARGS);
    fun!(map, "SET", fun_set, 2);
    fun!(map, "TEL", fun_tel, 2);
    fun!(map, "LINK", fun_link, 2);
    fun!(map, "PEMIT", fun_pemit, 2);
    fun!(map, "REMIT", fun_remit, 2);
    fun!(map, "OEMIT", fun_oemit, 2);
    fun!(map, "EMIT", fun_emit, 1);
    fun!(map, "WIPE", fun_wipe, 1);
}
