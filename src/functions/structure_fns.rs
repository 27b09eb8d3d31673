//! Softcode surface of the structure system. The executor keys every
//! operation; the store itself serializes access.

use super::{fun, list_words, match_thing, FuncMap, FN_VARARGS};
use crate::attr;
use crate::error::ERR_INVALID_ARGUMENT;
use crate::eval::EvalContext;
use crate::structure::{CompType, WIRE_DELIM};

fn owner_key(ctx: &EvalContext) -> crate::db::Dbref {
    ctx.db.owner_of(ctx.executor)
}

/// structure(name, components, types, defaults[, delim]): define a record
/// shape. Fails (0) when the name is taken or the lists disagree.
pub fn fun_structure(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 4 {
        out.push('0');
        return;
    }
    let comps = list_words(&args[1], " ");
    let type_words = list_words(&args[2], " ");
    let mut types = Vec::with_capacity(type_words.len());
    for word in &type_words {
        match CompType::from_code(word) {
            Some(t) => types.push(t),
            None => {
                out.push('0');
                return;
            }
        }
    }
    let mut defaults = list_words(&args[3], " ");
    defaults.resize(comps.len(), String::new());
    let delim = args.get(4).cloned().unwrap_or_else(|| " ".to_string());
    let player = owner_key(ctx);
    let ok = ctx
        .db
        .structures
        .define(ctx.host, player, &args[0], comps, types, defaults, delim)
        .is_ok();
    out.push_str(super::bool01(ok));
}

/// construct(instance, structure[, comp, value]...)
pub fn fun_construct(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        out.push('0');
        return;
    }
    let overrides: Vec<(String, String)> = args[2..]
        .chunks(2)
        .filter_map(|pair| match pair {
            [comp, value] => Some((comp.clone(), value.clone())),
            _ => None,
        })
        .collect();
    let player = owner_key(ctx);
    let ok = ctx
        .db
        .structures
        .construct(ctx.host, player, &args[0], &args[1], &overrides)
        .is_ok();
    out.push_str(super::bool01(ok));
}

/// load(instance, structure, serialized[, delim])
pub fn fun_load(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 3 {
        out.push('0');
        return;
    }
    let player = owner_key(ctx);
    let delim = args.get(3).map(|s| s.as_str());
    let ok = ctx
        .db
        .structures
        .load(ctx.host, player, &args[0], &args[1], &args[2], delim)
        .is_ok();
    out.push_str(super::bool01(ok));
}

pub fn fun_destruct(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let player = owner_key(ctx);
    let ok = ctx.db.structures.destruct(ctx.host, player, &args[0]);
    out.push_str(super::bool01(ok));
}

pub fn fun_unstructure(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let player = owner_key(ctx);
    let ok = ctx.db.structures.unstructure(ctx.host, player, &args[0]);
    out.push_str(super::bool01(ok));
}

/// modify(instance, components, values): batch update; echoes the count of
/// components actually changed.
pub fn fun_modify(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 3 {
        out.push('0');
        return;
    }
    let comps = list_words(&args[1], " ");
    let values = list_words(&args[2], " ");
    let player = owner_key(ctx);
    let n = ctx
        .db
        .structures
        .modify(ctx.host, player, &args[0], &comps, &values);
    out.push_str(&n.to_string());
}

/// z(instance, component): read one component.
pub fn fun_z(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let player = owner_key(ctx);
    if let Some(value) = ctx.db.structures.component(player, &args[0], &args[1]) {
        out.push_str(&value);
    }
}

/// unload(instance[, delim]): serialize an instance.
pub fn fun_unload(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.is_empty() {
        return;
    }
    let player = owner_key(ctx);
    let delim = args.get(1).map(|s| s.as_str());
    if let Some(serialized) = ctx.db.structures.unload(player, &args[0], delim) {
        out.push_str(&serialized);
    }
}

/// read(obj/attr, instance, structure): load an instance from attribute
/// text staged with the wire delimiter.
pub fn fun_read(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 3 {
        out.push('0');
        return;
    }
    let (obj, attr_name) = super::parse_objattr(ctx, &args[0]);
    if !ctx.db.exists(obj) {
        out.push('0');
        return;
    }
    let serialized = match ctx.db.attr_number(&attr_name) {
        Some(num) => attr::attr_text(ctx.db, ctx.host, ctx.executor, obj, num),
        None => {
            out.push('0');
            return;
        }
    };
    let player = owner_key(ctx);
    let wire = WIRE_DELIM.to_string();
    let ok = ctx
        .db
        .structures
        .load(
            ctx.host,
            player,
            &args[1],
            &args[2],
            &serialized,
            Some(wire.as_str()),
        )
        .is_ok();
    out.push_str(super::bool01(ok));
}

/// write(obj/attr, instance): store an instance into an attribute using the
/// wire delimiter.
pub fn fun_write(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        out.push('0');
        return;
    }
    let (obj_spec, attr_name) = match args[0].split_once('/') {
        Some((o, a)) => (o.to_string(), a.trim().to_string()),
        None => {
            out.push('0');
            return;
        }
    };
    let obj = match_thing(ctx, &obj_spec);
    if !ctx.db.exists(obj) || !ctx.db.controls(ctx.executor, obj) {
        out.push('0');
        return;
    }
    let player = owner_key(ctx);
    let wire = WIRE_DELIM.to_string();
    match ctx.db.structures.unload(player, &args[1], Some(wire.as_str())) {
        Some(serialized) => {
            let num = ctx.db.define_user_attr(&attr_name, 0);
            if let Some(o) = ctx.db.get_mut(obj) {
                o.attr_set(num, serialized);
            }
            out.push('1');
        }
        None => out.push('0'),
    }
}

/// delimit(structure, serialized, from, to): transcode a serialized form.
pub fn fun_delimit(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 4 {
        out.push_str(ERR_INVALID_ARGUMENT);
        return;
    }
    let player = owner_key(ctx);
    match ctx
        .db
        .structures
        .delimit(player, &args[0], &args[1], &args[2], &args[3])
    {
        Some(transcoded) => out.push_str(&transcoded),
        None => out.push_str(ERR_INVALID_ARGUMENT),
    }
}

pub fn fun_lstructures(ctx: &mut EvalContext, _args: &[String], out: &mut String) {
    let player = owner_key(ctx);
    out.push_str(&ctx.db.structures.structures(player).join(" "));
}

pub fn fun_linstances(ctx: &mut EvalContext, _args: &[String], out: &mut String) {
    let player = owner_key(ctx);
    out.push_str(&ctx.db.structures.instances(player).join(" "));
}

/// items(structure): component count of a definition.
pub fn fun_items(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let player = owner_key(ctx);
    match ctx.db.structures.items(player, &args[0]) {
        Some(n) => out.push_str(&n.to_string()),
        None => out.push('0'),
    }
}

pub fn register(map: &mut FuncMap) {
    fun!(map, "STRUCTURE", fun_structure, 0, FN_VARARGS);
    fun!(map, "CONSTRUCT", fun_construct, 0, FN_VARARGS);
    fun!(map, "LOAD", fun_load, 0, FN_VARARGS);
    fun!(map, "DESTRUCT", fun_destruct, 1);
    fun!(map, "UNSTRUCTURE", fun_unstructure, 1);
    fun!(map, "MODIFY", fun_modify, 0, FN_VARARGS);
    fun!(map, "Z", fun_z, 2);
    fun!(map, "UNLOAD", fun_unload, 0, FN_VARARGS);
    fun!(map, "READ", fun_read, 3);
    fun!(map, "WRITE", fun_write, 2);
    fun!(map, "DELIMIT", fun_delimit, 0, FN_VARARGS);
    fun!(map, "LSTRUCTURES", fun_lstructures, 0);
    fun!(map, "LINSTANCES", fun_linstances, 0);
    fun!(map, "ITEMS", fun_items, 1);
}
