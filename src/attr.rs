// ABOUTME: Attribute resolver - parent-chain walk, ownership headers, permission gate

use crate::config::PARENT_DEPTH_LIMIT;
use crate::db::{Db, Dbref, AF_DARK, AF_INTERNAL, AF_WIZARD, NOTHING};
use crate::host::Host;

/// Marker byte that opens an ownership header on a raw attribute value.
pub const ATTR_HEADER_MARKER: u8 = 0x01;

/// Strip the `0x01 owner ':' flags ':' text` header, returning the text
/// portion. A malformed header yields everything after the marker.
pub fn strip_header(raw: &str) -> &str {
    let bytes = raw.as_bytes();
    if bytes.first() != Some(&ATTR_HEADER_MARKER) {
        return raw;
    }
    let body = &raw[1..];
    if let Some(first) = body.find(':') {
        if let Some(second_rel) = body[first + 1..].find(':') {
            return &body[first + 1 + second_rel + 1..];
        }
    }
    body
}

/// Split an ownership header into (owner, flags, text), when present and
/// well-formed.
pub fn header_parts(raw: &str) -> Option<(Dbref, u32, &str)> {
    let bytes = raw.as_bytes();
    if bytes.first() != Some(&ATTR_HEADER_MARKER) {
        return None;
    }
    let body = &raw[1..];
    let first = body.find(':')?;
    let owner: Dbref = body[..first].parse().ok()?;
    let rest = &body[first + 1..];
    let second = rest.find(':')?;
    let flags: u32 = rest[..second].parse().ok()?;
    Some((owner, flags, &rest[second + 1..]))
}

/// Compose a raw value with an ownership header.
pub fn with_header(owner: Dbref, flags: u32, text: &str) -> String {
    format!("{}{}:{}:{}", ATTR_HEADER_MARKER as char, owner, flags, text)
}

/// Raw value with no parent walk and no permission gate. Privileged.
pub fn attr_raw(db: &Db, obj: Dbref, num: i32) -> String {
    db.get(obj)
        .and_then(|o| o.attr_raw(num))
        .unwrap_or("")
        .to_string()
}

/// Find the raw value along the parent chain. The walk is bounded and
/// no-inherit attributes stop at the object itself.
fn find_raw(db: &Db, obj: Dbref, num: i32) -> Option<(Dbref, String)> {
    let inheritable = db
        .attr_def(num)
        .map(|d| d.flags & crate::db::AF_NOINHERIT == 0)
        .unwrap_or(true);
    let mut cur = obj;
    for depth in 0..=PARENT_DEPTH_LIMIT {
        let o = db.get(cur)?;
        if let Some(raw) = o.attr_raw(num) {
            return Some((cur, raw.to_string()));
        }
        if !inheritable || depth == PARENT_DEPTH_LIMIT {
            return None;
        }
        cur = o.parent;
        if cur == NOTHING {
            return None;
        }
    }
    None
}

/// Text portion with the parent walk but no permission gate. Used by lock
/// evaluation, which has its own access rules.
pub fn attr_text_unchecked(db: &Db, obj: Dbref, num: i32) -> String {
    find_raw(db, obj, num)
        .map(|(_, raw)| strip_header(&raw).to_string())
        .unwrap_or_default()
}

/// Default readability policy, applied when the host does not override the
/// gate: wizards see everything; dark and internal attributes are hidden;
/// wizard-only attributes need wizard privilege.
pub fn default_readable(db: &Db, viewer: Dbref, _obj: Dbref, num: i32, raw: &str) -> bool {
    let mut flags = db.attr_def(num).map(|d| d.flags).unwrap_or(0);
    if let Some((_, header_flags, _)) = header_parts(raw) {
        flags |= header_flags;
    }
    if db.is_wizard(viewer) {
        return flags & AF_INTERNAL == 0;
    }
    flags & (AF_DARK | AF_INTERNAL | AF_WIZARD) == 0
}

/// The public contract: text portion of `num` on `obj`, walking the parent
/// chain, then applying the permission gate. Empty when missing or hidden.
pub fn attr_text(db: &Db, host: &dyn Host, viewer: Dbref, obj: Dbref, num: i32) -> String {
    match find_raw(db, obj, num) {
        Some((holder, raw)) => {
            if host.can_read_attr(db, viewer, holder, num, &raw) {
                strip_header(&raw).to_string()
            } else {
                String::new()
            }
        }
        None => String::new(),
    }
}

/// Resolve `name` (already uppercased or not; both work) and delegate to
/// [`attr_text`].
pub fn attr_by_name(db: &Db, host: &dyn Host, viewer: Dbref, obj: Dbref, name: &str) -> String {
    match db.attr_number(name) {
        Some(num) => attr_text(db, host, viewer, obj, num),
        None => String::new(),
    }
}
