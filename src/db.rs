// ABOUTME: Object store - the typed object graph the evaluator reads

use crate::boolexp::Boolexp;
use crate::config::USER_ATTR_START;
use crate::structure::StructureStore;
use std::collections::HashMap;

/// Integer object reference. Sentinels below; everything else indexes the store.
pub type Dbref = i32;

pub const NOTHING: Dbref = -1;
pub const AMBIGUOUS: Dbref = -2;
pub const HOME: Dbref = -3;

/// Dbref of the superuser object.
pub const GOD: Dbref = 1;

/// Render a dbref the way softcode sees it.
pub fn fmt_dbref(d: Dbref) -> String {
    format!("#{}", d)
}

// ============================================================================
// Object Types and Flags
// ============================================================================

// The object type lives in the low three bits of the first flag word, so the
// flatfile can carry type and flags in one field.
pub const TYPE_MASK: u32 = 0x7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Room = 0,
    Thing = 1,
    Exit = 2,
    Player = 3,
    Garbage = 5,
}

impl ObjectType {
    pub fn from_word(word: u32) -> ObjectType {
        match word & TYPE_MASK {
            0 => ObjectType::Room,
            1 => ObjectType::Thing,
            2 => ObjectType::Exit,
            3 => ObjectType::Player,
            _ => ObjectType::Garbage,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ObjectType::Room => "ROOM",
            ObjectType::Thing => "THING",
            ObjectType::Exit => "EXIT",
            ObjectType::Player => "PLAYER",
            ObjectType::Garbage => "GARBAGE",
        }
    }
}

// First flag word, above the type bits.
pub const FLAG_SEETHRU: u32 = 0x0000_0008;
pub const FLAG_WIZARD: u32 = 0x0000_0010;
pub const FLAG_LINK_OK: u32 = 0x0000_0020;
pub const FLAG_DARK: u32 = 0x0000_0040;
pub const FLAG_JUMP_OK: u32 = 0x0000_0080;
pub const FLAG_STICKY: u32 = 0x0000_0100;
pub const FLAG_DESTROY_OK: u32 = 0x0000_0200;
pub const FLAG_HAVEN: u32 = 0x0000_0400;
pub const FLAG_QUIET: u32 = 0x0000_0800;
pub const FLAG_HALT: u32 = 0x0000_1000;
pub const FLAG_TRACE: u32 = 0x0000_2000;
pub const FLAG_GOING: u32 = 0x0000_4000;
pub const FLAG_MYOPIC: u32 = 0x0000_8000;
pub const FLAG_PUPPET: u32 = 0x0001_0000;
pub const FLAG_CHOWN_OK: u32 = 0x0002_0000;
pub const FLAG_ENTER_OK: u32 = 0x0004_0000;
pub const FLAG_VISUAL: u32 = 0x0008_0000;
pub const FLAG_IMMORTAL: u32 = 0x0010_0000;
pub const FLAG_OPAQUE: u32 = 0x0020_0000;
pub const FLAG_VERBOSE: u32 = 0x0040_0000;
pub const FLAG_INHERIT: u32 = 0x0080_0000;
pub const FLAG_NOSPOOF: u32 = 0x0100_0000;
pub const FLAG_SAFE: u32 = 0x0200_0000;
pub const FLAG_ROYALTY: u32 = 0x0400_0000;
pub const FLAG_AUDIBLE: u32 = 0x0800_0000;

// Second flag word.
pub const FLAG2_ABODE: u32 = 0x0000_0002;
pub const FLAG2_FLOATING: u32 = 0x0000_0004;
pub const FLAG2_UNFINDABLE: u32 = 0x0000_0008;
pub const FLAG2_LISTENER: u32 = 0x0000_0010;
pub const FLAG2_NOBLEED: u32 = 0x0000_0020;
pub const FLAG2_STAFF: u32 = 0x0000_0040;
pub const FLAG2_GAGGED: u32 = 0x0000_0080;
pub const FLAG2_ANSI: u32 = 0x0000_0200;
pub const FLAG2_FIXED: u32 = 0x0000_0800;
pub const FLAG2_SLAVE: u32 = 0x0000_8000;

/// Flag-name table used by hasflag(), set(), and the flag decoder.
/// (name, word index, bit)
pub const FLAG_NAMES: &[(&str, usize, u32)] = &[
    ("SEETHRU", 0, FLAG_SEETHRU),
    ("WIZARD", 0, FLAG_WIZARD),
    ("LINK_OK", 0, FLAG_LINK_OK),
    ("DARK", 0, FLAG_DARK),
    ("JUMP_OK", 0, FLAG_JUMP_OK),
    ("STICKY", 0, FLAG_STICKY),
    ("DESTROY_OK", 0, FLAG_DESTROY_OK),
    ("HAVEN", 0, FLAG_HAVEN),
    ("QUIET", 0, FLAG_QUIET),
    ("HALT", 0, FLAG_HALT),
    ("TRACE", 0, FLAG_TRACE),
    ("GOING", 0, FLAG_GOING),
    ("MYOPIC", 0, FLAG_MYOPIC),
    ("PUPPET", 0, FLAG_PUPPET),
    ("CHOWN_OK", 0, FLAG_CHOWN_OK),
    ("ENTER_OK", 0, FLAG_ENTER_OK),
    ("VISUAL", 0, FLAG_VISUAL),
    ("IMMORTAL", 0, FLAG_IMMORTAL),
    ("OPAQUE", 0, FLAG_OPAQUE),
    ("VERBOSE", 0, FLAG_VERBOSE),
    ("INHERIT", 0, FLAG_INHERIT),
    ("NOSPOOF", 0, FLAG_NOSPOOF),
    ("SAFE", 0, FLAG_SAFE),
    ("ROYALTY", 0, FLAG_ROYALTY),
    ("AUDIBLE", 0, FLAG_AUDIBLE),
    ("ABODE", 1, FLAG2_ABODE),
    ("FLOATING", 1, FLAG2_FLOATING),
    ("UNFINDABLE", 1, FLAG2_UNFINDABLE),
    ("LISTENER", 1, FLAG2_LISTENER),
    ("NOBLEED", 1, FLAG2_NOBLEED),
    ("STAFF", 1, FLAG2_STAFF),
    ("GAGGED", 1, FLAG2_GAGGED),
    ("ANSI", 1, FLAG2_ANSI),
    ("FIXED", 1, FLAG2_FIXED),
    ("SLAVE", 1, FLAG2_SLAVE),
];

pub fn flag_by_name(name: &str) -> Option<(usize, u32)> {
    let upper = name.to_uppercase();
    FLAG_NAMES
        .iter()
        .find(|(n, _, _)| *n == upper)
        .map(|(_, w, b)| (*w, *b))
}

// Power words.
pub const POW_BUILDER: u32 = 0x0000_0002;
pub const POW_SEE_ALL: u32 = 0x0000_0800;

pub const POWER_NAMES: &[(&str, usize, u32)] = &[
    ("BUILDER", 0, POW_BUILDER),
    ("SEE_ALL", 0, POW_SEE_ALL),
];

// ============================================================================
// Attributes
// ============================================================================

// Well-known attribute numbers. Anything at or above USER_ATTR_START is a
// user-defined attribute held in the db's name map.
pub const A_OSUCC: i32 = 1;
pub const A_OFAIL: i32 = 2;
pub const A_FAIL: i32 = 3;
pub const A_SUCC: i32 = 4;
pub const A_PASS: i32 = 5;
pub const A_DESC: i32 = 6;
pub const A_SEX: i32 = 7;
pub const A_ODROP: i32 = 8;
pub const A_DROP: i32 = 9;
pub const A_ASUCC: i32 = 12;
pub const A_AFAIL: i32 = 13;
pub const A_ADROP: i32 = 14;
pub const A_STARTUP: i32 = 19;
pub const A_ACLONE: i32 = 20;
pub const A_APAY: i32 = 21;
pub const A_OPAY: i32 = 22;
pub const A_PAY: i32 = 23;
pub const A_COST: i32 = 24;
pub const A_LISTEN: i32 = 26;
pub const A_AAHEAR: i32 = 27;
pub const A_AMHEAR: i32 = 28;
pub const A_AHEAR: i32 = 29;
pub const A_LAST: i32 = 30;
pub const A_QUEUEMAX: i32 = 31;
pub const A_IDESC: i32 = 32;
pub const A_ENTER: i32 = 33;
pub const A_AENTER: i32 = 35;
pub const A_LOCK: i32 = 42;
pub const A_COMMENT: i32 = 44;
pub const A_USE: i32 = 45;
pub const A_AUSE: i32 = 47;
pub const A_AWAY: i32 = 73;
pub const A_IDLE: i32 = 74;
pub const A_VA: i32 = 100;
pub const A_VZ: i32 = 125;

/// Names for the well-known attribute slots.
pub const WELL_KNOWN_ATTRS: &[(i32, &str)] = &[
    (A_OSUCC, "OSUCC"),
    (A_OFAIL, "OFAIL"),
    (A_FAIL, "FAIL"),
    (A_SUCC, "SUCC"),
    (A_PASS, "PASS"),
    (A_DESC, "DESC"),
    (A_SEX, "SEX"),
    (A_ODROP, "ODROP"),
    (A_DROP, "DROP"),
    (A_ASUCC, "ASUCC"),
    (A_AFAIL, "AFAIL"),
    (A_ADROP, "ADROP"),
    (A_STARTUP, "STARTUP"),
    (A_ACLONE, "ACLONE"),
    (A_APAY, "APAY"),
    (A_OPAY, "OPAY"),
    (A_PAY, "PAY"),
    (A_COST, "COST"),
    (A_LISTEN, "LISTEN"),
    (A_AAHEAR, "AAHEAR"),
    (A_AMHEAR, "AMHEAR"),
    (A_AHEAR, "AHEAR"),
    (A_LAST, "LAST"),
    (A_QUEUEMAX, "QUEUEMAX"),
    (A_IDESC, "IDESC"),
    (A_ENTER, "ENTER"),
    (A_AENTER, "AENTER"),
    (A_LOCK, "LOCK"),
    (A_COMMENT, "COMMENT"),
    (A_USE, "USE"),
    (A_AUSE, "AUSE"),
    (A_AWAY, "AWAY"),
    (A_IDLE, "IDLE"),
];

// Attribute definition flags.
pub const AF_DARK: u32 = 0x0000_0001;
pub const AF_INTERNAL: u32 = 0x0000_0002;
pub const AF_WIZARD: u32 = 0x0000_0004;
pub const AF_NOPROG: u32 = 0x0000_0008;
pub const AF_NOINHERIT: u32 = 0x0000_0010;
pub const AF_VISUAL: u32 = 0x0000_0020;
pub const AF_GOD: u32 = 0x0000_0040;
pub const AF_IS_LOCK: u32 = 0x0000_0080;
pub const AF_REGEXP: u32 = 0x0000_0100;

/// A user-visible attribute definition. Names are stored uppercased.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrDef {
    pub name: String,
    pub number: i32,
    pub flags: u32,
}

// ============================================================================
// Objects
// ============================================================================

#[derive(Debug, Clone)]
pub struct Object {
    /// Display name; aliases ride along after ';' separators.
    pub name: String,
    pub flags: [u32; 3],
    pub powers: [u32; 2],
    pub owner: Dbref,
    pub parent: Dbref,
    pub zone: Dbref,
    pub location: Dbref,
    pub contents: Dbref,
    pub exits: Dbref,
    pub next: Dbref,
    pub link: Dbref,
    pub pennies: i64,
    pub accessed: i64,
    pub modified: i64,
    pub lock: Option<Boolexp>,
    /// Ordered attribute list: (number, raw value).
    pub attrs: Vec<(i32, String)>,
}

impl Object {
    pub fn new(name: impl Into<String>, kind: ObjectType) -> Object {
        Object {
            name: name.into(),
            flags: [kind as u32, 0, 0],
            powers: [0, 0],
            owner: GOD,
            parent: NOTHING,
            zone: NOTHING,
            location: NOTHING,
            contents: NOTHING,
            exits: NOTHING,
            next: NOTHING,
            link: NOTHING,
            pennies: 0,
            accessed: 0,
            modified: 0,
            lock: None,
            attrs: Vec::new(),
        }
    }

    pub fn kind(&self) -> ObjectType {
        ObjectType::from_word(self.flags[0])
    }

    pub fn is_garbage(&self) -> bool {
        self.kind() == ObjectType::Garbage || self.flags[0] & FLAG_GOING != 0
    }

    /// The display segment of the name (everything before the first ';').
    pub fn display_name(&self) -> &str {
        self.name.split(';').next().unwrap_or(&self.name)
    }

    /// Alias segments of the name, if any.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.name.split(';').skip(1)
    }

    pub fn has_flag(&self, word: usize, bit: u32) -> bool {
        self.flags[word] & bit != 0
    }

    /// Raw attribute value stored directly on this object (no parent walk).
    pub fn attr_raw(&self, num: i32) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| *n == num)
            .map(|(_, v)| v.as_str())
    }

    /// Set or replace an attribute, keeping the list ordered by number.
    pub fn attr_set(&mut self, num: i32, value: String) {
        if value.is_empty() {
            self.attrs.retain(|(n, _)| *n != num);
            return;
        }
        match self.attrs.binary_search_by_key(&num, |(n, _)| *n) {
            Ok(idx) => self.attrs[idx].1 = value,
            Err(idx) => self.attrs.insert(idx, (num, value)),
        }
    }
}

// ============================================================================
// The Store
// ============================================================================

#[derive(Debug, Default)]
pub struct Db {
    objects: HashMap<Dbref, Object>,
    /// Uppercased name -> number, for user-defined attributes.
    attr_numbers: HashMap<String, i32>,
    attr_defs: HashMap<i32, AttrDef>,
    next_attr: i32,
    /// Declared database size from the dump header.
    pub declared_size: usize,
    /// Player count recorded by the dump.
    pub player_count: i32,
    /// Attribute numbers the dump marked as freed. Kept for the writer;
    /// numbers are never handed out again.
    pub freed_attrs: Vec<i32>,
    pub structures: StructureStore,
}

impl Db {
    pub fn new() -> Db {
        Db {
            next_attr: USER_ATTR_START,
            ..Default::default()
        }
    }

    /// A minimal playable world: room #0, God #1 inside it.
    pub fn minimal() -> Db {
        let mut db = Db::new();
        let mut room = Object::new("Limbo", ObjectType::Room);
        room.owner = GOD;
        room.contents = GOD;
        db.insert(0, room);
        let mut god = Object::new("God", ObjectType::Player);
        god.owner = GOD;
        god.location = 0;
        god.flags[0] |= FLAG_WIZARD;
        god.link = 0;
        db.insert(GOD, god);
        db
    }

    pub fn insert(&mut self, dbref: Dbref, obj: Object) {
        self.objects.insert(dbref, obj);
    }

    pub fn get(&self, dbref: Dbref) -> Option<&Object> {
        if dbref < 0 {
            return None;
        }
        self.objects.get(&dbref)
    }

    pub fn get_mut(&mut self, dbref: Dbref) -> Option<&mut Object> {
        if dbref < 0 {
            return None;
        }
        self.objects.get_mut(&dbref)
    }

    pub fn exists(&self, dbref: Dbref) -> bool {
        dbref >= 0 && self.objects.contains_key(&dbref)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All dbrefs in ascending order.
    pub fn dbrefs(&self) -> Vec<Dbref> {
        let mut refs: Vec<Dbref> = self.objects.keys().copied().collect();
        refs.sort_unstable();
        refs
    }

    pub fn next_free_dbref(&self) -> Dbref {
        self.dbrefs().last().map(|d| d + 1).unwrap_or(0)
    }

    /// Create a new object and thread it into its location's contents chain.
    pub fn create(&mut self, name: &str, kind: ObjectType, owner: Dbref, loc: Dbref) -> Dbref {
        let dbref = self.next_free_dbref();
        let mut obj = Object::new(name, kind);
        obj.owner = owner;
        obj.location = loc;
        self.insert(dbref, obj);
        if self.exists(loc) {
            self.chain_insert(loc, dbref);
        }
        dbref
    }

    /// Push an object onto the head of a location's contents chain.
    pub fn chain_insert(&mut self, loc: Dbref, what: Dbref) {
        let head = self.get(loc).map(|o| o.contents).unwrap_or(NOTHING);
        if let Some(obj) = self.get_mut(what) {
            obj.next = head;
            obj.location = loc;
        }
        if let Some(room) = self.get_mut(loc) {
            room.contents = what;
        }
    }

    /// Unthread an object from its location's contents chain.
    pub fn chain_remove(&mut self, what: Dbref) {
        let loc = match self.get(what) {
            Some(o) => o.location,
            None => return,
        };
        let head = match self.get(loc) {
            Some(o) => o.contents,
            None => return,
        };
        let next = self.get(what).map(|o| o.next).unwrap_or(NOTHING);
        if head == what {
            if let Some(room) = self.get_mut(loc) {
                room.contents = next;
            }
        } else {
            let mut cur = head;
            let mut steps = 0usize;
            while cur != NOTHING && steps < crate::config::CHAIN_LENGTH_LIMIT {
                let cur_next = self.get(cur).map(|o| o.next).unwrap_or(NOTHING);
                if cur_next == what {
                    if let Some(prev) = self.get_mut(cur) {
                        prev.next = next;
                    }
                    break;
                }
                cur = cur_next;
                steps += 1;
            }
        }
        if let Some(obj) = self.get_mut(what) {
            obj.next = NOTHING;
        }
    }

    /// Walk a contents/exits chain, bounded by the corruption cap.
    pub fn chain(&self, head: Dbref) -> Vec<Dbref> {
        let mut out = Vec::new();
        let mut cur = head;
        while cur != NOTHING && out.len() < crate::config::CHAIN_LENGTH_LIMIT {
            if out.contains(&cur) {
                break;
            }
            out.push(cur);
            cur = self.get(cur).map(|o| o.next).unwrap_or(NOTHING);
        }
        out
    }

    // ===== Attribute definitions =====

    pub fn attr_def(&self, num: i32) -> Option<&AttrDef> {
        self.attr_defs.get(&num)
    }

    /// Resolve an attribute name (any case) to its number.
    pub fn attr_number(&self, name: &str) -> Option<i32> {
        let upper = name.to_uppercase();
        if let Some(num) = self.attr_numbers.get(&upper) {
            return Some(*num);
        }
        WELL_KNOWN_ATTRS
            .iter()
            .find(|(_, n)| *n == upper)
            .map(|(num, _)| *num)
            .or_else(|| {
                // VA..VZ map onto a fixed numeric range.
                let bytes = upper.as_bytes();
                if bytes.len() == 2 && bytes[0] == b'V' && bytes[1].is_ascii_uppercase() {
                    Some(A_VA + (bytes[1] - b'A') as i32)
                } else {
                    None
                }
            })
    }

    /// Stored name for an attribute number.
    pub fn attr_name(&self, num: i32) -> Option<String> {
        if num >= USER_ATTR_START {
            return self.attr_defs.get(&num).map(|d| d.name.clone());
        }
        if (A_VA..=A_VZ).contains(&num) {
            return Some(format!("V{}", (b'A' + (num - A_VA) as u8) as char));
        }
        WELL_KNOWN_ATTRS
            .iter()
            .find(|(n, _)| *n == num)
            .map(|(_, name)| (*name).to_string())
    }

    /// Define (or fetch) a user attribute by name. New entries append; numbers
    /// are never reused.
    pub fn define_user_attr(&mut self, name: &str, flags: u32) -> i32 {
        let upper = name.to_uppercase();
        if let Some(num) = self.attr_number(&upper) {
            return num;
        }
        let num = self.next_attr;
        self.next_attr += 1;
        self.attr_numbers.insert(upper.clone(), num);
        self.attr_defs.insert(
            num,
            AttrDef {
                name: upper,
                number: num,
                flags,
            },
        );
        num
    }

    /// Install a user attribute at a fixed number (flatfile +A directive).
    pub fn install_user_attr(&mut self, num: i32, name: &str, flags: u32) {
        let upper = name.to_uppercase();
        self.attr_numbers.insert(upper.clone(), num);
        self.attr_defs.insert(
            num,
            AttrDef {
                name: upper,
                number: num,
                flags,
            },
        );
        if num >= self.next_attr {
            self.next_attr = num + 1;
        }
    }

    pub fn set_next_attr(&mut self, num: i32) {
        if num > self.next_attr {
            self.next_attr = num;
        }
    }

    pub fn next_attr_number(&self) -> i32 {
        self.next_attr
    }

    pub fn user_attr_defs(&self) -> Vec<&AttrDef> {
        let mut defs: Vec<&AttrDef> = self.attr_defs.values().collect();
        defs.sort_by_key(|d| d.number);
        defs
    }

    /// Case-insensitive player lookup by display name or alias.
    pub fn find_player(&self, name: &str) -> Dbref {
        let target = name.trim().trim_start_matches('*').to_lowercase();
        let mut found = NOTHING;
        for (dbref, obj) in &self.objects {
            if obj.kind() != ObjectType::Player {
                continue;
            }
            let hit = obj.display_name().to_lowercase() == target
                || obj.aliases().any(|a| a.to_lowercase() == target);
            if hit {
                if found != NOTHING {
                    return AMBIGUOUS;
                }
                found = *dbref;
            }
        }
        found
    }

    /// True when the object may act with wizard privilege.
    pub fn is_wizard(&self, who: Dbref) -> bool {
        who == GOD
            || self
                .get(who)
                .map(|o| o.has_flag(0, FLAG_WIZARD) || o.has_flag(0, FLAG_IMMORTAL))
                .unwrap_or(false)
    }

    /// Ownership-or-wizard control predicate.
    pub fn controls(&self, who: Dbref, what: Dbref) -> bool {
        if self.is_wizard(who) {
            return true;
        }
        match (self.get(who), self.get(what)) {
            (Some(_), Some(target)) => target.owner == who || target.owner == self.owner_of(who),
            _ => false,
        }
    }

    pub fn owner_of(&self, who: Dbref) -> Dbref {
        self.get(who).map(|o| o.owner).unwrap_or(NOTHING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_are_not_objects() {
        let db = Db::minimal();
        assert!(db.get(NOTHING).is_none());
        assert!(db.get(AMBIGUOUS).is_none());
        assert!(db.get(HOME).is_none());
    }

    #[test]
    fn test_type_rides_in_flag_word() {
        let obj = Object::new("widget", ObjectType::Exit);
        assert_eq!(obj.kind(), ObjectType::Exit);
        assert_eq!(ObjectType::from_word(obj.flags[0]), ObjectType::Exit);
    }

    #[test]
    fn test_display_name_and_aliases() {
        let obj = Object::new("East;e;out", ObjectType::Exit);
        assert_eq!(obj.display_name(), "East");
        let aliases: Vec<&str> = obj.aliases().collect();
        assert_eq!(aliases, vec!["e", "out"]);
    }

    #[test]
    fn test_attr_set_keeps_order_and_replaces() {
        let mut obj = Object::new("widget", ObjectType::Thing);
        obj.attr_set(20, "twenty".to_string());
        obj.attr_set(6, "desc".to_string());
        obj.attr_set(20, "replaced".to_string());
        let nums: Vec<i32> = obj.attrs.iter().map(|(n, _)| *n).collect();
        assert_eq!(nums, vec![6, 20]);
        assert_eq!(obj.attr_raw(20), Some("replaced"));
    }

    #[test]
    fn test_attr_set_empty_erases() {
        let mut obj = Object::new("widget", ObjectType::Thing);
        obj.attr_set(6, "desc".to_string());
        obj.attr_set(6, String::new());
        assert!(obj.attr_raw(6).is_none());
    }

    #[test]
    fn test_chain_insert_and_remove() {
        let mut db = Db::minimal();
        let a = db.create("a", ObjectType::Thing, GOD, 0);
        let b = db.create("b", ObjectType::Thing, GOD, 0);
        // Chain is head-insertion order: b, a, God.
        assert_eq!(db.chain(db.get(0).unwrap().contents), vec![b, a, GOD]);
        db.chain_remove(a);
        assert_eq!(db.chain(db.get(0).unwrap().contents), vec![b, GOD]);
        assert_eq!(db.get(a).unwrap().next, NOTHING);
    }

    #[test]
    fn test_attr_name_resolution() {
        let mut db = Db::new();
        assert_eq!(db.attr_number("desc"), Some(A_DESC));
        assert_eq!(db.attr_number("VA"), Some(A_VA));
        assert_eq!(db.attr_number("vz"), Some(A_VZ));
        let num = db.define_user_attr("funkytown", 0);
        assert!(num >= USER_ATTR_START);
        assert_eq!(db.attr_number("FUNKYTOWN"), Some(num));
        assert_eq!(db.attr_name(num).as_deref(), Some("FUNKYTOWN"));
        // Numbers are never reused.
        let again = db.define_user_attr("FunkyTown", 0);
        assert_eq!(again, num);
    }

    #[test]
    fn test_find_player() {
        let mut db = Db::minimal();
        let p = db.create("Zilla;zee", ObjectType::Player, GOD, 0);
        assert_eq!(db.find_player("zilla"), p);
        assert_eq!(db.find_player("ZEE"), p);
        assert_eq!(db.find_player("*Zilla"), p);
        assert_eq!(db.find_player("nobody"), NOTHING);
    }

    #[test]
    fn test_controls() {
        let mut db = Db::minimal();
        let p = db.create("Pat", ObjectType::Player, GOD, 0);
        db.get_mut(p).unwrap().owner = p;
        let t = db.create("rock", ObjectType::Thing, p, 0);
        assert!(db.controls(p, t));
        assert!(db.controls(GOD, t));
        let q = db.create("Quinn", ObjectType::Player, GOD, 0);
        db.get_mut(q).unwrap().owner = q;
        assert!(!db.controls(q, t));
    }
}
