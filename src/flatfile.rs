// ABOUTME: Flatfile dump loader and writer - the version-tagged object stream

use crate::boolexp::parse_boolexp;
use crate::db::{Db, Dbref, Object, ObjectType, NOTHING};
use crate::error::LoadError;
use std::path::Path;

// ============================================================================
// Version Word
// ============================================================================

// The low byte of the version word is the format revision; the high bits are
// feature flags controlling which optional per-object fields follow.
pub const V_MASK: u32 = 0xff;
pub const V_ZONE: u32 = 1 << 8;
pub const V_LINK: u32 = 1 << 9;
/// Per-object lock carried in the object header.
pub const V_ATRKEY: u32 = 1 << 10;
pub const V_PARENT: u32 = 1 << 11;
/// Pennies carried as a field rather than an attribute.
pub const V_PENNIES: u32 = 1 << 12;
/// Second flag word present.
pub const V_XFLAGS: u32 = 1 << 13;
/// Third flag word present.
pub const V_3FLAGS: u32 = 1 << 14;
pub const V_POWERS: u32 = 1 << 15;
pub const V_TIMESTAMPS: u32 = 1 << 16;
/// Strings are quoted with escapes.
pub const V_QUOTED: u32 = 1 << 17;
/// User-attribute definitions carry their flag word.
pub const V_VISUALATTRS: u32 = 1 << 18;

/// Everything the writer emits.
pub const DUMP_VERSION: u32 = 1
    | V_ZONE
    | V_LINK
    | V_ATRKEY
    | V_PARENT
    | V_PENNIES
    | V_XFLAGS
    | V_3FLAGS
    | V_POWERS
    | V_TIMESTAMPS
    | V_QUOTED
    | V_VISUALATTRS;

pub const END_OF_DUMP: &str = "***END OF DUMP***";

// ============================================================================
// Quoted Strings
// ============================================================================

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn unquote(line: &str, lineno: usize) -> Result<String, LoadError> {
    let inner = line
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .ok_or_else(|| LoadError::parse(lineno, "expected quoted string"))?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some(other) => out.push(other),
            None => return Err(LoadError::parse(lineno, "dangling escape in string")),
        }
    }
    Ok(out)
}

// ============================================================================
// Loader
// ============================================================================

struct Parser<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Parser<'a> {
        Parser {
            lines: text.lines().collect(),
            pos: 0,
        }
    }

    fn lineno(&self) -> usize {
        self.pos
    }

    fn eof(&self) -> bool {
        self.pos >= self.lines.len()
    }

    fn next_line(&mut self) -> Result<&'a str, LoadError> {
        let line = self
            .lines
            .get(self.pos)
            .copied()
            .ok_or(LoadError::MissingTerminator)?;
        self.pos += 1;
        Ok(line)
    }

    fn read_num(&mut self) -> Result<i64, LoadError> {
        let lineno = self.lineno() + 1;
        let line = self.next_line()?;
        line.trim()
            .parse()
            .map_err(|_| LoadError::parse(lineno, format!("expected number, got '{}'", line)))
    }

    fn read_dbref(&mut self) -> Result<Dbref, LoadError> {
        Ok(self.read_num()? as Dbref)
    }

    fn read_string(&mut self, quoted: bool) -> Result<String, LoadError> {
        let lineno = self.lineno() + 1;
        let line = self.next_line()?;
        if quoted && line.starts_with('"') {
            unquote(line, lineno)
        } else {
            Ok(line.to_string())
        }
    }
}

fn parse_object(parser: &mut Parser<'_>, flags: u32) -> Result<Object, LoadError> {
    let quoted = flags & V_QUOTED != 0;
    let name = parser.read_string(quoted)?;
    let mut obj = Object::new(name, ObjectType::Thing);
    obj.location = parser.read_dbref()?;
    if flags & V_ZONE != 0 {
        obj.zone = parser.read_dbref()?;
    }
    obj.contents = parser.read_dbref()?;
    obj.exits = parser.read_dbref()?;
    if flags & V_LINK != 0 {
        obj.link = parser.read_dbref()?;
    }
    obj.next = parser.read_dbref()?;
    if flags & V_ATRKEY != 0 {
        let lineno = parser.lineno() + 1;
        let lock_line = parser.read_string(quoted)?;
        obj.lock = parse_boolexp(&lock_line).map_err(|message| LoadError::Boolexp {
            line: lineno,
            message,
        })?;
    }
    obj.owner = parser.read_dbref()?;
    if flags & V_PARENT != 0 {
        obj.parent = parser.read_dbref()?;
    } else {
        obj.parent = NOTHING;
    }
    if flags & V_PENNIES != 0 {
        obj.pennies = parser.read_num()?;
    }
    obj.flags[0] = parser.read_num()? as u32;
    if flags & V_XFLAGS != 0 {
        obj.flags[1] = parser.read_num()? as u32;
    }
    if flags & V_3FLAGS != 0 {
        obj.flags[2] = parser.read_num()? as u32;
    }
    if flags & V_POWERS != 0 {
        obj.powers[0] = parser.read_num()? as u32;
        obj.powers[1] = parser.read_num()? as u32;
    }
    if flags & V_TIMESTAMPS != 0 {
        obj.accessed = parser.read_num()?;
        obj.modified = parser.read_num()?;
    }
    // Attribute block: "> num" lines with a value line each, closed by "<".
    loop {
        let lineno = parser.lineno() + 1;
        let line = parser.next_line()?;
        if line.trim() == "<" {
            break;
        }
        let num: i32 = line
            .trim()
            .strip_prefix('>')
            .and_then(|rest| rest.trim().parse().ok())
            .ok_or_else(|| {
                LoadError::parse(lineno, format!("expected attribute header, got '{}'", line))
            })?;
        let value = parser.read_string(quoted)?;
        obj.attr_set(num, value);
    }
    Ok(obj)
}

/// Parse a complete dump from text. Structural corruption is fatal.
pub fn load_str(text: &str) -> Result<Db, LoadError> {
    let mut parser = Parser::new(text);
    let mut db = Db::new();
    let mut version: u32 = 0;
    let mut terminated = false;

    while !parser.eof() {
        let lineno = parser.lineno() + 1;
        let line = parser.next_line()?;
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == END_OF_DUMP {
            terminated = true;
            break;
        }
        if let Some(rest) = trimmed.strip_prefix("+T") {
            version = rest
                .trim()
                .parse()
                .map_err(|_| LoadError::BadVersion(trimmed.to_string()))?;
        } else if let Some(rest) = trimmed.strip_prefix("+V") {
            version = rest
                .trim()
                .parse()
                .map_err(|_| LoadError::BadVersion(trimmed.to_string()))?;
        } else if let Some(rest) = trimmed.strip_prefix("+X") {
            version = rest
                .trim()
                .parse()
                .map_err(|_| LoadError::BadVersion(trimmed.to_string()))?;
        } else if let Some(rest) = trimmed.strip_prefix("+S") {
            db.declared_size = rest.trim().parse().unwrap_or(0);
        } else if let Some(rest) = trimmed.strip_prefix("+N") {
            let next: i32 = rest
                .trim()
                .parse()
                .map_err(|_| LoadError::parse(lineno, "bad +N value"))?;
            db.set_next_attr(next);
        } else if let Some(rest) = trimmed.strip_prefix("+F") {
            let num: i32 = rest
                .trim()
                .parse()
                .map_err(|_| LoadError::parse(lineno, "bad +F value"))?;
            db.freed_attrs.push(num);
        } else if let Some(rest) = trimmed.strip_prefix("+A") {
            let num: i32 = rest
                .trim()
                .parse()
                .map_err(|_| LoadError::parse(lineno, "bad +A number"))?;
            let def_line = parser.read_string(version & V_QUOTED != 0)?;
            // Definitions read `flags:name`; a bare name means no flags.
            let (attr_flags, name) = match def_line.split_once(':') {
                Some((f, n)) if f.trim().chars().all(|c| c.is_ascii_digit()) => (
                    f.trim().parse::<u32>().unwrap_or(0),
                    n.to_string(),
                ),
                _ => (0, def_line.clone()),
            };
            if name.trim().is_empty() {
                return Err(LoadError::parse(lineno, "empty attribute name"));
            }
            db.install_user_attr(num, name.trim(), attr_flags);
        } else if let Some(rest) = trimmed.strip_prefix("-R") {
            db.player_count = rest.trim().parse().unwrap_or(0);
        } else if let Some(rest) = trimmed.strip_prefix('!') {
            let dbref: Dbref = rest
                .trim()
                .parse()
                .map_err(|_| LoadError::parse(lineno, format!("bad object header '{}'", line)))?;
            let obj = parse_object(&mut parser, version)?;
            db.insert(dbref, obj);
        } else {
            return Err(LoadError::parse(
                lineno,
                format!("unrecognized directive '{}'", trimmed),
            ));
        }
    }

    if !terminated {
        return Err(LoadError::MissingTerminator);
    }
    Ok(db)
}

pub fn load_file(path: &Path) -> Result<Db, LoadError> {
    let text = std::fs::read_to_string(path)?;
    load_str(&text)
}

// ============================================================================
// Writer
// ============================================================================

/// Serialize the store in the full dialect the loader reads back.
pub fn dump_str(db: &Db) -> String {
    let mut out = String::new();
    out.push_str(&format!("+T{}\n", DUMP_VERSION));
    out.push_str(&format!("+S{}\n", db.len()));
    out.push_str(&format!("+N{}\n", db.next_attr_number()));
    for def in db.user_attr_defs() {
        out.push_str(&format!("+A{}\n", def.number));
        out.push_str(&quote(&format!("{}:{}", def.flags, def.name)));
        out.push('\n');
    }
    for num in &db.freed_attrs {
        out.push_str(&format!("+F{}\n", num));
    }
    out.push_str(&format!("-R{}\n", db.player_count));
    for dbref in db.dbrefs() {
        let obj = match db.get(dbref) {
            Some(o) => o,
            None => continue,
        };
        out.push_str(&format!("!{}\n", dbref));
        out.push_str(&quote(&obj.name));
        out.push('\n');
        out.push_str(&format!("{}\n", obj.location));
        out.push_str(&format!("{}\n", obj.zone));
        out.push_str(&format!("{}\n", obj.contents));
        out.push_str(&format!("{}\n", obj.exits));
        out.push_str(&format!("{}\n", obj.link));
        out.push_str(&format!("{}\n", obj.next));
        let lock = obj
            .lock
            .as_ref()
            .map(|l| l.to_string())
            .unwrap_or_default();
        out.push_str(&quote(&lock));
        out.push('\n');
        out.push_str(&format!("{}\n", obj.owner));
        out.push_str(&format!("{}\n", obj.parent));
        out.push_str(&format!("{}\n", obj.pennies));
        out.push_str(&format!("{}\n", obj.flags[0]));
        out.push_str(&format!("{}\n", obj.flags[1]));
        out.push_str(&format!("{}\n", obj.flags[2]));
        out.push_str(&format!("{}\n", obj.powers[0]));
        out.push_str(&format!("{}\n", obj.powers[1]));
        out.push_str(&format!("{}\n", obj.accessed));
        out.push_str(&format!("{}\n", obj.modified));
        for (num, value) in &obj.attrs {
            out.push_str(&format!(">{}\n", num));
            out.push_str(&quote(value));
            out.push('\n');
        }
        out.push_str("<\n");
    }
    out.push_str(END_OF_DUMP);
    out.push('\n');
    out
}

pub fn dump_file(db: &Db, path: &Path) -> Result<(), LoadError> {
    std::fs::write(path, dump_str(db))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ObjectType, A_DESC, FLAG_WIZARD, GOD};

    const MINIMAL_DUMP: &str = "\
+V1
+S2
-R1
!0
Limbo
-1
1
-1
-1
1
0
>6
nice place
<
!1
God
0
-1
-1
-1
1
19
<
***END OF DUMP***
";

    #[test]
    fn test_load_minimal_v2_dialect() {
        let db = load_str(MINIMAL_DUMP).unwrap();
        assert_eq!(db.len(), 2);
        assert_eq!(db.declared_size, 2);
        assert_eq!(db.player_count, 1);
        let limbo = db.get(0).unwrap();
        assert_eq!(limbo.name, "Limbo");
        assert_eq!(limbo.kind(), ObjectType::Room);
        assert_eq!(limbo.contents, 1);
        assert_eq!(limbo.attr_raw(A_DESC), Some("nice place"));
        let god = db.get(1).unwrap();
        assert_eq!(god.kind(), ObjectType::Player);
        assert!(god.has_flag(0, FLAG_WIZARD));
        assert_eq!(god.location, 0);
    }

    #[test]
    fn test_missing_terminator_is_fatal() {
        let chopped = MINIMAL_DUMP.replace("***END OF DUMP***\n", "");
        assert!(matches!(
            load_str(&chopped),
            Err(LoadError::MissingTerminator)
        ));
    }

    #[test]
    fn test_unknown_directive_is_fatal() {
        let broken = format!("+V1\n?bogus\n{}", END_OF_DUMP);
        assert!(matches!(load_str(&broken), Err(LoadError::Parse { .. })));
    }

    #[test]
    fn test_bad_number_carries_position() {
        let broken = "+V1\n!0\nLimbo\nnot-a-number\n";
        match load_str(broken) {
            Err(LoadError::Parse { line, .. }) => assert_eq!(line, 4),
            other => panic!("expected positional parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_quote_unquote() {
        let original = "line\nwith \"quotes\" and \\slashes\\ and\ttabs";
        let quoted = quote(original);
        assert_eq!(unquote(&quoted, 1).unwrap(), original);
    }

    fn sample_db() -> crate::db::Db {
        let mut db = crate::db::Db::minimal();
        let thing = db.create("brick;stone", ObjectType::Thing, GOD, 0);
        db.get_mut(thing)
            .unwrap()
            .attr_set(A_DESC, "brick wall\nsecond line".to_string());
        let num = db.define_user_attr("FUNKY", crate::db::AF_VISUAL);
        db.get_mut(thing)
            .unwrap()
            .attr_set(num, crate::attr::with_header(1, 0, "headered"));
        db.get_mut(thing).unwrap().lock =
            crate::boolexp::parse_boolexp("(=1 | sex:m*)").unwrap();
        db.get_mut(thing).unwrap().pennies = 42;
        db.player_count = 1;
        db
    }

    fn assert_same_graph(a: &crate::db::Db, b: &crate::db::Db) {
        assert_eq!(a.dbrefs(), b.dbrefs());
        for dbref in a.dbrefs() {
            let (x, y) = (a.get(dbref).unwrap(), b.get(dbref).unwrap());
            assert_eq!(x.name, y.name, "#{} name", dbref);
            assert_eq!(x.flags, y.flags, "#{} flags", dbref);
            assert_eq!(x.powers, y.powers, "#{} powers", dbref);
            assert_eq!(x.owner, y.owner, "#{} owner", dbref);
            assert_eq!(x.parent, y.parent, "#{} parent", dbref);
            assert_eq!(x.zone, y.zone, "#{} zone", dbref);
            assert_eq!(x.location, y.location, "#{} location", dbref);
            assert_eq!(x.contents, y.contents, "#{} contents", dbref);
            assert_eq!(x.exits, y.exits, "#{} exits", dbref);
            assert_eq!(x.next, y.next, "#{} next", dbref);
            assert_eq!(x.link, y.link, "#{} link", dbref);
            assert_eq!(x.pennies, y.pennies, "#{} pennies", dbref);
            assert_eq!(x.lock, y.lock, "#{} lock", dbref);
            let mut ax = x.attrs.clone();
            let mut ay = y.attrs.clone();
            ax.sort();
            ay.sort();
            assert_eq!(ax, ay, "#{} attrs", dbref);
        }
    }

    #[test]
    fn test_dump_load_roundtrip() {
        let db = sample_db();
        let dumped = dump_str(&db);
        let reloaded = load_str(&dumped).unwrap();
        assert_same_graph(&db, &reloaded);
        // A second pass is byte-stable.
        assert_eq!(dump_str(&reloaded), dumped);
    }

    #[test]
    fn test_user_attr_definitions_survive() {
        let db = sample_db();
        let reloaded = load_str(&dump_str(&db)).unwrap();
        let num = db.attr_number("FUNKY").unwrap();
        assert_eq!(reloaded.attr_number("FUNKY"), Some(num));
        assert_eq!(
            reloaded.attr_def(num).map(|d| d.flags),
            Some(crate::db::AF_VISUAL)
        );
    }
}
