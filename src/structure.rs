// ABOUTME: Per-player typed record definitions and instances (the structure system)

use crate::db::Dbref;
use crate::host::Host;
use std::collections::HashMap;
use std::sync::RwLock;

/// Wire delimiter used by read()/write() serialization.
pub const WIRE_DELIM: char = '\x0c';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompType {
    Any,
    Char,
    Dbref,
    Integer,
    Float,
    /// A string with no embedded whitespace.
    Word,
}

impl CompType {
    pub fn from_code(code: &str) -> Option<CompType> {
        match code.trim().to_lowercase().as_str() {
            "any" | "a" => Some(CompType::Any),
            "char" | "character" | "c" => Some(CompType::Char),
            "dbref" | "d" => Some(CompType::Dbref),
            "integer" | "int" | "i" => Some(CompType::Integer),
            "float" | "f" => Some(CompType::Float),
            "string" | "s" => Some(CompType::Word),
            _ => None,
        }
    }

    pub fn accepts(&self, value: &str) -> bool {
        match self {
            CompType::Any => true,
            CompType::Char => value.chars().count() == 1,
            CompType::Dbref => value
                .strip_prefix('#')
                .map(|rest| rest.parse::<i64>().is_ok())
                .unwrap_or(false),
            CompType::Integer => value.parse::<i64>().is_ok(),
            CompType::Float => value.parse::<f64>().is_ok(),
            CompType::Word => !value.is_empty() && !value.chars().any(|c| c.is_whitespace()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub comps: Vec<String>,
    pub types: Vec<CompType>,
    pub defaults: Vec<String>,
    pub delim: String,
}

impl StructDef {
    fn comp_index(&self, comp: &str) -> Option<usize> {
        let lowered = comp.to_lowercase();
        self.comps.iter().position(|c| *c == lowered)
    }
}

#[derive(Debug, Clone)]
pub struct StructInstance {
    pub def_name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Default)]
struct StoreInner {
    defs: HashMap<(Dbref, String), StructDef>,
    instances: HashMap<(Dbref, String), StructInstance>,
    refcounts: HashMap<(Dbref, String), usize>,
}

/// The structure store. Addressed by executor rather than by evaluation
/// context, so all mutation funnels through one write lock; reads take the
/// read side.
#[derive(Debug, Default)]
pub struct StructureStore {
    inner: RwLock<StoreInner>,
}

impl StructureStore {
    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Define a structure. Fails when the name is taken or the component
    /// lists disagree in length.
    pub fn define(
        &self,
        host: &dyn Host,
        player: Dbref,
        name: &str,
        comps: Vec<String>,
        types: Vec<CompType>,
        defaults: Vec<String>,
        delim: String,
    ) -> Result<(), &'static str> {
        let key = (player, name.to_lowercase());
        if comps.is_empty() {
            return Err("no components");
        }
        if comps.len() != types.len() || comps.len() != defaults.len() {
            return Err("component list mismatch");
        }
        let mut inner = self.write();
        if inner.defs.contains_key(&key) {
            return Err("structure already exists");
        }
        for (ty, default) in types.iter().zip(defaults.iter()) {
            if !default.is_empty() && !ty.accepts(default) {
                return Err("default violates component type");
            }
        }
        let def = StructDef {
            name: key.1.clone(),
            comps: comps.iter().map(|c| c.to_lowercase()).collect(),
            types,
            defaults,
            delim,
        };
        host.save_structure_def(player, &key.1, &def.comps.join(" "));
        inner.defs.insert(key, def);
        Ok(())
    }

    /// Instantiate a structure with optional component overrides.
    pub fn construct(
        &self,
        host: &dyn Host,
        player: Dbref,
        instance: &str,
        def_name: &str,
        overrides: &[(String, String)],
    ) -> Result<(), &'static str> {
        let ikey = (player, instance.to_lowercase());
        let dkey = (player, def_name.to_lowercase());
        let mut inner = self.write();
        if inner.instances.contains_key(&ikey) {
            return Err("instance already exists");
        }
        let def = inner.defs.get(&dkey).ok_or("no such structure")?;
        let mut values = def.defaults.clone();
        for (comp, value) in overrides {
            let idx = def.comp_index(comp).ok_or("no such component")?;
            if !def.types[idx].accepts(value) {
                return Err("value violates component type");
            }
            values[idx] = value.clone();
        }
        let inst = StructInstance {
            def_name: dkey.1.clone(),
            values,
        };
        host.save_structure_instance(player, &ikey.1, &inst.values.join("\x0c"));
        inner.instances.insert(ikey, inst);
        *inner.refcounts.entry(dkey).or_insert(0) += 1;
        Ok(())
    }

    /// Instantiate from a serialized value list.
    pub fn load(
        &self,
        host: &dyn Host,
        player: Dbref,
        instance: &str,
        def_name: &str,
        serialized: &str,
        delim: Option<&str>,
    ) -> Result<(), &'static str> {
        let dkey = (player, def_name.to_lowercase());
        let (comps, values) = {
            let inner = self.read();
            let def = inner.defs.get(&dkey).ok_or("no such structure")?;
            let sep = delim.unwrap_or(def.delim.as_str());
            let values: Vec<String> = if sep.is_empty() {
                vec![serialized.to_string()]
            } else {
                serialized.split(sep).map(|s| s.to_string()).collect()
            };
            (def.comps.clone(), values)
        };
        if comps.len() != values.len() {
            return Err("value count mismatch");
        }
        let overrides: Vec<(String, String)> = comps.into_iter().zip(values).collect();
        self.construct(host, player, instance, def_name, &overrides)
    }

    /// Release an instance, decrementing its definition's refcount.
    pub fn destruct(&self, host: &dyn Host, player: Dbref, instance: &str) -> bool {
        let ikey = (player, instance.to_lowercase());
        let mut inner = self.write();
        match inner.instances.remove(&ikey) {
            Some(inst) => {
                let dkey = (player, inst.def_name.clone());
                if let Some(count) = inner.refcounts.get_mut(&dkey) {
                    *count = count.saturating_sub(1);
                }
                host.delete_structure_instance(player, &ikey.1);
                true
            }
            None => false,
        }
    }

    /// Drop a definition; refuses while instances reference it.
    pub fn unstructure(&self, host: &dyn Host, player: Dbref, name: &str) -> bool {
        let dkey = (player, name.to_lowercase());
        let mut inner = self.write();
        if !inner.defs.contains_key(&dkey) {
            return false;
        }
        if inner.refcounts.get(&dkey).copied().unwrap_or(0) > 0 {
            return false;
        }
        inner.defs.remove(&dkey);
        inner.refcounts.remove(&dkey);
        host.delete_structure_def(player, &dkey.1);
        true
    }

    /// Batch-update components with type checks. Returns how many changed.
    pub fn modify(
        &self,
        host: &dyn Host,
        player: Dbref,
        instance: &str,
        comps: &[String],
        values: &[String],
    ) -> usize {
        let ikey = (player, instance.to_lowercase());
        let mut inner = self.write();
        let def_name = match inner.instances.get(&ikey) {
            Some(inst) => inst.def_name.clone(),
            None => return 0,
        };
        let def = match inner.defs.get(&(player, def_name)) {
            Some(d) => d.clone(),
            None => return 0,
        };
        let mut modified = 0;
        if let Some(inst) = inner.instances.get_mut(&ikey) {
            for (comp, value) in comps.iter().zip(values.iter()) {
                if let Some(idx) = def.comp_index(comp) {
                    if def.types[idx].accepts(value) {
                        inst.values[idx] = value.clone();
                        modified += 1;
                    }
                }
            }
            if modified > 0 {
                host.save_structure_instance(player, &ikey.1, &inst.values.join("\x0c"));
            }
        }
        modified
    }

    /// Read one component of an instance.
    pub fn component(&self, player: Dbref, instance: &str, comp: &str) -> Option<String> {
        let ikey = (player, instance.to_lowercase());
        let inner = self.read();
        let inst = inner.instances.get(&ikey)?;
        let def = inner.defs.get(&(player, inst.def_name.clone()))?;
        let idx = def.comp_index(comp)?;
        inst.values.get(idx).cloned()
    }

    /// Serialize an instance with its definition's delimiter (or an override).
    pub fn unload(&self, player: Dbref, instance: &str, delim: Option<&str>) -> Option<String> {
        let ikey = (player, instance.to_lowercase());
        let inner = self.read();
        let inst = inner.instances.get(&ikey)?;
        let def = inner.defs.get(&(player, inst.def_name.clone()))?;
        let sep = delim.map(|d| d.to_string()).unwrap_or(def.delim.clone());
        Some(inst.values.join(&sep))
    }

    /// Transcode a serialized form from one delimiter to another.
    pub fn delimit(
        &self,
        player: Dbref,
        def_name: &str,
        serialized: &str,
        from: &str,
        to: &str,
    ) -> Option<String> {
        let dkey = (player, def_name.to_lowercase());
        let inner = self.read();
        let def = inner.defs.get(&dkey)?;
        let parts: Vec<&str> = serialized.split(from).collect();
        if parts.len() != def.comps.len() {
            return None;
        }
        Some(parts.join(to))
    }

    pub fn structures(&self, player: Dbref) -> Vec<String> {
        let inner = self.read();
        let mut names: Vec<String> = inner
            .defs
            .keys()
            .filter(|(p, _)| *p == player)
            .map(|(_, n)| n.clone())
            .collect();
        names.sort();
        names
    }

    pub fn instances(&self, player: Dbref) -> Vec<String> {
        let inner = self.read();
        let mut names: Vec<String> = inner
            .instances
            .keys()
            .filter(|(p, _)| *p == player)
            .map(|(_, n)| n.clone())
            .collect();
        names.sort();
        names
    }

    /// Component count of a definition.
    pub fn items(&self, player: Dbref, def_name: &str) -> Option<usize> {
        let dkey = (player, def_name.to_lowercase());
        self.read().defs.get(&dkey).map(|d| d.comps.len())
    }

    pub fn def_exists(&self, player: Dbref, name: &str) -> bool {
        self.read()
            .defs
            .contains_key(&(player, name.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullHost;

    fn sample_def(store: &StructureStore, player: Dbref) {
        store
            .define(
                &NullHost,
                player,
                "point",
                vec!["x".to_string(), "y".to_string()],
                vec![CompType::Integer, CompType::Integer],
                vec!["0".to_string(), "0".to_string()],
                "|".to_string(),
            )
            .unwrap();
    }

    #[test]
    fn test_define_and_redefine() {
        let store = StructureStore::default();
        sample_def(&store, 3);
        assert!(store.def_exists(3, "POINT"));
        let err = store.define(
            &NullHost,
            3,
            "point",
            vec!["x".to_string()],
            vec![CompType::Any],
            vec![String::new()],
            "|".to_string(),
        );
        assert_eq!(err, Err("structure already exists"));
    }

    #[test]
    fn test_defs_are_per_player() {
        let store = StructureStore::default();
        sample_def(&store, 3);
        assert!(!store.def_exists(4, "point"));
    }

    #[test]
    fn test_construct_with_overrides_and_types() {
        let store = StructureStore::default();
        sample_def(&store, 3);
        store
            .construct(
                &NullHost,
                3,
                "origin",
                "point",
                &[("x".to_string(), "5".to_string())],
            )
            .unwrap();
        assert_eq!(store.component(3, "origin", "x").as_deref(), Some("5"));
        assert_eq!(store.component(3, "origin", "y").as_deref(), Some("0"));

        let err = store.construct(
            &NullHost,
            3,
            "bad",
            "point",
            &[("x".to_string(), "fish".to_string())],
        );
        assert_eq!(err, Err("value violates component type"));

        let err = store.construct(
            &NullHost,
            3,
            "bad",
            "point",
            &[("zz".to_string(), "1".to_string())],
        );
        assert_eq!(err, Err("no such component"));
    }

    #[test]
    fn test_unstructure_blocked_by_refcount() {
        let store = StructureStore::default();
        sample_def(&store, 3);
        store
            .construct(&NullHost, 3, "origin", "point", &[])
            .unwrap();
        assert!(!store.unstructure(&NullHost, 3, "point"));
        assert!(store.destruct(&NullHost, 3, "origin"));
        assert!(store.unstructure(&NullHost, 3, "point"));
    }

    #[test]
    fn test_modify_counts_and_checks() {
        let store = StructureStore::default();
        sample_def(&store, 3);
        store
            .construct(&NullHost, 3, "origin", "point", &[])
            .unwrap();
        let n = store.modify(
            &NullHost,
            3,
            "origin",
            &["x".to_string(), "y".to_string()],
            &["7".to_string(), "fish".to_string()],
        );
        assert_eq!(n, 1);
        assert_eq!(store.component(3, "origin", "x").as_deref(), Some("7"));
        assert_eq!(store.component(3, "origin", "y").as_deref(), Some("0"));
    }

    #[test]
    fn test_load_unload_roundtrip() {
        let store = StructureStore::default();
        sample_def(&store, 3);
        store
            .load(&NullHost, 3, "pt", "point", "3|4", None)
            .unwrap();
        assert_eq!(store.unload(3, "pt", None).as_deref(), Some("3|4"));
        assert_eq!(store.unload(3, "pt", Some(",")).as_deref(), Some("3,4"));
    }

    #[test]
    fn test_delimit_transcode() {
        let store = StructureStore::default();
        sample_def(&store, 3);
        assert_eq!(
            store.delimit(3, "point", "3|4", "|", ",").as_deref(),
            Some("3,4")
        );
        assert_eq!(store.delimit(3, "point", "3|4|5", "|", ","), None);
    }

    #[test]
    fn test_listings() {
        let store = StructureStore::default();
        sample_def(&store, 3);
        store
            .construct(&NullHost, 3, "origin", "point", &[])
            .unwrap();
        assert_eq!(store.structures(3), vec!["point".to_string()]);
        assert_eq!(store.instances(3), vec!["origin".to_string()]);
        assert_eq!(store.items(3, "point"), Some(2));
    }
}
