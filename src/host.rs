// ABOUTME: The host callback surface - the evaluator's view of the running game

use crate::db::{Db, Dbref, NOTHING};

/// Side-effect output produced during one evaluation and delivered by the
/// host, in order, after the top-level call returns.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub target: Dbref,
    pub message: String,
    pub kind: NotifyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    /// Direct to the target object.
    Pemit,
    /// To everything in the target room.
    Remit,
    /// To everything in the room except the target.
    Oemit,
}

/// Everything the evaluator needs from the world outside the object graph.
/// Methods take and return plain values only. Defaults describe a host with
/// no connections and no external services, which is what tests want.
///
/// The graph itself is mutated through the store; this trait carries the
/// capabilities the store cannot answer: connectivity, external services,
/// the attribute permission gate, and structure persistence.
pub trait Host {
    /// Connected players, filtered to those `viewer` may see. A negative
    /// viewer means no filtering.
    fn players_online(&self, _viewer: Dbref) -> Vec<Dbref> {
        Vec::new()
    }

    /// Seconds connected, or -1 when not connected.
    fn conn_secs(&self, _player: Dbref) -> i64 {
        -1
    }

    /// Seconds idle, or -1 when not connected.
    fn idle_secs(&self, _player: Dbref) -> i64 {
        -1
    }

    fn doing(&self, _player: Dbref) -> String {
        String::new()
    }

    fn is_connected(&self, _player: Dbref) -> bool {
        false
    }

    /// Current wall-clock seconds since the epoch. Tests pin this.
    fn now_secs(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    /// Attribute permission gate. Receives the raw value so embedded header
    /// flags can be inspected.
    fn can_read_attr(&self, db: &Db, viewer: Dbref, obj: Dbref, num: i32, raw: &str) -> bool {
        crate::attr::default_readable(db, viewer, obj, num, raw)
    }

    fn sql_query(&self, _query: &str, _row_sep: &str, _field_sep: &str) -> String {
        String::new()
    }

    fn sql_escape(&self, text: &str) -> String {
        text.replace('\\', "\\\\").replace('\'', "''")
    }

    fn spellcheck(&self, _word: &str) -> Vec<String> {
        Vec::new()
    }

    /// (unread, read, cleared) mail counts for a player.
    fn mail_counts(&self, _player: Dbref) -> (i64, i64, i64) {
        (0, 0, 0)
    }

    fn mail_from(&self, _player: Dbref, _index: i64) -> Dbref {
        NOTHING
    }

    fn mail_subject(&self, _player: Dbref, _index: i64) -> String {
        String::new()
    }

    fn channels(&self, _player: Dbref) -> Vec<String> {
        Vec::new()
    }

    fn channel_members(&self, _channel: &str) -> Vec<Dbref> {
        Vec::new()
    }

    /// Structure persistence hooks. The store calls these after mutations;
    /// a host that does not persist ignores them.
    fn save_structure_def(&self, _player: Dbref, _name: &str, _serialized: &str) {}

    fn delete_structure_def(&self, _player: Dbref, _name: &str) {}

    fn save_structure_instance(&self, _player: Dbref, _name: &str, _serialized: &str) {}

    fn delete_structure_instance(&self, _player: Dbref, _name: &str) {}
}

/// A host with nobody home. Useful for tests and offline evaluation.
pub struct NullHost;

impl Host for NullHost {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_host_defaults() {
        let host = NullHost;
        assert!(host.players_online(NOTHING).is_empty());
        assert_eq!(host.conn_secs(3), -1);
        assert!(!host.is_connected(3));
        assert_eq!(host.mail_counts(3), (0, 0, 0));
    }

    #[test]
    fn test_sql_escape_default() {
        let host = NullHost;
        assert_eq!(host.sql_escape("it's"), "it''s");
        assert_eq!(host.sql_escape("a\\b"), "a\\\\b");
    }
}
