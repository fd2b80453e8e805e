use std::collections::HashSet;
use tsdb_keys::{table_name, TableKind};

fn is_valid(name: &str, prefix: char) -> bool {
    let mut parts = name.splitn(3, '_');
    let Some(p) = parts.next() else { return false };
    if p != prefix.to_string() {
        return false;
    }
    let Some(body) = parts.next() else { return false };
    let Some(suffix) = parts.next() else { return false };
    if parts.next().is_some() {
        return false;
    }
    !body.is_empty()
        && body.chars().all(|c| matches!(c, 'a'..='z' | '2'..='7'))
        && !suffix.is_empty()
        && suffix.chars().all(|c| c.is_ascii_digit() || matches!(c, 'a'..='z'))
}

#[test]
fn table_names_match_the_declared_shape() {
    for id in ["todos", "user-profiles", "", "a/b/c", "emoji-✓"] {
        let rows = table_name(id, TableKind::Rows);
        let tombs = table_name(id, TableKind::Tombstones);
        assert!(is_valid(&rows, 'c'), "invalid rows table name: {rows}");
        assert!(is_valid(&tombs, 't'), "invalid tomb table name: {tombs}");
    }
}

#[test]
fn table_name_is_pure() {
    let a = table_name("todos", TableKind::Rows);
    let b = table_name("todos", TableKind::Rows);
    assert_eq!(a, b);
}

#[test]
fn distinct_collection_ids_produce_distinct_table_names() {
    let ids = [
        "todos", "notes", "users", "sessions", "events", "orders", "a", "b", "c", "d",
    ];
    let mut seen = HashSet::new();
    for id in ids {
        let name = table_name(id, TableKind::Rows);
        assert!(seen.insert(name), "collision for id {id}");
    }
}

#[test]
fn rows_and_tomb_names_never_collide_for_the_same_id() {
    let rows = table_name("todos", TableKind::Rows);
    let tombs = table_name("todos", TableKind::Tombstones);
    assert_ne!(rows, tombs);
}
