//! End-to-end expression evaluation against a snapshot loaded from disk,
//! the way the SMTP delivery path drives it.

use std::collections::BTreeSet;
use std::path::PathBuf;

use pretty_assertions::assert_eq;

use mailset::{parse, Snapshot};

fn snapshot() -> Snapshot {
    let fixtures = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    Snapshot::load(
        &fixtures.join("lists"),
        &fixtures.join("symbols.txt"),
        "test.local",
    )
    .unwrap()
}

fn addrs(members: &[&str]) -> BTreeSet<String> {
    members
        .iter()
        .map(|member| format!("{member}@test.local"))
        .collect()
}

#[test]
fn vanilla_list_address() {
    let (tag, set) = parse(&snapshot(), "simple").unwrap();
    assert_eq!(tag, "Simple");
    assert_eq!(set, addrs(&["a", "b"]));
}

#[test]
fn vanilla_person_address() {
    let (tag, set) = parse(&snapshot(), "ww").unwrap();
    assert_eq!(tag, "Ww");
    assert_eq!(set, addrs(&["c"]));
}

#[test]
fn vanilla_empty_list_is_deliverable() {
    let (tag, set) = parse(&snapshot(), "empty").unwrap();
    assert_eq!(tag, "Empty");
    assert_eq!(set, BTreeSet::new());
}

#[test]
fn intersection_of_lists() {
    let (tag, set) = parse(&snapshot(), "simple_&_complex").unwrap();
    assert_eq!(tag, "S&T");
    assert_eq!(set, addrs(&["a", "b"]));
}

#[test]
fn difference_against_person() {
    let (tag, set) = parse(&snapshot(), "complex_-_ww").unwrap();
    assert_eq!(tag, "T-wxy");
    assert_eq!(set, addrs(&["a", "b"]));
}

#[test]
fn union_with_braces_keeps_structure() {
    let (tag, set) = parse(&snapshot(), "empty_|_{complex_-_simple}").unwrap();
    assert_eq!(tag, "x|(T-S)");
    assert_eq!(set, addrs(&["c"]));
}

#[test]
fn tagged_symbol_uses_member_initials() {
    let (tag, set) = parse(&snapshot(), "{yy.zz}").unwrap();
    assert_eq!(tag, "yz");
    assert_eq!(set, addrs(&["b"]));
}

#[test]
fn empty_result_bounces() {
    assert_eq!(
        parse(&snapshot(), "simple_-_complex").unwrap_err().to_string(),
        "No recipients match this set expression",
    );
}

#[test]
fn unknown_leaf_bounces_with_name() {
    assert_eq!(
        parse(&snapshot(), "simple_&_nobody").unwrap_err().to_string(),
        "No such list or person: nobody",
    );
}

#[test]
fn ambiguous_person_bounces() {
    assert_eq!(
        parse(&snapshot(), "complex_&_yy").unwrap_err().to_string(),
        "Ambiguous person: yy",
    );
}

#[test]
fn mixed_operators_bounce() {
    assert_eq!(
        parse(&snapshot(), "simple_&_complex_|_nested")
            .unwrap_err()
            .to_string(),
        "Parentheses required when mixing different operators",
    );
}
