use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{SchemaError, WalkError};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduValue};
use crate::schema::{
    build_tree, schema_tree, FieldBinding, FieldSpec, MibRecord, NodeAccess, ScalarSetter,
    TableKey, TableKeyKind,
};
use crate::transport::MockTransport;
use crate::tree::{NodeKind, OidTree};
use crate::walker::{dispatch, SchemaWalker};

fn oid(s: &str) -> Oid {
    s.parse().unwrap()
}

/// Walks `path` arc by arc through `find_next`; `Some` only when the path is
/// fully consumed and ends exactly on a node.
fn walk_exact<'t>(tree: &'t OidTree, path: &Oid) -> Option<&'t OidTree> {
    let mut node = tree;
    let mut remainder: &[u32] = path.arcs();
    loop {
        let (next, rest) = node.find_next(remainder);
        match next {
            None => return None,
            Some(n) if std::ptr::eq(n, node) => return rest.is_empty().then_some(n),
            Some(n) => {
                node = n;
                remainder = rest;
            }
        }
    }
}

fn leaf_binding(name: &str) -> FieldBinding {
    FieldBinding {
        qualified_name: name.to_string(),
        access: NodeAccess::Assign(ScalarSetter::Int(Box::new(|_: &mut dyn Any, _: i64| true))),
    }
}

fn no_rows<'a>(_: &'a mut dyn Any, _: &TableKey) -> Option<&'a mut dyn Any> {
    None
}

fn table_binding(name: &str) -> FieldBinding {
    FieldBinding {
        qualified_name: name.to_string(),
        access: NodeAccess::Rows {
            entry: Box::new(no_rows),
            key: TableKeyKind::UInt,
            key_arity: 1,
        },
    }
}

// A small schema shaped like the interface MIBs: two tables sharing the
// 1.3.6.1.2.1 prefix, so building it exercises the split path.

#[derive(Debug, Default)]
struct IfaceRow {
    descr: String,
    mtu: i32,
    mac: Vec<u8>,
    up: bool,
    octets: u64,
}

impl MibRecord for IfaceRow {
    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::string("descr", "2", |r: &mut Self| &mut r.descr),
            FieldSpec::int32("mtu", "4", |r: &mut Self| &mut r.mtu),
            FieldSpec::bytes("mac", "6", |r: &mut Self| &mut r.mac),
            FieldSpec::boolean("up", "7", |r: &mut Self| &mut r.up),
            FieldSpec::uint64("octets", "10", |r: &mut Self| &mut r.octets),
        ]
    }
}

#[derive(Debug, Default)]
struct NameRow {
    name: String,
    high_speed: u64,
}

impl MibRecord for NameRow {
    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::string("name", "1", |r: &mut Self| &mut r.name),
            FieldSpec::uint64("high_speed", "15", |r: &mut Self| &mut r.high_speed),
        ]
    }
}

#[derive(Debug, Default)]
struct Device {
    ifaces: BTreeMap<u32, IfaceRow>,
    names: BTreeMap<u32, NameRow>,
}

impl MibRecord for Device {
    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::table("ifaces", ".1.3.6.1.2.1.2.2.1", |d: &mut Self| &mut d.ifaces),
            FieldSpec::table("names", ".1.3.6.1.2.1.31.1.1.1", |d: &mut Self| &mut d.names),
        ]
    }
}

// ---------------------------------------------------------------------------
// Tree construction

#[test]
fn split_keeps_both_subtrees_reachable() {
    let mut tree = OidTree::new();
    tree.insert(oid("1.3.6.1.2.1.2.2.1").arcs(), leaf_binding("a"), NodeKind::Leaf);
    tree.insert(
        oid("1.3.6.1.2.1.31.1.1.1").arcs(),
        leaf_binding("b"),
        NodeKind::Leaf,
    );

    let a = walk_exact(&tree, &oid("1.3.6.1.2.1.2.2.1")).unwrap();
    assert_eq!(a.kind(), NodeKind::Leaf);
    assert_eq!(a.field_name(), Some("a"));

    let b = walk_exact(&tree, &oid("1.3.6.1.2.1.31.1.1.1")).unwrap();
    assert_eq!(b.kind(), NodeKind::Leaf);
    assert_eq!(b.field_name(), Some("b"));

    // The split point is demoted to an unbound simple node.
    assert_eq!(tree.kind(), NodeKind::Simple);
    assert_eq!(tree.field_name(), None);
    assert_eq!(tree.prefix(), &oid("1.3.6.1.2.1"));
}

#[test]
fn split_emits_one_walk_root_per_table() {
    let mut tree = OidTree::new();
    tree.insert(
        oid("1.3.6.1.2.1.2.2.1").arcs(),
        table_binding("a"),
        NodeKind::SuffixCatcher,
    );
    tree.insert(
        oid("1.3.6.1.2.1.31.1.1.1").arcs(),
        table_binding("b"),
        NodeKind::SuffixCatcher,
    );

    let paths = tree.prefix_paths();
    assert_eq!(
        paths,
        vec![oid("1.3.6.1.2.1.2.2.1"), oid("1.3.6.1.2.1.31.1.1.1")]
    );
}

#[test]
fn lone_leaves_are_not_walk_roots() {
    // A scalar is a single value, not a subtree.
    let mut tree = OidTree::new();
    tree.insert(oid("1.3.6.1.2.1.1.3").arcs(), leaf_binding("x"), NodeKind::Leaf);
    assert!(tree.prefix_paths().is_empty());
}

#[test]
#[should_panic(expected = "leaf")]
fn insert_under_leaf_panics() {
    let mut tree = OidTree::new();
    tree.insert(oid("1.3.6").arcs(), leaf_binding("x"), NodeKind::Leaf);
    tree.insert(oid("1.3.6.1").arcs(), leaf_binding("y"), NodeKind::Leaf);
}

#[test]
fn insert_order_does_not_matter() {
    let entries = [
        ("1.3.6.1.2.1.2.2.1", "ifaces"),
        ("1.3.6.1.2.1.31.1.1.1", "names"),
        ("1.3.6.1.4.1.2636.3.60.1.1.1.1", "dom"),
        ("1.3.6.1.2.1.99.1.1.1", "sensors"),
    ];

    let mut forward = OidTree::new();
    for (path, name) in entries {
        forward.insert(oid(path).arcs(), table_binding(name), NodeKind::SuffixCatcher);
    }
    let mut reverse = OidTree::new();
    for &(path, name) in entries.iter().rev() {
        reverse.insert(oid(path).arcs(), table_binding(name), NodeKind::SuffixCatcher);
    }

    for (path, name) in entries {
        for tree in [&forward, &reverse] {
            let node = walk_exact(tree, &oid(path)).unwrap();
            assert_eq!(node.kind(), NodeKind::SuffixCatcher);
            assert_eq!(node.field_name(), Some(name));
        }
    }
    assert_eq!(forward.prefix_paths(), reverse.prefix_paths());
}

// ---------------------------------------------------------------------------
// Schema introspection

#[test]
fn schema_roots_cover_every_entry_and_stop_at_tables() {
    let tree = schema_tree::<Device>().unwrap();
    let roots = tree.prefix_paths();
    assert_eq!(
        roots,
        vec![oid("1.3.6.1.2.1.2.2.1"), oid("1.3.6.1.2.1.31.1.1.1")]
    );

    // Every column path is covered by exactly one root; no root reaches
    // inside a table subtree.
    for column in ["1.3.6.1.2.1.2.2.1.2", "1.3.6.1.2.1.2.2.1.10", "1.3.6.1.2.1.31.1.1.1.15"] {
        let column = oid(column);
        let covering = roots.iter().filter(|r| r.is_prefix_of(&column)).count();
        assert_eq!(covering, 1, "{column} should be covered once");
    }

    let descr = walk_exact(&tree, &oid("1.3.6.1.2.1.2.2.1.2")).unwrap();
    assert_eq!(descr.kind(), NodeKind::Leaf);
    assert_eq!(descr.field_name(), Some("IfaceRow.descr"));

    let table = walk_exact(&tree, &oid("1.3.6.1.2.1.2.2.1")).unwrap();
    assert_eq!(table.kind(), NodeKind::SuffixCatcher);
    assert_eq!(table.field_name(), Some("Device.ifaces"));
}

#[test]
fn schema_tree_is_cached_per_type() {
    let a = schema_tree::<Device>().unwrap();
    let b = schema_tree::<Device>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[derive(Debug, Default)]
struct Looper {
    children: BTreeMap<u32, Looper>,
}

impl MibRecord for Looper {
    fn fields() -> Vec<FieldSpec> {
        vec![FieldSpec::table("children", "1", |l: &mut Self| &mut l.children)]
    }
}

#[test]
fn recursive_schema_is_rejected() {
    let err = build_tree::<Looper>().unwrap_err();
    assert!(matches!(err, SchemaError::RecursiveSchema { .. }));
}

#[derive(Debug, Default)]
struct AbsoluteRow {
    v: i64,
}

impl MibRecord for AbsoluteRow {
    fn fields() -> Vec<FieldSpec> {
        vec![FieldSpec::int64("v", ".1.2", |r: &mut Self| &mut r.v)]
    }
}

#[derive(Debug, Default)]
struct AbsoluteTop {
    rows: BTreeMap<u32, AbsoluteRow>,
}

impl MibRecord for AbsoluteTop {
    fn fields() -> Vec<FieldSpec> {
        vec![FieldSpec::table("rows", ".1.9", |t: &mut Self| &mut t.rows)]
    }
}

#[test]
fn absolute_annotation_in_nested_record_is_rejected() {
    let err = build_tree::<AbsoluteTop>().unwrap_err();
    assert!(matches!(err, SchemaError::AbsoluteInNested { .. }));
}

#[derive(Debug, Default)]
struct BadAnnotationTop {
    v: i64,
}

impl MibRecord for BadAnnotationTop {
    fn fields() -> Vec<FieldSpec> {
        vec![FieldSpec::int64("v", ".1.bad.3", |t: &mut Self| &mut t.v)]
    }
}

#[test]
fn unparseable_annotation_is_rejected() {
    let err = build_tree::<BadAnnotationTop>().unwrap_err();
    assert!(matches!(err, SchemaError::BadAnnotation { .. }));
}

#[derive(Debug, Default)]
struct PartiallyAnnotatedRow {
    unannotated: i64,
    kept: i64,
}

impl MibRecord for PartiallyAnnotatedRow {
    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::int64("unannotated", "", |r: &mut Self| &mut r.unannotated),
            FieldSpec::int64("kept", "5", |r: &mut Self| &mut r.kept),
        ]
    }
}

#[derive(Debug, Default)]
struct PartiallyAnnotatedTop {
    rows: BTreeMap<u32, PartiallyAnnotatedRow>,
}

impl MibRecord for PartiallyAnnotatedTop {
    fn fields() -> Vec<FieldSpec> {
        vec![FieldSpec::table("rows", ".1.9", |t: &mut Self| &mut t.rows)]
    }
}

#[test]
fn unannotated_field_is_skipped_not_fatal() {
    // Only the unannotated field is dropped; fields declared after it still
    // make it into the tree.
    let tree = build_tree::<PartiallyAnnotatedTop>().unwrap();
    let kept = walk_exact(&tree, &oid("1.9.5")).unwrap();
    assert_eq!(kept.field_name(), Some("PartiallyAnnotatedRow.kept"));

    let mut top = PartiallyAnnotatedTop::default();
    dispatch(&tree, &mut top, &Pdu::new(".1.9.5.3", PduValue::Integer(11)));
    assert_eq!(top.rows[&3].kept, 11);
    assert_eq!(top.rows[&3].unannotated, 0);
}

// ---------------------------------------------------------------------------
// Dispatch

#[tokio::test]
async fn table_rows_are_created_on_the_fly() {
    #[derive(Debug, Default)]
    struct Row {
        a: i64,
        b: i64,
    }
    impl MibRecord for Row {
        fn fields() -> Vec<FieldSpec> {
            vec![
                FieldSpec::int64("a", "2", |r: &mut Self| &mut r.a),
                FieldSpec::int64("b", "3", |r: &mut Self| &mut r.b),
            ]
        }
    }
    #[derive(Debug, Default)]
    struct Top {
        m: BTreeMap<u32, Row>,
    }
    impl MibRecord for Top {
        fn fields() -> Vec<FieldSpec> {
            vec![FieldSpec::table("m", ".1.2", |t: &mut Self| &mut t.m)]
        }
    }

    let walker = SchemaWalker::new(Top::default()).unwrap();
    let mut transport = MockTransport::new(vec![
        Pdu::new(".1.2.2.7", PduValue::Integer(42)),
        Pdu::new(".1.2.3.7", PduValue::Integer(99)),
    ]);
    walker.query(&mut transport).await.unwrap();

    assert_eq!(transport.walked_roots(), vec![oid("1.2")]);
    let top = walker.into_record();
    assert_eq!(top.m[&7].a, 42);
    assert_eq!(top.m[&7].b, 99);
}

#[test]
fn nested_group_fields_are_reachable() {
    #[derive(Debug, Default)]
    struct System {
        uptime: u64,
    }
    impl MibRecord for System {
        fn fields() -> Vec<FieldSpec> {
            vec![FieldSpec::uint64("uptime", "3", |s: &mut Self| &mut s.uptime)]
        }
    }
    #[derive(Debug, Default)]
    struct GroupTop {
        system: System,
    }
    impl MibRecord for GroupTop {
        fn fields() -> Vec<FieldSpec> {
            vec![FieldSpec::group("system", ".1.9", |t: &mut Self| &mut t.system)]
        }
    }

    let tree = build_tree::<GroupTop>().unwrap();
    let mut top = GroupTop::default();
    dispatch(&tree, &mut top, &Pdu::new(".1.9.3", PduValue::TimeTicks(1234)));
    assert_eq!(top.system.uptime, 1234);
}

#[test]
fn boolean_coercion_maps_truth_values() {
    let tree = schema_tree::<Device>().unwrap();
    let mut dev = Device::default();

    dispatch(&tree, &mut dev, &Pdu::new("1.3.6.1.2.1.2.2.1.7.3", PduValue::Integer(1)));
    assert!(dev.ifaces[&3].up);

    dispatch(&tree, &mut dev, &Pdu::new("1.3.6.1.2.1.2.2.1.7.3", PduValue::Integer(2)));
    assert!(!dev.ifaces[&3].up);
}

#[test]
#[should_panic(expected = "TruthValue")]
fn boolean_coercion_hard_fails_out_of_range() {
    let tree = schema_tree::<Device>().unwrap();
    let mut dev = Device::default();
    dispatch(&tree, &mut dev, &Pdu::new("1.3.6.1.2.1.2.2.1.7.3", PduValue::Integer(3)));
}

#[test]
fn byte_fields_get_a_defensive_copy() {
    let tree = schema_tree::<Device>().unwrap();
    let mut dev = Device::default();

    let mut pdu = Pdu::new(
        "1.3.6.1.2.1.2.2.1.6.3",
        PduValue::OctetString(vec![0xaa, 0xbb, 0xcc]),
    );
    dispatch(&tree, &mut dev, &pdu);

    if let PduValue::OctetString(buf) = &mut pdu.value {
        buf[0] = 0x00;
    }
    assert_eq!(dev.ifaces[&3].mac, vec![0xaa, 0xbb, 0xcc]);
}

#[test]
fn tag_type_mismatch_is_skipped() {
    let tree = schema_tree::<Device>().unwrap();
    let mut dev = Device::default();

    // descr is a String; an Integer PDU must leave it untouched and must not
    // abort anything.
    dispatch(&tree, &mut dev, &Pdu::new("1.3.6.1.2.1.2.2.1.2.4", PduValue::Integer(9)));
    assert_eq!(dev.ifaces[&4].descr, "");

    dispatch(
        &tree,
        &mut dev,
        &Pdu::new("1.3.6.1.2.1.2.2.1.2.4", PduValue::OctetString(b"et-0/0/1".to_vec())),
    );
    assert_eq!(dev.ifaces[&4].descr, "et-0/0/1");
}

#[test]
fn unknown_column_under_walked_subtree_is_tolerated() {
    let tree = schema_tree::<Device>().unwrap();
    let mut dev = Device::default();

    dispatch(&tree, &mut dev, &Pdu::new("1.3.6.1.2.1.2.2.1.99.7", PduValue::Integer(5)));
    // The row is still materialized (its key was peeled before the unknown
    // column was noticed); the fields stay default.
    assert_eq!(dev.ifaces[&7].descr, "");
    assert_eq!(dev.ifaces[&7].octets, 0);
}

#[test]
fn unparseable_pdu_name_is_skipped() {
    let tree = schema_tree::<Device>().unwrap();
    let mut dev = Device::default();
    dispatch(&tree, &mut dev, &Pdu::new("not-an-oid", PduValue::Integer(5)));
    assert!(dev.ifaces.is_empty());
}

#[test]
fn multi_arc_keys_join_into_text_rows() {
    #[derive(Debug, Default)]
    struct AddrRow {
        state: i64,
    }
    impl MibRecord for AddrRow {
        fn fields() -> Vec<FieldSpec> {
            vec![FieldSpec::int64("state", "2", |r: &mut Self| &mut r.state)]
        }
    }
    #[derive(Debug, Default)]
    struct AddrTop {
        addrs: BTreeMap<String, AddrRow>,
    }
    impl MibRecord for AddrTop {
        fn fields() -> Vec<FieldSpec> {
            vec![FieldSpec::text_table("addrs", ".1.4", 4, |t: &mut Self| &mut t.addrs)]
        }
    }

    let tree = build_tree::<AddrTop>().unwrap();
    let mut top = AddrTop::default();
    dispatch(&tree, &mut top, &Pdu::new(".1.4.2.10.0.0.1", PduValue::Integer(1)));
    assert_eq!(top.addrs["10.0.0.1"].state, 1);
}

// ---------------------------------------------------------------------------
// Walker

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn query_is_one_shot_even_under_a_race() {
    let walker = Arc::new(SchemaWalker::new(Device::default()).unwrap());
    let transport = MockTransport::new(Vec::new());

    let mut t1 = transport.clone();
    let mut t2 = transport.clone();
    let w1 = Arc::clone(&walker);
    let w2 = Arc::clone(&walker);
    let h1 = tokio::spawn(async move { w1.query(&mut t1).await });
    let h2 = tokio::spawn(async move { w2.query(&mut t2).await });

    let results = [h1.await.unwrap(), h2.await.unwrap()];
    let ok = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(WalkError::AlreadyFilled)))
        .count();
    assert_eq!(ok, 1);
    assert_eq!(refused, 1);

    // The refused caller never touched its transport.
    assert_eq!(transport.connect_count(), 1);
    assert_eq!(transport.close_count(), 1);
}

#[tokio::test]
async fn walk_error_aborts_remaining_walks_but_closes_transport() {
    let walker = SchemaWalker::new(Device::default()).unwrap();
    let mut transport = MockTransport::new(Vec::new()).fail_walk_at(0);

    let err = walker.query(&mut transport).await.unwrap_err();
    assert!(matches!(err, WalkError::Transport(_)));

    // Device has two walk roots; the failure on the first skips the second.
    assert_eq!(transport.walked_roots().len(), 1);
    assert_eq!(transport.close_count(), 1);
}

#[tokio::test]
async fn describe_lists_walk_roots_and_tree() {
    let walker = SchemaWalker::new(Device::default()).unwrap();
    let dump = walker.describe();
    assert!(dump.contains("BulkWalk queries:"));
    assert!(dump.contains("- 1.3.6.1.2.1.2.2.1"));
    assert!(dump.contains("- 1.3.6.1.2.1.31.1.1.1"));
    assert!(dump.contains("<suffix-catching>"));
    assert!(dump.contains("IfaceRow.descr"));
}
