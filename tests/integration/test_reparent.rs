//! Reparenting through the store.

use fff_graph::rules::{FORM_HIERARCHY, HAS_FAILURE, PERFORMS_FUNCTION};
use fff_graph::{Edge, Graph, GraphStore, Layer, Node, ReparentError, RuleSet};

fn scenario_graph() -> Graph {
    Graph::new(
        vec![
            Node::bare("F1", Layer::Form),
            Node::bare("F2", Layer::Form),
            Node::bare("Fn", Layer::Function),
        ],
        vec![Edge::new("e1", "F1", "F2", FORM_HIERARCHY)],
    )
}

fn store(graph: Graph) -> GraphStore {
    GraphStore::from_graph(graph, RuleSet::reference()).unwrap()
}

#[test]
fn test_orphan_function_moves_under_form() {
    let mut s = store(scenario_graph());
    assert_eq!(s.hierarchy().orphans_of(&Layer::Function), ["Fn".to_string()]);

    let outcome = s.reparent("Fn", "F2", PERFORMS_FUNCTION).unwrap();
    assert!(outcome.removed.is_empty());
    assert_eq!(outcome.added.source, "F2");
    assert_eq!(outcome.added.target, "Fn");
    assert_eq!(outcome.added.relation, PERFORMS_FUNCTION);
    assert!(s.graph().edge(&outcome.added.id).is_some());

    let tree = s.hierarchy();
    assert!(tree.orphans_of(&Layer::Function).is_empty());
    assert_eq!(tree.children(PERFORMS_FUNCTION, "F2"), vec!["Fn"]);
    assert_eq!(tree.roots, vec!["F1"]);
}

#[test]
fn test_moved_node_has_exactly_one_parent() {
    let mut s = store(scenario_graph());
    s.add_node(Node::bare("F3", Layer::Form)).unwrap();
    s.reparent("F3", "F1", FORM_HIERARCHY).unwrap();
    s.reparent("F3", "F2", FORM_HIERARCHY).unwrap();

    assert_eq!(s.hierarchy().parents_of(FORM_HIERARCHY, "F3"), vec!["F2"]);
    assert!(!s.hierarchy().children(FORM_HIERARCHY, "F1").contains(&"F3"));
}

#[test]
fn test_incompatible_move_leaves_graph_unchanged() {
    let mut s = store(scenario_graph());
    let before = s.snapshot();
    let tree_before = s.hierarchy().clone();

    let err = s.reparent("Fn", "F2", HAS_FAILURE).unwrap_err();
    assert_eq!(
        err,
        ReparentError::IncompatibleRelation {
            relation: HAS_FAILURE.to_string(),
            expected_source: Layer::Form,
            expected_target: Layer::Failure,
            parent_layer: Layer::Form,
            child_layer: Layer::Function,
        }
    );
    assert_eq!(s.snapshot(), before);
    assert_eq!(s.hierarchy(), &tree_before);
}

#[test]
fn test_rejections_leave_graph_unchanged() {
    let mut s = store(scenario_graph());
    let before = s.snapshot();
    let revision = s.revision();

    assert!(matches!(
        s.reparent("Fn", "F2", "owns"),
        Err(ReparentError::UnknownRelation(_))
    ));
    assert!(matches!(
        s.reparent("ghost", "F2", PERFORMS_FUNCTION),
        Err(ReparentError::NodeNotFound(_))
    ));
    assert!(matches!(
        s.reparent("F2", "F2", FORM_HIERARCHY),
        Err(ReparentError::SelfParent(_))
    ));
    assert_eq!(s.snapshot(), before);
    assert_eq!(s.revision(), revision);
}

#[test]
fn test_move_clears_every_duplicate_parent_edge() {
    let mut graph = scenario_graph();
    graph.nodes.push(Node::bare("F3", Layer::Form));
    graph.edges.push(Edge::new("dup1", "F1", "F3", FORM_HIERARCHY));
    graph.edges.push(Edge::new("dup2", "F2", "F3", FORM_HIERARCHY));
    let mut s = store(graph);
    assert_eq!(s.hierarchy().duplicate_parents().len(), 1);

    let outcome = s.reparent("F3", "F1", FORM_HIERARCHY).unwrap();
    let removed: Vec<&str> = outcome.removed.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(removed, vec!["dup1", "dup2"]);
    assert!(s.hierarchy().duplicate_parents().is_empty());
    assert_eq!(s.hierarchy().parents_of(FORM_HIERARCHY, "F3"), vec!["F1"]);
}

#[test]
fn test_move_keeps_node_payload() {
    let mut graph = scenario_graph();
    graph.nodes[2] = Node::new("Fn", Layer::Function, "Stop vehicle").with_attribute("asil", "D");
    let mut s = store(graph);
    let before = s.node("Fn").cloned().unwrap();
    s.reparent("Fn", "F1", PERFORMS_FUNCTION).unwrap();
    assert_eq!(s.node("Fn"), Some(&before));
}

#[test]
fn test_custom_rule_table() {
    let rules = RuleSet::from_json(
        r#"{"root_relation": "contains", "rules": [
            {"source_layer": "system", "target_layer": "system", "relation": "contains"},
            {"source_layer": "system", "target_layer": "hazard", "relation": "exposes"}
        ]}"#,
    )
    .unwrap();
    let graph = Graph::new(
        vec![
            Node::bare("S1", Layer::from("system")),
            Node::bare("S2", Layer::from("system")),
            Node::bare("H1", Layer::from("hazard")),
        ],
        vec![],
    );
    let mut s = GraphStore::from_graph(graph, rules).unwrap();
    s.reparent("H1", "S2", "exposes").unwrap();
    s.reparent("S2", "S1", "contains").unwrap();
    assert_eq!(s.hierarchy().roots, vec!["S1"]);
    assert_eq!(s.hierarchy().children("exposes", "S2"), vec!["H1"]);
    assert!(matches!(
        s.reparent("H1", "S1", PERFORMS_FUNCTION),
        Err(ReparentError::UnknownRelation(_))
    ));
}
