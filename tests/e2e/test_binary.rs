//! Integration tests for the fff-graph binary.
//!
//! These run the compiled binary against small model files in a temp dir.

use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};

const MODEL: &str = r#"{
  "nodes": [
    {"id": "F1", "layer": "form", "label": "Vehicle"},
    {"id": "F2", "layer": "form", "label": "Brakes"},
    {"id": "Fn1", "layer": "function", "label": "Stop"},
    {"id": "X1", "layer": "failure", "label": "Pad wear",
     "attributes": {"severity": 9, "occurrence": 5, "detection": 5}}
  ],
  "edges": [
    {"id": "e1", "source": "F1", "target": "F2", "relation": "form_hierarchy"},
    {"id": "e2", "source": "F2", "target": "X1", "relation": "has_failure"}
  ]
}"#;

fn run(args: &[&str], store: &Path, stdin: Option<&str>) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_fff-graph"))
        .args(args)
        .arg("--store")
        .arg(store)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to run binary");
    {
        use std::io::Write;
        let mut pipe = child.stdin.take().expect("stdin");
        if let Some(input) = stdin {
            pipe.write_all(input.as_bytes()).expect("write stdin");
        }
    }
    child.wait_with_output().expect("Failed to wait on binary")
}

fn stdout(out: &Output) -> String {
    String::from_utf8(out.stdout.clone()).expect("Non-UTF8 output")
}

fn model_file(dir: &Path) -> String {
    let path = dir.join("model.json");
    fs::write(&path, MODEL).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_tree_prints_outline() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(&["tree"], dir.path(), Some(MODEL));
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let text = stdout(&out);
    assert!(text.starts_with("Vehicle [F1]\n  Brakes [F2] (form_hierarchy)\n"), "{text}");
    assert!(text.contains("    Pad wear [X1] (has_failure)\n"), "{text}");
    assert!(text.contains("Stop [Fn1]\n"), "{text}");
}

#[test]
fn test_tree_json() {
    let dir = tempfile::tempdir().unwrap();
    let file = model_file(dir.path());
    let out = run(&["tree", &file, "--json"], dir.path(), None);
    assert!(out.status.success());
    let tree: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(tree["roots"], serde_json::json!(["F1"]));
    assert_eq!(tree["orphans"]["function"], serde_json::json!(["Fn1"]));
}

#[test]
fn test_validate_reports_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let file = model_file(dir.path());
    let out = run(&["validate", &file], dir.path(), None);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("[warn] Function Allocation"), "{text}");
    assert!(text.contains("    - Stop"), "{text}");
}

#[test]
fn test_validate_empty_diagram_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(&["validate", "--json"], dir.path(), Some(r#"{"nodes": [], "edges": []}"#));
    assert_eq!(out.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(report["valid"], serde_json::json!(false));
}

#[test]
fn test_run_fmea_writes_annotated_graph() {
    let dir = tempfile::tempdir().unwrap();
    let file = model_file(dir.path());
    let output = dir.path().join("out.json");
    let out = run(
        &["run", "fmea_risk_analysis", &file, "-p", "rpn_threshold=200", "-o", output.to_str().unwrap()],
        dir.path(),
        None,
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(stdout(&out).contains("fmea_risk_analysis completed"));

    let graph: serde_json::Value = serde_json::from_str(&fs::read_to_string(output).unwrap()).unwrap();
    let x1 = graph["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["id"] == "X1")
        .unwrap();
    assert_eq!(x1["attributes"]["rpn"], serde_json::json!(225));
    assert_eq!(x1["attributes"]["risk_level"], serde_json::json!("critical"));
}

#[test]
fn test_run_unknown_algorithm_fails() {
    let dir = tempfile::tempdir().unwrap();
    let file = model_file(dir.path());
    let out = run(&["run", "centrality", &file], dir.path(), None);
    assert_eq!(out.status.code(), Some(1));
    assert!(stdout(&out).contains("Algorithm 'centrality' not found in domain 'automotive'"));
}

#[test]
fn test_move_rejects_incompatible_relation() {
    let dir = tempfile::tempdir().unwrap();
    let file = model_file(dir.path());
    let out = run(&["move", "Fn1", "F2", "has_failure", &file], dir.path(), None);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("has_failure"));
}

#[test]
fn test_move_outputs_updated_graph() {
    let dir = tempfile::tempdir().unwrap();
    let file = model_file(dir.path());
    let out = run(&["move", "Fn1", "F2", "performs_function", &file], dir.path(), None);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let graph: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    let edges = graph["edges"].as_array().unwrap();
    assert_eq!(edges.len(), 3);
    assert!(edges.iter().any(|e| e["source"] == "F2" && e["target"] == "Fn1"));
}

#[test]
fn test_save_list_load_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store");
    let file = model_file(dir.path());

    let saved = run(&["save", &file, "--name", "brakes"], &store, None);
    assert!(saved.status.success(), "{}", String::from_utf8_lossy(&saved.stderr));
    let id = stdout(&saved).trim().to_string();

    let listed = stdout(&run(&["list"], &store, None));
    assert!(listed.starts_with(&format!("{id}\tbrakes\tautomotive\t4 nodes\t2 edges\t")), "{listed}");

    let loaded = run(&["load", &id], &store, None);
    assert!(loaded.status.success());
    let graph: serde_json::Value = serde_json::from_str(&stdout(&loaded)).unwrap();
    assert_eq!(graph["nodes"].as_array().unwrap().len(), 4);

    let resaved = run(&["save", &file, "--name", "brakes v2", "--id", &id], &store, None);
    assert_eq!(stdout(&resaved).trim(), id);

    assert!(run(&["delete", &id], &store, None).status.success());
    assert!(!run(&["load", &id], &store, None).status.success());
}

#[test]
fn test_algorithms_lists_builtins() {
    let dir = tempfile::tempdir().unwrap();
    let text = stdout(&run(&["algorithms"], dir.path(), None));
    assert!(text.contains("fmea_risk_analysis\t"));
    assert!(text.contains("failure_propagation\t"));
    assert!(text.contains("critical_components\t"));
}
