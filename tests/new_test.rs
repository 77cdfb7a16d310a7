#[path = "common/mod.rs"]
mod common;
use common::TkTest;

#[test]
fn new_creates_ticket_file_with_default_fields() {
    let tk = TkTest::new();
    let id = tk.create("Fix the thing");

    assert!(tk.ticket_exists(&id));
    let content = tk.read_ticket(&id);
    assert!(content.contains("schema_version: 1"));
    assert!(content.contains("status: open"));
    assert!(content.contains("type: task"));
    assert!(content.contains("priority: 2"));
    assert!(content.contains("# Fix the thing"));
}

#[test]
fn new_accepts_type_and_priority_overrides() {
    let tk = TkTest::new();
    let output = tk.run_success(&["new", "Critical bug", "--type", "bug", "--priority", "1"]);
    let id = output
        .trim()
        .strip_prefix("Created ")
        .unwrap()
        .split(" - ")
        .next()
        .unwrap();

    let content = tk.read_ticket(id);
    assert!(content.contains("type: bug"));
    assert!(content.contains("priority: 1"));
}

#[test]
fn new_rejects_out_of_range_priority() {
    let tk = TkTest::new();
    let stderr = tk.run_failure(&["new", "Bad priority", "--priority", "9"]);
    assert!(stderr.contains("priority") || !stderr.is_empty());
}

#[test]
fn new_with_parent_requires_existing_open_parent() {
    let tk = TkTest::new();
    let parent_id = tk.create("Parent epic");

    let output = tk.run_success(&["new", "Child task", "--parent", &parent_id]);
    assert!(output.contains("Child task"));

    let stderr = tk.run_failure(&["new", "Orphan", "--parent", "nonexistent"]);
    assert!(stderr.contains("not found") || stderr.contains("ParentNotFound"));
}

#[test]
fn new_rejects_parent_that_is_closed() {
    let tk = TkTest::new();
    let parent_id = tk.create("Parent");
    tk.run_success(&["start", &parent_id]);
    tk.run_success(&["close", &parent_id]);

    let stderr = tk.run_failure(&["new", "Child", "--parent", &parent_id]);
    assert!(stderr.contains("closed"));
}

#[test]
fn new_emits_json_summary_when_requested() {
    let tk = TkTest::new();
    let output = tk.run_success(&["new", "JSON ticket", "--json"]);
    assert!(output.trim().starts_with('{'));
    assert!(output.contains("\"title\":\"JSON ticket\""));
}

#[test]
fn successive_new_calls_generate_distinct_ids() {
    let tk = TkTest::new();
    let id1 = tk.create("One");
    let id2 = tk.create("Two");
    assert_ne!(id1, id2);
}
