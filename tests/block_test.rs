#[path = "common/mod.rs"]
mod common;
use common::TkTest;

#[test]
fn block_adds_blocked_by_entry() {
    let tk = TkTest::new();
    let a = tk.create("A");
    let b = tk.create("B");

    tk.run_success(&["block", &a, "--by", &b]);
    let content = tk.read_ticket(&a);
    assert!(content.contains(&b));
}

#[test]
fn block_remove_clears_blocked_by_entry() {
    let tk = TkTest::new();
    let a = tk.create("A");
    let b = tk.create("B");

    tk.run_success(&["block", &a, "--by", &b]);
    tk.run_success(&["block", &a, "--by", &b, "--remove"]);
    let content = tk.read_ticket(&a);
    assert!(content.contains("blocked-by: []"));
}

#[test]
fn block_rejects_self_block() {
    let tk = TkTest::new();
    let a = tk.create("A");

    let stderr = tk.run_failure(&["block", &a, "--by", &a]);
    assert!(stderr.contains("cannot block itself"));
}

#[test]
fn block_requires_blocker_flag() {
    let tk = TkTest::new();
    let a = tk.create("A");

    let stderr = tk.run_failure(&["block", &a]);
    assert!(stderr.contains("blocker id is required"));
}

#[test]
fn block_rejects_duplicate_relationship() {
    let tk = TkTest::new();
    let a = tk.create("A");
    let b = tk.create("B");

    tk.run_success(&["block", &a, "--by", &b]);
    let stderr = tk.run_failure(&["block", &a, "--by", &b]);
    assert!(stderr.contains("already blocked"));
}

#[test]
fn block_remove_without_existing_relationship_fails() {
    let tk = TkTest::new();
    let a = tk.create("A");
    let b = tk.create("B");

    let stderr = tk.run_failure(&["block", &a, "--by", &b, "--remove"]);
    assert!(stderr.contains("not blocked by"));
}

#[test]
fn block_requires_blocker_to_exist() {
    let tk = TkTest::new();
    let a = tk.create("A");

    let stderr = tk.run_failure(&["block", &a, "--by", "nonexistent"]);
    assert!(stderr.contains("not found"));
}
