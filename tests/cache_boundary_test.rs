//! Black-box coverage of the cache's directory-vs-cache boundary scenarios,
//! driven through the `tk` binary rather than the library API: cold build,
//! mutation-then-list, corrupt-cache recovery, and external add/delete.

#[path = "common/mod.rs"]
mod common;
use common::TkTest;

use std::fs;
use std::time::{Duration, SystemTime};

#[test]
fn cold_build_produces_cache_file_and_lists_every_ticket() {
    let tk = TkTest::new();
    const COUNT: usize = 40;
    for i in 0..COUNT {
        tk.write_ticket_file(&format!("a{i:06}"), &format!("Ticket {i}"));
    }

    // No `tk` invocation has touched this directory yet, so the first `ls`
    // must take the cold-build path (no `.cache` to reconcile against).
    assert!(!tk.cache_path().exists());
    let output = tk.run_success(&["ls", "--limit", "0"]);
    assert_eq!(output.lines().count(), COUNT);
    assert!(tk.cache_path().exists());
}

#[test]
fn mutation_then_list_reflects_the_new_status() {
    let tk = TkTest::new();
    let id = tk.create("Ticket");
    tk.run_success(&["start", &id]);
    tk.run_success(&["close", &id]);

    let open = tk.run_success(&["ls", "--status", "open"]);
    assert!(open.trim().is_empty());

    let closed = tk.run_success(&["ls", "--status", "closed"]);
    assert!(closed.contains(&id));
}

#[test]
fn corrupt_cache_is_silently_rebuilt_on_next_list() {
    let tk = TkTest::new();
    tk.create("Ticket one");
    tk.create("Ticket two");
    tk.run_success(&["ls"]);

    fs::write(tk.cache_path(), b"corrupt").unwrap();

    let output = tk.run_success(&["ls"]);
    assert_eq!(output.lines().count(), 2);
    assert!(tk.cache_path().exists());
}

#[test]
fn externally_added_ticket_is_picked_up_without_reparsing_existing() {
    let tk = TkTest::new();
    tk.create("Existing ticket");
    tk.run_success(&["ls"]); // warm the cache

    // Backdate the cache so the directory's mtime (bumped by the write
    // below) is seen as newer on the next `ls`.
    let old = SystemTime::now() - Duration::from_secs(120);
    let cache_file = std::fs::OpenOptions::new()
        .write(true)
        .open(tk.cache_path())
        .unwrap();
    cache_file.set_modified(old).unwrap();

    let tickets_dir = tk.temp_dir.path().join("tickets");
    fs::write(
        tickets_dir.join("z999999.md"),
        "---\nschema_version: 1\nid: z999999\nstatus: open\nblocked-by: []\ncreated: 2026-01-01T00:00:00Z\ntype: task\npriority: 2\n---\n# External ticket\n",
    )
    .unwrap();

    let output = tk.run_success(&["ls"]);
    assert!(output.contains("Existing ticket"));
    assert!(output.contains("External ticket"));
}

#[test]
fn externally_deleted_ticket_disappears_on_next_list() {
    let tk = TkTest::new();
    let keep_id = tk.create("Keep me");
    let remove_id = tk.create("Remove me");
    tk.run_success(&["ls"]); // warm the cache

    let old = SystemTime::now() - Duration::from_secs(120);
    let cache_file = std::fs::OpenOptions::new()
        .write(true)
        .open(tk.cache_path())
        .unwrap();
    cache_file.set_modified(old).unwrap();

    fs::remove_file(tk.ticket_path(&remove_id)).unwrap();

    let output = tk.run_success(&["ls"]);
    assert!(output.contains(&keep_id));
    assert!(!output.contains(&remove_id));
}
