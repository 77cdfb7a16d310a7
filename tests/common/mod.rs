use std::fs;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Runs the `tk` binary in an isolated temp directory for black-box CLI
/// testing. Every invocation's cwd is `temp_dir`, so the default
/// ticket directory (`./tickets`) lives entirely inside it.
pub struct TkTest {
    pub temp_dir: TempDir,
    binary_path: String,
}

impl TkTest {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");

        let binary_path = if cfg!(debug_assertions) {
            concat!(env!("CARGO_MANIFEST_DIR"), "/target/debug/tk")
        } else {
            concat!(env!("CARGO_MANIFEST_DIR"), "/target/release/tk")
        };
        let binary_path = if std::path::Path::new(binary_path).exists() {
            binary_path.to_string()
        } else {
            concat!(env!("CARGO_MANIFEST_DIR"), "/target/debug/tk").to_string()
        };

        TkTest {
            temp_dir,
            binary_path,
        }
    }

    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(&self.binary_path)
            .args(args)
            .current_dir(self.temp_dir.path())
            .output()
            .expect("failed to execute tk command")
    }

    pub fn run_success(&self, args: &[&str]) -> String {
        let output = self.run(args);
        if !output.status.success() {
            panic!(
                "command {:?} failed with status {:?}\nstdout: {}\nstderr: {}",
                args,
                output.status,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        String::from_utf8_lossy(&output.stdout).to_string()
    }

    pub fn run_failure(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            !output.status.success(),
            "expected command {args:?} to fail, but it succeeded"
        );
        String::from_utf8_lossy(&output.stderr).to_string()
    }

    pub fn ticket_path(&self, id: &str) -> std::path::PathBuf {
        self.temp_dir.path().join("tickets").join(format!("{id}.md"))
    }

    pub fn ticket_exists(&self, id: &str) -> bool {
        self.ticket_path(id).exists()
    }

    pub fn read_ticket(&self, id: &str) -> String {
        fs::read_to_string(self.ticket_path(id)).expect("failed to read ticket file")
    }

    pub fn cache_path(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("tickets").join(".cache")
    }

    /// Create a ticket and return its generated id, parsed out of `new`'s
    /// plain-text "Created <id> - <title>" line.
    pub fn create(&self, title: &str) -> String {
        let output = self.run_success(&["new", title]);
        output
            .trim()
            .strip_prefix("Created ")
            .and_then(|rest| rest.split(" - ").next())
            .expect("unexpected `tk new` output")
            .to_string()
    }

    /// Write a ticket file directly, bypassing `tk new` and any cache
    /// write-through, to set up a directory that has never been touched by a
    /// `tk` invocation (for cold-build scenarios).
    pub fn write_ticket_file(&self, id: &str, title: &str) {
        let dir = self.temp_dir.path().join("tickets");
        fs::create_dir_all(&dir).expect("failed to create tickets directory");
        let content = format!(
            "---\nschema_version: 1\nid: {id}\nstatus: open\nblocked-by: []\ncreated: 2026-01-01T00:00:00Z\ntype: task\npriority: 2\n---\n# {title}\n"
        );
        fs::write(dir.join(format!("{id}.md")), content).expect("failed to write ticket file");
    }
}
