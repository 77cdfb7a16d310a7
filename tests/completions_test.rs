#[path = "common/mod.rs"]
mod common;
use common::TkTest;

#[test]
fn completions_bash_mentions_binary_name() {
    let tk = TkTest::new();
    let output = tk.run_success(&["completions", "bash"]);
    assert!(output.contains("tk"));
}

#[test]
fn completions_zsh_emits_compdef() {
    let tk = TkTest::new();
    let output = tk.run_success(&["completions", "zsh"]);
    assert!(output.contains("#compdef tk"));
}

#[test]
fn completions_fish_emits_complete_directives() {
    let tk = TkTest::new();
    let output = tk.run_success(&["completions", "fish"]);
    assert!(output.contains("complete -c tk"));
}

#[test]
fn completions_rejects_unknown_shell() {
    let tk = TkTest::new();
    let _ = tk.run_failure(&["completions", "not-a-shell"]);
}
