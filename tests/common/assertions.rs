// Shared assertion helpers for command-level tests

/// Assert that a joined command string contains a flag/value fragment.
pub fn assert_cmd_contains(cmd: &str, needle: &str) {
    assert!(
        cmd.contains(needle),
        "expected command to contain {needle:?}\ncommand: {cmd}"
    );
}

/// Assert that a joined command string does not contain a fragment.
pub fn assert_cmd_not_contains(cmd: &str, needle: &str) {
    assert!(
        !cmd.contains(needle),
        "expected command to NOT contain {needle:?}\ncommand: {cmd}"
    );
}
