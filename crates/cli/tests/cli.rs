use assert_cmd::Command;

#[test]
fn help_lists_subcommands() {
    let output = Command::cargo_bin("bookshelf-cli")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["serve", "list", "search", "show"] {
        assert!(stdout.contains(command), "missing {command}");
    }
}

#[test]
fn list_reads_a_fresh_catalog() {
    let dir = std::env::temp_dir().join(format!("bookshelf-cli-{}", std::process::id()));
    let output = Command::cargo_bin("bookshelf-cli")
        .unwrap()
        .current_dir(std::env::temp_dir())
        .env("BOOKSHELF_CONFIG_DIR", dir.join("config"))
        .env("BOOKSHELF_DATABASE__PATH", dir.join("catalog.sqlite"))
        .env("BOOKSHELF_ENV", "local")
        .args(["list", "--json"])
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "[]");
    let _ = std::fs::remove_dir_all(dir);
}
