use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn taglink(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_taglink"))
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .expect("run taglink")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn write_rename_corpus(dir: &Path) {
    fs::write(dir.join("file1.md"), "# old tag\nSome content about the old tag.").unwrap();
    fs::write(dir.join("file2.md"), "# another tag\nThis file references old tag.").unwrap();
}

#[test]
fn init_then_rename() {
    let dir = tempfile::tempdir().unwrap();
    write_rename_corpus(dir.path());
    let root = dir.path().to_str().unwrap();

    let out = taglink(&["--init", root]);
    assert!(out.status.success(), "{out:?}");
    assert!(dir.path().join("linklist.md").exists());
    assert!(dir.path().join(".tag_index.json").exists());

    let out = taglink(&["rename", root, "old tag", "new tag"]);
    assert!(out.status.success(), "{out:?}");

    let file1 = fs::read_to_string(dir.path().join("file1.md")).unwrap();
    assert!(file1.contains("# new tag"));
    assert!(!file1.contains("old tag"));
    let file2 = fs::read_to_string(dir.path().join("file2.md")).unwrap();
    assert!(file2.contains("[new tag][new tag]"));
    assert!(file2.contains("[new tag]: file1.md#new-tag"));

    let index: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join(".tag_index.json")).unwrap()).unwrap();
    assert!(index["tags"].get("new tag").is_some());
    assert!(index["tags"].get("old tag").is_none());
}

#[test]
fn rename_errors_go_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    write_rename_corpus(dir.path());
    let root = dir.path().to_str().unwrap();
    assert!(taglink(&["sync", root]).status.success());

    let out = taglink(&["rename", root, "non_existent_tag", "new_tag"]);
    assert!(out.status.success());
    assert_eq!(
        stdout(&out).trim(),
        "Error: Tag 'non_existent_tag' not found in the index."
    );

    let out = taglink(&["--strict", "rename", root, "old tag", "another tag"]);
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(
        stdout(&out).trim(),
        "Error: Tag 'another tag' already exists. Cannot rename."
    );
}

#[test]
fn origin_and_check() {
    let dir = tempfile::tempdir().unwrap();
    write_rename_corpus(dir.path());
    let root = dir.path().to_str().unwrap();
    assert!(taglink(&["-q", "sync", root]).status.success());

    let out = taglink(&["origin", root, "Old Tag"]);
    assert_eq!(stdout(&out).trim(), "file1.md");

    let out = taglink(&["check", root, "old tag", "missing tag"]);
    let text = stdout(&out);
    assert!(text.lines().any(|l| l.starts_with("listed") && l.ends_with("old tag")));
    assert!(text.lines().any(|l| l.starts_with("missing") && l.ends_with("missing tag")));
}

#[test]
fn update_links_a_new_document() {
    let dir = tempfile::tempdir().unwrap();
    write_rename_corpus(dir.path());
    let root = dir.path().to_str().unwrap();
    assert!(taglink(&["sync", root]).status.success());

    fs::write(dir.path().join("file3.md"), "more about old tag\n").unwrap();
    let out = taglink(&["update", root, "file3.md"]);
    assert!(out.status.success(), "{out:?}");

    let file3 = fs::read_to_string(dir.path().join("file3.md")).unwrap();
    assert!(file3.contains("[old tag][old tag]"));
    assert!(file3.contains("[old tag]: file1.md#old-tag"));
    let linklist = fs::read_to_string(dir.path().join("linklist.md")).unwrap();
    assert!(linklist.contains("[file3.md](file3.md);"));
}

#[test]
fn custom_linklist_name_and_no_backlinks() {
    let dir = tempfile::tempdir().unwrap();
    write_rename_corpus(dir.path());
    let root = dir.path().to_str().unwrap();

    let out = taglink(&["sync", root, "--linklist", "tags.md", "--backlinks", "none"]);
    assert!(out.status.success(), "{out:?}");
    assert!(!dir.path().join("linklist.md").exists());
    let list = fs::read_to_string(dir.path().join("tags.md")).unwrap();
    assert!(list.contains("[old tag](file1.md#old-tag);\n"));
}

#[test]
fn empty_directory_stays_empty() {
    let dir = tempfile::tempdir().unwrap();
    let out = taglink(&["--init", dir.path().to_str().unwrap()]);
    assert!(out.status.success());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}
