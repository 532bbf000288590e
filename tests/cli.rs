use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use pedigree::storage;
use pedigree::PersonId;
use tempfile::TempDir;

fn pedigree(dir: &Path, args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_pedigree"))
        .args(args)
        .current_dir(dir)
        .env_remove("PEDIGREE_INPUT")
        .env_remove("PEDIGREE_BASE")
        .env_remove("PEDIGREE_STYLE")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

#[test]
fn test_init_generate_cleanup() {
    let dir = TempDir::new().unwrap();

    let out = pedigree(dir.path(), &["init"], "");
    assert!(out.status.success());
    assert!(dir.path().join("relations.toml").exists());

    let out = pedigree(dir.path(), &["init"], "");
    assert_eq!(out.status.code(), Some(1));

    let out = pedigree(dir.path(), &["generate", "--style", "last initial"], "");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let html = std::fs::read_to_string(dir.path().join("family_tree.html")).unwrap();
    assert!(html.contains("Frederick Joseph F. (9)"));
    let dot = std::fs::read_to_string(dir.path().join("family_tree.dot")).unwrap();
    assert!(dot.contains("\"7\" -> \"9\" [color=blue];"));

    let out = pedigree(dir.path(), &["cleanup"], "");
    assert!(out.status.success());
    assert!(!dir.path().join("family_tree.html").exists());
    assert!(!dir.path().join("family_tree.dot").exists());
    assert!(!dir.path().join("family_tree.svg").exists());

    let out = pedigree(dir.path(), &["cleanup"], "");
    assert!(out.status.success());
}

#[test]
fn test_custom_paths() {
    let dir = TempDir::new().unwrap();
    let out = pedigree(dir.path(), &["init", "-i", "stones.json"], "");
    assert!(out.status.success());

    let out = pedigree(
        dir.path(),
        &["generate", "-i", "stones.json", "-b", "charts", "--first-names-only"],
        "",
    );
    assert!(out.status.success());
    let dot = std::fs::read_to_string(dir.path().join("charts.dot")).unwrap();
    assert!(dot.contains("[label=\"Frederick\", shape=\"box\"]"));
}

#[test]
fn test_missing_or_malformed_input_exits_1() {
    let dir = TempDir::new().unwrap();
    let out = pedigree(dir.path(), &["generate"], "");
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("relations.toml"));

    std::fs::write(dir.path().join("relations.toml"), "father = [[1, 2]").unwrap();
    let out = pedigree(dir.path(), &["generate"], "");
    assert_eq!(out.status.code(), Some(1));

    let out = pedigree(dir.path(), &["generate", "--style", "surname first"], "");
    assert!(!out.status.success());
}

#[test]
fn test_scripted_edit_session() {
    let dir = TempDir::new().unwrap();
    let script = "\
add m \"Fred /Flintstone/\"
father 1 new \"Ed /Flintstone/\"
mother 1 new \"Edna /Hardrock/\"
note 1 Yabba dabba doo
quit
y
";
    let out = pedigree(dir.path(), &[], script);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Ed Flintstone (2) is the father of Fred Flintstone (1)"));

    let family = storage::load_family(&dir.path().join("relations.toml")).unwrap();
    assert_eq!(family.len(), 3);
    let fred = family.person(PersonId(1)).unwrap();
    assert_eq!(family.mother(fred).unwrap().full_name(), "Edna Hardrock");
    assert_eq!(fred.notes(), ["Yabba dabba doo"]);
}
