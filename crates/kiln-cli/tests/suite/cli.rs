use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use kiln_test_utils::ClassFixture;
use predicates::prelude::*;
use std::path::Path;

fn kiln() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("kiln"));
    cmd.env_remove("KILN_CONFIG_PATH")
        .env_remove("KILN_TEST_COMPILE_EXIT")
        .env_remove("KILN_TEST_CLASSES");
    cmd
}

/// A workspace whose compile server is the test helper and whose toolchain is
/// a single placeholder jar in a workspace-local repository.
fn workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    let server = env!("CARGO_BIN_EXE_kiln-cli-test-compile-server");
    temp.child("kiln.toml")
        .write_str(&format!(
            r#"[logging]
level = "error"

[language]
runtime_library = false

[toolchain]
compiler = ["org.example:fake-compiler:1.0"]

[repository]
path = "repo"

[compile_server]
program = '{server}'
"#
        ))
        .unwrap();
    temp.child("repo/org/example/fake-compiler/1.0/fake-compiler-1.0.jar")
        .write_binary(b"PK")
        .unwrap();
    temp
}

fn classes(fixtures: &[ClassFixture]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for fixture in fixtures {
        fixture.write_to(dir.path()).unwrap();
    }
    dir
}

fn compile(ws: &Path) -> Command {
    let mut cmd = kiln();
    cmd.arg("compile")
        .arg("--workspace")
        .arg(ws)
        .arg("--project")
        .arg("demo");
    cmd
}

#[test]
fn help_mentions_core_commands() {
    kiln().arg("--help").assert().success().stdout(
        predicate::str::contains("compile")
            .and(predicate::str::contains("main-class"))
            .and(predicate::str::contains("descriptor")),
    );
}

#[test]
fn compile_json_reports_the_output_directory() {
    let ws = workspace();
    ws.child("src/Main.scala").write_str("object Main\n").unwrap();
    let classes = classes(&[ClassFixture::new("Main").main_method(&[1])]);

    let output = compile(ws.path())
        .arg(ws.child("src").path())
        .arg("--json")
        .env("KILN_TEST_CLASSES", classes.path())
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["success"], true);
    let project = v["project"].as_str().unwrap();
    assert!(project.starts_with("demo_"), "{project}");
    let out = Path::new(v["output"].as_str().unwrap());
    assert!(out.join("Main.class").is_file());
    assert!(v["sources"][0].as_str().unwrap().ends_with("Main.scala"));
}

#[test]
fn failed_compilation_exits_with_one() {
    let ws = workspace();
    ws.child("src/Main.scala").write_str("object Main {\n").unwrap();

    compile(ws.path())
        .arg(ws.child("src").path())
        .env("KILN_TEST_COMPILE_EXIT", "1")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed"));
}

#[test]
fn missing_toolchain_jar_is_fatal() {
    let ws = workspace();
    ws.child("src/Main.scala").write_str("object Main\n").unwrap();
    std::fs::remove_dir_all(ws.child("repo").path()).unwrap();

    compile(ws.path())
        .arg(ws.child("src").path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("fake-compiler"));
}

#[test]
fn missing_input_is_fatal() {
    let ws = workspace();
    compile(ws.path())
        .arg(ws.child("nope.sc").path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nope.sc"));
}

#[test]
fn main_class_prefers_the_script_launcher() {
    let ws = workspace();
    ws.child("hello.sc").write_str("println(\"hi\")\n").unwrap();
    let classes = classes(&[
        ClassFixture::new("hello_sc").main_method(&[1]),
        ClassFixture::new("Other").main_method(&[1]),
    ]);

    kiln()
        .arg("main-class")
        .arg(ws.child("hello.sc").path())
        .arg("--workspace")
        .arg(ws.path())
        .env("KILN_TEST_CLASSES", classes.path())
        .assert()
        .success()
        .stdout("hello_sc\n");
}

#[test]
fn main_class_lists_candidates_when_ambiguous() {
    let ws = workspace();
    ws.child("src/A.scala").write_str("object A\n").unwrap();
    let classes = classes(&[
        ClassFixture::new("B").main_method(&[1]),
        ClassFixture::new("A").main_method(&[1]),
    ]);

    kiln()
        .arg("main-class")
        .arg(ws.child("src").path())
        .arg("--workspace")
        .arg(ws.path())
        .env("KILN_TEST_CLASSES", classes.path())
        .assert()
        .code(1)
        .stdout("A\nB\n")
        .stderr(predicate::str::contains("several main classes"));
}

#[test]
fn descriptor_is_persisted_under_the_workspace() {
    let ws = workspace();
    ws.child("src/Main.scala").write_str("object Main\n").unwrap();

    let output = kiln()
        .arg("descriptor")
        .arg(ws.child("src").path())
        .arg("--workspace")
        .arg(ws.path())
        .arg("--project")
        .arg("demo")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let printed = String::from_utf8(output.stdout).unwrap();
    let path = Path::new(printed.trim());
    assert!(path.is_file(), "{}", path.display());
    assert!(path.starts_with(ws.path().canonicalize().unwrap().join(".kiln/projects")));

    let output = kiln()
        .arg("descriptor")
        .arg(ws.child("src").path())
        .arg("--workspace")
        .arg(ws.path())
        .arg("--project")
        .arg("demo")
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["version"], "1");
    assert!(v["project"]["name"].as_str().unwrap().starts_with("demo_"));
    assert!(v["project"]["compiler"]["jars"][0]
        .as_str()
        .unwrap()
        .ends_with("fake-compiler-1.0.jar"));
}
