use crate::support::Harness;
use kiln_build::{
    BuildResult, EntryPointError, InputElement, Inputs, Options, ProjectDescriptor, ProjectLayout,
};
use kiln_classfile::{ClassFile, DebugPositions};
use kiln_test_utils::ClassFixture;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

fn options() -> Options {
    Options {
        add_runtime_library: false,
        ..Options::default()
    }
}

fn script_inputs(ws: &Path) -> Inputs {
    let script = ws.join("hello.sc");
    fs::write(&script, "val who = \"world\"\nprintln(s\"hello $who\")\nprintln(\"bye\")\n").unwrap();
    Inputs::new(ws, "hello", vec![InputElement::SingleFile(script)])
}

/// What the compiler emits for the wrapped `hello.sc`: the body starts on
/// generated line 3.
fn compiled_script() -> ClassFixture {
    ClassFixture::new("hello$")
        .source_file("hello.scala")
        .main_method(&[3, 4, 5])
}

#[test]
fn successful_build_remaps_script_positions() {
    let ws = tempfile::tempdir().unwrap();
    let other = ClassFixture::new("Util").source_file("Util.scala").main_method(&[10, 11]);
    let harness = Harness::compiling(vec![compiled_script(), other.clone()]);

    let result = harness
        .builder
        .build(&script_inputs(ws.path()), &options(), ws.path())
        .unwrap();

    let BuildResult::Successful(ok) = result else {
        panic!("expected a successful build");
    };
    let project = ok.common.project_name().to_string();
    assert_eq!(ok.output, ProjectLayout::new(ws.path(), project).classes_dir());

    let script_class = fs::read(ok.output.join("hello$.class")).unwrap();
    let positions = DebugPositions::read(&script_class).unwrap();
    assert_eq!(positions.source_file(), Some("hello.sc"));
    assert_eq!(positions.line_numbers(), vec![1, 2, 3]);

    // Classes from other sources are left byte-for-byte alone.
    assert_eq!(fs::read(ok.output.join("Util.class")).unwrap(), other.build());
}

#[test]
fn line_correction_plugin_keeps_lines_but_renames_source() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::compiling(vec![compiled_script()]);
    let options = Options {
        use_line_correction_plugin: true,
        ..options()
    };

    let result = harness
        .builder
        .build(&script_inputs(ws.path()), &options, ws.path())
        .unwrap();
    let output = result.output().unwrap().to_path_buf();

    let bytes = fs::read(output.join("hello$.class")).unwrap();
    let positions = DebugPositions::read(&bytes).unwrap();
    assert_eq!(positions.line_numbers(), vec![3, 4, 5]);
    assert_eq!(positions.source_file(), Some("hello.sc"));

    let request = harness.resolver.requests.lock().unwrap()[0].clone();
    assert_eq!(request.plugins, vec![options.line_correction_plugin.clone()]);
    let compiler_options = &result.common().descriptor.project.compiler.options;
    assert!(compiler_options.contains(&"-P:line-correction:headers:hello.scala=2".to_string()));
}

#[test]
fn repeated_builds_reuse_project_and_descriptor() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::compiling(vec![compiled_script()]);
    let inputs = script_inputs(ws.path());

    let first = harness.builder.build(&inputs, &options(), ws.path()).unwrap();
    let descriptor_path = ProjectLayout::new(ws.path(), first.common().project_name()).descriptor_path();

    let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
    fs::File::options()
        .write(true)
        .open(&descriptor_path)
        .unwrap()
        .set_modified(old)
        .unwrap();

    let second = harness.builder.build(&inputs, &options(), ws.path()).unwrap();
    assert_eq!(first.common().project_name(), second.common().project_name());
    assert_eq!(first.output(), second.output());
    assert_eq!(first.common().descriptor, second.common().descriptor);
    assert_eq!(fs::metadata(&descriptor_path).unwrap().modified().unwrap(), old);

    let stored: ProjectDescriptor =
        serde_json::from_slice(&fs::read(&descriptor_path).unwrap()).unwrap();
    assert_eq!(stored, second.common().descriptor);
    assert_eq!(harness.compiler.projects().len(), 2);
}

#[test]
fn compile_failure_is_a_failed_result() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::new(
        crate::support::FakeCompiler::failing(),
        crate::support::ScriptedGenerator::exiting_with(0),
    );
    let result = harness
        .builder
        .build(&script_inputs(ws.path()), &options(), ws.path())
        .unwrap();
    assert!(!result.is_success());
    assert!(result.output().is_none());
    assert_eq!(result.common().sources.generated.len(), 1);
}

#[test]
fn malformed_output_class_is_a_remap_error() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::compiling(Vec::new());
    let inputs = script_inputs(ws.path());
    let classes = ProjectLayout::new(ws.path(), inputs.project_name()).classes_dir();
    fs::create_dir_all(&classes).unwrap();
    fs::write(classes.join("Broken.class"), b"\xCA\xFE\xBA\xBE\x00").unwrap();

    let err = harness.builder.build(&inputs, &options(), ws.path()).unwrap_err();
    match err {
        kiln_build::BuildError::Remap { path, .. } => assert!(path.ends_with("Broken.class")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn script_launcher_is_the_default_entry_point() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::compiling(vec![
        compiled_script(),
        ClassFixture::new("hello_sc").source_file("hello.scala").main_method(&[8]),
        ClassFixture::new("other/Tool").source_file("Tool.scala").main_method(&[1]),
    ]);
    let result = harness
        .builder
        .build(&script_inputs(ws.path()), &options(), ws.path())
        .unwrap();
    let ok = result.successful().unwrap();

    // `hello$` is a plain module class in this fixture and also has `main`.
    assert_eq!(ok.entry_points().unwrap(), ["hello$", "hello_sc", "other.Tool"]);
    assert_eq!(ok.entry_point().unwrap(), "hello_sc");
}

#[test]
fn several_mains_without_default_are_ambiguous() {
    let ws = tempfile::tempdir().unwrap();
    let src = ws.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("A.scala"), "object A\n").unwrap();
    fs::write(src.join("B.scala"), "object B\n").unwrap();
    let inputs = Inputs::new(ws.path(), "multi", vec![InputElement::Directory(src)]);

    let harness = Harness::compiling(vec![
        ClassFixture::new("B").source_file("B.scala").main_method(&[1]),
        ClassFixture::new("A").source_file("A.scala").main_method(&[1]),
    ]);
    let result = harness.builder.build(&inputs, &options(), ws.path()).unwrap();
    match result.successful().unwrap().entry_point() {
        Err(EntryPointError::Ambiguous { candidates }) => assert_eq!(candidates, ["A", "B"]),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn no_main_class_is_not_found() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::compiling(vec![ClassFixture::new("hello$").source_file("hello.scala")]);
    let result = harness
        .builder
        .build(&script_inputs(ws.path()), &options(), ws.path())
        .unwrap();
    let ok = result.successful().unwrap();
    assert!(matches!(ok.entry_point(), Err(EntryPointError::NotFound)));
    // Still a valid class file after remapping.
    let class = ClassFile::parse(&fs::read(ok.output.join("hello$.class")).unwrap()).unwrap();
    assert_eq!(class.source_file.as_deref(), Some("hello.sc"));
}
