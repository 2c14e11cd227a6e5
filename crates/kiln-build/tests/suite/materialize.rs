use kiln_build::{
    Dependency, DirectiveMaterializer, InputElement, Inputs, MaterializeError, ProjectLayout,
    SourceMaterializer, WrapperStrategy,
};
use std::fs;
use std::path::Path;

fn write(path: &Path, text: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

#[test]
fn directory_scan_skips_hidden_entries_and_wraps_scripts() {
    let ws = tempfile::tempdir().unwrap();
    let src = ws.path().join("src");
    write(&src.join("Main.scala"), "object Main\n");
    write(&src.join("util/Helper.java"), "class Helper {}\n");
    write(&src.join("jobs/nightly.sc"), "//> using dep \"org.example:lib:1.0\"\nprintln(1)\n");
    write(&src.join("notes.txt"), "ignored\n");
    write(&src.join(".hidden/Secret.scala"), "object Secret\n");
    write(&src.join(".Dot.scala"), "object Dot\n");
    let res = ws.path().join("resources");
    fs::create_dir_all(&res).unwrap();

    let inputs = Inputs::new(
        ws.path(),
        "demo",
        vec![
            InputElement::Directory(src.clone()),
            InputElement::ResourceDirectory(res.clone()),
        ],
    );
    let sources = DirectiveMaterializer
        .materialize(&inputs, WrapperStrategy::ObjectWrapper, None)
        .unwrap();

    let root = ProjectLayout::new(ws.path(), inputs.project_name()).generated_sources_dir();
    assert_eq!(sources.generated_root, root);
    let generated = root.join("jobs/nightly.scala");
    assert_eq!(
        sources.paths,
        vec![src.join("Main.scala"), generated.clone(), src.join("util/Helper.java")]
    );
    assert_eq!(sources.resource_dirs, vec![res]);
    assert_eq!(sources.generated.len(), 1);
    assert_eq!(sources.generated[0].generated, generated);
    assert_eq!(sources.generated[0].reporting, src.join("jobs/nightly.sc"));
    assert_eq!(sources.generated[0].header_lines, 2);
    assert_eq!(sources.default_entry_point.as_deref(), Some("nightly_sc"));
    assert_eq!(sources.dependencies, vec![Dependency::new("org.example", "lib", "1.0")]);

    let wrapped = fs::read_to_string(&generated).unwrap();
    assert!(wrapped.starts_with("object nightly {\n"));
    // The script body begins right after the header.
    assert_eq!(wrapped.lines().nth(3), Some("println(1)"));
}

#[test]
fn main_class_directive_sets_default_entry_point() {
    let ws = tempfile::tempdir().unwrap();
    let file = ws.path().join("App.scala");
    write(&file, "//> using mainClass \"app.Main\"\npackage app\nobject Main\n");
    let inputs = Inputs::new(ws.path(), "app", vec![InputElement::SingleFile(file)]);
    let sources = DirectiveMaterializer
        .materialize(&inputs, WrapperStrategy::ObjectWrapper, None)
        .unwrap();
    assert_eq!(sources.default_entry_point.as_deref(), Some("app.Main"));
    assert!(sources.generated.is_empty());
}

#[test]
fn malformed_dependency_directive_reports_location() {
    let ws = tempfile::tempdir().unwrap();
    let file = ws.path().join("bad.sc");
    write(&file, "// comment\n//> using dep not-a-coordinate\n");
    let inputs = Inputs::new(ws.path(), "bad", vec![InputElement::SingleFile(file.clone())]);
    let err = DirectiveMaterializer
        .materialize(&inputs, WrapperStrategy::ObjectWrapper, None)
        .unwrap_err();
    match err {
        MaterializeError::Directive { path, line, .. } => {
            assert_eq!(path, file);
            assert_eq!(line, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn single_file_must_be_a_source() {
    let ws = tempfile::tempdir().unwrap();
    let file = ws.path().join("README.md");
    write(&file, "# readme\n");
    let inputs = Inputs::new(ws.path(), "x", vec![InputElement::SingleFile(file)]);
    let err = DirectiveMaterializer
        .materialize(&inputs, WrapperStrategy::ObjectWrapper, None)
        .unwrap_err();
    assert!(matches!(err, MaterializeError::UnsupportedFile(_)), "{err}");
}

#[test]
fn platform_specific_sources_follow_the_target() {
    let ws = tempfile::tempdir().unwrap();
    let src = ws.path().join("src");
    write(&src.join("Shared.scala"), "object Shared\n");
    write(&src.join("Impl.js.scala"), "object Impl\n");
    write(&src.join("Impl.jvm.scala"), "object Impl\n");
    let inputs = Inputs::new(ws.path(), "x", vec![InputElement::Directory(src.clone())]);

    let jvm = DirectiveMaterializer
        .materialize(&inputs, WrapperStrategy::ObjectWrapper, None)
        .unwrap();
    assert_eq!(jvm.paths, vec![src.join("Impl.jvm.scala"), src.join("Shared.scala")]);

    let js = DirectiveMaterializer
        .materialize(&inputs, WrapperStrategy::ObjectWrapper, Some("js"))
        .unwrap();
    assert_eq!(js.paths, vec![src.join("Impl.js.scala"), src.join("Shared.scala")]);
}

#[test]
fn wrappers_of_deleted_scripts_are_removed() {
    let ws = tempfile::tempdir().unwrap();
    let src = ws.path().join("src");
    write(&src.join("a.sc"), "println(1)\n");
    write(&src.join("b.sc"), "println(2)\n");
    let inputs = Inputs::new(ws.path(), "x", vec![InputElement::Directory(src.clone())]);

    let first = DirectiveMaterializer
        .materialize(&inputs, WrapperStrategy::ClassWrapper, None)
        .unwrap();
    assert_eq!(first.generated.len(), 2);
    assert_eq!(first.default_entry_point, None);

    fs::remove_file(src.join("b.sc")).unwrap();
    let second = DirectiveMaterializer
        .materialize(&inputs, WrapperStrategy::ClassWrapper, None)
        .unwrap();
    assert_eq!(second.generated.len(), 1);
    assert!(!second.generated_root.join("b.scala").exists());
    assert!(second.generated_root.join("a.scala").exists());
    assert_eq!(second.default_entry_point.as_deref(), Some("a_sc"));
}

#[test]
fn same_script_name_from_two_directories_is_rejected() {
    let ws = tempfile::tempdir().unwrap();
    let one = ws.path().join("one");
    let two = ws.path().join("two");
    write(&one.join("run.sc"), "println(1)\n");
    write(&two.join("run.sc"), "println(2)\n");
    let inputs = Inputs::new(
        ws.path(),
        "x",
        vec![InputElement::Directory(one), InputElement::Directory(two)],
    );
    let err = DirectiveMaterializer
        .materialize(&inputs, WrapperStrategy::ObjectWrapper, None)
        .unwrap_err();
    assert!(matches!(err, MaterializeError::DuplicateScript { .. }), "{err}");
}
