use crate::support::{FakeCompiler, Harness, ScriptedGenerator};
use kiln_build::{BuildError, GeneratorCommand, InputElement, Inputs, Options, ProjectLayout};
use kiln_test_utils::ClassFixture;
use std::fs;
use std::path::{Path, PathBuf};

fn bench_options() -> Options {
    Options {
        add_runtime_library: false,
        benchmark: true,
        benchmark_dependencies: vec!["org.openjdk.jmh:jmh-core:1.37".parse().unwrap()],
        generator: Some(GeneratorCommand {
            program: PathBuf::from("bench-gen"),
            args: vec!["--quiet".into()],
        }),
        ..Options::default()
    }
}

fn inputs(ws: &Path) -> Inputs {
    let src = ws.join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("Lib.scala"), "object Lib\n").unwrap();
    Inputs::new(ws, "lib", vec![InputElement::Directory(src)])
}

#[test]
fn generator_failure_is_a_secondary_build_error() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::new(
        FakeCompiler::succeeding(vec![ClassFixture::new("Lib")]),
        ScriptedGenerator::exiting_with(2),
    );

    let err = harness
        .builder
        .build(&inputs(ws.path()), &bench_options(), ws.path())
        .unwrap_err();
    assert!(
        matches!(err, BuildError::SecondaryBuild { exit_code: Some(2) }),
        "{err:?}"
    );
    // Only the primary project was compiled.
    assert_eq!(harness.compiler.projects().len(), 1);
}

#[test]
fn generated_benchmarks_are_built_as_a_derived_project() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::compiling(vec![ClassFixture::new("Lib")]);
    let inputs = inputs(ws.path());
    let primary_project = inputs.project_name();

    let result = harness
        .builder
        .build(&inputs, &bench_options(), ws.path())
        .unwrap();

    let bench_project = format!("{primary_project}_bench");
    assert_eq!(result.common().project_name(), bench_project);
    assert!(!result.common().options.benchmark);
    assert_eq!(harness.compiler.projects(), [primary_project.clone(), bench_project.clone()]);

    let scratch = ProjectLayout::new(ws.path(), primary_project.as_str()).bench_dir();
    let commands = harness.generator.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].program, PathBuf::from("bench-gen"));
    assert_eq!(commands[0].cwd, ws.path());
    assert_eq!(
        commands[0].args,
        [
            "--quiet".to_string(),
            ProjectLayout::new(ws.path(), primary_project.as_str())
                .classes_dir()
                .display()
                .to_string(),
            scratch.join("sources").display().to_string(),
            scratch.join("resources").display().to_string(),
            "default".to_string(),
        ]
    );

    let elements = result.common().inputs.elements();
    assert_eq!(
        &elements[1..],
        [
            InputElement::Directory(scratch.join("sources")),
            InputElement::ResourceDirectory(scratch.join("resources")),
        ]
    );
    assert!(result
        .common()
        .sources
        .paths
        .contains(&scratch.join("sources").join("Bench.scala")));

    // Both passes asked for the benchmark dependencies.
    let requests = harness.resolver.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    for request in requests.iter() {
        assert!(request
            .dependencies
            .iter()
            .any(|dep| dep.name == "jmh-core"));
    }
}

#[test]
fn scratch_area_is_recreated_for_each_run() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::compiling(vec![ClassFixture::new("Lib")]);
    let inputs = inputs(ws.path());
    let scratch = ProjectLayout::new(ws.path(), inputs.project_name()).bench_dir();
    fs::create_dir_all(scratch.join("sources")).unwrap();
    fs::write(scratch.join("sources").join("Stale.scala"), "class Stale\n").unwrap();

    harness
        .builder
        .build(&inputs, &bench_options(), ws.path())
        .unwrap();

    assert!(!scratch.join("sources").join("Stale.scala").exists());
    assert!(scratch.join("sources").join("Bench.scala").exists());
}

#[test]
fn failed_primary_build_skips_the_generator() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::new(FakeCompiler::failing(), ScriptedGenerator::exiting_with(0));
    let result = harness
        .builder
        .build(&inputs(ws.path()), &bench_options(), ws.path())
        .unwrap();
    assert!(!result.is_success());
    assert!(harness.generator.commands().is_empty());
}

#[test]
fn benchmark_without_generator_is_an_error() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::compiling(vec![ClassFixture::new("Lib")]);
    let options = Options {
        generator: None,
        ..bench_options()
    };
    let err = harness
        .builder
        .build(&inputs(ws.path()), &options, ws.path())
        .unwrap_err();
    assert!(matches!(err, BuildError::MissingGenerator), "{err:?}");
}
