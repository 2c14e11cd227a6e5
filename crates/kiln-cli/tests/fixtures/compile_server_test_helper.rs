//! Stand-in for the external compile service used by the CLI tests.
//!
//! Invoked as `<helper> compile <project> --config-dir <dir>`. Reads the
//! persisted descriptor, copies every file from `$KILN_TEST_CLASSES` into the
//! descriptor's classes directory and exits with `$KILN_TEST_COMPILE_EXIT`
//! (default 0).

use std::path::{Path, PathBuf};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (project, config_dir) = match args.as_slice() {
        [cmd, project, flag, dir] if cmd == "compile" && flag == "--config-dir" => {
            (project.clone(), PathBuf::from(dir))
        }
        _ => {
            eprintln!("usage: compile <project> --config-dir <dir>, got {args:?}");
            std::process::exit(64);
        }
    };

    let descriptor_path = config_dir.join(format!("{project}.json"));
    let text = std::fs::read_to_string(&descriptor_path).unwrap_or_else(|err| {
        eprintln!("cannot read {}: {err}", descriptor_path.display());
        std::process::exit(65);
    });
    let descriptor: serde_json::Value = serde_json::from_str(&text).unwrap_or_else(|err| {
        eprintln!("invalid descriptor: {err}");
        std::process::exit(65);
    });

    let exit_code: i32 = std::env::var("KILN_TEST_COMPILE_EXIT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);
    if exit_code != 0 {
        eprintln!("[error] {project}: compilation failed");
        std::process::exit(exit_code);
    }

    let classes = descriptor["project"]["classesDir"]
        .as_str()
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            eprintln!("descriptor has no classesDir");
            std::process::exit(65);
        });
    std::fs::create_dir_all(&classes).unwrap_or_else(|err| {
        eprintln!("cannot create {}: {err}", classes.display());
        std::process::exit(74);
    });
    if let Some(from) = std::env::var_os("KILN_TEST_CLASSES") {
        copy_dir(Path::new(&from), &classes);
    }
    eprintln!("compiled {project}");
}

fn copy_dir(from: &Path, to: &Path) {
    let Ok(entries) = std::fs::read_dir(from) else {
        return;
    };
    for entry in entries.flatten() {
        let target = to.join(entry.file_name());
        if entry.path().is_dir() {
            let _ = std::fs::create_dir_all(&target);
            copy_dir(&entry.path(), &target);
        } else {
            let _ = std::fs::copy(entry.path(), &target);
        }
    }
}
