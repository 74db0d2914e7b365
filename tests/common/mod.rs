#![allow(dead_code)]

use fpcbox::{Limits, Runner, RunnerConfig, Workspace};

use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Once;

pub const HELLO: &str = "program Hello;\nbegin\n  writeln('Hello, World!');\nend.\n";

pub const GREETER: &str =
    "program Greeter;\nvar line: string;\nbegin\n  readln(line);\n  writeln(line);\nend.\n";

/// Stands in for `fpc`: copies `<fixtures>/<program name>` to the artifact.
/// Sources containing `wrtieln` fail with FPC-shaped diagnostics after
/// planting an artifact, so a test can tell whether it was ever run.
pub const FAKE_FPC: &str = r#"
src="$1"; out="$2"; fixtures="$3"
: > "$fixtures/compiled"
if grep -q 'wrtieln' "$src"; then
  cp "$fixtures/Tattle" "$out" && chmod 755 "$out"
  echo 'program.pas(3,3) Error: Identifier not found "wrtieln"'
  echo 'program.pas(5) Fatal: There were 1 errors compiling module, stopping' >&2
  exit 1
fi
name=$(sed -n 's/^[[:space:]]*program[[:space:]]*\([A-Za-z0-9_]*\).*/\1/p' "$src" | head -n 1)
cp "$fixtures/$name" "$out" && chmod 755 "$out"
"#;

pub fn init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn scratch() -> Workspace {
    Workspace::create(&env::temp_dir()).unwrap()
}

pub fn write_script(path: &Path, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

pub fn install_artifact(ws: &Workspace, body: &str) {
    write_script(ws.artifact_path(), body);
}

pub fn test_limits() -> Limits {
    Limits {
        cpu_time_secs: 1,
        wall_time_secs: 3,
        compile_timeout_secs: 5,
        ..Default::default()
    }
}

/// Fixtures every fake-compiler test can rely on.
pub fn fixtures() -> Workspace {
    let ws = scratch();
    let dir = ws.dir();
    write_script(&dir.join("Hello"), "printf 'Hello, World!\\n'");
    write_script(&dir.join("Greeter"), "read line\nprintf '%s\\n' \"$line\"");
    write_script(&dir.join("Spin"), "while :; do :; done");
    write_script(&dir.join("Where"), "pwd");
    write_script(
        &dir.join("Flood"),
        "i=0\nwhile [ $i -lt 5000 ]; do printf '0123456789'; i=$((i+1)); done",
    );
    write_script(
        &dir.join("Tattle"),
        &format!(": > '{}'", dir.join("ran").display()),
    );
    ws
}

pub fn fake_config(fixtures: &Workspace, work_root: &Path, limits: Limits) -> RunnerConfig {
    RunnerConfig {
        compiler: "/bin/sh".into(),
        compiler_args: vec![
            "-c".into(),
            FAKE_FPC.into(),
            "fakefpc".into(),
            "{source}".into(),
            "{artifact}".into(),
            fixtures.dir().display().to_string(),
        ],
        work_root: Some(work_root.to_owned()),
        limits,
        ..Default::default()
    }
}

pub fn fake_runner(fixtures: &Workspace, work_root: &Path, limits: Limits) -> Runner {
    Runner::new(fake_config(fixtures, work_root, limits)).unwrap()
}

pub fn entries(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}
