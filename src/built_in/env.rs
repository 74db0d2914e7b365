use std::ffi::OsString;
use std::path::Path;

/// Search path for the program: nothing can be found through it.
const NO_PATH: &str = "/nonexistent";
const NO_SHELL: &str = "/bin/false";

fn pinned(workdir: &Path) -> Vec<(&'static str, OsString)> {
    vec![
        ("HOME", workdir.into()),
        ("TMPDIR", workdir.into()),
        ("TMP", workdir.into()),
        ("TEMP", workdir.into()),
        ("SHELL", NO_SHELL.into()),
        ("LANG", "C".into()),
        ("LC_ALL", "C".into()),
    ]
}

/// Environment for the compiler: a fixed search path, everything else pinned
/// to the workspace.
pub fn compiler_env(workdir: &Path, search_path: &str) -> Vec<(&'static str, OsString)> {
    let mut env = pinned(workdir);
    env.push(("PATH", search_path.into()));
    env
}

/// Environment for the submitted program.
pub fn program_env(workdir: &Path) -> Vec<(&'static str, OsString)> {
    let mut env = pinned(workdir);
    env.push(("PATH", NO_PATH.into()));
    env
}
