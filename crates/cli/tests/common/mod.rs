//! Helpers for running the built `intake` binary

use std::path::Path;
use std::process::{Command, Output};

/// Run `intake` with `args` inside `working_dir`
///
/// HOME and XDG_CONFIG_HOME point into the working directory so a user
/// configuration on the test machine is never picked up.
pub fn intake(working_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_intake"))
        .args(args)
        .current_dir(working_dir)
        .env("HOME", working_dir)
        .env("XDG_CONFIG_HOME", working_dir.join(".config"))
        .output()
        .expect("failed to run intake binary")
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
