// SPDX-License-Identifier: Apache-2.0

use process_control::{ChildExt, Output, Timeout};
use std::fs::read_dir;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

pub const PROBE_BIN: &str = env!("CARGO_BIN_EXE_writev-probe");
pub const TIMEOUT_SECS: u64 = 30;
pub const BASE_NAME: &str = "writev_data_file";

pub fn spawn(tmpdir: &Path, args: &[&str]) -> Child {
    Command::new(PROBE_BIN)
        .arg("--tmpdir")
        .arg(tmpdir)
        .args(args)
        .env_remove("WRITEV_PROBE_LOG")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|e| panic!("failed to run `{}`: {:#?}", PROBE_BIN, e))
}

pub fn finish(child: Child) -> Output {
    child
        .with_output_timeout(Duration::from_secs(TIMEOUT_SECS))
        .terminating()
        .wait()
        .unwrap_or_else(|e| panic!("failed to wait for `{}`: {:#?}", PROBE_BIN, e))
        .unwrap_or_else(|| panic!("process `{}` timed out", PROBE_BIN))
}

pub fn run(tmpdir: &Path, args: &[&str]) -> Output {
    finish(spawn(tmpdir, args))
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

pub fn assert_status(output: &Output, expected: i64) {
    assert_eq!(
        output.status.code(),
        Some(expected),
        "Expected exit status differs.\nstdout:\n{}\nstderr:\n{}",
        stdout(output),
        stderr(output)
    );
}

/// Every `<BASE_NAME>.*` file inside the per-run working directories.
pub fn target_files(tmpdir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for workdir in read_dir(tmpdir).unwrap() {
        let workdir = workdir.unwrap().path();
        if !workdir.is_dir() {
            continue;
        }

        for file in read_dir(&workdir).unwrap() {
            let file = file.unwrap().path();
            let name = file.file_name().unwrap().to_string_lossy().into_owned();
            if name.starts_with(BASE_NAME) {
                found.push(file);
            }
        }
    }
    found
}

/// Poll until the child has created its target file.
pub fn wait_for_target(tmpdir: &Path, pid: u32) -> PathBuf {
    let name = format!("{}.{}", BASE_NAME, pid);
    let start = Instant::now();

    while start.elapsed() < Duration::from_secs(TIMEOUT_SECS) {
        if let Some(path) = target_files(tmpdir)
            .into_iter()
            .find(|p| p.file_name().map_or(false, |n| n == name.as_str()))
        {
            return path;
        }
        sleep(Duration::from_millis(10));
    }

    panic!("`{}` never created {}", PROBE_BIN, name);
}
