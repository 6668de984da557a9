// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use integration_tests::fake_gtest::NO_FILTER_RECORD;
use std::{
    borrow::Cow,
    collections::HashMap,
    ffi::OsString,
    fmt,
    process::{Child, Command, ExitStatus, Stdio},
    time::{Duration, Instant},
};

/// Environment variables that would otherwise leak configuration into the harness under test.
const HARNESS_ENV_VARS: &[&str] = &[
    "CRASH_RETRY_XML_OUTPUT_FILE",
    "CRASH_RETRY_LOG_FILE",
    "CRASH_RETRY_MAX_RETRIES",
    "CRASH_RETRY_FILTER_FILE",
    "CRASH_RETRY_LOG",
    "CRASH_RETRY_VERBOSE",
];

pub fn fake_gtest_bin() -> &'static str {
    env!("CARGO_BIN_EXE_fake-gtest")
}

#[derive(Clone, Debug)]
pub struct CrashRetryCli {
    bin: Utf8PathBuf,
    args: Vec<String>,
    envs: HashMap<OsString, OsString>,
    unchecked: bool,
}

impl CrashRetryCli {
    pub fn new() -> Self {
        Self {
            bin: env!("CARGO_BIN_EXE_crash-retry-dup").into(),
            args: Vec::new(),
            envs: HashMap::new(),
            unchecked: false,
        }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(&mut self, arg: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(arg.into_iter().map(Into::into));
        self
    }

    pub fn env(&mut self, k: impl Into<OsString>, v: impl Into<OsString>) -> &mut Self {
        self.envs.insert(k.into(), v.into());
        self
    }

    pub fn unchecked(&mut self, unchecked: bool) -> &mut Self {
        self.unchecked = unchecked;
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.bin);
        command.args(&self.args);
        for var in HARNESS_ENV_VARS {
            command.env_remove(var);
        }
        command.env("CARGO_TERM_COLOR", "never");
        command.envs(&self.envs);
        command
    }

    /// Starts the harness in the background with its output captured.
    pub fn spawn(&self) -> Child {
        self.command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to spawn")
    }

    pub fn output(&self) -> CrashRetryOutput {
        let mut command = self.command();
        let output = command.output().expect("failed to execute");

        let ret = CrashRetryOutput {
            command,
            exit_status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        };

        if !self.unchecked && !output.status.success() {
            panic!("command failed:\n\n{ret}");
        }

        ret
    }
}

pub struct CrashRetryOutput {
    pub command: Command,
    pub exit_status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CrashRetryOutput {
    pub fn stdout_as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

impl fmt::Display for CrashRetryOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command: {:?}\nexit code: {:?}\n\
                   --- stdout ---\n{}\n\n--- stderr ---\n{}\n\n",
            self.command,
            self.exit_status.code(),
            String::from_utf8_lossy(&self.stdout),
            String::from_utf8_lossy(&self.stderr)
        )
    }
}

// Make Debug output the same as Display output, so `.unwrap()` and `.expect()` are nicer.
impl fmt::Debug for CrashRetryOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A scratch directory holding the files a harness run reads and writes.
pub struct HarnessDir {
    _dir: Utf8TempDir,
    pub xml: Utf8PathBuf,
    pub log: Utf8PathBuf,
    pub filter_file: Utf8PathBuf,
    pub record: Utf8PathBuf,
}

impl HarnessDir {
    pub fn new() -> Self {
        let dir = camino_tempfile::tempdir().expect("created temp dir");
        Self {
            xml: dir.path().join("out/report.xml"),
            log: dir.path().join("out/run.log"),
            filter_file: dir.path().join("out/filter.txt"),
            record: dir.path().join("record.txt"),
            _dir: dir,
        }
    }

    /// Returns a CLI with the XML and log paths set.
    pub fn cli(&self) -> CrashRetryCli {
        let mut cli = CrashRetryCli::new();
        cli.args([
            "--xml_output_file",
            self.xml.as_str(),
            "--log_file",
            self.log.as_str(),
        ]);
        cli
    }

    /// Returns the command line for fake-gtest, writing XML to the path the harness expects.
    pub fn fake_gtest_args<'a>(&self, extra: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut args = vec![
            fake_gtest_bin().to_owned(),
            format!("--gtest_output=xml:{}", self.xml),
            format!("--record={}", self.record),
        ];
        args.extend(extra.into_iter().map(str::to_owned));
        args
    }

    /// Returns the filter each fake-gtest invocation received, with `None` for no filter.
    pub fn recorded_filters(&self) -> Vec<Option<String>> {
        read_to_string(&self.record)
            .lines()
            .map(|line| (line != NO_FILTER_RECORD).then(|| line.to_owned()))
            .collect()
    }
}

pub fn read_to_string(path: &Utf8Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|err| panic!("failed to read {path}: {err}"))
}

/// Waits until `path` exists and contains `needle`.
pub fn wait_for_contents(path: &Utf8Path, needle: &str) {
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        if std::fs::read_to_string(path).is_ok_and(|contents| contents.contains(needle)) {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {path} to contain {needle:?}"
        );
        std::thread::sleep(Duration::from_millis(50));
    }
}
