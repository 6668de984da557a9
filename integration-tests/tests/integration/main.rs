// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for crash-retry.
//!
//! These run the `crash-retry-dup` binary, a copy of crash-retry, against `fake-gtest`, a scripted
//! GoogleTest stand-in.

use pretty_assertions::assert_eq;
use quick_xml::{Reader, events::Event};
use std::collections::BTreeMap;

mod fixtures;

use fixtures::*;

#[derive(Debug, Default)]
struct ParsedReport {
    attributes: BTreeMap<String, BTreeMap<String, String>>,
    cdata: String,
}

fn parse_report(xml: &str) -> ParsedReport {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut parsed = ParsedReport::default();
    loop {
        match reader.read_event().expect("report is well-formed") {
            Event::Start(start) | Event::Empty(start) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                let attributes = start
                    .attributes()
                    .map(|attr| {
                        let attr = attr.expect("valid attribute");
                        (
                            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                            attr.unescape_value().expect("valid value").into_owned(),
                        )
                    })
                    .collect();
                parsed.attributes.insert(name, attributes);
            }
            Event::CData(cdata) => {
                parsed.cdata.push_str(&String::from_utf8_lossy(&cdata));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    parsed
}

#[test]
fn clean_pass_on_first_try() {
    let dir = HarnessDir::new();
    let output = dir
        .cli()
        .arg("--")
        .args(dir.fake_gtest_args(["--tests=S.a"]))
        .output();

    assert_eq!(output.exit_status.code(), Some(0));
    let log = read_to_string(&dir.log);
    assert!(log.contains("[ RUN      ] S.a\n[       OK ] S.a (0 ms)\n"), "{log}");
    assert_eq!(output.stdout_as_str(), log, "stdout and log match");
    assert_eq!(dir.recorded_filters(), vec![None]);
}

#[test]
fn two_crashes_then_pass() {
    let dir = HarnessDir::new();
    let output = dir
        .cli()
        .args(["--filter_file", dir.filter_file.as_str(), "--"])
        .args(dir.fake_gtest_args(["--tests=S.a,S.b,S.c", "--crash=S.b,S.c"]))
        .output();

    assert_eq!(output.exit_status.code(), Some(0));
    assert_eq!(
        dir.recorded_filters(),
        vec![
            None,
            Some("-S.b".to_owned()),
            Some("-S.b:S.c".to_owned())
        ]
    );
    assert_eq!(read_to_string(&dir.filter_file), "-S.b:S.c");

    // The log only holds the final attempt, while stdout holds all of them.
    let log = read_to_string(&dir.log);
    assert!(!log.contains("[ RUN      ] S.b"), "{log}");
    let stdout = output.stdout_as_str();
    assert!(stdout.contains("[ RUN      ] S.b\n*** S.b crashed ***\n"), "{stdout}");
    assert!(stdout.contains("[ RUN      ] S.c\n*** S.c crashed ***\n"), "{stdout}");

    let stderr = output.stderr_as_str();
    assert!(stderr.contains("attempt 1 crashed in S.b"), "{stderr}");
    assert!(stderr.contains("attempt 2 crashed in S.c"), "{stderr}");
    assert!(
        stderr.contains("excluded 2 crashed tests: S.b S.c"),
        "{stderr}"
    );
}

#[test]
fn unidentifiable_crash() {
    let dir = HarnessDir::new();
    let output = dir
        .cli()
        .arg("--")
        .args(dir.fake_gtest_args(["--tests=S.a", "--crash-before-tests"]))
        .unchecked(true)
        .output();

    assert_eq!(output.exit_status.code(), Some(1));
    assert!(!dir.xml.exists(), "no report is written");
    assert_eq!(dir.recorded_filters(), vec![None], "no retries");

    let stderr = output.stderr_as_str();
    assert!(
        stderr.contains("the crashed test could not be identified: no test was started"),
        "{stderr}"
    );
}

#[test]
fn positive_filter_preserved() {
    let dir = HarnessDir::new();
    let output = dir
        .cli()
        .arg("--")
        .args(dir.fake_gtest_args([
            "--tests=S.a,S.b,T.a",
            "--crash=S.b,T.a",
            "--gtest_filter=S.*",
        ]))
        .output();

    assert_eq!(output.exit_status.code(), Some(0));
    assert_eq!(
        dir.recorded_filters(),
        vec![Some("S.*".to_owned()), Some("S.*-S.b".to_owned())]
    );
}

#[test]
fn wildcard_filter_normalized() {
    let dir = HarnessDir::new();
    let output = dir
        .cli()
        .arg("--")
        .args(dir.fake_gtest_args([
            "--gtest_filter=*",
            "--tests=Suite.Name,Suite.Other",
            "--crash=Suite.Name",
        ]))
        .output();

    assert_eq!(output.exit_status.code(), Some(0));
    assert_eq!(
        dir.recorded_filters(),
        vec![None, Some("-Suite.Name".to_owned())]
    );
}

#[test]
fn retries_exhausted() {
    let dir = HarnessDir::new();
    let output = dir
        .cli()
        .args(["--max_retries=1", "--"])
        .args(dir.fake_gtest_args(["--tests=S.a,S.b,S.c", "--crash=S.b,S.c"]))
        .unchecked(true)
        .output();

    assert_eq!(output.exit_status.code(), Some(1));
    assert_eq!(
        dir.recorded_filters(),
        vec![None, Some("-S.b".to_owned())]
    );

    let report = parse_report(&read_to_string(&dir.xml));
    let testsuites = &report.attributes["testsuites"];
    assert_eq!(testsuites["tests"], "1");
    assert_eq!(testsuites["failures"], "0");
    assert_eq!(testsuites["errors"], "1");
    assert_eq!(report.attributes["testsuite"]["name"], "S");
    assert_eq!(report.attributes["testcase"]["name"], "c");
    assert_eq!(report.attributes["testcase"]["classname"], "S");
    assert_eq!(report.attributes["error"]["message"], "Test crashed");
    assert_eq!(report.cdata, "*** S.c crashed ***\n");

    let stderr = output.stderr_as_str();
    assert!(stderr.contains("all 2 attempts crashed"), "{stderr}");
}

#[test]
fn max_retries_from_env() {
    let dir = HarnessDir::new();
    let output = dir
        .cli()
        .env("CRASH_RETRY_MAX_RETRIES", "0")
        .arg("--")
        .args(dir.fake_gtest_args(["--tests=S.a", "--crash=S.a"]))
        .unchecked(true)
        .output();

    assert_eq!(output.exit_status.code(), Some(1));
    assert_eq!(dir.recorded_filters(), vec![None]);
    assert_eq!(parse_report(&read_to_string(&dir.xml)).cdata, "*** S.a crashed ***\n");
}

#[test]
fn child_exit_code_passed_through() {
    let dir = HarnessDir::new();
    let output = dir
        .cli()
        .arg("--")
        .args(dir.fake_gtest_args(["--tests=S.a,S.b", "--fail=S.a", "--exit-code=7"]))
        .unchecked(true)
        .output();

    assert_eq!(output.exit_status.code(), Some(7));
    assert_eq!(dir.recorded_filters(), vec![None], "failures are not retried");
}

#[test]
fn stale_xml_is_not_success() {
    let dir = HarnessDir::new();
    std::fs::create_dir_all(dir.xml.parent().unwrap()).unwrap();
    std::fs::write(&dir.xml, "stale").unwrap();

    let output = dir
        .cli()
        .arg("--")
        .args(dir.fake_gtest_args(["--crash-before-tests"]))
        .unchecked(true)
        .output();

    assert_eq!(output.exit_status.code(), Some(1));
    assert!(!dir.xml.exists(), "stale XML was removed");
}

#[test]
fn spawn_failure() {
    let dir = HarnessDir::new();
    let missing = dir.log.with_file_name("no-such-binary");
    let output = dir
        .cli()
        .args(["--", missing.as_str()])
        .unchecked(true)
        .output();

    assert_eq!(output.exit_status.code(), Some(1));
    let stderr = output.stderr_as_str();
    assert!(stderr.contains("failed to start"), "{stderr}");
    assert!(
        stderr.contains("the crashed test could not be identified"),
        "{stderr}"
    );
}

#[test]
fn empty_command() {
    let dir = HarnessDir::new();
    let output = dir.cli().arg("--").unchecked(true).output();

    assert_eq!(output.exit_status.code(), Some(1));
    let stderr = output.stderr_as_str();
    assert!(stderr.contains("no command was specified to run"), "{stderr}");
}

#[test]
fn placeholder_test_name_is_unidentified() {
    let dir = HarnessDir::new();
    let output = dir
        .cli()
        .arg("--")
        .args(dir.fake_gtest_args(["--tests=UnknownTest", "--crash=UnknownTest"]))
        .unchecked(true)
        .output();

    assert_eq!(output.exit_status.code(), Some(1));
    assert_eq!(dir.recorded_filters(), vec![None], "no retries");
    assert!(!dir.xml.exists(), "no report is written");
}

#[cfg(unix)]
#[test]
fn sigterm_kills_child_without_retrying() {
    let dir = HarnessDir::new();
    let child = dir
        .cli()
        .arg("--")
        .args(dir.fake_gtest_args(["--tests=S.a,S.b", "--hang=S.b"]))
        .spawn();

    wait_for_contents(&dir.log, "[ RUN      ] S.b");
    let status = std::process::Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .expect("ran kill");
    assert!(status.success(), "kill exited with {status}");

    let output = child.wait_with_output().expect("harness exited");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(143), "{stderr}");
    assert!(
        stderr.contains("received SIGTERM during attempt 1"),
        "{stderr}"
    );
    assert_eq!(dir.recorded_filters(), vec![None], "no retries");
    assert!(!dir.xml.exists(), "no report is written");
}
