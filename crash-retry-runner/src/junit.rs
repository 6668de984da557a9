// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The JUnit report written in place of the child's own when retries run out.

use crate::{diagnose::TestIdentifier, errors::CrashReportError};
use camino::Utf8Path;
use chrono::{DateTime, Utc};
use quick_xml::{
    Writer,
    events::{BytesCData, BytesDecl, BytesEnd, BytesStart, Event},
};
use std::io::{self, Write};
use tracing::debug;

static TESTSUITES_TAG: &str = "testsuites";
static TESTSUITE_TAG: &str = "testsuite";
static TESTCASE_TAG: &str = "testcase";
static ERROR_TAG: &str = "error";

/// The message attached to the `<error>` element.
pub const CRASH_MESSAGE: &str = "Test crashed";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A single-test JUnit report describing a crash.
#[derive(Clone, Debug)]
pub struct CrashReport<'a> {
    test: &'a TestIdentifier,
    excerpt: &'a str,
    timestamp: DateTime<Utc>,
}

impl<'a> CrashReport<'a> {
    /// Creates a new `CrashReport` timestamped with the current time.
    pub fn new(test: &'a TestIdentifier, excerpt: &'a str) -> Self {
        Self {
            test,
            excerpt,
            timestamp: Utc::now(),
        }
    }

    #[cfg(test)]
    fn set_timestamp(&mut self, timestamp: DateTime<Utc>) -> &mut Self {
        self.timestamp = timestamp;
        self
    }

    /// Serializes this report to `writer`.
    pub fn serialize(&self, writer: impl io::Write) -> quick_xml::Result<()> {
        let mut writer = Writer::new_with_indent(writer, b' ', 2);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.serialize_impl(&mut writer)?;

        // Add a trailing newline.
        writer.get_mut().write_all(b"\n")?;
        Ok(())
    }

    #[cfg(test)]
    fn serialize_to_string(&self) -> quick_xml::Result<String> {
        let mut buf = Vec::new();
        self.serialize(&mut buf)?;
        Ok(String::from_utf8(buf).expect("serializer writes UTF-8"))
    }

    /// Writes this report to `path`, replacing any existing file.
    pub fn write_to_path(&self, path: &Utf8Path) -> Result<(), CrashReportError> {
        let mut buf = Vec::new();
        self.serialize(&mut buf).map_err(CrashReportError::Serialize)?;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|error| CrashReportError::Write {
                path: path.to_owned(),
                error: atomicwrites::Error::Internal(error),
            })?;
        }

        atomicwrites::AtomicFile::new(path, atomicwrites::AllowOverwrite)
            .write(|file| file.write_all(&buf))
            .map_err(|error| CrashReportError::Write {
                path: path.to_owned(),
                error,
            })?;

        debug!("wrote crash report for {} to {path}", self.test);
        Ok(())
    }

    fn serialize_impl(&self, writer: &mut Writer<impl io::Write>) -> quick_xml::Result<()> {
        let suite = sanitize(self.test.suite());
        let name = sanitize(self.test.name());
        let timestamp = self.timestamp.format(TIMESTAMP_FORMAT).to_string();

        let mut testsuites_tag = BytesStart::new(TESTSUITES_TAG);
        testsuites_tag.extend_attributes([
            ("tests", "1"),
            ("failures", "0"),
            ("disabled", "0"),
            ("errors", "1"),
            ("time", "0"),
        ]);
        writer.write_event(Event::Start(testsuites_tag))?;

        let mut testsuite_tag = BytesStart::new(TESTSUITE_TAG);
        testsuite_tag.extend_attributes([
            ("name", suite.as_str()),
            ("tests", "1"),
            ("failures", "0"),
            ("disabled", "0"),
            ("errors", "1"),
            ("time", "0"),
            ("timestamp", timestamp.as_str()),
        ]);
        writer.write_event(Event::Start(testsuite_tag))?;

        let mut testcase_tag = BytesStart::new(TESTCASE_TAG);
        testcase_tag.extend_attributes([
            ("name", name.as_str()),
            ("classname", suite.as_str()),
            ("time", "0"),
        ]);
        writer.write_event(Event::Start(testcase_tag))?;

        let mut error_tag = BytesStart::new(ERROR_TAG);
        error_tag.push_attribute(("message", CRASH_MESSAGE));
        writer.write_event(Event::Start(error_tag))?;

        let excerpt = sanitize(&strip_ansi_escapes::strip_str(self.excerpt));
        for section in cdata_sections(&excerpt) {
            writer.write_event(Event::CData(BytesCData::new(section)))?;
        }

        serialize_end_tag(ERROR_TAG, writer)?;
        serialize_end_tag(TESTCASE_TAG, writer)?;
        serialize_end_tag(TESTSUITE_TAG, writer)?;
        serialize_end_tag(TESTSUITES_TAG, writer)?;

        Ok(())
    }
}

fn serialize_end_tag(
    tag_name: &'static str,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    writer.write_event(Event::End(BytesEnd::new(tag_name)))
}

/// Drops characters that cannot appear in an XML 1.0 document.
fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|&c| match c {
            '\t' | '\n' | '\r' => true,
            '\u{fffe}' | '\u{ffff}' => false,
            c => c >= ' ',
        })
        .collect()
}

/// Splits `text` so that no section contains `]]>`.
///
/// Each split happens between `]]` and `>`. At least one section is always returned.
fn cdata_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut rest = text;
    while let Some(index) = rest.find("]]>") {
        let (section, remaining) = rest.split_at(index + 2);
        sections.push(section);
        rest = remaining;
    }
    sections.push(rest);
    sections
}
