// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::exit_codes::HarnessExitCode;
use std::{
    fs::File,
    io::PipeReader,
    os::{fd::OwnedFd, unix::process::ExitStatusExt},
    process::ExitStatus,
};

pub(super) fn pipe_reader_to_file(rx: PipeReader) -> File {
    File::from(OwnedFd::from(rx))
}

/// Follows the shell convention of reporting death by signal as `128 + signal`.
pub(super) fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => HarnessExitCode::SIGNAL_BASE + signal,
        (None, None) => HarnessExitCode::FAILURE,
    }
}
