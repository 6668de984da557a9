// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::exit_codes::HarnessExitCode;
use std::{fs::File, io::PipeReader, os::windows::io::OwnedHandle, process::ExitStatus};

pub(super) fn pipe_reader_to_file(rx: PipeReader) -> File {
    File::from(OwnedHandle::from(rx))
}

pub(super) fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(HarnessExitCode::FAILURE)
}
