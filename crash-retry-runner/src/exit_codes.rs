// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exit codes used by crash-retry.

/// Exit codes used by the harness itself, as opposed to those passed through from the child.
pub enum HarnessExitCode {}

impl HarnessExitCode {
    /// No crashed test could be identified, retries were exhausted, or the harness failed.
    pub const FAILURE: i32 = 1;

    /// Added to the signal number when the harness is stopped by a signal.
    pub const SIGNAL_BASE: i32 = 128;
}
