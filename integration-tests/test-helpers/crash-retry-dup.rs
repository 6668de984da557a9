// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! This is a duplicate of crash-retry's main.rs, so that integration tests can find the binary
//! through `CARGO_BIN_EXE_crash-retry-dup`.

use color_eyre::Result;

fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = enable_ansi_support::enable_ansi_support();

    crash_retry::main_impl()
}
