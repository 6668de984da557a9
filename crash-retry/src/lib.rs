// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs a GoogleTest binary, retrying without the tests it crashes in.
//!
//! The logic lives in [crash-retry-runner](crash_retry_runner). This crate is the command-line
//! frontend: it parses arguments, sets up logging and reports progress.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;
mod reporter;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
