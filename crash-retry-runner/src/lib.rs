// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for [crash-retry](https://crates.io/crates/crash-retry).
//!
//! crash-retry runs a GoogleTest binary, works out which test was running when the binary
//! crashed, and runs the binary again with that test excluded through `--gtest_filter`. Once the
//! retry budget is used up, it writes a JUnit XML report describing the last crash.
//!
//! The entry point is [`RetryHarnessBuilder`](supervisor::RetryHarnessBuilder).

pub mod config;
pub mod diagnose;
pub mod errors;
pub mod exit_codes;
pub mod gtest_filter;
pub mod junit;
pub mod signal;
pub mod supervisor;
mod test_command;
