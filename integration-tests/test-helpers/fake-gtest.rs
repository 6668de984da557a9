// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A scripted stand-in for a GoogleTest binary. See `integration_tests::fake_gtest`.

use clap::Parser;
use color_eyre::Result;
use integration_tests::fake_gtest::FakeGtest;

fn main() -> Result<()> {
    color_eyre::install()?;

    let code = FakeGtest::parse().run()?;
    std::process::exit(code)
}
