// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running a single attempt of the child and teeing its output.

use crate::{
    errors::RunChildError,
    signal::{ShutdownEvent, SignalHandler},
};
use camino::Utf8Path;
use std::{
    fs::File,
    io::{self, Write},
    process::{ExitStatus, Stdio},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        use unix as os;
    } else if #[cfg(windows)] {
        mod windows;
        use windows as os;
    } else {
        compile_error!("unsupported target platform");
    }
}

/// How a single attempt of the child ended.
#[derive(Debug)]
pub(crate) enum ChildExit {
    /// The child ran to completion with this exit code.
    Exited(i32),

    /// The child could not be started.
    SpawnFailed(io::Error),

    /// A shutdown signal arrived while the child was running. The child has been killed.
    Interrupted(ShutdownEvent),
}

/// Makes sure the XML output path can be written to and does not exist yet.
pub(crate) fn prepare_attempt(xml_output_path: &Utf8Path) -> Result<(), RunChildError> {
    create_parent_dir(xml_output_path)?;

    match std::fs::remove_file(xml_output_path) {
        Ok(()) => {
            debug!("removed existing XML output at {xml_output_path}");
            Ok(())
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(RunChildError::RemoveStaleXml {
            path: xml_output_path.to_owned(),
            error,
        }),
    }
}

/// Returns true if the child wrote its XML output.
pub(crate) fn attempt_succeeded(xml_output_path: &Utf8Path) -> bool {
    xml_output_path.exists()
}

/// Runs the child described by `argv` to completion.
///
/// The child's stdout and stderr are merged into a single pipe. Every line read from it is written
/// to `log_path` and to `echo`, in order.
pub(crate) async fn run_child(
    argv: &[String],
    log_path: &Utf8Path,
    echo: &mut dyn Write,
    signal_handler: &mut SignalHandler,
) -> Result<ChildExit, RunChildError> {
    let Some((program, args)) = argv.split_first() else {
        return Ok(ChildExit::SpawnFailed(io::Error::new(
            io::ErrorKind::InvalidInput,
            "empty command line",
        )));
    };

    create_parent_dir(log_path)?;
    let mut log = File::create(log_path).map_err(|error| RunChildError::OpenLog {
        path: log_path.to_owned(),
        error,
    })?;

    let (rx, tx) = io::pipe().map_err(RunChildError::CreatePipe)?;
    let tx_stderr = tx.try_clone().map_err(RunChildError::CreatePipe)?;

    debug!("running `{}`", shell_words::join(argv));

    // The command owns our copies of the write ends, so it must be dropped before reading, or the
    // pipe never reaches EOF.
    let spawned = {
        let mut cmd = std::process::Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(tx)
            .stderr(tx_stderr);
        let mut cmd: tokio::process::Command = cmd.into();
        cmd.kill_on_drop(true);
        cmd.spawn()
    };
    let mut child = match spawned {
        Ok(child) => child,
        Err(error) => return Ok(ChildExit::SpawnFailed(error)),
    };

    let mut reader = BufReader::new(tokio::fs::File::from_std(os::pipe_reader_to_file(rx)));
    let mut line = Vec::new();

    loop {
        line.clear();
        tokio::select! {
            read = reader.read_until(b'\n', &mut line) => {
                let n = read.map_err(RunChildError::ReadOutput)?;
                if n == 0 {
                    break;
                }

                log.write_all(&line).map_err(|error| RunChildError::WriteLog {
                    path: log_path.to_owned(),
                    error,
                })?;
                echo.write_all(&line)
                    .and_then(|()| echo.flush())
                    .map_err(RunChildError::Echo)?;
            }
            Some(event) = signal_handler.recv() => {
                debug!("received {event}, killing child");
                // The child may already have exited, in which case there's nothing to kill.
                _ = child.start_kill();
                child.wait().await.map_err(RunChildError::Wait)?;
                return Ok(ChildExit::Interrupted(event));
            }
        }
    }

    let status = child.wait().await.map_err(RunChildError::Wait)?;
    debug!("child exited with {status}");
    Ok(ChildExit::Exited(exit_code(status)))
}

fn create_parent_dir(path: &Utf8Path) -> Result<(), RunChildError> {
    match path.parent() {
        Some(dir) if !dir.as_str().is_empty() => {
            std::fs::create_dir_all(dir).map_err(|error| RunChildError::CreateDir {
                dir: dir.to_owned(),
                error,
            })
        }
        _ => Ok(()),
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    os::exit_code(status)
}
