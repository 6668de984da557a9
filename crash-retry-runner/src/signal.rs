// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handling shutdown signals while a child is running.

use crate::{errors::SignalHandlerSetupError, exit_codes::HarnessExitCode};
use std::fmt;

/// The kind of signal handling to set up for a harness run.
///
/// A `SignalHandlerKind` can be passed into
/// [`RetryHarnessBuilder::set_signal_handler`](crate::supervisor::RetryHarnessBuilder::set_signal_handler).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum SignalHandlerKind {
    /// The standard signal handler. Captures interrupt and termination signals depending on the
    /// platform.
    #[default]
    Standard,

    /// A no-op signal handler. Useful for tests and for embedding the harness in a program that
    /// handles signals itself.
    Noop,
}

impl SignalHandlerKind {
    pub(crate) fn build(self) -> Result<SignalHandler, SignalHandlerSetupError> {
        match self {
            Self::Standard => SignalHandler::new(),
            Self::Noop => Ok(SignalHandler::noop()),
        }
    }
}

/// The signal handler implementation.
#[derive(Debug)]
pub(crate) struct SignalHandler {
    signals: Option<imp::Signals>,
}

impl SignalHandler {
    /// Creates a new `SignalHandler` that handles Ctrl-C and other signals.
    pub(crate) fn new() -> Result<Self, SignalHandlerSetupError> {
        let signals = imp::Signals::new()?;
        Ok(Self {
            signals: Some(signals),
        })
    }

    /// Creates a new `SignalHandler` that never produces events.
    pub(crate) fn noop() -> Self {
        Self { signals: None }
    }

    /// Waits for the next shutdown signal.
    ///
    /// Returns `None` once no more signals can arrive.
    pub(crate) async fn recv(&mut self) -> Option<ShutdownEvent> {
        match &mut self.signals {
            Some(signals) => signals.recv().await,
            None => None,
        }
    }
}

#[cfg(unix)]
mod imp {
    use super::*;
    use tokio::signal::unix::{Signal, SignalKind, signal};

    /// Signals for SIGINT, SIGTERM and SIGHUP on Unix.
    #[derive(Debug)]
    pub(super) struct Signals {
        sigint: SignalWithDone,
        sighup: SignalWithDone,
        sigterm: SignalWithDone,
    }

    impl Signals {
        pub(super) fn new() -> std::io::Result<Self> {
            let sigint = SignalWithDone::new(SignalKind::interrupt())?;
            let sighup = SignalWithDone::new(SignalKind::hangup())?;
            let sigterm = SignalWithDone::new(SignalKind::terminate())?;

            Ok(Self {
                sigint,
                sighup,
                sigterm,
            })
        }

        pub(super) async fn recv(&mut self) -> Option<ShutdownEvent> {
            loop {
                tokio::select! {
                    recv = self.sigint.signal.recv(), if !self.sigint.done => {
                        match recv {
                            Some(()) => break Some(ShutdownEvent::Interrupt),
                            None => self.sigint.done = true,
                        }
                    }
                    recv = self.sighup.signal.recv(), if !self.sighup.done => {
                        match recv {
                            Some(()) => break Some(ShutdownEvent::Hangup),
                            None => self.sighup.done = true,
                        }
                    }
                    recv = self.sigterm.signal.recv(), if !self.sigterm.done => {
                        match recv {
                            Some(()) => break Some(ShutdownEvent::Term),
                            None => self.sigterm.done = true,
                        }
                    }
                    else => {
                        break None
                    }
                }
            }
        }
    }

    #[derive(Debug)]
    struct SignalWithDone {
        signal: Signal,
        done: bool,
    }

    impl SignalWithDone {
        fn new(kind: SignalKind) -> std::io::Result<Self> {
            let signal = signal(kind)?;
            Ok(Self {
                signal,
                done: false,
            })
        }
    }
}

#[cfg(windows)]
mod imp {
    use super::*;
    use tokio::signal::windows::{CtrlC, ctrl_c};

    #[derive(Debug)]
    pub(super) struct Signals {
        ctrl_c: CtrlC,
        ctrl_c_done: bool,
    }

    impl Signals {
        pub(super) fn new() -> std::io::Result<Self> {
            let ctrl_c = ctrl_c()?;
            Ok(Self {
                ctrl_c,
                ctrl_c_done: false,
            })
        }

        pub(super) async fn recv(&mut self) -> Option<ShutdownEvent> {
            if self.ctrl_c_done {
                return None;
            }

            match self.ctrl_c.recv().await {
                Some(()) => Some(ShutdownEvent::Interrupt),
                None => {
                    self.ctrl_c_done = true;
                    None
                }
            }
        }
    }
}

/// A signal that stops the harness.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ShutdownEvent {
    /// SIGHUP.
    #[cfg(unix)]
    Hangup,

    /// SIGTERM.
    #[cfg(unix)]
    Term,

    /// SIGINT, or Ctrl-C on Windows.
    Interrupt,
}

impl ShutdownEvent {
    /// Returns the exit code the harness uses after receiving this signal.
    pub fn exit_code(self) -> i32 {
        let signal = match self {
            #[cfg(unix)]
            Self::Hangup => 1,
            #[cfg(unix)]
            Self::Term => 15,
            Self::Interrupt => 2,
        };
        HarnessExitCode::SIGNAL_BASE + signal
    }
}

impl fmt::Display for ShutdownEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(unix)]
            Self::Hangup => write!(f, "SIGHUP"),
            #[cfg(unix)]
            Self::Term => write!(f, "SIGTERM"),
            #[cfg(unix)]
            Self::Interrupt => write!(f, "SIGINT"),
            #[cfg(not(unix))]
            Self::Interrupt => write!(f, "Ctrl-C"),
        }
    }
}
