use std::fmt;

use crate::channel::ChannelError;
use crate::core::SnapshotError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    InvalidArgs,
    Failed,
    DeviceUnreachable,
}

impl ExitCode {
    pub const fn as_i32(self) -> i32 {
        match self {
            ExitCode::Success => 0,
            ExitCode::InvalidArgs => 2,
            ExitCode::Failed => 10,
            ExitCode::DeviceUnreachable => 20,
        }
    }
}

#[derive(Debug)]
pub struct ExitError {
    pub code: ExitCode,
    pub err: anyhow::Error,
}

impl ExitError {
    pub fn new(code: ExitCode, err: anyhow::Error) -> Self {
        Self { code, err }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.err.fmt(f)
    }
}

impl std::error::Error for ExitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.err.as_ref())
    }
}

/// Explicit `ExitError` first, then typed library errors anywhere in the chain.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(exit) = err.downcast_ref::<ExitError>() {
        return exit.code.as_i32();
    }
    for cause in err.chain() {
        if let Some(channel) = cause.downcast_ref::<ChannelError>() {
            return match channel {
                ChannelError::UnsupportedCommand(_) => ExitCode::InvalidArgs,
                _ => ExitCode::DeviceUnreachable,
            }
            .as_i32();
        }
        if cause.downcast_ref::<SnapshotError>().is_some() {
            return ExitCode::InvalidArgs.as_i32();
        }
    }
    ExitCode::Failed.as_i32()
}

pub fn invalid_args(message: impl Into<String>) -> anyhow::Error {
    ExitError::new(ExitCode::InvalidArgs, anyhow::anyhow!(message.into())).into()
}

pub fn invalid_args_err(err: anyhow::Error) -> anyhow::Error {
    ExitError::new(ExitCode::InvalidArgs, err).into()
}
