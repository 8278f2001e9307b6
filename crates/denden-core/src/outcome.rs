//! Results of a single exchange with the orchestrator and how they map onto
//! process exit codes.

use std::process::ExitCode;

use denden_protocol::{FrameError, ResponseEnvelope, ResponseStatus, TransportCode};
use thiserror::Error;

/// A failure of the exchange itself: nothing usable came back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct TransportFailure {
    pub code: TransportCode,
    pub message: String,
}

impl TransportFailure {
    pub fn new(code: TransportCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(TransportCode::Unavailable, message)
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(TransportCode::DeadlineExceeded, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(TransportCode::Internal, message)
    }
}

impl From<FrameError> for TransportFailure {
    fn from(err: FrameError) -> Self {
        Self::new(err.code, err.message)
    }
}

/// Result of one dispatched call.
///
/// Application-level failures (`ERROR`/`DENIED`) are still `Delivered`; only
/// the exchange failing as a whole yields `TransportFailure`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Delivered(T),
    TransportFailure(TransportFailure),
}

impl<T> From<Result<T, TransportFailure>> for Outcome<T> {
    fn from(result: Result<T, TransportFailure>) -> Self {
        match result {
            Ok(v) => Self::Delivered(v),
            Err(err) => Self::TransportFailure(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Success,
    Failure,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        match exit {
            Exit::Success => ExitCode::SUCCESS,
            Exit::Failure => ExitCode::FAILURE,
        }
    }
}

pub fn exit_for_status(status: ResponseStatus) -> Exit {
    match status {
        ResponseStatus::Ok => Exit::Success,
        ResponseStatus::Error | ResponseStatus::Denied => Exit::Failure,
    }
}

impl Outcome<ResponseEnvelope> {
    pub fn exit(&self) -> Exit {
        match self {
            Self::Delivered(resp) => exit_for_status(resp.status),
            Self::TransportFailure(_) => Exit::Failure,
        }
    }
}

impl<T> Outcome<T> {
    /// Exit code for calls with no application-level status of their own.
    pub fn transport_exit(&self) -> Exit {
        match self {
            Self::Delivered(_) => Exit::Success,
            Self::TransportFailure(_) => Exit::Failure,
        }
    }
}
