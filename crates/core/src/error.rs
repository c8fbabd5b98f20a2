// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use thiserror::Error;

/// Unified error codes shared across HTTP, SSH, and gRPC transports (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorCode {
    InvalidRequest,
    TabNotFound,
    RepoNotFound,
    InvalidState,
    RunnerUnauthorized,
    RunnerContainerSocket,
    RunnerContainerStart,
    RunnerStreamError,
    AuthFailed,
    TOTPFailed,
    Internal,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest => 400,
            Self::TabNotFound | Self::RepoNotFound => 404,
            Self::InvalidState => 409,
            Self::RunnerUnauthorized => 502,
            Self::RunnerContainerSocket => 504,
            Self::RunnerContainerStart => 502,
            Self::RunnerStreamError => 502,
            Self::AuthFailed | Self::TOTPFailed => 401,
            Self::Internal => 500,
        }
    }

    pub fn grpc_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_ARGUMENT",
            Self::TabNotFound | Self::RepoNotFound => "NOT_FOUND",
            Self::InvalidState => "FAILED_PRECONDITION",
            Self::RunnerUnauthorized => "UNAUTHENTICATED",
            Self::RunnerContainerSocket => "UNAVAILABLE",
            Self::RunnerContainerStart => "UNAVAILABLE",
            Self::RunnerStreamError => "ABORTED",
            Self::AuthFailed | Self::TOTPFailed => "UNAUTHENTICATED",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::TabNotFound => "TAB_NOT_FOUND",
            Self::RepoNotFound => "REPO_NOT_FOUND",
            Self::InvalidState => "INVALID_STATE",
            Self::RunnerUnauthorized => "RUNNER_UNAUTHORIZED",
            Self::RunnerContainerSocket => "RUNNER_CONTAINER_SOCKET",
            Self::RunnerContainerStart => "RUNNER_CONTAINER_START",
            Self::RunnerStreamError => "RUNNER_STREAM_ERROR",
            Self::AuthFailed => "AUTH_FAILED",
            Self::TOTPFailed => "TOTP_FAILED",
            Self::Internal => "INTERNAL",
        }
    }

    /// A short user-facing hint appended to buffer lines for runner failures (§7).
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::RunnerUnauthorized => Some("run `codex login` in the container and retry"),
            Self::RunnerContainerSocket => Some("check runner logs for startup failures"),
            Self::RunnerContainerStart => Some("check container runtime logs"),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The core's error type. Every public service method returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct CoreError {
    pub code: ErrorCode,
    pub message: String,
}

impl CoreError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn tab_not_found(tab: impl fmt::Display) -> Self {
        Self::new(ErrorCode::TabNotFound, format!("tab not found: {tab}"))
    }

    pub fn repo_not_found(name: impl fmt::Display) -> Self {
        Self::new(ErrorCode::RepoNotFound, format!("repo not found: {name}"))
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Render this error as a buffer line, including the recovery hint (§7).
    pub fn to_buffer_line(&self) -> String {
        match self.code.hint() {
            Some(hint) => format!("error: {} ({hint})", self.message),
            None => format!("error: {}", self.message),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
