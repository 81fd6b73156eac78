//! Error types for the exporter operator.

use std::path::PathBuf;
use thiserror::Error;

use crate::lifecycle::ProvisionStep;

/// Main error type for the operator.
#[derive(Error, Debug)]
pub enum OperatorError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors.
    #[error("Validation error: {kind}")]
    Validation { kind: ValidationErrorKind },

    /// Archive could not be downloaded (network, HTTP status, timeout).
    #[error("Download error: {message}")]
    Download { message: String },

    /// Archive is corrupt or does not have the expected layout.
    #[error("Archive error: {message}")]
    Archive { message: String },

    /// Placing a provisioned file on disk failed.
    #[error("Install I/O error on '{}': {source}", .path.display())]
    InstallIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A step of the install sequence failed; later steps were not run.
    #[error("Provisioning failed at step '{step}': {source}")]
    Provision {
        step: ProvisionStep,
        #[source]
        source: Box<OperatorError>,
    },

    /// A teardown step failed; later teardown steps were not run.
    #[error("Teardown failed at step '{step}': {source}")]
    Teardown {
        step: ProvisionStep,
        #[source]
        source: Box<OperatorError>,
    },

    /// Template rendering errors.
    #[error("Config render error: {kind}")]
    Render { kind: TemplateErrorKind },

    /// The installed binary did not report a dotted version triple.
    #[error("Could not parse exporter version from output: {output:?}")]
    VersionParse { output: String },

    /// Service supervisor command exited non-zero.
    #[error("systemctl {action} {unit} failed (exit {exit_code:?}): {message}")]
    ServiceControl {
        unit: String,
        action: String,
        exit_code: Option<i32>,
        message: String,
    },

    /// Subprocess execution errors.
    #[error("Command error: {kind}")]
    Command { kind: CommandErrorKind },

    /// Event is not allowed from the current lifecycle phase.
    #[error("Event '{event}' is not allowed while {phase}")]
    InvalidTransition { event: String, phase: String },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Validation error kinds.
#[derive(Error, Debug)]
pub enum ValidationErrorKind {
    #[error("Invalid listen address '{value}': {message}")]
    InvalidListenAddress { value: String, message: String },

    #[error("Invalid account name '{name}': {message}")]
    InvalidAccountName { name: String, message: String },

    #[error("Privilege grant rejected for '{command}': {message}")]
    GrantRejected { command: String, message: String },

    #[error("Unknown option '{key}'")]
    UnknownOption { key: String },

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },
}

/// Template error kinds.
#[derive(Error, Debug)]
pub enum TemplateErrorKind {
    #[error("Template not found: {name}")]
    NotFound { name: String },

    #[error("Template '{template}' requires variable '{variable}'")]
    MissingVariable { template: String, variable: String },

    #[error("Failed to render template '{template}': {message}")]
    RenderFailed { template: String, message: String },
}

/// Command error kinds.
#[derive(Error, Debug)]
pub enum CommandErrorKind {
    #[error("Command execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("Command timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}

impl OperatorError {
    /// Stable error code reported to the orchestration agent and the journal.
    pub fn code(&self) -> &'static str {
        match self {
            OperatorError::Config { .. } => "CONFIG_ERROR",
            OperatorError::Validation { .. } => "VALIDATION_ERROR",
            OperatorError::Download { .. } => "DOWNLOAD_ERROR",
            OperatorError::Archive { .. } => "ARCHIVE_ERROR",
            OperatorError::InstallIo { .. } => "INSTALL_IO_ERROR",
            OperatorError::Provision { .. } => "PROVISION_ERROR",
            OperatorError::Teardown { .. } => "TEARDOWN_ERROR",
            OperatorError::Render { kind } => match kind {
                TemplateErrorKind::NotFound { .. } => "TEMPLATE_NOT_FOUND",
                TemplateErrorKind::MissingVariable { .. } => "MISSING_VARIABLE",
                TemplateErrorKind::RenderFailed { .. } => "CONFIG_RENDER_ERROR",
            },
            OperatorError::VersionParse { .. } => "VERSION_PARSE_ERROR",
            OperatorError::ServiceControl { .. } => "SERVICE_CONTROL_ERROR",
            OperatorError::Command { .. } => "COMMAND_ERROR",
            OperatorError::InvalidTransition { .. } => "INVALID_TRANSITION",
            OperatorError::Io(_) => "IO_ERROR",
            OperatorError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Wrap this error as the failure of a named provisioning step.
    ///
    /// An error that already names a step is returned unchanged.
    pub fn at_step(self, step: ProvisionStep) -> Self {
        match self {
            err @ OperatorError::Provision { .. } => err,
            other => OperatorError::Provision {
                step,
                source: Box::new(other),
            },
        }
    }

    /// Wrap this error as the failure of a named teardown step.
    pub fn at_teardown_step(self, step: ProvisionStep) -> Self {
        match self {
            err @ OperatorError::Teardown { .. } => err,
            other => OperatorError::Teardown {
                step,
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn install_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OperatorError::InstallIo {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for operator operations.
pub type OperatorResult<T> = Result<T, OperatorError>;
