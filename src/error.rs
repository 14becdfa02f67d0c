// Error types shared by the rendering engine. Template problems, missing
// named templates, unserializable data and sink failures are kept apart so
// callers can tell a bad template from a broken terminal.

use std::fmt;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("template {0:?} not found")]
    TemplateNotFound(String),

    #[error("failed to bind template data: {0}")]
    Data(#[from] serde_json::Error),

    #[error("failed to write to output: {0}")]
    Sink(#[from] std::io::Error),
}

/// A malformed template source or a failure while executing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateError {
    pub template: String,
    pub kind: TemplateErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateErrorKind {
    Parse,
    Exec,
}

impl TemplateError {
    pub(crate) fn parse(template: &str, message: impl Into<String>) -> Self {
        TemplateError {
            template: template.to_string(),
            kind: TemplateErrorKind::Parse,
            message: message.into(),
        }
    }

    pub(crate) fn exec(template: &str, message: impl Into<String>) -> Self {
        TemplateError {
            template: template.to_string(),
            kind: TemplateErrorKind::Exec,
            message: message.into(),
        }
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self.kind {
            TemplateErrorKind::Parse => "parse",
            TemplateErrorKind::Exec => "exec",
        };
        write!(f, "template {}: {} error: {}", self.template, stage, self.message)
    }
}

impl std::error::Error for TemplateError {}
