use std::fmt;

use thiserror::Error;

use crate::position::FilePosition;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Broad classification of a recorded issue, mirroring the stages that can
/// produce one.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IssueKind {
    /// Malformed XML input.
    Xml,
    /// Missing toolkit, type, attribute, child, or role name.
    UnknownReference,
    /// Diamond or override conflict between inherited specifications.
    InheritanceConflict,
    /// Child count outside the role's `[min, max]`.
    Cardinality,
    /// A value failed to parse against its declared value type.
    TypeCoercion,
    /// Unresolved or mismatched external content.
    Promise,
}

/// A single positioned error or warning.
#[derive(Clone, Debug)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub position: FilePosition,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}: {tag}: {}", self.position, self.message)
    }
}

/// The failure value of `read_toolkit()` and `read_document()`: every issue
/// recorded during the run, in source order, at least one of which is an
/// error.
#[derive(Debug)]
pub struct CompositeError {
    pub issues: Vec<Issue>,
}

impl CompositeError {
    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
    }
}

impl fmt::Display for CompositeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s):", self.errors().count())?;
        for issue in &self.issues {
            write!(f, "\n  {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompositeError {}

/// Failure of a [`ToolkitResolver`](crate::session::ToolkitResolver) or
/// [`ExternalResolver`](crate::promise::ExternalResolver).
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no source found for {0}")]
    NotFound(String),
    #[error("failed to read {0}: {1}")]
    Io(String, String),
}

/// Accumulates issues in source order. Builds and parses succeed only if no
/// error-severity issue was recorded; warnings are carried through to the
/// caller on success.
#[derive(Debug, Default)]
pub struct ErrorReporting {
    issues: Vec<Issue>,
}

impl ErrorReporting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, kind: IssueKind, position: FilePosition, message: impl Into<String>) {
        self.issues.push(Issue {
            kind,
            severity: Severity::Error,
            position,
            message: message.into(),
        });
    }

    pub fn warn(&mut self, kind: IssueKind, position: FilePosition, message: impl Into<String>) {
        self.issues.push(Issue {
            kind,
            severity: Severity::Warning,
            position,
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = Issue>) {
        self.issues.extend(issues);
    }

    /// The warnings recorded at or after `start`, for attributing them to
    /// the build that produced them.
    pub fn warnings_since(&self, start: usize) -> Vec<Issue> {
        self.issues[start.min(self.issues.len())..]
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .cloned()
            .collect()
    }

    /// On success returns the recorded warnings; on failure, the whole issue
    /// list wrapped in a [`CompositeError`].
    pub fn finish(self) -> Result<Vec<Issue>, CompositeError> {
        if self.has_errors() {
            Err(CompositeError {
                issues: self.issues,
            })
        } else {
            Ok(self.issues)
        }
    }
}
