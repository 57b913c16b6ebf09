use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The requested path resolves outside the sandbox root.
    AccessDenied,
    /// The requested file does not exist.
    NotFound,
    /// The input could not be decoded, e.g. a file that is not UTF-8 or an
    /// image in an unsupported format.
    DecodeError,
    /// An arithmetic expression could not be evaluated.
    EvaluationError,
    /// Text could not be spoken.
    SynthesisError,
    /// The model asked for a tool that isn't registered.
    UnknownTool,
    /// The input provided to the tool was invalid.
    InvalidInput,
    /// Error occurred while executing the tool.
    ExecutionError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::AccessDenied => "access denied",
            ErrorKind::NotFound => "not found",
            ErrorKind::DecodeError => "decode error",
            ErrorKind::EvaluationError => "evaluation error",
            ErrorKind::SynthesisError => "synthesis error",
            ErrorKind::UnknownTool => "unknown tool",
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::ExecutionError => "execution error",
        };
        f.write_str(s)
    }
}

/// Describes a tool call error.
///
/// Errors never abort a turn. They are rendered with [`Display`] into the
/// tool result and handed back to the model, as `<kind>: <reason>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
}

macro_rules! ctor {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[inline]
        pub fn $name() -> Self {
            Self::new(ErrorKind::$kind)
        }
    };
}

impl Error {
    /// Creates a new error of `kind` without a reason.
    #[inline]
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, reason: None }
    }

    ctor!(
        /// Creates a new error with the `AccessDenied` kind.
        access_denied => AccessDenied
    );
    ctor!(
        /// Creates a new error with the `NotFound` kind.
        not_found => NotFound
    );
    ctor!(
        /// Creates a new error with the `DecodeError` kind.
        decode_error => DecodeError
    );
    ctor!(
        /// Creates a new error with the `EvaluationError` kind.
        evaluation_error => EvaluationError
    );
    ctor!(
        /// Creates a new error with the `SynthesisError` kind.
        synthesis_error => SynthesisError
    );
    ctor!(
        /// Creates a new error with the `UnknownTool` kind.
        unknown_tool => UnknownTool
    );
    ctor!(
        /// Creates a new error with the `InvalidInput` kind.
        invalid_input => InvalidInput
    );
    ctor!(
        /// Creates a new error with the `ExecutionError` kind.
        execution_error => ExecutionError
    );

    /// Attaches a reason to the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(self, reason: S) -> Self {
        Self {
            kind: self.kind,
            reason: Some(reason.into()),
        }
    }

    /// Returns the kind of the error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason for the error.
    #[inline]
    pub fn reason(&self) -> Cow<'_, str> {
        match self.reason.as_deref() {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Owned(format!("{}", self.kind)),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason())
    }
}

impl StdError for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::not_found().with_reason("File not found at a.txt");
        assert_eq!(err.to_string(), "not found: File not found at a.txt");
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = Error::execution_error();
        assert_eq!(err.reason(), "execution error");
        assert_eq!(err.to_string(), "execution error: execution error");
    }
}
