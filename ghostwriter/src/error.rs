use std::borrow::Cow;
use std::fmt;

/// Represents a failed pipeline step.
///
/// The display form of an error is exactly the message that is stored in the
/// [`ValidationState`](crate::ValidationState) and is meant to be shown to
/// users verbatim.  Two errors raised for the same input always carry the
/// same text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{detail}")]
pub struct Error {
    kind: ErrorKind,
    detail: Cow<'static, str>,
}

/// An enum describing the error kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The template or the rendered output exceeds a configured ceiling.
    Size,
    /// The template bytes are not clean UTF-8.
    Encoding,
    /// The template failed to parse.
    Syntax,
    /// The template uses a forbidden construct.
    StaticSecurity,
    /// The template or context touches a restricted name.
    RuntimeSecurity,
    /// Evaluation failed.
    Evaluation,
    /// The requested format type does not exist.
    Format,
}

impl ErrorKind {
    fn description(self) -> &'static str {
        match self {
            ErrorKind::Size => "size limit exceeded",
            ErrorKind::Encoding => "invalid encoding",
            ErrorKind::Syntax => "syntax error",
            ErrorKind::StaticSecurity => "forbidden construct",
            ErrorKind::RuntimeSecurity => "restricted name",
            ErrorKind::Evaluation => "evaluation failed",
            ErrorKind::Format => "unsupported format",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl Error {
    /// Creates a new error with kind and detail.
    pub fn new<D: Into<Cow<'static, str>>>(kind: ErrorKind, detail: D) -> Error {
        Error {
            kind,
            detail: detail.into(),
        }
    }

    pub(crate) fn size(detail: String) -> Error {
        Error::new(ErrorKind::Size, detail)
    }

    pub(crate) fn encoding(detail: &'static str) -> Error {
        Error::new(ErrorKind::Encoding, detail)
    }

    pub(crate) fn static_security(detail: String) -> Error {
        Error::new(ErrorKind::StaticSecurity, detail)
    }

    pub(crate) fn runtime_security(detail: String) -> Error {
        Error::new(ErrorKind::RuntimeSecurity, detail)
    }

    pub(crate) fn evaluation<D: Into<Cow<'static, str>>>(detail: D) -> Error {
        Error::new(ErrorKind::Evaluation, detail)
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the human readable message.
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl From<minijinja::Error> for Error {
    fn from(err: minijinja::Error) -> Self {
        if err.kind() == minijinja::ErrorKind::SyntaxError {
            Error::new(ErrorKind::Syntax, err.to_string())
        } else {
            let detail = match err.detail() {
                Some(detail) => detail.to_string(),
                None => err.kind().to_string(),
            };
            Error::evaluation(format!("Template rendering error: {detail}"))
        }
    }
}
