use std::fmt;

/// Error kind for driver-side failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or storage I/O while fetching out-of-line content.
    Io,
    /// Content could not be decoded (bad UTF-8, malformed payload).
    Format,
    /// Reading the member itself failed (closed cursor, revoked handle).
    Access,
    /// Anything else.
    Logic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Format => f.write_str("format"),
            ErrorKind::Access => f.write_str("access"),
            ErrorKind::Logic => f.write_str("logic"),
        }
    }
}

/// Error raised by the driver layer: a failed large-object fetch or an
/// unreadable record member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    pub kind: ErrorKind,
    pub message: String,
}

impl DriverError {
    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Format, message: msg.into() }
    }

    pub fn access(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Access, message: msg.into() }
    }

    pub fn logic(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Logic, message: msg.into() }
    }

    /// Add context to the error, preserving the original ErrorKind.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for DriverError {}

// ---------------------------------------------------------------------------
// From impls: standard error types → DriverError with correct ErrorKind
// ---------------------------------------------------------------------------

impl From<serde_json::Error> for DriverError {
    fn from(e: serde_json::Error) -> Self {
        Self::format(e.to_string())
    }
}

impl From<std::string::FromUtf8Error> for DriverError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Self::format(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_kind() {
        let err = DriverError::io("connection reset").with_context("field 'CONTENT'");
        assert_eq!(err.kind, ErrorKind::Io);
        assert_eq!(err.message, "field 'CONTENT': connection reset");
        assert_eq!(err.to_string(), "io: field 'CONTENT': connection reset");
    }

    #[test]
    fn utf8_errors_are_format_errors() {
        let err: DriverError = String::from_utf8(vec![0xff, 0xfe]).unwrap_err().into();
        assert_eq!(err.kind, ErrorKind::Format);
    }
}
