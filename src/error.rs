//! Status codes and the error type used across the [`tensorvm`](crate) crate.

use std::borrow::Cow;

/// Canonical status codes.
///
/// The numeric values are stable and are used directly as process exit codes by the `tensorvm-run` binary.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    /// Successful completion.
    Ok = 0,
    /// The operation was cancelled by the caller.
    Cancelled = 1,
    /// Unknown error, or an error from an unknown source.
    Unknown = 2,
    /// The caller passed an invalid argument, independent of the state of the system.
    InvalidArgument = 3,
    /// A deadline expired before the operation could complete.
    DeadlineExceeded = 4,
    /// A requested resource (file, driver, function, ...) was not found.
    NotFound = 5,
    /// The resource the caller attempted to create already exists.
    AlreadyExists = 6,
    /// The caller does not have permission to access the resource.
    PermissionDenied = 7,
    /// A resource was exhausted, such as memory.
    ResourceExhausted = 8,
    /// The system is not in a state required for the operation.
    FailedPrecondition = 9,
    /// The operation was aborted.
    Aborted = 10,
    /// The operation was attempted past the valid range, e.g. popping from an empty list.
    OutOfRange = 11,
    /// The operation is not implemented or not supported.
    Unimplemented = 12,
    /// An internal invariant was broken.
    Internal = 13,
    /// The resource is currently unavailable.
    Unavailable = 14,
    /// Unrecoverable data loss or corruption.
    DataLoss = 15,
    /// The request does not have valid authentication credentials.
    Unauthenticated = 16,
}
impl StatusCode {
    /// The canonical upper-case name of the code, e.g. `NOT_FOUND`.
    pub fn name(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Cancelled => "CANCELLED",
            StatusCode::Unknown => "UNKNOWN",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::AlreadyExists => "ALREADY_EXISTS",
            StatusCode::PermissionDenied => "PERMISSION_DENIED",
            StatusCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            StatusCode::FailedPrecondition => "FAILED_PRECONDITION",
            StatusCode::Aborted => "ABORTED",
            StatusCode::OutOfRange => "OUT_OF_RANGE",
            StatusCode::Unimplemented => "UNIMPLEMENTED",
            StatusCode::Internal => "INTERNAL",
            StatusCode::Unavailable => "UNAVAILABLE",
            StatusCode::DataLoss => "DATA_LOSS",
            StatusCode::Unauthenticated => "UNAUTHENTICATED",
        }
    }

    /// The code as a process exit code.
    ///
    /// All codes fit in `0..=255`, so the value is passed through unchanged.
    pub fn exit_code(self) -> i32 {
        self as u32 as i32
    }
}
impl std::fmt::Display for StatusCode {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.write_str(self.name())
    }
}

/// A failed operation: a non-OK [`StatusCode`], a message, and annotations added while the error propagated.
///
/// Success is represented by `Ok(_)` of [`Result`], so a `Status` value never carries [`StatusCode::Ok`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Status {
    code: StatusCode,
    message: Cow<'static, str>,
    annotations: Vec<Cow<'static, str>>,
}
impl Status {
    /// Create a new status.
    ///
    /// # Panics
    ///
    /// If `code` is [`StatusCode::Ok`].
    pub fn new(code: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        assert_ne!(code, StatusCode::Ok, "a failure status can not carry the OK code");
        Self {
            code,
            message: message.into(),
            annotations: Vec::new(),
        }
    }

    /// The status code.
    pub fn code(&self) -> StatusCode {
        self.code
    }

    /// The message the status was created with.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Annotations in the order they were added, innermost first.
    pub fn annotations(&self) -> impl Iterator<Item = &str> {
        self.annotations.iter().map(|a| a.as_ref())
    }

    /// Append context to the status while keeping its code.
    pub fn annotate(mut self, annotation: impl Into<Cow<'static, str>>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    /// Print the formatted status to a writer.
    pub fn fprint(&self, writer: &mut impl std::io::Write) -> std::io::Result<()> {
        writeln!(writer, "{self}")
    }

    /// Consume a status that was already reported or is intentionally unchecked.
    pub fn ignore(self) {
        log::trace!("ignoring status {}", self.code);
    }
}
impl std::fmt::Display for Status {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{}", self.code)?;
        if !self.message.is_empty() {
            write!(fmt, "; {}", self.message)?;
        }
        for annotation in &self.annotations {
            write!(fmt, "; {annotation}")?;
        }
        Ok(())
    }
}
impl std::error::Error for Status {}

impl From<std::io::Error> for Status {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        let code = match err.kind() {
            ErrorKind::NotFound => StatusCode::NotFound,
            ErrorKind::PermissionDenied => StatusCode::PermissionDenied,
            ErrorKind::AlreadyExists => StatusCode::AlreadyExists,
            ErrorKind::InvalidInput | ErrorKind::InvalidData => StatusCode::InvalidArgument,
            ErrorKind::UnexpectedEof => StatusCode::OutOfRange,
            ErrorKind::TimedOut => StatusCode::DeadlineExceeded,
            ErrorKind::Interrupted => StatusCode::Aborted,
            ErrorKind::OutOfMemory => StatusCode::ResourceExhausted,
            ErrorKind::Unsupported => StatusCode::Unimplemented,
            _ => StatusCode::Unavailable,
        };
        Status::new(code, err.to_string())
    }
}

/// Adds [`annotate`](Status::annotate) to results.
pub trait ResultExt<T> {
    /// Annotate the error, if any, with lazily computed context.
    fn annotate_with<F, A>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> A,
        A: Into<Cow<'static, str>>;

    /// Annotate the error, if any, with a static context string.
    fn annotate(self, annotation: &'static str) -> Result<T>;
}
impl<T> ResultExt<T> for Result<T> {
    fn annotate_with<F, A>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> A,
        A: Into<Cow<'static, str>>,
    {
        self.map_err(|status| status.annotate(f()))
    }

    fn annotate(self, annotation: &'static str) -> Result<T> {
        self.map_err(|status| status.annotate(annotation))
    }
}

/// Shorthand for creating a [`Status`] with a formatted message.
macro_rules! status {
    ($code:ident, $($arg:tt)*) => {
        $crate::Status::new($crate::StatusCode::$code, format!($($arg)*))
    };
}
pub(crate) use status;

/// Result type of all fallible operations of the crate.
pub type Result<T, E = Status> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Status>();
        assert_send_sync::<StatusCode>();
    }

    #[test]
    fn exit_codes_are_portable() {
        let codes = [
            StatusCode::Ok,
            StatusCode::Cancelled,
            StatusCode::Unknown,
            StatusCode::InvalidArgument,
            StatusCode::DeadlineExceeded,
            StatusCode::NotFound,
            StatusCode::AlreadyExists,
            StatusCode::PermissionDenied,
            StatusCode::ResourceExhausted,
            StatusCode::FailedPrecondition,
            StatusCode::Aborted,
            StatusCode::OutOfRange,
            StatusCode::Unimplemented,
            StatusCode::Internal,
            StatusCode::Unavailable,
            StatusCode::DataLoss,
            StatusCode::Unauthenticated,
        ];
        for (i, code) in codes.into_iter().enumerate() {
            assert_eq!(code.exit_code(), i as i32);
            assert!((0..=255).contains(&code.exit_code()));
        }
    }

    #[test]
    fn display_includes_annotations() {
        let status = Status::new(StatusCode::NotFound, "no such file 'a.tvmb'")
            .annotate("loading bytecode module")
            .annotate("session setup");
        assert_eq!(
            status.to_string(),
            "NOT_FOUND; no such file 'a.tvmb'; loading bytecode module; session setup"
        );
        assert_eq!(
            status.annotations().collect::<Vec<_>>(),
            ["loading bytecode module", "session setup"]
        );
    }

    #[test]
    fn annotate_result() {
        let res: Result<()> = Err(status!(OutOfRange, "list is empty"));
        let err = res.annotate("popping output").unwrap_err();
        assert_eq!(err.code(), StatusCode::OutOfRange);
        assert_eq!(err.message(), "list is empty");
        assert_eq!(err.to_string(), "OUT_OF_RANGE; list is empty; popping output");

        let ok: Result<u32> = Ok(3);
        assert_eq!(ok.annotate_with(|| format!("never {}", 1)).unwrap(), 3);
    }

    #[test]
    fn io_error_mapping() {
        let err: Status = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.code(), StatusCode::NotFound);
        let err: Status = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no").into();
        assert_eq!(err.code(), StatusCode::PermissionDenied);
        let err: Status = std::io::Error::new(std::io::ErrorKind::Other, "?").into();
        assert_eq!(err.code(), StatusCode::Unavailable);
    }

    #[test]
    #[should_panic]
    fn ok_is_not_a_failure() {
        let _ = Status::new(StatusCode::Ok, "");
    }
}
