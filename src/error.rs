use std::fmt;

/// Classification of a `CoreError`, mirroring the error taxonomy the
/// consumer framework uses to decide whether to re-raise (permanent, routed
/// to a dead-letter target) or retry in-process (transient).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed envelope, missing required event field, unparseable JSON,
    /// invalid UUID, invalid enum value.
    PermanentDecode,
    /// File missing required object metadata, unsupported file format where
    /// mapping cannot be inferred, deny vote without reason.
    PermanentInput,
    /// Store throttle, transient network error, conditional-write
    /// contention.
    TransientIo,
    /// Precondition violation, e.g. activating a pattern whose validation
    /// failed.
    PermanentBusiness,
}

impl ErrorKind {
    /// Whether this error kind must be re-raised so the delivery runtime
    /// routes the record to a dead-letter store, as opposed to being
    /// retried in-process or left for redelivery.
    pub fn is_permanent(self) -> bool {
        !matches!(self, ErrorKind::TransientIo)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::PermanentDecode => "permanent_decode",
            ErrorKind::PermanentInput => "permanent_input",
            ErrorKind::TransientIo => "transient_io",
            ErrorKind::PermanentBusiness => "permanent_business",
        };
        f.write_str(label)
    }
}

/// The single error type the core surfaces. Adapters (HTTP handlers, Lambda
/// shims, whatever embeds this crate) own mapping `kind` to a user-facing
/// status or message — the core never formats one itself.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct CoreError {
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn permanent_decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermanentDecode, message)
    }

    pub fn permanent_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermanentInput, message)
    }

    pub fn transient_io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientIo, message)
    }

    pub fn permanent_business(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermanentBusiness, message)
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn is_permanent(&self) -> bool {
        self.kind.is_permanent()
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_io_is_not_permanent() {
        assert!(!ErrorKind::TransientIo.is_permanent());
    }

    #[test]
    fn every_other_kind_is_permanent() {
        assert!(ErrorKind::PermanentDecode.is_permanent());
        assert!(ErrorKind::PermanentInput.is_permanent());
        assert!(ErrorKind::PermanentBusiness.is_permanent());
    }
}
