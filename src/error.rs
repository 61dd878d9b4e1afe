/// Failures that indicate a malformed claim rather than a wrong one.
///
/// A claim that is well-formed but does not match its recomputation is not an
/// error; it comes back as [`crate::VerificationOutcome::Mismatch`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("malformed {field}: {reason}")]
    MalformedInput { field: &'static str, reason: String },
    #[error("{field} must satisfy 1 <= value < curve order")]
    OutOfRange { field: &'static str },
    #[error("curve violation: {0}")]
    CurveViolation(String),
    #[error("modular inverse does not exist")]
    NoInverse,
    #[error("{field} is the point at infinity")]
    PointAtInfinity { field: &'static str },
    #[error("nonce placement {offset}+{length} exceeds template length {buffer}")]
    RangeError {
        offset: usize,
        length: usize,
        buffer: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Error::MalformedInput {
            field,
            reason: reason.into(),
        }
    }
}
