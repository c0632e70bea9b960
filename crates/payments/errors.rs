use thiserror::Error;

/// Failure of a single billing provider call. The client never retries; the
/// variant tells the caller whether retrying or proceeding makes sense.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Network failure or timeout. Retryable by the caller.
    #[error("billing provider unreachable: {0}")]
    Transport(String),
    /// The remote resource does not exist or is already in the target state.
    #[error("billing provider resource not found or already inactive: {0}")]
    NotFoundOrInactive(String),
    #[error("billing provider rejected the request ({status}): {message}")]
    Provider { status: u16, message: String },
    #[error("billing provider returned an unexpected response: {0}")]
    InvalidResponse(String),
}

impl BillingError {
    pub fn is_retryable(&self) -> bool {
        match self {
            BillingError::Transport(_) => true,
            BillingError::Provider { status, .. } => *status >= 500,
            BillingError::NotFoundOrInactive(_) | BillingError::InvalidResponse(_) => false,
        }
    }

    pub fn is_not_found_or_inactive(&self) -> bool {
        matches!(self, BillingError::NotFoundOrInactive(_))
    }
}

impl From<reqwest::Error> for BillingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BillingError::InvalidResponse(err.to_string())
        } else {
            BillingError::Transport(err.to_string())
        }
    }
}

pub const DEFAULT_ALREADY_INACTIVE_MARKERS: &[&str] =
    &["not found", "already inactive", "already disabled"];

/// Decides whether a failed provider response means "nothing left to do".
/// The provider has no dedicated error code for this, so the check runs on the
/// status and on configurable phrases in the error message.
#[derive(Debug, Clone)]
pub struct AlreadyInactiveMatcher {
    markers: Vec<String>,
}

impl Default for AlreadyInactiveMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_ALREADY_INACTIVE_MARKERS.iter().copied())
    }
}

impl AlreadyInactiveMatcher {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let markers = markers
            .into_iter()
            .map(|marker| marker.as_ref().trim().to_ascii_lowercase())
            .filter(|marker| !marker.is_empty())
            .collect();

        Self { markers }
    }

    /// Parses a comma-separated list, e.g. `not found,already inactive`.
    pub fn from_csv(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn matches(&self, status: u16, message: &str) -> bool {
        if status == 404 {
            return true;
        }

        let message = message.to_ascii_lowercase();
        self.markers.iter().any(|marker| message.contains(marker))
    }
}
