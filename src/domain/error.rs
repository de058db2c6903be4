use thiserror::Error;

/// Failure while producing a value from an upstream provider.
///
/// Cloneable so that a single failed fetch can be handed to every caller that
/// joined the same in-flight request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("{provider} {operation} returned HTTP {status}")]
    Upstream {
        provider: &'static str,
        operation: &'static str,
        status: u16,
    },
    #[error("{provider} request failed: {message}")]
    Transport {
        provider: &'static str,
        message: String,
    },
    #[error("{provider} payload could not be decoded: {message}")]
    Malformed {
        provider: &'static str,
        message: String,
    },
    #[error("{provider} has no {resource}")]
    NotFound {
        provider: &'static str,
        resource: &'static str,
    },
    #[error("in-flight fetch for `{key}` was abandoned before it settled")]
    Abandoned { key: String },
}

impl FetchError {
    pub fn upstream(provider: &'static str, operation: &'static str, status: u16) -> Self {
        Self::Upstream {
            provider,
            operation,
            status,
        }
    }

    pub fn transport(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            provider,
            message: message.into(),
        }
    }

    pub fn malformed(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            provider,
            message: message.into(),
        }
    }

    pub fn not_found(provider: &'static str, resource: &'static str) -> Self {
        Self::NotFound { provider, resource }
    }

    pub fn abandoned(key: impl Into<String>) -> Self {
        Self::Abandoned { key: key.into() }
    }

    /// HTTP status carried by an upstream rejection.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Rate limiting (429) or blocking (403); callers answer this with a fallback.
    pub fn is_blocked(&self) -> bool {
        matches!(self.status(), Some(403 | 429))
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_statuses_are_recognised() {
        assert!(FetchError::upstream("reddit", "search", 429).is_blocked());
        assert!(FetchError::upstream("reddit", "search", 403).is_blocked());
        assert!(!FetchError::upstream("reddit", "search", 500).is_blocked());
        assert!(!FetchError::transport("reddit", "connection reset").is_blocked());
    }

    #[test]
    fn message_carries_status_code() {
        let err = FetchError::upstream("espn", "summary", 404);
        assert_eq!(err.to_string(), "espn summary returned HTTP 404");
        assert_eq!(err.status(), Some(404));
    }
}
