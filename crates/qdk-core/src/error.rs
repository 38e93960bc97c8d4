use std::fmt;

use uuid::Uuid;

/// Coarse classification used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    ValidationFailed,
    OwnerMismatch,
    CounterUnavailable,
    Unauthorized,
    Internal,
}

#[derive(Debug)]
pub enum QuoteError {
    /// The id (as given by the caller) matched no request of any kind.
    RequestNotFound(String),
    ArticleNotFound {
        article_id: String,
        request_id: String,
    },
    QuoteNotFound(String),
    ValidationFailed(String),
    OwnerMismatch {
        expected: Uuid,
        found: Uuid,
        request_id: Uuid,
    },
    NoValidLines,
    CounterUnavailable {
        key: String,
        attempts: u32,
        reason: String,
    },
    Unauthorized,
    Storage(anyhow::Error),
}

impl QuoteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QuoteError::RequestNotFound(_)
            | QuoteError::ArticleNotFound { .. }
            | QuoteError::QuoteNotFound(_) => ErrorKind::NotFound,
            QuoteError::ValidationFailed(_) | QuoteError::NoValidLines => {
                ErrorKind::ValidationFailed
            }
            QuoteError::OwnerMismatch { .. } => ErrorKind::OwnerMismatch,
            QuoteError::CounterUnavailable { .. } => ErrorKind::CounterUnavailable,
            QuoteError::Unauthorized => ErrorKind::Unauthorized,
            QuoteError::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to hand back to the caller. Infrastructure failures are
    /// collapsed to a generic text; the detail goes to the log only.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::CounterUnavailable | ErrorKind::Internal => {
                "internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for QuoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteError::RequestNotFound(id) => write!(f, "request not found: {id}"),
            QuoteError::ArticleNotFound {
                article_id,
                request_id,
            } => write!(
                f,
                "article {article_id} not found for request {request_id}"
            ),
            QuoteError::QuoteNotFound(n) => write!(f, "quote not found: {n}"),
            QuoteError::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            QuoteError::OwnerMismatch { request_id, .. } => write!(
                f,
                "all requests must belong to the same client (request {request_id} differs)"
            ),
            QuoteError::NoValidLines => write!(f, "no valid quote line"),
            QuoteError::CounterUnavailable {
                key,
                attempts,
                reason,
            } => write!(
                f,
                "COUNTER_UNAVAILABLE key={key} attempts={attempts}: {reason}"
            ),
            QuoteError::Unauthorized => write!(f, "unauthorized"),
            QuoteError::Storage(e) => write!(f, "storage failure: {e:#}"),
        }
    }
}

impl std::error::Error for QuoteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QuoteError::Storage(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for QuoteError {
    fn from(e: anyhow::Error) -> Self {
        QuoteError::Storage(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_detail_is_not_public() {
        let e = QuoteError::Storage(anyhow::anyhow!("connection refused to 10.0.0.3"));
        assert_eq!(e.kind(), ErrorKind::Internal);
        assert_eq!(e.public_message(), "internal server error");

        let e = QuoteError::CounterUnavailable {
            key: "quote:2025".into(),
            attempts: 3,
            reason: "timeout".into(),
        };
        assert_eq!(e.public_message(), "internal server error");
        assert!(e.to_string().contains("quote:2025"));
    }

    #[test]
    fn not_found_names_the_offending_id() {
        let e = QuoteError::RequestNotFound("abc".into());
        assert_eq!(e.kind(), ErrorKind::NotFound);
        assert_eq!(e.public_message(), "request not found: abc");
    }
}
