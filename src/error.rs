//! Error type.

use std::fmt;

/// Errors that can occur while resolving a 1Password key for an age file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `op` could not be started, or exited with a failure status.
    #[error("`{command}` failed: {reason}")]
    VaultUnavailable { command: String, reason: String },

    /// `op` succeeded but its output was not the JSON we expected.
    #[error("could not decode output of `{command}`: {source}")]
    VaultOutputMalformed {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    /// The item exists but has no private key value.
    #[error("private key not found in item {id}")]
    KeyFieldEmpty { id: String },

    /// The private key is not a usable OpenSSH key.
    #[error("not a usable SSH private key: {reason}")]
    IdentityParseFailure { reason: String },

    /// A key matched the stanza fingerprint but decryption still failed.
    ///
    /// This aborts the search, because it indicates a broken file or key rather than
    /// the wrong key.
    #[error("failed to decrypt with key {id}: {source}")]
    Decryption {
        id: String,
        #[source]
        source: age::DecryptError,
    },

    /// No 1Password item matched any stanza, and nothing went wrong along the way.
    #[error("no SSH key in 1Password matched the file's recipients")]
    NoMatchingIdentity,

    /// Every candidate key failed. The failures are kept in the order they happened.
    #[error("{}", DisplayCandidates(.0))]
    Aggregated(Vec<CandidateError>),
}

/// A failure while trying one 1Password item as a decryption key.
#[derive(Debug)]
pub struct CandidateError {
    /// The 1Password item ID.
    pub id: String,
    pub error: Error,
}

impl fmt::Display for CandidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key {}: {}", self.id, self.error)
    }
}

impl std::error::Error for CandidateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

struct DisplayCandidates<'a>(&'a [CandidateError]);

impl fmt::Display for DisplayCandidates<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no matching SSH key could be used")?;
        for failure in self.0 {
            write!(f, "\n- {}", failure)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CandidateError, Error};

    #[test]
    fn aggregated_message_lists_every_failure_in_order() {
        let err = Error::Aggregated(vec![
            CandidateError {
                id: "first".into(),
                error: Error::KeyFieldEmpty { id: "first".into() },
            },
            CandidateError {
                id: "second".into(),
                error: Error::IdentityParseFailure {
                    reason: "unsupported key type".into(),
                },
            },
        ]);

        assert_eq!(
            err.to_string(),
            "no matching SSH key could be used\n\
             - key first: private key not found in item first\n\
             - key second: not a usable SSH private key: unsupported key type"
        );
    }
}
