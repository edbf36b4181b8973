//! Resolution of recipient stanzas to 1Password SSH keys.

use age::{ssh, Identity as _};
use age_core::format::{FileKey, Stanza};
use log::{debug, warn};
use secrecy::{ExposeSecret, SecretString};

use crate::{
    error::{CandidateError, Error},
    op::{CredentialStore, ItemSummary, SSH_KEY_CATEGORY},
};

const FINGERPRINT_PREFIX: &str = "SHA256:";

/// Returns true if `item` might hold the key that `fingerprint` refers to.
///
/// `fingerprint` is the truncated fingerprint from a stanza's first argument.
pub fn matches(item: &ItemSummary, fingerprint: &str) -> bool {
    item.additional_information
        .starts_with(&format!("{}{}", FINGERPRINT_PREFIX, fingerprint))
}

/// An age identity whose private keys live in a [`CredentialStore`].
#[derive(Debug)]
pub struct OpIdentity<S> {
    store: S,
}

impl<S: CredentialStore> OpIdentity<S> {
    pub fn new(store: S) -> Self {
        OpIdentity { store }
    }

    /// Recovers the file key from the recipient stanzas of one age file.
    ///
    /// Candidate keys are tried stanza by stanza, in the order the store lists them,
    /// until one decrypts. Candidates that cannot be fetched or parsed are skipped and
    /// reported in [`Error::Aggregated`] if nothing succeeds. A matching key that fails
    /// to decrypt for any reason other than being the wrong key ends the search.
    pub fn unwrap_stanzas(&self, stanzas: &[Stanza]) -> Result<FileKey, Error> {
        let items = self.store.list_items(SSH_KEY_CATEGORY)?;

        let mut failures = vec![];
        for stanza in stanzas {
            let fingerprint = match stanza.args.first() {
                Some(fingerprint) => fingerprint,
                None => {
                    debug!("Skipping {} stanza without arguments", stanza.tag);
                    continue;
                }
            };

            for item in items.iter().filter(|item| matches(item, fingerprint)) {
                debug!("Trying key {} for {} stanza {}", item.id, stanza.tag, fingerprint);

                let identity = match self
                    .store
                    .fetch_private_key(&item.id)
                    .and_then(|key| parse_identity(&item.id, &key))
                {
                    Ok(identity) => identity,
                    Err(error) => {
                        warn!("Skipping key {}: {}", item.id, error);
                        failures.push(CandidateError {
                            id: item.id.clone(),
                            error,
                        });
                        continue;
                    }
                };

                match identity.unwrap_stanzas(stanzas) {
                    Some(Ok(file_key)) => {
                        debug!("Key {} unwrapped the file key", item.id);
                        return Ok(file_key);
                    }
                    Some(Err(source)) => {
                        return Err(Error::Decryption {
                            id: item.id.clone(),
                            source,
                        })
                    }
                    None => debug!("Key {} is not a recipient of this file", item.id),
                }
            }
        }

        if failures.is_empty() {
            Err(Error::NoMatchingIdentity)
        } else {
            Err(Error::Aggregated(failures))
        }
    }
}

/// Parses an unencrypted OpenSSH private key.
fn parse_identity(id: &str, key: &SecretString) -> Result<ssh::Identity, Error> {
    let identity = ssh::Identity::from_buffer(key.expose_secret().as_bytes(), Some(id.to_owned()))
        .map_err(|e| Error::IdentityParseFailure {
            reason: e.to_string(),
        })?;

    match identity {
        ssh::Identity::Unencrypted(_) => Ok(identity),
        ssh::Identity::Encrypted(_) => Err(Error::IdentityParseFailure {
            reason: "passphrase-protected keys are not supported".to_owned(),
        }),
        ssh::Identity::Unsupported(_) => Err(Error::IdentityParseFailure {
            reason: "unsupported key type".to_owned(),
        }),
    }
}
