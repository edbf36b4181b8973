//! An age plugin that decrypts files with SSH keys held in 1Password.
//!
//! Private keys never touch the disk. When age asks the plugin to unwrap a file key,
//! the plugin lists the "SSH Key" items in the user's 1Password account through the
//! `op` command-line tool, picks the items whose fingerprint matches the SSH recipient
//! stanzas in the file header, fetches each candidate's private key, and trial-decrypts
//! with it.
//!
//! # Usage
//!
//! Running `age-plugin-op` with no arguments prints the plugin identity:
//!
//! ```text
//! $ age-plugin-op > identity.txt
//! $ age -d -i identity.txt secrets.age
//! ```
//!
//! The identity carries no key material; it only tells age to start this plugin.
//!
//! # Matching
//!
//! An SSH recipient stanza names its key by a truncated fingerprint in its first
//! argument. A 1Password item is a candidate for that stanza when its
//! `additional_information` (which `op` fills with the key's `SHA256:` fingerprint)
//! starts with `SHA256:` followed by that argument. Candidates are tried in the order
//! `op` lists them, and the first one that decrypts wins.

use bech32::{ToBase32, Variant};

pub mod config;
mod error;
pub mod identity;
pub mod op;
pub mod plugin;

pub use error::{CandidateError, Error};

/// The name age uses to find this plugin (`age-plugin-op`).
pub const PLUGIN_NAME: &str = "op";

const PLUGIN_IDENTITY_PREFIX: &str = "age-plugin-";

/// Returns the recipient-less identity string for this plugin.
///
/// The identity has an empty payload, so the encoding is the same on every run.
pub fn identity_string() -> String {
    let payload: &[u8] = &[];
    bech32::encode(
        &format!("{}{}-", PLUGIN_IDENTITY_PREFIX, PLUGIN_NAME),
        payload.to_base32(),
        Variant::Bech32,
    )
    .expect("HRP is valid")
    .to_uppercase()
}

#[cfg(test)]
mod tests {
    use bech32::{FromBase32, Variant};

    use super::identity_string;

    #[test]
    fn identity_has_plugin_prefix_and_no_payload() {
        let identity = identity_string();
        assert!(identity.starts_with("AGE-PLUGIN-OP-1"));

        let (hrp, data, variant) = bech32::decode(&identity).unwrap();
        assert_eq!(hrp, "age-plugin-op-");
        assert_eq!(variant, Variant::Bech32);
        assert!(Vec::<u8>::from_base32(&data).unwrap().is_empty());
    }

    #[test]
    fn identity_is_stable() {
        assert_eq!(identity_string(), identity_string());
    }
}
