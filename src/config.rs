//! Plugin configuration.
//!
//! age plugins take no configuration files, so the few knobs this plugin has are read
//! from the environment when the plugin starts.

use std::env;
use std::ffi::OsString;

/// Name or path of the 1Password CLI binary.
pub const ENV_OP_CLI: &str = "AGE_PLUGIN_OP_CLI";
/// 1Password account to use, forwarded to `op --account`.
pub const ENV_OP_ACCOUNT: &str = "AGE_PLUGIN_OP_ACCOUNT";
/// Vault to search for keys, forwarded to `op item list --vault`.
pub const ENV_OP_VAULT: &str = "AGE_PLUGIN_OP_VAULT";

const DEFAULT_OP_CLI: &str = "op";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub op_cli: OsString,
    pub account: Option<OsString>,
    pub vault: Option<OsString>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            op_cli: DEFAULT_OP_CLI.into(),
            account: None,
            vault: None,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var_os(name))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        // An exported-but-empty variable counts as unset.
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        Config {
            op_cli: var(ENV_OP_CLI).unwrap_or_else(|| DEFAULT_OP_CLI.into()),
            account: var(ENV_OP_ACCOUNT),
            vault: var(ENV_OP_VAULT),
        }
    }
}
