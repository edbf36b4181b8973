//! Access to 1Password through the `op` command-line tool.

use log::debug;
use secrecy::SecretString;
use serde::Deserialize;
use std::ffi::OsString;
use std::fmt;
use std::process::{Command, Stdio};
use zeroize::Zeroize;

use crate::{config::Config, error::Error};

/// The 1Password item category holding SSH keys.
pub const SSH_KEY_CATEGORY: &str = "SSH Key";

const CMD_ITEM_LIST: &str = "op item list";
const CMD_ITEM_GET: &str = "op item get";

/// One entry of `op item list --format=json`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ItemSummary {
    #[serde(default)]
    pub id: String,
    /// For SSH keys, `op` puts the key's `SHA256:` fingerprint here.
    #[serde(default)]
    pub additional_information: String,
}

/// The single field returned by `op item get --fields type=SSHKEY --format=json`.
///
/// `value` holds the key as PKCS#8, which the age SSH parser cannot read. `op` also
/// returns an OpenSSH encoding under `ssh_formats`, and that is the one we use.
#[derive(Deserialize)]
struct KeyField {
    #[serde(default)]
    id: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    ssh_formats: Option<SshFormats>,
}

#[derive(Deserialize)]
struct SshFormats {
    #[serde(default)]
    openssh: Option<SshFormat>,
}

#[derive(Deserialize)]
struct SshFormat {
    #[serde(default)]
    value: String,
}

impl KeyField {
    /// The private key text to parse, preferring the OpenSSH encoding.
    fn private_key(&self) -> &str {
        self.ssh_formats
            .as_ref()
            .and_then(|formats| formats.openssh.as_ref())
            .map(|openssh| openssh.value.trim())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| self.value.trim())
    }
}

impl fmt::Debug for KeyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyField")
            .field("id", &self.id)
            .field("type", &self.kind)
            .field("label", &self.label)
            .field(
                "openssh",
                &self
                    .ssh_formats
                    .as_ref()
                    .and_then(|formats| formats.openssh.as_ref())
                    .is_some(),
            )
            .finish_non_exhaustive()
    }
}

impl Drop for KeyField {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

impl Drop for SshFormat {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

/// A source of SSH private keys.
///
/// Every call goes to the backing store; implementations must not cache.
pub trait CredentialStore {
    /// Lists the items of the given category that have an ID, in store order.
    fn list_items(&self, category: &str) -> Result<Vec<ItemSummary>, Error>;

    /// Fetches the private key of one item, with surrounding whitespace removed.
    fn fetch_private_key(&self, id: &str) -> Result<SecretString, Error>;
}

/// [`CredentialStore`] backed by the `op` binary.
///
/// Each operation spawns one `op` process and waits for it to exit.
#[derive(Debug)]
pub struct OpCli {
    program: OsString,
    account: Option<OsString>,
    vault: Option<OsString>,
}

impl OpCli {
    pub fn new(config: &Config) -> Self {
        OpCli {
            program: config.op_cli.clone(),
            account: config.account.clone(),
            vault: config.vault.clone(),
        }
    }

    /// Runs `op` and returns its stdout if it exited successfully.
    fn run(&self, command: &str, mut cmd: Command) -> Result<Vec<u8>, Error> {
        if let Some(account) = &self.account {
            cmd.arg("--account").arg(account);
        }

        // Our stdin is the age plugin protocol, so `op` must not read from it.
        let output = cmd
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::VaultUnavailable {
                command: command.to_owned(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            let mut stdout = output.stdout;
            stdout.zeroize();
            Err(Error::VaultUnavailable {
                command: command.to_owned(),
                reason: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }
}

impl CredentialStore for OpCli {
    fn list_items(&self, category: &str) -> Result<Vec<ItemSummary>, Error> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["item", "list", "--categories", category, "--format=json"]);
        if let Some(vault) = &self.vault {
            cmd.arg("--vault").arg(vault);
        }

        let stdout = self.run(CMD_ITEM_LIST, cmd)?;
        let items: Vec<ItemSummary> =
            serde_json::from_slice(&stdout).map_err(|source| Error::VaultOutputMalformed {
                command: CMD_ITEM_LIST.to_owned(),
                source,
            })?;

        let total = items.len();
        let items: Vec<_> = items.into_iter().filter(|item| !item.id.is_empty()).collect();
        debug!(
            "op listed {} {} items ({} without an ID)",
            total,
            category,
            total - items.len()
        );

        Ok(items)
    }

    fn fetch_private_key(&self, id: &str) -> Result<SecretString, Error> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["item", "get", id, "--format=json", "--fields", "type=SSHKEY"]);

        let mut stdout = self.run(CMD_ITEM_GET, cmd)?;
        let field = serde_json::from_slice::<KeyField>(&stdout);
        stdout.zeroize();
        let field = field.map_err(|source| Error::VaultOutputMalformed {
            command: CMD_ITEM_GET.to_owned(),
            source,
        })?;
        debug!("op returned {:?} for item {}", field, id);

        match field.private_key() {
            "" => Err(Error::KeyFieldEmpty { id: id.to_owned() }),
            value => Ok(SecretString::from(value.to_owned())),
        }
    }
}
