//! age plugin protocol handlers.

use age_core::format::{FileKey, Stanza};
use age_plugin::{
    identity::{self, IdentityPluginV1},
    run_state_machine, Callbacks, PluginHandler,
};
use log::{debug, error};
use std::collections::HashMap;
use std::convert::Infallible;
use std::io;

use crate::{
    config::Config,
    error::Error,
    identity::OpIdentity,
    op::{CredentialStore, OpCli},
    PLUGIN_NAME,
};

/// Runs the given age plugin state machine over stdin and stdout.
pub fn run(state_machine: &str, config: Config) -> io::Result<()> {
    run_state_machine(state_machine, Handler { config })
}

struct Handler {
    config: Config,
}

impl PluginHandler for Handler {
    type RecipientV1 = Infallible;
    type IdentityV1 = IdentityPlugin<OpCli>;

    fn recipient_v1(self) -> io::Result<Self::RecipientV1> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "age-plugin-op does not support encryption; use the SSH public key as the recipient",
        ))
    }

    fn identity_v1(self) -> io::Result<Self::IdentityV1> {
        debug!("Starting identity-v1 with {:?}", self.config);
        Ok(IdentityPlugin::new(OpCli::new(&self.config)))
    }
}

/// The `identity-v1` half of the plugin.
pub(crate) struct IdentityPlugin<S> {
    identity: OpIdentity<S>,
    identities: usize,
}

impl<S: CredentialStore> IdentityPlugin<S> {
    pub(crate) fn new(store: S) -> Self {
        IdentityPlugin {
            identity: OpIdentity::new(store),
            identities: 0,
        }
    }
}

impl<S: CredentialStore> IdentityPluginV1 for IdentityPlugin<S> {
    fn add_identity(
        &mut self,
        index: usize,
        plugin_name: &str,
        bytes: &[u8],
    ) -> Result<(), identity::Error> {
        if plugin_name == PLUGIN_NAME && bytes.is_empty() {
            // Every age-plugin-op identity is the same; there is nothing to store.
            self.identities += 1;
            Ok(())
        } else {
            Err(identity::Error::Identity {
                index,
                message: "Invalid age-plugin-op identity".to_owned(),
            })
        }
    }

    fn unwrap_file_keys(
        &mut self,
        files: Vec<Vec<Stanza>>,
        _callbacks: impl Callbacks<identity::Error>,
    ) -> io::Result<HashMap<usize, Result<FileKey, Vec<identity::Error>>>> {
        let mut file_keys = HashMap::with_capacity(files.len());
        if self.identities == 0 {
            return Ok(file_keys);
        }

        for (file_index, stanzas) in files.iter().enumerate() {
            if let Some(result) = file_key_result(self.identity.unwrap_stanzas(stanzas)) {
                file_keys.insert(file_index, result);
            }
        }
        Ok(file_keys)
    }
}

/// Converts the outcome for one file into the plugin protocol's terms.
///
/// Returns `None` when no key matched, which age reports as "no identity matched".
fn file_key_result(
    result: Result<FileKey, Error>,
) -> Option<Result<FileKey, Vec<identity::Error>>> {
    match result {
        Ok(file_key) => Some(Ok(file_key)),
        Err(Error::NoMatchingIdentity) => None,
        Err(Error::Aggregated(failures)) => {
            for failure in &failures {
                error!("{}", failure);
            }
            Some(Err(failures
                .into_iter()
                .map(|failure| identity::Error::Internal {
                    message: failure.to_string(),
                })
                .collect()))
        }
        Err(e) => {
            error!("{}", e);
            Some(Err(vec![identity::Error::Internal {
                message: e.to_string(),
            }]))
        }
    }
}
