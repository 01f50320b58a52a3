// Copyright © 2019-2020 The Radicle Foundation <hello@radicle.foundation>
//
// This file is part of radicle-link, distributed under the GPLv3 with Radicle
// Linking Exception. For full terms see the included LICENSE file.

//! Remote discovery (§4.C): is `<id>` a mutable name or an immutable CID,
//! and is it reachable at all?

use tracing::{debug, info};

use crate::cas::CasClient;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteState {
    /// Either `/ipns/<id>` or the raw `<id>`, depending on what probed
    /// successfully. All subsequent calls use this as the anchor.
    pub ipfs_path: String,
    pub is_mutable_name: bool,
    pub is_accessible: bool,
}

/// Probe the daemon in the order specified by §4.C and classify the
/// remote. Never returns an error: an unreachable remote is a valid,
/// terminal classification, not a failure of discovery itself.
pub fn discover(cas: &CasClient, id: &str) -> RemoteState {
    let ipns_path = format!("/ipns/{}", id);
    match cas.ls(&ipns_path) {
        Ok(_) => {
            debug!(path = %ipns_path, "resolved as a mutable name");
            return RemoteState {
                ipfs_path: ipns_path,
                is_mutable_name: true,
                is_accessible: true,
            };
        },
        Err(e) if e.is_recoverable_during_discovery() => {
            debug!(error = %e, "mutable-name probe failed, falling back to immutable CID");
        },
        Err(e) => {
            // Per §7, DaemonTimeout is recoverable during discovery; any
            // other error here still just means "try the next probe".
            debug!(error = %e, "mutable-name probe errored, falling back");
        },
    }

    match cas.ls(id) {
        Ok(_) => {
            debug!(path = %id, "resolved as an immutable CID");
            RemoteState {
                ipfs_path: id.to_owned(),
                is_mutable_name: false,
                is_accessible: true,
            }
        },
        Err(e) => {
            info!(error = %e, id, "remote is not accessible");
            RemoteState {
                ipfs_path: id.to_owned(),
                is_mutable_name: false,
                is_accessible: false,
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn falls_back_to_immutable_when_daemon_is_down() {
        // Nothing is listening on this base URL, so every call fails fast
        // with a transport error; discovery should still classify instead
        // of panicking, landing on the immutable branch with
        // is_accessible=false.
        let mut config = Config::default();
        config.url = "http://127.0.0.1".to_owned();
        config.port = 1; // reserved, nothing binds here
        config.timeout = 0.2;
        let cas = CasClient::new(&config);

        let state = discover(&cas, "bafyExampleCidForTests");
        assert!(!state.is_mutable_name);
        assert!(!state.is_accessible);
        assert_eq!(state.ipfs_path, "bafyExampleCidForTests");
    }
}
