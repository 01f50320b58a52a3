// Copyright © 2019-2020 The Radicle Foundation <hello@radicle.foundation>
//
// This file is part of radicle-link, distributed under the GPLv3 with Radicle
// Linking Exception. For full terms see the included LICENSE file.

//! The fetch engine (§4.E): download the closure of objects reachable from
//! a requested oid that the local repository does not already have, verify
//! each one's hash, and write it into the local object store.

use std::collections::{HashSet, VecDeque};

use ipfs_vcs_ext::Oid;
use tracing::debug;

use crate::{
    cas::CasClient,
    error::{HelperError, Result},
    vcs::{Object, Plumbing},
};

pub struct FetchEngine<'a> {
    cas: &'a CasClient,
    plumbing: &'a Plumbing,
    ipfs_path: &'a str,
}

impl<'a> FetchEngine<'a> {
    pub fn new(cas: &'a CasClient, plumbing: &'a Plumbing, ipfs_path: &'a str) -> Self {
        Self {
            cas,
            plumbing,
            ipfs_path,
        }
    }

    /// Downloads the closure of `start` that is not already present
    /// locally (invariant 3, §8). Objects already on disk are not
    /// re-downloaded, but are still walked so their remote-only
    /// descendants are discovered — this is what lets incremental
    /// fetches stop as soon as they hit the local repository's history.
    pub fn fetch(&self, start: Oid) -> Result<()> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([start]);

        while let Some(oid) = queue.pop_front() {
            if !seen.insert(oid) {
                continue;
            }

            if self.plumbing.exists(oid) {
                debug!(%oid, "already present locally");
                queue.extend(self.plumbing.successors(oid)?);
                continue;
            }

            if oid.is_empty_tree() {
                // The empty tree is implicit: every VCS install has it
                // available without needing to fetch it (§9 open question 3).
                self.plumbing.ensure_empty_tree()?;
                continue;
            }

            let path = format!("{}/{}", self.ipfs_path, oid.object_path());
            let compressed = self.cas.cat(&path)?;
            let object = Object::decompress(&compressed)?;

            let written = self.plumbing.hash_write(object.kind, &object.payload)?;
            if written != oid {
                return Err(HelperError::HashMismatch {
                    expected: oid.to_string(),
                    actual: written.to_string(),
                });
            }

            debug!(%oid, kind = %object.kind, "downloaded and verified");
            queue.extend(self.plumbing.successors(written)?);
        }

        Ok(())
    }
}
