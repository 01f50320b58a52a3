// Copyright © 2019-2020 The Radicle Foundation <hello@radicle.foundation>
//
// This file is part of radicle-link, distributed under the GPLv3 with Radicle
// Linking Exception. For full terms see the included LICENSE file.

//! The reference directory (§4.D): recursively enumerating `refs/` on the
//! remote, and reading `HEAD`'s symbolic-ref value.

use std::collections::BTreeMap;

use ipfs_vcs_ext::Oid;
use tracing::info;

use crate::{
    cas::{types::EntryType, CasClient},
    error::Result,
};

pub struct ReferenceDirectory<'a> {
    cas: &'a CasClient,
    ipfs_path: &'a str,
}

impl<'a> ReferenceDirectory<'a> {
    pub fn new(cas: &'a CasClient, ipfs_path: &'a str) -> Self {
        Self { cas, ipfs_path }
    }

    /// Recursively lists `<prefix>/` on the remote and returns every leaf
    /// file path under it, e.g. `refs/heads/main`. Entries that are
    /// neither a subdirectory nor a file are logged at INFO and skipped.
    /// Order is unspecified.
    pub fn reference_names(&self, prefix: &str) -> Result<Vec<String>> {
        let listing = self.cas.ls(&format!("{}/{}", self.ipfs_path, prefix))?;
        let mut out = Vec::new();

        for entry in listing.entries {
            let child_path = format!("{}/{}", prefix, entry.name);
            match entry.kind() {
                EntryType::Directory if entry.size == 0 => {
                    out.extend(self.reference_names(&child_path)?);
                },
                EntryType::File => out.push(child_path),
                other => {
                    info!(path = %child_path, kind = ?other, "skipping unrecognised remote entry");
                },
            }
        }

        Ok(out)
    }

    /// All references under `refs/`, as a name → oid map (§3 invariant 4).
    /// Returns an empty map if `refs/` cannot be listed at all — the
    /// caller interprets that as an empty repository (§4.C).
    pub fn list_references(&self) -> Result<BTreeMap<String, Oid>> {
        let names = match self.reference_names("refs") {
            Ok(names) => names,
            Err(_) => return Ok(BTreeMap::new()),
        };

        let mut out = BTreeMap::new();
        for name in names {
            if let Some(oid) = self.read_oid_ref(&name)? {
                out.insert(name, oid);
            }
        }
        Ok(out)
    }

    /// Reads a plain ref file (`40-hex oid` + newline) at `path`.
    fn read_oid_ref(&self, path: &str) -> Result<Option<Oid>> {
        let bytes = self.cas.cat(&format!("{}/{}", self.ipfs_path, path))?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(text.trim().parse().ok())
    }

    /// `read_symbolic_reference(name)`: `ls`s `<ipfs_path>/<name>`; if
    /// absent, returns `None`. Otherwise `cat`s it and returns the value
    /// after `"ref: "` with trailing whitespace removed — `None` if the
    /// file does not look like a symbolic ref.
    pub fn read_symbolic_reference(&self, name: &str) -> Result<Option<String>> {
        let full_path = format!("{}/{}", self.ipfs_path, name);
        if self.cas.ls(&full_path).is_err() {
            return Ok(None);
        }

        let bytes = self.cas.cat(&full_path)?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(text
            .trim_end()
            .strip_prefix("ref: ")
            .map(|target| target.trim().to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_ref_prefix() {
        let raw = "ref: refs/heads/main\n";
        assert_eq!(
            raw.trim_end().strip_prefix("ref: ").map(str::to_owned),
            Some("refs/heads/main".to_owned())
        );
    }

    #[test]
    fn non_symbolic_head_yields_none() {
        let raw = "4b825dc642cb6eb9a060e54bf8d69288fbee4904\n";
        assert_eq!(raw.trim_end().strip_prefix("ref: "), None);
    }
}
