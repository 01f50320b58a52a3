// Copyright © 2019-2020 The Radicle Foundation <hello@radicle.foundation>
//
// This file is part of radicle-link, distributed under the GPLv3 with Radicle
// Linking Exception. For full terms see the included LICENSE file.

//! The push engine (§4.F): validates each pushed ref, stages the upload
//! manifest, uploads it as a single wrap-directory, and either updates the
//! mutable name or rewrites the local remote URL to the new CID.

use std::collections::{BTreeMap, HashSet};

use ipfs_vcs_ext::Oid;
use tracing::{debug, info, warn};

use crate::{
    cas::CasClient,
    config::Config,
    error::{HelperError, Result},
    vcs::{Object, Plumbing},
};

/// One `push [+]<src>:<dst>` line. `src` is `None` for a deletion.
pub struct PushSpec {
    pub force: bool,
    pub src: Option<String>,
    pub dst: String,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PushOutcome {
    Ok(String),
    Error(String, String),
}

impl PushOutcome {
    /// `ok <dst>` | `error <dst> <reason>` — exactly one per input line
    /// (§11 open question 1).
    pub fn to_line(&self) -> String {
        match self {
            PushOutcome::Ok(dst) => format!("ok {}", dst),
            PushOutcome::Error(dst, reason) => format!("error {} {}", dst, reason),
        }
    }
}

pub struct PushEngine<'a> {
    cas: &'a CasClient,
    plumbing: &'a Plumbing,
    config: &'a Config,
    remote_name: &'a str,
    ipfs_path: &'a str,
    is_mutable_name: bool,
    is_empty: bool,
    /// The current remote `HEAD` file's raw contents, if the remote is not
    /// empty; carried into the new snapshot unchanged unless this push
    /// bootstraps an empty remote's `HEAD` for the first time.
    remote_head_bytes: Option<Vec<u8>>,
    /// The remote `HEAD`'s symbolic target, if resolved, used to refuse
    /// deletion of the current branch.
    remote_head_target: Option<&'a str>,
    /// References known from the last `list`, consulted for fast-forward
    /// checks.
    remote_refs: &'a BTreeMap<String, Oid>,
}

impl<'a> PushEngine<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cas: &'a CasClient,
        plumbing: &'a Plumbing,
        config: &'a Config,
        remote_name: &'a str,
        ipfs_path: &'a str,
        is_mutable_name: bool,
        is_empty: bool,
        remote_head_bytes: Option<Vec<u8>>,
        remote_head_target: Option<&'a str>,
        remote_refs: &'a BTreeMap<String, Oid>,
    ) -> Self {
        Self {
            cas,
            plumbing,
            config,
            remote_name,
            ipfs_path,
            is_mutable_name,
            is_empty,
            remote_head_bytes,
            remote_head_target,
            remote_refs,
        }
    }

    /// Processes one push batch end to end, returning exactly one outcome
    /// per input spec, in order.
    pub fn run(&self, specs: &[PushSpec]) -> Result<Vec<PushOutcome>> {
        let mut outcomes = Vec::with_capacity(specs.len());
        let mut accepted: Vec<(String, Oid)> = Vec::new();
        let mut deletions = HashSet::new();

        for spec in specs {
            match &spec.src {
                None => outcomes.push(self.handle_deletion(&spec.dst, &mut deletions)),
                Some(src) => match self.validate_update(src, &spec.dst, spec.force) {
                    Ok(oid) => {
                        accepted.push((spec.dst.clone(), oid));
                        outcomes.push(PushOutcome::Ok(spec.dst.clone()));
                    },
                    Err(HelperError::RefRejected { dst, reason }) => {
                        outcomes.push(PushOutcome::Error(dst, reason));
                    },
                    Err(e) => return Err(e),
                },
            }
        }

        // A deletion-only batch still needs a new snapshot uploaded: the
        // deleted ref's absence from the manifest is what effects the
        // delete (§4.F "Deletions"), so `finalize` must run even when
        // `accepted` is empty.
        if !accepted.is_empty() || !deletions.is_empty() {
            self.finalize(&accepted)?;
        }

        Ok(outcomes)
    }

    fn handle_deletion(&self, dst: &str, deletions: &mut HashSet<String>) -> PushOutcome {
        if self.remote_head_target == Some(dst) {
            return PushOutcome::Error(dst.to_owned(), "refused to delete current branch".to_owned());
        }
        deletions.insert(dst.to_owned());
        PushOutcome::Ok(dst.to_owned())
    }

    /// Resolves `src` locally and, unless forced or the remote is empty,
    /// runs the fast-forward check against the last known remote value of
    /// `dst`.
    fn validate_update(&self, src: &str, dst: &str, force: bool) -> Result<Oid> {
        let oid = self
            .plumbing
            .ref_target(src)?
            .ok_or_else(|| HelperError::RefRejected {
                dst: dst.to_owned(),
                reason: format!("src ref {} not found", src),
            })?;

        if force || self.is_empty {
            return Ok(oid);
        }

        match self.remote_refs.get(dst) {
            None => Ok(oid),
            Some(&prior) if !self.plumbing.exists(prior) => Err(HelperError::RefRejected {
                dst: dst.to_owned(),
                reason: "fetch first".to_owned(),
            }),
            Some(&prior) if !self.plumbing.is_ancestor(prior, oid)? => Err(HelperError::RefRejected {
                dst: dst.to_owned(),
                reason: "non-fast forward".to_owned(),
            }),
            Some(_) => Ok(oid),
        }
    }

    /// Stages the closure of every accepted update, uploads it in one
    /// `add` call, and resolves the mutable name or local remote URL. Refs
    /// not named by `accepted` (including deleted ones) are simply absent
    /// from the new manifest (§4.F "Deletions").
    fn finalize(&self, accepted: &[(String, Oid)]) -> Result<()> {
        let mut object_ids = HashSet::new();
        for (_, oid) in accepted {
            object_ids.extend(self.plumbing.reachable_objects(*oid)?);
        }

        let mut files = Vec::with_capacity(object_ids.len() + accepted.len() + 3);
        let mut total_bytes = 0usize;
        for oid in &object_ids {
            let (kind, payload) = self.plumbing.read_object(*oid)?;
            let compressed = Object::new(kind, payload).compress()?;
            total_bytes += compressed.len();
            files.push((oid.object_path(), compressed));
        }
        debug!(objects = object_ids.len(), bytes = total_bytes, "staged push objects");

        let (info_refs, packs) = self.plumbing.update_server_info()?;
        files.push(("info/refs".to_owned(), info_refs));
        files.push(("objects/info/packs".to_owned(), packs));

        for (dst, oid) in accepted {
            files.push((dst.clone(), format!("{}\n", oid).into_bytes()));
        }

        files.push(("HEAD".to_owned(), self.resolve_head(accepted)));

        let cid = self
            .cas
            .add(&files, self.config.cid_version, &self.config.ipfs_chunker)?;
        info!(%cid, "uploaded new snapshot");

        if self.is_mutable_name {
            self.finalize_mutable(&cid)?;
        } else {
            let url = format!("ipfs://{}", cid);
            self.plumbing.set_remote_url(self.remote_name, &url)?;
            info!(%url, "rewrote local remote url to new snapshot");
        }

        Ok(())
    }

    fn finalize_mutable(&self, cid: &str) -> Result<()> {
        let old_cid = self.cas.name_resolve(self.ipfs_path).ok();
        if let Some(old) = &old_cid {
            debug!(%old, "previous snapshot");
        }

        if self.config.unpin_old {
            if let Some(old) = &old_cid {
                if let Err(e) = self.cas.pin_rm(old) {
                    warn!(error = %e, "failed to unpin previous snapshot");
                }
            }
        }

        if self.config.republish {
            let key = self.ipfs_path.rsplit('/').next().unwrap_or(self.ipfs_path);
            match self.cas.name_publish(cid, key, &self.config.ipns_ttl) {
                Ok(_) => info!(%cid, "republished mutable name"),
                Err(e) => warn!(error = %e, %cid, "failed to republish mutable name; switch to the new CID manually"),
            }
        } else {
            info!(%cid, "republish disabled; mutable name left unchanged");
        }

        Ok(())
    }

    /// §4.F "Empty-repo HEAD bootstrapping" and §11 resolution 3: carries
    /// the previous remote `HEAD` forward unless the remote was empty, in
    /// which case the first accepted ref matching local `HEAD` (or else
    /// the first accepted ref) becomes the new default branch.
    fn resolve_head(&self, accepted: &[(String, Oid)]) -> Vec<u8> {
        if !self.is_empty {
            if let Some(bytes) = &self.remote_head_bytes {
                return bytes.clone();
            }
        }

        let local_head_ref = self.plumbing.head().ok().flatten();
        let chosen = local_head_ref
            .as_deref()
            .and_then(|head_ref| accepted.iter().find(|(dst, _)| dst == head_ref))
            .or_else(|| accepted.first());

        match chosen {
            Some((dst, _)) => format!("ref: {}\n", dst).into_bytes(),
            None => Vec::new(),
        }
    }
}
