// Copyright © 2019-2020 The Radicle Foundation <hello@radicle.foundation>
//
// This file is part of radicle-link, distributed under the GPLv3 with Radicle
// Linking Exception. For full terms see the included LICENSE file.

//! The VCS plumbing gateway (§4.B): the operations the rest of the helper
//! needs from the local repository. Implemented directly against `git2`
//! rather than shelling out, per the "link against a native library" option
//! in the design notes (§9) — `update-server-info` has no `git2` API, so
//! that one operation still shells out to `git`, the same way the teacher's
//! `credential::Git` does for `git credential`.

use std::{
    collections::{HashSet, VecDeque},
    convert::TryFrom,
    path::{Path, PathBuf},
    process::Command,
};

use ipfs_vcs_ext::{Kind, Oid};

use crate::error::{HelperError, Result};

pub struct Plumbing {
    repo: git2::Repository,
}

impl Plumbing {
    /// Open the repository the helper is running inside of, as identified
    /// by `GIT_DIR` (the VCS driver always sets this for remote helpers).
    pub fn from_env() -> Result<Self> {
        let repo = git2::Repository::open_from_env()?;
        Ok(Self { repo })
    }

    /// Opens a specific repository path directly, bypassing `GIT_DIR`.
    /// Used by tests that need a scratch repository of their own.
    pub fn open(path: &Path) -> Result<Self> {
        let repo = git2::Repository::open(path)?;
        Ok(Self { repo })
    }

    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    pub fn top_level(&self) -> Option<&Path> {
        self.repo.workdir()
    }

    pub fn type_of(&self, oid: Oid) -> Result<Kind> {
        let odb = self.repo.odb()?;
        let obj = odb.read(oid.into())?;
        Kind::try_from(obj.kind()).map_err(|e| HelperError::Cas {
            status: 0,
            message: e.to_string(),
        })
    }

    pub fn size_of(&self, oid: Oid) -> Result<usize> {
        let odb = self.repo.odb()?;
        Ok(odb.read(oid.into())?.len())
    }

    pub fn read(&self, oid: Oid) -> Result<Vec<u8>> {
        let odb = self.repo.odb()?;
        Ok(odb.read(oid.into())?.data().to_vec())
    }

    /// `type` + `read` + `size` in one odb round trip; used by the push
    /// engine, which needs all three for every reachable object.
    pub fn read_object(&self, oid: Oid) -> Result<(Kind, Vec<u8>)> {
        let odb = self.repo.odb()?;
        let obj = odb.read(oid.into())?;
        let kind = Kind::try_from(obj.kind()).map_err(|e| HelperError::Cas {
            status: 0,
            message: e.to_string(),
        })?;
        Ok((kind, obj.data().to_vec()))
    }

    pub fn exists(&self, oid: Oid) -> bool {
        self.repo
            .odb()
            .map(|odb| odb.exists(oid.into()))
            .unwrap_or(false)
    }

    /// Insert `payload` of the given `kind` into the local object store and
    /// return the oid the store assigns it — which must equal the oid the
    /// caller expected, checked by the fetch engine (invariant 2, §8).
    pub fn hash_write(&self, kind: Kind, payload: &[u8]) -> Result<Oid> {
        let odb = self.repo.odb()?;
        Ok(odb.write(kind.into(), payload)?.into())
    }

    /// True iff `ancestor` is an ancestor of (or equal to) `descendant`.
    pub fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool> {
        if ancestor == descendant {
            return Ok(true);
        }
        Ok(self
            .repo
            .graph_descendant_of(descendant.into(), ancestor.into())?)
    }

    /// The tip oid a ref currently points at in the local repository, if
    /// any.
    pub fn ref_target(&self, refname: &str) -> Result<Option<Oid>> {
        match self.repo.refname_to_id(refname) {
            Ok(oid) => Ok(Some(oid.into())),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The local `HEAD`, resolved to the ref it points at (or its direct
    /// oid if detached).
    pub fn head(&self) -> Result<Option<String>> {
        match self.repo.find_reference("HEAD") {
            Ok(r) => Ok(r.symbolic_target().map(str::to_owned)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The transitive closure of objects reachable from `start` — exactly
    /// what `git rev-list --objects start` would enumerate, minus
    /// submodule gitlink targets (they are not objects in *this*
    /// repository). Shared with the fetch engine's traversal, which walks
    /// the same kind of DAG but downloads as it goes instead of reading
    /// locally.
    pub fn reachable_objects(&self, start: Oid) -> Result<Vec<Oid>> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([start]);
        let mut order = Vec::new();

        while let Some(oid) = queue.pop_front() {
            if !seen.insert(oid) {
                continue;
            }
            order.push(oid);
            for child in self.successors(oid)? {
                if !seen.contains(&child) {
                    queue.push_back(child);
                }
            }
        }

        Ok(order)
    }

    /// The objects a given object directly references, per the traversal
    /// rules in §4.E: blobs have none, tags point at one object, commits
    /// point at a tree and their parents, trees point at their entries
    /// (except gitlinks).
    pub fn successors(&self, oid: Oid) -> Result<Vec<Oid>> {
        let git_oid = git2::Oid::from(oid);
        match self.type_of(oid)? {
            Kind::Blob => Ok(vec![]),
            Kind::Tag => {
                let tag = self.repo.find_tag(git_oid)?;
                Ok(vec![tag.target_id().into()])
            },
            Kind::Commit => {
                let commit = self.repo.find_commit(git_oid)?;
                let mut out = vec![Oid::from(commit.tree_id())];
                out.extend(commit.parent_ids().map(Oid::from));
                Ok(out)
            },
            Kind::Tree => {
                let tree = self.repo.find_tree(git_oid)?;
                Ok(tree
                    .iter()
                    .filter(|entry| entry.filemode() != i32::from(git2::FileMode::Commit))
                    .map(|entry| Oid::from(entry.id()))
                    .collect())
            },
        }
    }

    /// Runs `git update-server-info` in this repository and returns the two
    /// files it (re-)generates, read verbatim. There is no `git2` API for
    /// this, so it is the one plumbing operation that still shells out.
    pub fn update_server_info(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let workdir = self
            .top_level()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.git_dir().to_path_buf());

        let status = Command::new("git")
            .env("GIT_DIR", self.git_dir())
            .arg("update-server-info")
            .current_dir(&workdir)
            .status()?;

        if !status.success() {
            return Err(HelperError::PluggingFailure(
                "git update-server-info exited non-zero".to_owned(),
            ));
        }

        let info_refs = std::fs::read(self.git_dir().join("info").join("refs"))
            .unwrap_or_default();
        let packs = std::fs::read(self.git_dir().join("objects").join("info").join("packs"))
            .unwrap_or_default();

        Ok((info_refs, packs))
    }

    /// Rewrites `remote.<name>.url` to `url`, used after a push to an
    /// immutable CID to point the working tree at the new snapshot.
    pub fn set_remote_url(&self, name: &str, url: &str) -> Result<()> {
        let mut remote = self
            .repo
            .find_remote(name)
            .or_else(|_| self.repo.remote(name, url))?;
        self.repo
            .remote_set_url(remote.name().unwrap_or(name), url)
            .map_err(HelperError::from)?;
        let _ = remote.disconnect();
        Ok(())
    }

    /// Materialises the well-known empty tree, if it is not already
    /// present locally. §9 open question 3: both engines rely on it
    /// existing when reachable.
    pub fn ensure_empty_tree(&self) -> Result<Oid> {
        let oid: Oid = ipfs_vcs_ext::EMPTY_TREE.parse()?;
        if self.exists(oid) {
            return Ok(oid);
        }
        let written = self.hash_write(Kind::Tree, &[])?;
        debug_assert_eq!(written, oid);
        Ok(written)
    }
}

pub fn git_dir_from_env() -> Result<PathBuf> {
    std::env::var_os("GIT_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| HelperError::Config("GIT_DIR is not set in the environment".to_owned()))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    /// §4.E / §8 property 7: a tree entry with a gitlink filemode (`160000`,
    /// a submodule pointing at a commit in some other repository) must not
    /// be returned as a successor — its target need not exist here.
    #[test]
    fn gitlink_entries_are_excluded_from_successors() {
        let dir = TempDir::new().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();

        let blob_oid = repo.blob(b"hello").unwrap();
        let submodule_oid = git2::Oid::from_str("0123456789abcdef0123456789abcdef01234567").unwrap();

        let mut builder = repo.treebuilder(None).unwrap();
        builder
            .insert("file.txt", blob_oid, i32::from(git2::FileMode::Blob))
            .unwrap();
        builder
            .insert("submodule", submodule_oid, i32::from(git2::FileMode::Commit))
            .unwrap();
        let tree_oid = builder.write().unwrap();

        let plumbing = Plumbing::open(dir.path()).unwrap();
        let successors = plumbing.successors(tree_oid.into()).unwrap();

        assert_eq!(successors, vec![Oid::from(blob_oid)]);
        assert!(!successors.contains(&Oid::from(submodule_oid)));
    }

    #[test]
    fn reachable_objects_walks_commit_tree_and_parents() {
        let dir = TempDir::new().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        let sig = git2::Signature::now("test", "test@example.com").unwrap();

        let blob_oid = repo.blob(b"content").unwrap();
        let mut builder = repo.treebuilder(None).unwrap();
        builder
            .insert("file.txt", blob_oid, i32::from(git2::FileMode::Blob))
            .unwrap();
        let tree_oid = builder.write().unwrap();
        let tree = repo.find_tree(tree_oid).unwrap();

        let first = repo
            .commit(None, &sig, &sig, "first", &tree, &[])
            .unwrap();
        let first_commit = repo.find_commit(first).unwrap();
        let second = repo
            .commit(Some("refs/heads/main"), &sig, &sig, "second", &tree, &[&first_commit])
            .unwrap();

        let plumbing = Plumbing::open(dir.path()).unwrap();
        let reachable = plumbing.reachable_objects(second.into()).unwrap();

        for expected in [second.into(), first.into(), tree_oid.into(), blob_oid.into()] {
            assert!(reachable.contains(&expected), "missing {:?} in {:?}", expected, reachable);
        }
    }
}
