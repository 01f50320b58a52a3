// Copyright © 2019-2020 The Radicle Foundation <hello@radicle.foundation>
//
// This file is part of radicle-link, distributed under the GPLv3 with Radicle
// Linking Exception. For full terms see the included LICENSE file.

use std::{
    convert::TryFrom,
    fmt::{self, Display},
    ops::Deref,
    str::FromStr,
};

/// Serializable [`git2::Oid`].
///
/// Beyond wrapping [`git2::Oid`], this knows how to split itself into the
/// `<xx>/<rest>` two-level path the dumb protocol layout uses under
/// `objects/`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Oid(git2::Oid);

/// The well-known empty-tree object id every git history implicitly
/// contains; see the fetch engine's special-casing of it.
pub const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

impl Oid {
    /// The `(fan-out-dir, rest)` components of `objects/<xx>/<rest>`.
    pub fn split(&self) -> (String, String) {
        let hex = self.0.to_string();
        (hex[..2].to_owned(), hex[2..].to_owned())
    }

    /// The relative path `objects/<xx>/<rest>` of this object.
    pub fn object_path(&self) -> String {
        let (dir, rest) = self.split();
        format!("objects/{}/{}", dir, rest)
    }

    pub fn is_empty_tree(&self) -> bool {
        self.0.to_string() == EMPTY_TREE
    }
}

impl Deref for Oid {
    type Target = git2::Oid;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<git2::Oid> for Oid {
    fn as_ref(&self) -> &git2::Oid {
        &self.0
    }
}

impl AsRef<[u8]> for Oid {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<git2::Oid> for Oid {
    fn from(oid: git2::Oid) -> Self {
        Self(oid)
    }
}

impl From<Oid> for git2::Oid {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<&str> for Oid {
    type Error = git2::Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse().map(Self)
    }
}

impl FromStr for Oid {
    type Err = git2::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl TryFrom<&[u8]> for Oid {
    type Error = git2::Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        git2::Oid::from_bytes(bytes).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_fan_out() {
        let oid: Oid = EMPTY_TREE.parse().unwrap();
        let (dir, rest) = oid.split();
        assert_eq!(dir, "4b");
        assert_eq!(rest, "825dc642cb6eb9a060e54bf8d69288fbee4904");
        assert_eq!(oid.object_path(), format!("objects/4b/{}", rest));
    }

    #[test]
    fn recognises_empty_tree() {
        let oid: Oid = EMPTY_TREE.parse().unwrap();
        assert!(oid.is_empty_tree());
    }

    #[test]
    fn display_round_trips() {
        let oid: Oid = EMPTY_TREE.parse().unwrap();
        assert_eq!(oid.to_string(), EMPTY_TREE);
    }
}
