// Copyright © 2019-2020 The Radicle Foundation <hello@radicle.foundation>
//
// This file is part of radicle-link, distributed under the GPLv3 with Radicle
// Linking Exception. For full terms see the included LICENSE file.

use std::{
    convert::TryFrom,
    fmt::{self, Display},
    str::FromStr,
};

use thiserror::Error;

/// The four object kinds the VCS's object store knows about.
///
/// Mirrors [`git2::ObjectType`], but restricted to the variants that can
/// appear in a loose-object store (no `git2::ObjectType::Any`), and with a
/// canonical lowercase string representation matching the header word in
/// `"<kind> <size>\0<payload>"`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Kind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Blob => "blob",
            Kind::Tree => "tree",
            Kind::Commit => "commit",
            Kind::Tag => "tag",
        }
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unrecognised object kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for Kind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blob" => Ok(Kind::Blob),
            "tree" => Ok(Kind::Tree),
            "commit" => Ok(Kind::Commit),
            "tag" => Ok(Kind::Tag),
            other => Err(UnknownKind(other.to_owned())),
        }
    }
}

impl From<Kind> for git2::ObjectType {
    fn from(k: Kind) -> Self {
        match k {
            Kind::Blob => git2::ObjectType::Blob,
            Kind::Tree => git2::ObjectType::Tree,
            Kind::Commit => git2::ObjectType::Commit,
            Kind::Tag => git2::ObjectType::Tag,
        }
    }
}

#[derive(Debug, Error)]
#[error("object type {0:?} has no loose-object representation")]
pub struct UnrepresentableType(pub git2::ObjectType);

impl TryFrom<git2::ObjectType> for Kind {
    type Error = UnrepresentableType;

    fn try_from(ty: git2::ObjectType) -> Result<Self, Self::Error> {
        match ty {
            git2::ObjectType::Blob => Ok(Kind::Blob),
            git2::ObjectType::Tree => Ok(Kind::Tree),
            git2::ObjectType::Commit => Ok(Kind::Commit),
            git2::ObjectType::Tag => Ok(Kind::Tag),
            other => Err(UnrepresentableType(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for k in [Kind::Blob, Kind::Tree, Kind::Commit, Kind::Tag] {
            assert_eq!(k, k.as_str().parse().unwrap());
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!("frobnicate".parse::<Kind>().is_err());
    }
}
