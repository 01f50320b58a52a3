// Copyright © 2019-2020 The Radicle Foundation <hello@radicle.foundation>
//
// This file is part of radicle-link, distributed under the GPLv3 with Radicle
// Linking Exception. For full terms see the included LICENSE file.

//! Extensions and wrappers for `git2` types

pub mod kind;
pub mod oid;

pub use kind::Kind;
pub use oid::*;
