// Copyright © 2019-2020 The Radicle Foundation <hello@radicle.foundation>
//
// This file is part of radicle-link, distributed under the GPLv3 with Radicle
// Linking Exception. For full terms see the included LICENSE file.

//! A remote helper bridging the VCS's native transport to a content-addressed
//! peer-to-peer object network exposed over HTTP, as the `git-remote-ipfs`
//! binary.

pub mod cas;
pub mod config;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod push;
pub mod refs;
pub mod remote_helper;
pub mod vcs;
