// Copyright © 2019-2020 The Radicle Foundation <hello@radicle.foundation>
//
// This file is part of radicle-link, distributed under the GPLv3 with Radicle
// Linking Exception. For full terms see the included LICENSE file.

//! Wire types for the CAS daemon's JSON-over-HTTP API (§4.A, §6).

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    #[serde(default)]
    pub commit: String,
}

/// `type=1` is a subdirectory, `type=2` is a file (§4.D).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EntryType {
    Directory,
    File,
    Other(u8),
}

impl From<u8> for EntryType {
    fn from(n: u8) -> Self {
        match n {
            1 => EntryType::Directory,
            2 => EntryType::File,
            other => EntryType::Other(other),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LsEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: u8,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub hash: String,
}

impl LsEntry {
    pub fn kind(&self) -> EntryType {
        EntryType::from(self.entry_type)
    }
}

#[derive(Debug, Deserialize)]
pub struct LsResponse {
    pub entries: Vec<LsEntry>,
}

#[derive(Debug, Deserialize)]
pub struct AddEntry {
    pub name: String,
    pub hash: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveResponse {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct PublishResponse {
    #[serde(default)]
    pub name: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct PinRmResponse {
    pub pins: Vec<String>,
}
