// Copyright © 2019-2020 The Radicle Foundation <hello@radicle.foundation>
//
// This file is part of radicle-link, distributed under the GPLv3 with Radicle
// Linking Exception. For full terms see the included LICENSE file.

//! Typed configuration loaded from `<repo>/.git/ipfs/config`.
//!
//! INI format, single `[IPFS]` section, case-sensitive keys. This is a
//! fixed record rather than a dynamic dictionary: unknown keys are ignored
//! for forward compatibility, known keys fall back to their documented
//! defaults when absent.

use std::{fs, path::Path};

use crate::error::{HelperError, Result};

const SECTION: &str = "[IPFS]";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub url: String,
    pub port: u16,
    pub version_prefix: String,
    pub timeout: f64,
    pub unpin_old: bool,
    pub republish: bool,
    pub ipns_ttl: String,
    pub cid_version: u32,
    pub ipfs_chunker: String,
    pub user_name: Option<String>,
    pub user_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1".to_owned(),
            port: 5001,
            version_prefix: "api/v0".to_owned(),
            timeout: 30.0,
            unpin_old: false,
            republish: false,
            ipns_ttl: "2h".to_owned(),
            cid_version: 0,
            ipfs_chunker: "size-262144".to_owned(),
            user_name: None,
            user_password: None,
        }
    }
}

impl Config {
    /// Load from `<repo>/.git/ipfs/config`. A missing file is a fatal
    /// [`HelperError::Config`] with a remediation message, per §6.
    pub fn load(git_dir: &Path) -> Result<Self> {
        let path = git_dir.join("ipfs").join("config");
        let contents = fs::read_to_string(&path).map_err(|_| {
            HelperError::Config(format!(
                "no ipfs remote configuration found at {}",
                path.display()
            ))
        })?;
        Self::parse(&contents)
    }

    /// Parse the `[IPFS]` section of an INI document. Keys outside the
    /// section, or in a different section, are ignored; so are blank lines,
    /// `;`/`#` comments, and unknown keys.
    fn parse(contents: &str) -> Result<Self> {
        let mut cfg = Config::default();
        let mut in_section = false;

        for raw_line in contents.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') {
                in_section = line.eq_ignore_ascii_case(SECTION) || line == SECTION;
                continue;
            }
            if !in_section {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "URL" => cfg.url = value.to_owned(),
                "Port" => {
                    cfg.port = value.parse().map_err(|_| {
                        HelperError::Config(format!("invalid Port value: {}", value))
                    })?
                },
                "VersionPrefix" => cfg.version_prefix = value.to_owned(),
                "Timeout" => {
                    cfg.timeout = value.parse().map_err(|_| {
                        HelperError::Config(format!("invalid Timeout value: {}", value))
                    })?
                },
                "UnpinOld" => cfg.unpin_old = parse_bool(value),
                "Republish" => cfg.republish = parse_bool(value),
                "IPNSTTLString" => cfg.ipns_ttl = value.to_owned(),
                "CIDVersion" => {
                    cfg.cid_version = value.parse().map_err(|_| {
                        HelperError::Config(format!("invalid CIDVersion value: {}", value))
                    })?
                },
                "IPFSChunker" => cfg.ipfs_chunker = value.to_owned(),
                "UserName" => cfg.user_name = Some(value.to_owned()),
                "UserPassword" => cfg.user_password = Some(value.to_owned()),
                _ => { /* forward-compatible: ignore unknown keys */ },
            }
        }

        Ok(cfg)
    }

    /// The daemon base URL with port and version prefix applied, e.g.
    /// `http://127.0.0.1:5001/api/v0`.
    pub fn api_base(&self) -> String {
        format!(
            "{}:{}/{}",
            self.url.trim_end_matches('/'),
            self.port,
            self.version_prefix.trim_matches('/')
        )
    }

    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        match (&self.user_name, &self.user_password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_absent() {
        let cfg = Config::parse("[IPFS]\n").unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn parses_known_keys_case_sensitively() {
        let cfg = Config::parse(
            "[IPFS]\n\
             URL = http://example.org\n\
             Port = 6001\n\
             Republish = true\n\
             UserName = alice\n\
             UserPassword = hunter2\n\
             url = should-be-ignored\n",
        )
        .unwrap();
        assert_eq!(cfg.url, "http://example.org");
        assert_eq!(cfg.port, 6001);
        assert!(cfg.republish);
        assert_eq!(cfg.basic_auth(), Some(("alice", "hunter2")));
    }

    #[test]
    fn ignores_unknown_keys_and_other_sections() {
        let cfg = Config::parse(
            "[Other]\nURL = http://nope\n\n[IPFS]\nFrobnicate = 1\nPort = 7001\n",
        )
        .unwrap();
        assert_eq!(cfg.url, Config::default().url);
        assert_eq!(cfg.port, 7001);
    }

    #[test]
    fn api_base_strips_slashes() {
        let mut cfg = Config::default();
        cfg.url = "http://127.0.0.1/".to_owned();
        cfg.version_prefix = "/api/v0/".to_owned();
        assert_eq!(cfg.api_base(), "http://127.0.0.1:5001/api/v0");
    }
}
