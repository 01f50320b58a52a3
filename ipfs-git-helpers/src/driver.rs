// Copyright © 2019-2020 The Radicle Foundation <hello@radicle.foundation>
//
// This file is part of radicle-link, distributed under the GPLv3 with Radicle
// Linking Exception. For full terms see the included LICENSE file.

//! The protocol driver (§4.G): a small finite state machine reading
//! newline-delimited commands from the VCS driver on stdin and replying on
//! stdout, dispatching `list`/`push`/`fetch` batches to the other engines.

use std::{
    collections::BTreeMap,
    io::{BufRead, Write},
};

use ipfs_vcs_ext::Oid;
use tracing::info;

use crate::{
    cas::CasClient,
    config::Config,
    discovery::RemoteState,
    error::{HelperError, Result},
    fetch::FetchEngine,
    logging::{self, Verbosity},
    push::{PushEngine, PushSpec},
    refs::ReferenceDirectory,
    vcs::Plumbing,
};

pub struct Driver<'a> {
    cas: &'a CasClient,
    plumbing: &'a Plumbing,
    config: &'a Config,
    remote_name: &'a str,
    remote: RemoteState,
    logging_handle: Option<logging::Handle>,
}

/// What `list` discovered, consulted by subsequent `push`/`fetch` batches.
#[derive(Default)]
struct ListState {
    references: BTreeMap<String, Oid>,
    head_target: Option<String>,
    head_bytes: Option<Vec<u8>>,
    is_empty: bool,
    listed: bool,
}

impl<'a> Driver<'a> {
    pub fn new(
        cas: &'a CasClient,
        plumbing: &'a Plumbing,
        config: &'a Config,
        remote_name: &'a str,
        remote: RemoteState,
        logging_handle: Option<logging::Handle>,
    ) -> Self {
        Self {
            cas,
            plumbing,
            config,
            remote_name,
            remote,
            logging_handle,
        }
    }

    /// Drives the command loop until an empty line arrives at `IDLE` (clean
    /// exit) or stdin closes.
    pub fn run<R: BufRead, W: Write>(&self, mut input: R, mut output: W) -> Result<()> {
        let mut state = ListState::default();
        let mut line = String::new();

        loop {
            line.clear();
            if input.read_line(&mut line)? == 0 {
                break;
            }
            let trimmed = line.trim_end_matches(|c| c == '\n' || c == '\r');

            if trimmed.is_empty() {
                break;
            } else if trimmed == "capabilities" {
                self.handle_capabilities(&mut output)?;
            } else if let Some(rest) = trimmed.strip_prefix("option ") {
                self.handle_option(rest, &mut output)?;
            } else if trimmed == "list" || trimmed == "list for-push" {
                self.handle_list(trimmed == "list for-push", &mut state, &mut output)?;
            } else if let Some(rest) = trimmed.strip_prefix("push ") {
                self.handle_push_batch(rest, &mut input, &mut state, &mut output)?;
            } else if let Some(rest) = trimmed.strip_prefix("fetch ") {
                self.handle_fetch_batch(rest, &mut input, &mut output)?;
            } else {
                return Err(HelperError::Protocol(trimmed.to_owned()));
            }
        }

        Ok(())
    }

    fn handle_capabilities<W: Write>(&self, output: &mut W) -> Result<()> {
        for capability in ["option", "list", "push", "fetch"] {
            writeln!(output, "{}", capability)?;
        }
        writeln!(output)?;
        output.flush()?;
        Ok(())
    }

    fn handle_option<W: Write>(&self, rest: &str, output: &mut W) -> Result<()> {
        let mut parts = rest.splitn(2, ' ');
        let (name, value) = (parts.next().unwrap_or_default(), parts.next().unwrap_or_default());

        let applied = match name {
            "verbosity" => {
                let verbosity = value.parse::<i64>().map(Verbosity::from_level).unwrap_or_default();
                self.logging_handle
                    .as_ref()
                    .map(|handle| logging::set_verbosity(handle, verbosity))
                    .unwrap_or(false)
            },
            _ => false,
        };

        writeln!(output, "{}", if applied { "ok" } else { "unsupported" })?;
        output.flush()?;
        Ok(())
    }

    fn handle_list<W: Write>(&self, for_push: bool, state: &mut ListState, output: &mut W) -> Result<()> {
        let refdir = ReferenceDirectory::new(self.cas, &self.remote.ipfs_path);
        state.references = refdir.list_references()?;
        state.is_empty = state.references.is_empty();
        state.listed = true;

        let symbolic_head = refdir.read_symbolic_reference("HEAD")?;
        state.head_target = symbolic_head.clone();
        state.head_bytes = self.cas.cat(&format!("{}/HEAD", self.remote.ipfs_path)).ok();

        for (name, oid) in &state.references {
            writeln!(output, "{} {}", oid, name)?;
        }
        if !for_push {
            if let Some(target) = &symbolic_head {
                writeln!(output, "@{} HEAD", target)?;
            }
        }
        writeln!(output)?;
        output.flush()?;
        Ok(())
    }

    fn handle_push_batch<R: BufRead, W: Write>(
        &self,
        first: &str,
        input: &mut R,
        state: &mut ListState,
        output: &mut W,
    ) -> Result<()> {
        let mut specs = vec![parse_push_spec(first)?];
        let mut line = String::new();
        loop {
            line.clear();
            if input.read_line(&mut line)? == 0 {
                break;
            }
            let trimmed = line.trim_end_matches(|c| c == '\n' || c == '\r');
            if trimmed.is_empty() {
                break;
            }
            let rest = trimmed
                .strip_prefix("push ")
                .ok_or_else(|| HelperError::Protocol(trimmed.to_owned()))?;
            specs.push(parse_push_spec(rest)?);
        }

        if !state.listed {
            self.handle_list(true, state, &mut std::io::sink())?;
        }

        let engine = PushEngine::new(
            self.cas,
            self.plumbing,
            self.config,
            self.remote_name,
            &self.remote.ipfs_path,
            self.remote.is_mutable_name,
            state.is_empty,
            state.head_bytes.clone(),
            state.head_target.as_deref(),
            &state.references,
        );

        let outcomes = engine.run(&specs)?;
        for outcome in outcomes {
            writeln!(output, "{}", outcome.to_line())?;
        }
        writeln!(output)?;
        output.flush()?;
        Ok(())
    }

    fn handle_fetch_batch<R: BufRead, W: Write>(&self, first: &str, input: &mut R, output: &mut W) -> Result<()> {
        let mut requests = vec![parse_fetch_spec(first)?];
        let mut line = String::new();
        loop {
            line.clear();
            if input.read_line(&mut line)? == 0 {
                break;
            }
            let trimmed = line.trim_end_matches(|c| c == '\n' || c == '\r');
            if trimmed.is_empty() {
                break;
            }
            let rest = trimmed
                .strip_prefix("fetch ")
                .ok_or_else(|| HelperError::Protocol(trimmed.to_owned()))?;
            requests.push(parse_fetch_spec(rest)?);
        }

        let engine = FetchEngine::new(self.cas, self.plumbing, &self.remote.ipfs_path);
        for (oid, refname) in requests {
            info!(%oid, %refname, "fetching");
            engine.fetch(oid)?;
        }

        writeln!(output)?;
        output.flush()?;
        Ok(())
    }
}

/// `[+]<src>:<dst>`, where an empty `<src>` denotes a deletion.
fn parse_push_spec(rest: &str) -> Result<PushSpec> {
    let (force, rest) = match rest.strip_prefix('+') {
        Some(stripped) => (true, stripped),
        None => (false, rest),
    };
    let (src, dst) = rest
        .split_once(':')
        .ok_or_else(|| HelperError::Protocol(format!("push {}", rest)))?;

    Ok(PushSpec {
        force,
        src: if src.is_empty() { None } else { Some(src.to_owned()) },
        dst: dst.to_owned(),
    })
}

/// `<oid> <refname>`.
fn parse_fetch_spec(rest: &str) -> Result<(Oid, String)> {
    let (oid, refname) = rest
        .split_once(' ')
        .ok_or_else(|| HelperError::Protocol(format!("fetch {}", rest)))?;
    let oid: Oid = oid.parse()?;
    Ok((oid, refname.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_forced_push_spec() {
        let spec = parse_push_spec("+refs/heads/main:refs/heads/main").unwrap();
        assert!(spec.force);
        assert_eq!(spec.src.as_deref(), Some("refs/heads/main"));
        assert_eq!(spec.dst, "refs/heads/main");
    }

    #[test]
    fn parses_deletion_push_spec() {
        let spec = parse_push_spec(":refs/heads/gone").unwrap();
        assert!(!spec.force);
        assert_eq!(spec.src, None);
        assert_eq!(spec.dst, "refs/heads/gone");
    }

    #[test]
    fn parses_fetch_spec() {
        let (oid, refname) = parse_fetch_spec(&format!("{} refs/heads/main", ipfs_vcs_ext::EMPTY_TREE)).unwrap();
        assert_eq!(oid.to_string(), ipfs_vcs_ext::EMPTY_TREE);
        assert_eq!(refname, "refs/heads/main");
    }
}
