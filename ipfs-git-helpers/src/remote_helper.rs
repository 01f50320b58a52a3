// Copyright © 2019-2020 The Radicle Foundation <hello@radicle.foundation>
//
// This file is part of radicle-link, distributed under the GPLv3 with Radicle
// Linking Exception. For full terms see the included LICENSE file.

use std::{
    env,
    io::{self, BufReader},
};

use crate::{cas::CasClient, config::Config, discovery, driver::Driver, logging, vcs::Plumbing};

/// Entry point invoked as `git-remote-ipfs <remote-name> <remote-path>`
/// (§6). `remote-path` is an `ipfs://<id>` url; the helper splits on the
/// literal `"://"` itself rather than assuming the VCS driver already did.
pub fn run() -> anyhow::Result<()> {
    let args = env::args().skip(1).take(2).collect::<Vec<_>>();
    let remote_name = args
        .first()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("usage: git-remote-ipfs <remote-name> <remote-path>"))?;
    let remote_path = args
        .get(1)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("usage: git-remote-ipfs <remote-name> <remote-path>"))?;

    let id = remote_path
        .splitn(2, "://")
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("invalid remote url: {}", remote_path))?
        .to_owned();

    let plumbing = Plumbing::from_env()?;
    let config = Config::load(plumbing.git_dir())?;
    let handle = logging::init(logging::Verbosity::default());

    let cas = CasClient::new(&config);
    cas.version()?;

    let remote = discovery::discover(&cas, &id);
    let driver = Driver::new(&cas, &plumbing, &config, &remote_name, remote, Some(handle));

    // §4.G: stdout carries the protocol dialog and must not go through any
    // text-mode byte translation. Unlike the teacher's transport, which
    // hands raw sockets to the VCS driver via `Localio::inherit()`, this
    // helper speaks the line protocol itself, so it owns stdin/stdout
    // directly instead of inheriting a connected subprocess's handles.
    let stdin = BufReader::new(io::stdin());
    let stdout = io::stdout();
    driver.run(stdin, stdout.lock())?;

    Ok(())
}
