// Copyright © 2019-2020 The Radicle Foundation <hello@radicle.foundation>
//
// This file is part of radicle-link, distributed under the GPLv3 with Radicle
// Linking Exception. For full terms see the included LICENSE file.

use ipfs_git_helpers::remote_helper;

fn main() -> anyhow::Result<()> {
    remote_helper::run()
}
