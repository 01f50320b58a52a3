// Copyright © 2019-2020 The Radicle Foundation <hello@radicle.foundation>
//
// This file is part of radicle-link, distributed under the GPLv3 with Radicle
// Linking Exception. For full terms see the included LICENSE file.

//! End-to-end scenarios (§8 S1, S5) driven straight through [`Driver::run`]
//! over in-memory stdin/stdout, against a fake CAS daemon on localhost,
//! rather than through a real `git push`/`git fetch` subprocess — there is
//! no live daemon available here, so the daemon side is stubbed with
//! `httptest`.

use std::io::Cursor;

use httptest::{matchers::*, responders::*, Expectation, Server};
use ipfs_git_helpers::{cas::CasClient, config::Config, discovery::RemoteState, driver::Driver, vcs::Plumbing};
use tempfile::TempDir;

fn repo_with_one_commit_on_main() -> (TempDir, Plumbing) {
    let dir = TempDir::new().unwrap();
    let repo = git2::Repository::init(dir.path()).unwrap();
    let sig = git2::Signature::now("test", "test@example.com").unwrap();
    let tree_oid = repo.treebuilder(None).unwrap().write().unwrap();
    let tree = repo.find_tree(tree_oid).unwrap();
    repo.commit(Some("refs/heads/main"), &sig, &sig, "initial", &tree, &[])
        .unwrap();
    repo.set_head("refs/heads/main").unwrap();

    let plumbing = Plumbing::open(dir.path()).unwrap();
    (dir, plumbing)
}

fn cas_pointed_at(server: &Server) -> (Config, CasClient) {
    let mut config = Config::default();
    config.url = "http://127.0.0.1".to_owned();
    config.port = server.addr().port();
    let cas = CasClient::new(&config);
    (config, cas)
}

/// S1 — empty remote, first push: `refs/` cannot be listed, `HEAD` cannot be
/// read, so `list` reports no references, and the subsequent push of
/// `refs/heads/main` is accepted unconditionally (no prior tip to compare
/// against) and uploaded in one `add` call.
#[test]
fn s1_empty_remote_first_push_is_acked_and_uploaded() {
    let server = Server::run();
    let (_dir, plumbing) = repo_with_one_commit_on_main();

    server.expect(
        Expectation::matching(all_of![
            request::method("POST"),
            request::path("/api/v0/ls"),
            request::query(url_decoded(contains(("arg", "bafyExample/refs")))),
        ])
        .respond_with(status_code(500)),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method("POST"),
            request::path("/api/v0/ls"),
            request::query(url_decoded(contains(("arg", "bafyExample/HEAD")))),
        ])
        .respond_with(status_code(500)),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method("POST"),
            request::path("/api/v0/cat"),
            request::query(url_decoded(contains(("arg", "bafyExample/HEAD")))),
        ])
        .respond_with(status_code(500)),
    );
    server.expect(
        Expectation::matching(all_of![request::method("POST"), request::path("/api/v0/add"),])
            .respond_with(status_code(200).body(
                "{\"name\":\"HEAD\",\"hash\":\"bafyHead\"}\n{\"name\":\"\",\"hash\":\"bafyNewSnapshot\"}\n",
            )),
    );

    let (config, cas) = cas_pointed_at(&server);
    let remote = RemoteState {
        ipfs_path: "bafyExample".to_owned(),
        is_mutable_name: false,
        is_accessible: true,
    };
    let driver = Driver::new(&cas, &plumbing, &config, "origin", remote, None);

    let input = "capabilities\nlist\npush +refs/heads/main:refs/heads/main\n\n\n";
    let mut output = Vec::new();
    driver.run(Cursor::new(input.as_bytes()), &mut output).unwrap();

    let text = String::from_utf8(output).unwrap();
    assert!(text.contains("option\nlist\npush\nfetch"), "capabilities block: {}", text);
    assert!(text.contains("ok refs/heads/main"), "push ack: {}", text);
}

/// S5 — delete current branch refused: the remote's `HEAD` names
/// `refs/heads/main`, so a deletion push for that same ref must be rejected
/// rather than silently dropping the default branch.
#[test]
fn s5_delete_current_branch_is_refused() {
    let server = Server::run();
    let (_dir, plumbing) = repo_with_one_commit_on_main();

    server.expect(
        Expectation::matching(all_of![
            request::method("POST"),
            request::path("/api/v0/ls"),
            request::query(url_decoded(contains(("arg", "bafyExample/refs")))),
        ])
        .respond_with(
            status_code(200).body("{\"entries\":[{\"name\":\"heads\",\"type\":1,\"size\":0,\"hash\":\"\"}]}"),
        ),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method("POST"),
            request::path("/api/v0/ls"),
            request::query(url_decoded(contains(("arg", "bafyExample/refs/heads")))),
        ])
        .respond_with(
            status_code(200).body("{\"entries\":[{\"name\":\"main\",\"type\":2,\"size\":41,\"hash\":\"\"}]}"),
        ),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method("POST"),
            request::path("/api/v0/cat"),
            request::query(url_decoded(contains(("arg", "bafyExample/refs/heads/main")))),
        ])
        .respond_with(status_code(200).body("4b825dc642cb6eb9a060e54bf8d69288fbee4904\n")),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method("POST"),
            request::path("/api/v0/ls"),
            request::query(url_decoded(contains(("arg", "bafyExample/HEAD")))),
        ])
        .respond_with(status_code(200).body("{\"entries\":[]}")),
    );
    // Read twice: once by `read_symbolic_reference`'s own `cat`, once more
    // by `handle_list`'s separate capture of the raw `HEAD` bytes to carry
    // forward into the next push's manifest.
    server.expect(
        Expectation::matching(all_of![
            request::method("POST"),
            request::path("/api/v0/cat"),
            request::query(url_decoded(contains(("arg", "bafyExample/HEAD")))),
        ])
        .times(2)
        .respond_with(status_code(200).body("ref: refs/heads/main\n")),
    );

    let (config, cas) = cas_pointed_at(&server);
    let remote = RemoteState {
        ipfs_path: "bafyExample".to_owned(),
        is_mutable_name: false,
        is_accessible: true,
    };
    let driver = Driver::new(&cas, &plumbing, &config, "origin", remote, None);

    let input = "list\npush :refs/heads/main\n\n\n";
    let mut output = Vec::new();
    driver.run(Cursor::new(input.as_bytes()), &mut output).unwrap();

    let text = String::from_utf8(output).unwrap();
    assert!(
        text.contains("error refs/heads/main refused to delete current branch"),
        "delete refusal: {}",
        text
    );
}
