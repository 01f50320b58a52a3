// Copyright © 2019-2020 The Radicle Foundation <hello@radicle.foundation>
//
// This file is part of radicle-link, distributed under the GPLv3 with Radicle
// Linking Exception. For full terms see the included LICENSE file.

use std::io;

use thiserror::Error;

/// The error taxonomy from the error handling design: one variant per kind,
/// each fatal unless stated otherwise.
#[derive(Debug, Error)]
pub enum HelperError {
    /// Missing or malformed `.git/ipfs/config`. Fatal, reported before any
    /// network I/O is attempted.
    #[error("{0}\n\nrun the install subcommand to (re-)create .git/ipfs/config")]
    Config(String),

    /// Connection refused, DNS failure, or a non-200 `version` response.
    /// Fatal.
    #[error("could not reach the CAS daemon: {0}")]
    DaemonUnreachable(String),

    /// A request to the CAS daemon timed out. Fatal during push/fetch;
    /// callers in the discovery module are expected to catch this
    /// themselves and fall through to the next probe instead of
    /// propagating it.
    #[error("request to the CAS daemon timed out after {0:?}")]
    DaemonTimeout(std::time::Duration),

    /// An unrecognised line arrived from the VCS driver on stdin.
    #[error("unsupported operation: {0}")]
    Protocol(String),

    /// A downloaded object's computed oid did not match the oid requested.
    /// Fatal: a data integrity violation.
    #[error("hash mismatch: expected {expected}, downloaded object hashes to {actual}")]
    HashMismatch { expected: String, actual: String },

    /// A single ref update was rejected; non-fatal, reported on the
    /// protocol channel and the batch continues.
    #[error("{dst} {reason}")]
    RefRejected { dst: String, reason: String },

    /// `update-server-info` or `set-remote-url` failed after the upload had
    /// already succeeded. Fatal, but the caller should still print the new
    /// CID so the user can recover manually.
    #[error("local plumbing command failed after upload: {0}")]
    PluggingFailure(String),

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("CAS daemon returned {status}: {message}")]
    Cas { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, HelperError>;
