// Copyright © 2019-2020 The Radicle Foundation <hello@radicle.foundation>
//
// This file is part of radicle-link, distributed under the GPLv3 with Radicle
// Linking Exception. For full terms see the included LICENSE file.

//! Thin wrapper over the CAS daemon's JSON-over-HTTP API (§4.A). One method
//! per endpoint used; everything is a blocking `ureq` call, since the whole
//! helper is single-threaded and synchronous (§5).

use std::time::Duration;

use ureq::{Agent, AgentBuilder};

use crate::{
    cas::types::{AddEntry, LsResponse, PinRmResponse, PublishResponse, ResolveResponse, VersionResponse},
    config::Config,
    error::{HelperError, Result},
};

pub struct CasClient {
    agent: Agent,
    base: String,
    auth: Option<(String, String)>,
}

impl CasClient {
    pub fn new(config: &Config) -> Self {
        let timeout = Duration::from_secs_f64(config.timeout.max(0.0));
        let agent = AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();

        Self {
            agent,
            base: config.api_base(),
            auth: config
                .basic_auth()
                .map(|(u, p)| (u.to_owned(), p.to_owned())),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base.trim_end_matches('/'), endpoint)
    }

    /// Applies the basic-auth config (if set) and the `Connection: close`
    /// header. The latter preserves the original implementation's
    /// HTTP/1.0-style connection-close behavior, documented in §9, without
    /// pinning the whole process to HTTP/1.0.
    fn request(&self, method: &str, endpoint: &str) -> ureq::Request {
        let mut req = self.agent.request(method, &self.url(endpoint));
        req = req.set("Connection", "close");
        if let Some((user, pass)) = &self.auth {
            let token = base64::encode(format!("{}:{}", user, pass));
            req = req.set("Authorization", &format!("Basic {}", token));
        }
        req
    }

    fn map_transport(err: ureq::Error) -> HelperError {
        match err {
            ureq::Error::Status(status, response) => {
                let message = response
                    .into_string()
                    .unwrap_or_else(|_| "<non-utf8 body>".to_owned());
                HelperError::Cas { status, message }
            },
            ureq::Error::Transport(t) => {
                if matches!(t.kind(), ureq::ErrorKind::Io) && t.to_string().contains("timed out") {
                    HelperError::DaemonTimeout(Duration::default())
                } else {
                    HelperError::DaemonUnreachable(t.to_string())
                }
            },
        }
    }

    /// `version() -> {version, commit}`. Probed once at startup; failure is
    /// fatal (§4.A).
    pub fn version(&self) -> Result<VersionResponse> {
        self.request("POST", "version")
            .call()
            .map_err(Self::map_transport)?
            .into_json()
            .map_err(|e| HelperError::Cas {
                status: 0,
                message: e.to_string(),
            })
    }

    /// `ls(path) -> {entries: [...]}`. Used for discovery (§4.C) and
    /// reference enumeration (§4.D). Callers that treat a non-200 as a
    /// recoverable probe failure should match on [`HelperError::Cas`] /
    /// [`HelperError::DaemonTimeout`] rather than propagating.
    pub fn ls(&self, path: &str) -> Result<LsResponse> {
        self.request("POST", "ls")
            .query("arg", path)
            .call()
            .map_err(Self::map_transport)?
            .into_json()
            .map_err(|e| HelperError::Cas {
                status: 0,
                message: e.to_string(),
            })
    }

    /// `cat(path) -> bytes`. Used for reading reference files and object
    /// files.
    pub fn cat(&self, path: &str) -> Result<Vec<u8>> {
        let response = self
            .request("POST", "cat")
            .query("arg", path)
            .call()
            .map_err(Self::map_transport)?;
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut response.into_reader(), &mut buf)?;
        Ok(buf)
    }

    /// `add(files, opts) -> [{name, hash}, ...]`. Uploads a set of named
    /// byte streams wrapped in a single directory, with
    /// `wrap-with-directory=true`, `pin=true`, `raw-leaves=true`, and the
    /// configured `cid-version`/`chunker`. The response is
    /// newline-delimited JSON; only the last line (the wrapper directory's
    /// hash) is significant to callers, but every line is parsed so a
    /// malformed response is caught early.
    pub fn add(&self, files: &[(String, Vec<u8>)], cid_version: u32, chunker: &str) -> Result<String> {
        let boundary = "----ipfs-git-remote-boundary";
        let mut body = Vec::new();
        for (name, contents) in files {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                    name
                )
                .as_bytes(),
            );
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            body.extend_from_slice(contents);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        let response = self
            .request("POST", "add")
            .query("wrap-with-directory", "true")
            .query("pin", "true")
            .query("raw-leaves", "true")
            .query("cid-version", &cid_version.to_string())
            .query("chunker", chunker)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .send_bytes(&body)
            .map_err(Self::map_transport)?;

        let text = response.into_string().map_err(|e| HelperError::Cas {
            status: 0,
            message: e.to_string(),
        })?;

        let mut last_hash = None;
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let entry: AddEntry = serde_json::from_str(line).map_err(|e| HelperError::Cas {
                status: 0,
                message: format!("malformed add response line {:?}: {}", line, e),
            })?;
            last_hash = Some(entry.hash);
        }

        last_hash.ok_or_else(|| HelperError::Cas {
            status: 0,
            message: "add returned no entries".to_owned(),
        })
    }

    /// `name/resolve(arg) -> {path}`.
    pub fn name_resolve(&self, name: &str) -> Result<String> {
        Ok(self
            .request("POST", "name/resolve")
            .query("arg", name)
            .call()
            .map_err(Self::map_transport)?
            .into_json::<ResolveResponse>()
            .map_err(|e| HelperError::Cas {
                status: 0,
                message: e.to_string(),
            })?
            .path)
    }

    /// `name/publish(arg=cid, key, lifetime, allow-offline=true,
    /// resolve=true, ipns-base="base36")`.
    pub fn name_publish(&self, cid: &str, key: &str, lifetime: &str) -> Result<PublishResponse> {
        self.request("POST", "name/publish")
            .query("arg", cid)
            .query("key", key)
            .query("lifetime", lifetime)
            .query("allow-offline", "true")
            .query("resolve", "true")
            .query("ipns-base", "base36")
            .call()
            .map_err(Self::map_transport)?
            .into_json()
            .map_err(|e| HelperError::Cas {
                status: 0,
                message: e.to_string(),
            })
    }

    /// `pin/rm(arg, recursive=true) -> {pins: [...]}`.
    pub fn pin_rm(&self, arg: &str) -> Result<PinRmResponse> {
        self.request("POST", "pin/rm")
            .query("arg", arg)
            .query("recursive", "true")
            .call()
            .map_err(Self::map_transport)?
            .into_json()
            .map_err(|e| HelperError::Cas {
                status: 0,
                message: e.to_string(),
            })
    }
}

impl HelperError {
    /// Used by the discovery module (§4.C, §7) to decide whether a probe
    /// failure should fall through to the next probe instead of being
    /// fatal.
    pub fn is_recoverable_during_discovery(&self) -> bool {
        matches!(
            self,
            HelperError::DaemonTimeout(_) | HelperError::Cas { .. } | HelperError::DaemonUnreachable(_)
        )
    }
}
