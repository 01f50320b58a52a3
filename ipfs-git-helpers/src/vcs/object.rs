// Copyright © 2019-2020 The Radicle Foundation <hello@radicle.foundation>
//
// This file is part of radicle-link, distributed under the GPLv3 with Radicle
// Linking Exception. For full terms see the included LICENSE file.

//! The object data model (§3): canonical on-the-wire form
//! `"<kind> <size>\0<payload>"`, and its zlib-compressed counterpart, which
//! is exactly the representation a loose-object store already uses on disk.

use std::io::{Read, Write};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use ipfs_vcs_ext::Kind;

use crate::error::{HelperError, Result};

/// An object read from (or about to be written to) the VCS's object store:
/// a kind and a raw payload. The `oid` is deliberately not carried here —
/// it is always either known up front (we are about to upload it) or is
/// the thing we are about to verify against (we just downloaded it).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Object {
    pub kind: Kind,
    pub payload: Vec<u8>,
}

impl Object {
    pub fn new(kind: Kind, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }

    /// `"<kind> <size>\0<payload>"`.
    pub fn canonical(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.payload.len() + 32);
        buf.extend_from_slice(self.kind.as_str().as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.payload.len().to_string().as_bytes());
        buf.push(0);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// `deflate(canonical(self))`, zlib-wrapped exactly as the VCS's own
    /// loose-object format is.
    pub fn compress(&self) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&self.canonical())?;
        Ok(encoder.finish()?)
    }

    /// Inverse of [`Object::compress`]: inflate, split on the first NUL
    /// into header and payload, and parse the header as `"<kind> <size>"`.
    pub fn decompress(bytes: &[u8]) -> Result<Self> {
        let mut decoder = ZlibDecoder::new(bytes);
        let mut canonical = Vec::new();
        decoder.read_to_end(&mut canonical)?;
        Self::from_canonical(&canonical)
    }

    fn from_canonical(canonical: &[u8]) -> Result<Self> {
        let nul = canonical
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| HelperError::Cas {
                status: 0,
                message: "malformed object: no NUL separator in header".to_owned(),
            })?;
        let header = std::str::from_utf8(&canonical[..nul]).map_err(|_| HelperError::Cas {
            status: 0,
            message: "malformed object header: not utf8".to_owned(),
        })?;
        let mut parts = header.splitn(2, ' ');
        let (kind_str, size_str) = (
            parts.next().unwrap_or_default(),
            parts.next().unwrap_or_default(),
        );
        let kind: Kind = kind_str.parse().map_err(|_| HelperError::Cas {
            status: 0,
            message: format!("malformed object header: unknown kind {}", kind_str),
        })?;
        let size: usize = size_str.parse().map_err(|_| HelperError::Cas {
            status: 0,
            message: format!("malformed object header: bad size {}", size_str),
        })?;

        let payload = &canonical[nul + 1..];
        if payload.len() != size {
            return Err(HelperError::Cas {
                status: 0,
                message: format!(
                    "malformed object: header declares {} bytes, found {}",
                    size,
                    payload.len()
                ),
            });
        }

        Ok(Self {
            kind,
            payload: payload.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_compression() {
        let obj = Object::new(Kind::Blob, b"hello, world".to_vec());
        let compressed = obj.compress().unwrap();
        let decoded = Object::decompress(&compressed).unwrap();
        assert_eq!(obj, decoded);
    }

    #[test]
    fn canonical_matches_git_object_header() {
        let obj = Object::new(Kind::Blob, b"abc".to_vec());
        assert_eq!(obj.canonical(), b"blob 3\0abc");
    }

    #[test]
    fn rejects_truncated_payload() {
        let err = Object::from_canonical(b"blob 10\0abc").unwrap_err();
        assert!(matches!(err, HelperError::Cas { .. }));
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = Object::from_canonical(b"widget 3\0abc").unwrap_err();
        assert!(matches!(err, HelperError::Cas { .. }));
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn round_trip_any_payload(payload in proptest::collection::vec(any::<u8>(), 0..4096)) {
            for kind in [Kind::Blob, Kind::Tree, Kind::Commit, Kind::Tag] {
                let obj = Object::new(kind, payload.clone());
                let compressed = obj.compress().unwrap();
                let decoded = Object::decompress(&compressed).unwrap();
                prop_assert_eq!(&obj, &decoded);
                prop_assert_eq!(decoded.payload.len(), payload.len());
            }
        }
    }
}
