//! Framing of persisted assets
//!
//! A stored value is `MAGIC || sha256(locator) || payload`. The fingerprint
//! lets a fresh process tell whether bytes left by an earlier run still
//! belong to the locator it is being asked for.

use crate::types::SourceLocator;
use bytes::Bytes;
use sha2::{Digest, Sha256};

const MAGIC: &[u8; 4] = b"ACE1";
const FINGERPRINT_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + FINGERPRINT_LEN;

type Fingerprint = [u8; FINGERPRINT_LEN];

fn fingerprint(locator: &SourceLocator) -> Fingerprint {
    let mut out = [0u8; FINGERPRINT_LEN];
    out.copy_from_slice(&Sha256::digest(locator.as_str().as_bytes()));
    out
}

/// Frame `payload` fetched from `locator` for the store
pub(crate) fn encode(locator: &SourceLocator, payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(HEADER_LEN + payload.len());
    framed.extend_from_slice(MAGIC);
    framed.extend_from_slice(&fingerprint(locator));
    framed.extend_from_slice(payload);
    framed
}

/// A persisted asset read back from the store
pub(crate) struct StoredEntry {
    fingerprint: Fingerprint,
    pub(crate) payload: Bytes,
}

impl StoredEntry {
    /// `None` if `raw` was not written by `encode`
    pub(crate) fn decode(raw: Bytes) -> Option<Self> {
        if raw.len() < HEADER_LEN || &raw[..MAGIC.len()] != MAGIC {
            return None;
        }

        let mut fingerprint = [0u8; FINGERPRINT_LEN];
        fingerprint.copy_from_slice(&raw[MAGIC.len()..HEADER_LEN]);

        Some(Self {
            fingerprint,
            payload: raw.slice(HEADER_LEN..),
        })
    }

    pub(crate) fn is_from(&self, locator: &SourceLocator) -> bool {
        self.fingerprint == fingerprint(locator)
    }
}
