// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Server-side cookie sealing and the rotating keyring behind it.
//!
//! Cookies are opaque to clients. The wire form used here is:
//!
//! ```text
//! [key_id: 2 bytes BE][nonce: 16 bytes][SIV tag: 16 bytes][sealed payload: 66 bytes]
//! ```
//!
//! The payload is the [`PlainCookie`] (`algorithm || s2c_key || c2s_key`),
//! sealed with AES-SIV-CMAC-256 under the keyring's current secret, with the
//! key id as associated data.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::aead::{self, KEY_LEN, NONCE_LEN, TAG_LEN};
use crate::error::CryptoError;

/// Serialized size of a [`PlainCookie`].
pub const PLAIN_COOKIE_LEN: usize = 2 + 2 * KEY_LEN;

/// Wire size of an [`EncryptedCookie`] minted by this crate.
pub const ENCRYPTED_COOKIE_LEN: usize = 2 + NONCE_LEN + TAG_LEN + PLAIN_COOKIE_LEN;

/// Per-session state a server needs to resume a client.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PlainCookie {
    /// Negotiated AEAD algorithm.
    pub algorithm_id: u16,
    /// Server-to-client key.
    pub s2c_key: [u8; KEY_LEN],
    /// Client-to-server key.
    pub c2s_key: [u8; KEY_LEN],
}

impl fmt::Debug for PlainCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlainCookie")
            .field("algorithm_id", &self.algorithm_id)
            .finish_non_exhaustive()
    }
}

impl PlainCookie {
    /// Serialize as `algorithm (BE) || s2c_key || c2s_key`.
    pub fn to_bytes(&self) -> Zeroizing<[u8; PLAIN_COOKIE_LEN]> {
        let mut out = Zeroizing::new([0u8; PLAIN_COOKIE_LEN]);
        out[..2].copy_from_slice(&self.algorithm_id.to_be_bytes());
        out[2..2 + KEY_LEN].copy_from_slice(&self.s2c_key);
        out[2 + KEY_LEN..].copy_from_slice(&self.c2s_key);
        out
    }

    /// Parse a serialized payload.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CryptoError> {
        if data.len() != PLAIN_COOKIE_LEN {
            return Err(CryptoError::MalformedCookie);
        }
        let mut cookie = PlainCookie {
            algorithm_id: u16::from_be_bytes([data[0], data[1]]),
            s2c_key: [0u8; KEY_LEN],
            c2s_key: [0u8; KEY_LEN],
        };
        cookie.s2c_key.copy_from_slice(&data[2..2 + KEY_LEN]);
        cookie.c2s_key.copy_from_slice(&data[2 + KEY_LEN..]);
        Ok(cookie)
    }
}

/// A sealed cookie as handed to clients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedCookie {
    /// Id of the keyring entry that sealed it.
    pub key_id: u16,
    /// Random sealing nonce.
    pub nonce: [u8; NONCE_LEN],
    /// SIV tag followed by the sealed payload.
    pub ciphertext: Vec<u8>,
}

impl EncryptedCookie {
    /// Wire form: `key_id || nonce || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + NONCE_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.key_id.to_be_bytes());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse the wire form. Anything too short to hold a tag is malformed.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CryptoError> {
        if data.len() < 2 + NONCE_LEN + TAG_LEN {
            return Err(CryptoError::MalformedCookie);
        }
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&data[2..2 + NONCE_LEN]);
        Ok(EncryptedCookie {
            key_id: u16::from_be_bytes([data[0], data[1]]),
            nonce,
            ciphertext: data[2 + NONCE_LEN..].to_vec(),
        })
    }
}

/// One keyring entry.
#[derive(Clone)]
pub struct CookieKey {
    key_id: u16,
    secret: Zeroizing<[u8; KEY_LEN]>,
    created: Instant,
    retired: Option<Instant>,
    grace: Duration,
}

impl fmt::Debug for CookieKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieKey")
            .field("key_id", &self.key_id)
            .field("created", &self.created)
            .field("retired", &self.retired)
            .finish_non_exhaustive()
    }
}

impl CookieKey {
    fn generate(key_id: u16) -> Self {
        let mut secret = Zeroizing::new([0u8; KEY_LEN]);
        rand::fill(&mut secret[..]);
        Self::from_secret(key_id, secret)
    }

    fn from_secret(key_id: u16, secret: Zeroizing<[u8; KEY_LEN]>) -> Self {
        CookieKey {
            key_id,
            secret,
            created: Instant::now(),
            retired: None,
            grace: Duration::ZERO,
        }
    }

    /// Identifier embedded in cookies sealed with this key.
    pub fn key_id(&self) -> u16 {
        self.key_id
    }

    /// When the key was created.
    pub fn created(&self) -> Instant {
        self.created
    }

    /// End of the validity window, `None` while the key is current.
    pub fn valid_until(&self) -> Option<Instant> {
        self.retired.map(|at| at + self.grace)
    }

    /// Whether `now` falls inside `[created, retired + grace)`.
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now >= self.created && self.valid_until().is_none_or(|end| now < end)
    }
}

/// An immutable keyring snapshot: one current key plus retained old keys.
///
/// Rotation and eviction return new snapshots; callers share a snapshot
/// behind an `Arc` and swap it atomically.
#[derive(Clone, Debug)]
pub struct CookieKeyring {
    current: CookieKey,
    /// Newest first.
    retained: Vec<CookieKey>,
}

impl Default for CookieKeyring {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieKeyring {
    /// Keyring with a single fresh random key (id 1).
    pub fn new() -> Self {
        CookieKeyring {
            current: CookieKey::generate(1),
            retained: Vec::new(),
        }
    }

    /// Keyring whose current key is the given secret.
    pub fn with_key(key_id: u16, secret: [u8; KEY_LEN]) -> Self {
        CookieKeyring {
            current: CookieKey::from_secret(key_id, Zeroizing::new(secret)),
            retained: Vec::new(),
        }
    }

    /// Id of the key used for minting.
    pub fn current_key_id(&self) -> u16 {
        self.current.key_id
    }

    /// All key ids, current first.
    pub fn key_ids(&self) -> Vec<u16> {
        std::iter::once(self.current.key_id)
            .chain(self.retained.iter().map(|k| k.key_id))
            .collect()
    }

    /// The current key followed by retained keys.
    pub fn keys(&self) -> impl Iterator<Item = &CookieKey> {
        std::iter::once(&self.current).chain(self.retained.iter())
    }

    fn find(&self, key_id: u16) -> Option<&CookieKey> {
        self.keys().find(|k| k.key_id == key_id)
    }

    /// A new snapshot with a fresh current key.
    ///
    /// The old current key is retained and stays usable for decryption
    /// until `grace` has passed from now.
    pub fn rotated(&self, grace: Duration) -> CookieKeyring {
        let now = Instant::now();
        let mut next_id = self.current.key_id.wrapping_add(1);
        while self.find(next_id).is_some() {
            next_id = next_id.wrapping_add(1);
        }

        let mut old = self.current.clone();
        old.retired = Some(now);
        old.grace = grace;

        let mut retained = Vec::with_capacity(self.retained.len() + 1);
        retained.push(old);
        retained.extend(self.retained.iter().cloned());

        debug!(
            retired_key = self.current.key_id,
            current_key = next_id,
            "rotated cookie key"
        );
        CookieKeyring {
            current: CookieKey::generate(next_id),
            retained,
        }
    }

    /// A new snapshot without retained keys whose window ended before `now`.
    ///
    /// The current key is never evicted.
    pub fn without_expired(&self, now: Instant) -> CookieKeyring {
        let retained: Vec<CookieKey> = self
            .retained
            .iter()
            .filter(|k| k.valid_until().is_none_or(|end| now < end))
            .cloned()
            .collect();
        let evicted = self.retained.len() - retained.len();
        if evicted > 0 {
            debug!(evicted, "evicted expired cookie keys");
        }
        CookieKeyring {
            current: self.current.clone(),
            retained,
        }
    }
}

/// Seal a cookie under the keyring's current key.
pub fn mint(plain: &PlainCookie, keyring: &CookieKeyring) -> Result<EncryptedCookie, CryptoError> {
    let key = &keyring.current;
    let aad = key.key_id.to_be_bytes();
    let payload = plain.to_bytes();
    let (nonce, ciphertext) = aead::seal(&key.secret, &aad, &payload[..])?;
    Ok(EncryptedCookie {
        key_id: key.key_id,
        nonce,
        ciphertext,
    })
}

/// Open a cookie with whichever keyring entry its key id names.
///
/// Expiry is not consulted here; a retained key is usable until it is
/// evicted from the keyring.
pub fn decrypt(cookie: &EncryptedCookie, keyring: &CookieKeyring) -> Result<PlainCookie, CryptoError> {
    let key = keyring
        .find(cookie.key_id)
        .ok_or(CryptoError::UnknownKeyId {
            key_id: cookie.key_id,
        })?;
    let aad = cookie.key_id.to_be_bytes();
    let payload = Zeroizing::new(aead::open(&key.secret, &aad, &cookie.nonce, &cookie.ciphertext)?);
    PlainCookie::from_bytes(&payload)
}

/// Parse and open a cookie in its wire form.
pub fn decrypt_bytes(data: &[u8], keyring: &CookieKeyring) -> Result<PlainCookie, CryptoError> {
    decrypt(&EncryptedCookie::from_bytes(data)?, keyring)
}
