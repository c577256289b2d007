// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! AES-SIV-CMAC-256 sealing (RFC 5297) for the single algorithm NTS-KE
//! negotiates here.

use aes_siv::Aes128SivAead;
use aes_siv::aead::{Aead, KeyInit, Payload};

use crate::error::CryptoError;

/// AEAD algorithm id for AES-SIV-CMAC-256.
pub const AEAD_AES_SIV_CMAC_256: u16 = 15;

/// Key length in bytes for AES-SIV-CMAC-256 (two AES-128 keys).
pub const KEY_LEN: usize = 32;

/// Nonce length used when sealing.
pub const NONCE_LEN: usize = 16;

/// Length of the synthetic IV prepended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// Key length for an algorithm id, or `None` if it is not supported.
pub fn aead_key_length(algorithm: u16) -> Option<usize> {
    match algorithm {
        AEAD_AES_SIV_CMAC_256 => Some(KEY_LEN),
        _ => None,
    }
}

/// Seal `plaintext` under `key` with a fresh random nonce.
///
/// Returns `(nonce, ciphertext)`; the ciphertext is `TAG_LEN` bytes longer
/// than the plaintext.
pub fn seal(
    key: &[u8; KEY_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<([u8; NONCE_LEN], Vec<u8>), CryptoError> {
    let cipher = Aes128SivAead::new_from_slice(key).map_err(|_| CryptoError::Seal)?;
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::fill(&mut nonce_bytes);

    let payload = Payload {
        msg: plaintext,
        aad,
    };
    let nonce = aes_siv::Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, payload)
        .map_err(|_| CryptoError::Seal)?;

    Ok((nonce_bytes, ciphertext))
}

/// Open a ciphertext produced by [`seal`].
pub fn open(
    key: &[u8; KEY_LEN],
    aad: &[u8],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes128SivAead::new_from_slice(key).map_err(|_| CryptoError::CookieAuthentication)?;
    let payload = Payload {
        msg: ciphertext,
        aad,
    };
    cipher
        .decrypt(aes_siv::Nonce::from_slice(nonce), payload)
        .map_err(|_| CryptoError::CookieAuthentication)
}
