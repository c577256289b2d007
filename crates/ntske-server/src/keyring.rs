// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Process-wide cookie keyring with atomic snapshot publication.
//!
//! Sessions take an `Arc` snapshot (the read lock is held only to clone the
//! `Arc`) and mint with it for the rest of the handshake. Rotation builds a
//! whole new [`CookieKeyring`] and swaps it in under the write lock, so a
//! session never sees a half-rotated keyring.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() {
//! use std::time::Duration;
//! use ntske_server::keyring::{SharedKeyring, spawn_rotation_task};
//!
//! let keyring = SharedKeyring::default();
//! // New key every hour; old keys keep working for a day.
//! let _task = spawn_rotation_task(
//!     keyring.clone(),
//!     Duration::from_secs(3600),
//!     Duration::from_secs(86400),
//! );
//! # }
//! ```

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use log::{debug, info};
use ntske_proto::cookie::CookieKeyring;
use tokio::task::JoinHandle;

/// A cloneable handle to the current keyring snapshot.
#[derive(Clone, Debug)]
pub struct SharedKeyring {
    inner: Arc<RwLock<Arc<CookieKeyring>>>,
}

impl Default for SharedKeyring {
    fn default() -> Self {
        Self::new(CookieKeyring::new())
    }
}

impl SharedKeyring {
    /// Wrap an initial keyring.
    pub fn new(keyring: CookieKeyring) -> Self {
        SharedKeyring {
            inner: Arc::new(RwLock::new(Arc::new(keyring))),
        }
    }

    /// The keyring as of now.
    pub fn snapshot(&self) -> Arc<CookieKeyring> {
        // The guarded value is only ever replaced whole, so a poisoned lock
        // still holds a consistent snapshot.
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the keyring.
    pub fn publish(&self, keyring: CookieKeyring) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(keyring);
    }

    /// Switch to a fresh current key; the old one stays usable for `grace`.
    ///
    /// Returns the new current key id.
    pub fn rotate(&self, grace: Duration) -> u16 {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let next = guard.rotated(grace);
        let key_id = next.current_key_id();
        *guard = Arc::new(next);
        info!("cookie key rotated, current key id {}", key_id);
        key_id
    }

    /// Drop retained keys whose grace period has ended.
    ///
    /// Returns the number of keys evicted.
    pub fn evict_expired(&self) -> usize {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let next = guard.without_expired(Instant::now());
        let evicted = guard.key_ids().len() - next.key_ids().len();
        if evicted > 0 {
            *guard = Arc::new(next);
            debug!("evicted {} expired cookie keys", evicted);
        }
        evicted
    }
}

/// Rotate every `period` and evict keys older than `grace` past retirement.
///
/// The first rotation happens one full `period` after the call.
pub fn spawn_rotation_task(shared: SharedKeyring, period: Duration, grace: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            interval.tick().await;
            shared.rotate(grace);
            shared.evict_expired();
        }
    })
}
