//! # Credential Pool
//!
//! A fixed set of credential tokens, each either available or checked out.
//! Tokens are tracked by slot index so a configuration that lists the same
//! string twice still yields two distinct slots.
//!
//! When a checkout asks for more tokens than are available the pool does not
//! fail: it hands out `tokens[i % N]` for `i in 0..count` and leaves its
//! state untouched. Participants then share credentials.

use rand::seq::index::sample;
use tracing::{debug, warn};
use troupe_core::CredentialToken;

use crate::errors::PoolError;

/// Owned pool of credential tokens.
#[derive(Debug)]
pub struct CredentialPool {
    tokens: Vec<CredentialToken>,
    available: Vec<usize>,
    checked_out: Vec<usize>,
}

impl CredentialPool {
    /// Create a pool over a non-empty token set, all available.
    pub fn new(tokens: Vec<CredentialToken>) -> Result<Self, PoolError> {
        if tokens.is_empty() {
            return Err(PoolError::Empty);
        }
        let available = (0..tokens.len()).collect();
        Ok(Self {
            tokens,
            available,
            checked_out: Vec::new(),
        })
    }

    /// Check out `count` tokens.
    ///
    /// With enough tokens available, returns `count` distinct tokens chosen
    /// uniformly at random and marks them checked out. Otherwise returns
    /// `count` tokens cycling through the full set in original order, without
    /// changing availability. Never blocks and never fails.
    pub fn acquire(&mut self, count: usize) -> Vec<CredentialToken> {
        if count <= self.available.len() {
            let mut picked = sample(&mut rand::rng(), self.available.len(), count).into_vec();
            let tokens: Vec<CredentialToken> = picked
                .iter()
                .map(|&pos| self.tokens[self.available[pos]].clone())
                .collect();
            // Remove from the back so earlier positions stay valid.
            picked.sort_unstable_by(|a, b| b.cmp(a));
            for pos in picked {
                let slot = self.available.swap_remove(pos);
                self.checked_out.push(slot);
            }
            debug!(count, available = self.available.len(), "credentials checked out");
            return tokens;
        }

        warn!(
            requested = count,
            available = self.available.len(),
            total = self.tokens.len(),
            "credential pool exhausted, sharing tokens"
        );
        (0..count)
            .map(|i| self.tokens[i % self.tokens.len()].clone())
            .collect()
    }

    /// Return a checked-out token. No-op if it is not checked out.
    pub fn release(&mut self, token: &CredentialToken) {
        if let Some(pos) = self
            .checked_out
            .iter()
            .position(|&slot| &self.tokens[slot] == token)
        {
            let slot = self.checked_out.swap_remove(pos);
            self.available.push(slot);
        }
    }

    /// Return every checked-out token.
    pub fn release_all(&mut self) {
        self.available.append(&mut self.checked_out);
    }

    /// Tokens currently available.
    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    /// Size of the fixed token set.
    pub fn total_count(&self) -> usize {
        self.tokens.len()
    }

    /// Whether `token` belongs to the fixed set.
    pub fn contains(&self, token: &CredentialToken) -> bool {
        self.tokens.contains(token)
    }

    /// First token of the fixed set, in configuration order.
    pub fn primary(&self) -> &CredentialToken {
        &self.tokens[0]
    }
}
