//! Node Selector Service
//!
//! Pure domain logic for choosing the one node responsible for a record.
//! Selectors hold no state, so a single instance can be shared by every
//! request handler without synchronization.

use crate::domain::value_objects::RoutingKey;

/// Selection failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    /// The pool snapshot was empty, nothing can aggregate the record.
    #[error("no route for key {0}: client pool is empty")]
    NoRoute(RoutingKey),
}

/// Strategy mapping `(clients, key)` to exactly one client.
///
/// Contract shared by all implementations:
/// - deterministic for a fixed `(clients, key)` pair
/// - `RoutingError::NoRoute` (never a panic) on an empty slice
/// - never mutates `clients`
pub trait NodeSelector<T>: Send + Sync {
    fn select<'a>(&self, clients: &'a [T], key: &RoutingKey) -> Result<&'a T, RoutingError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Always picks the first client.
///
/// For single-node deployments, or when consistency is enforced elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPrimarySelector;

impl<T> NodeSelector<T> for FixedPrimarySelector {
    fn select<'a>(&self, clients: &'a [T], key: &RoutingKey) -> Result<&'a T, RoutingError> {
        tracing::trace!(clients = clients.len(), "fixed-primary selection");
        clients
            .first()
            .ok_or_else(|| RoutingError::NoRoute(key.clone()))
    }

    fn name(&self) -> &'static str {
        "fixed-primary"
    }
}

/// Maps a key to `crc32(key) % len(clients)`.
///
/// Every record of one entity reaches the same node while membership is
/// stable. A membership change may remap keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicKeySelector;

impl DeterministicKeySelector {
    /// Index a key maps to for a pool of `len` clients.
    ///
    /// Returns None for an empty pool.
    pub fn index_for(key: &RoutingKey, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(crc32fast::hash(key.as_bytes()) as usize % len)
    }
}

impl<T> NodeSelector<T> for DeterministicKeySelector {
    fn select<'a>(&self, clients: &'a [T], key: &RoutingKey) -> Result<&'a T, RoutingError> {
        let index = Self::index_for(key, clients.len())
            .ok_or_else(|| RoutingError::NoRoute(key.clone()))?;
        Ok(&clients[index])
    }

    fn name(&self) -> &'static str {
        "deterministic-key"
    }
}

/// Selector chosen by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectorKind {
    FixedPrimary,
    #[default]
    DeterministicKey,
}

impl SelectorKind {
    /// Parse a selector name (`fixed-primary` or `deterministic-key`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "fixed-primary" | "fixed" | "first" => Some(Self::FixedPrimary),
            "deterministic-key" | "key" | "hash" => Some(Self::DeterministicKey),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FixedPrimary => "fixed-primary",
            Self::DeterministicKey => "deterministic-key",
        }
    }

    /// Build the selector this kind names.
    pub fn build<T>(&self) -> Box<dyn NodeSelector<T>> {
        match self {
            Self::FixedPrimary => Box::new(FixedPrimarySelector),
            Self::DeterministicKey => Box::new(DeterministicKeySelector),
        }
    }
}

impl std::fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
