//! Id generation.
//!
//! Stores and action stacks never mint ids themselves; they are handed an
//! [`IdGenerator`] so tests can supply deterministic sequences.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use uuid::Uuid;

/// Source of process-unique identifiers.
pub trait IdGenerator: Send + Sync + Debug {
    fn next_id(&self) -> String;
}

/// Shared handle injected into consumers.
pub type SharedIds = Arc<dyn IdGenerator>;

/// Monotonically increasing ids: `prefix-1`, `prefix-2`, ...
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }

    pub fn shared(prefix: impl Into<String>) -> SharedIds {
        Arc::new(Self::new(prefix))
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}

/// Random v4 UUIDs, used for user-created items.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl UuidIds {
    pub fn shared() -> SharedIds {
        Arc::new(Self)
    }
}

impl IdGenerator for UuidIds {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
