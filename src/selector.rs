//! Fair round-robin reviewer selection.
//!
//! The selector is a pure function over the reviewer pool, the slot count and
//! the bookkeeping stored in [`RotationState`]. It never performs I/O; the
//! orchestrator persists whatever it returns.
//!
//! Draw order is the pool's configured order. With a stable pool the sequence
//! of reviewers produced by consecutive calls is exactly the pool repeated
//! cyclically, so every reviewer is drawn once before anyone is drawn twice.

use std::collections::HashSet;

use crate::errors::ConfigError;
use crate::state::RotationState;

/// Ordered, duplicate-free set of reviewer handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewerPool {
    reviewers: Vec<String>,
}

impl ReviewerPool {
    /// Build a pool, rejecting empty pools and duplicate handles.
    /// Handles are case-sensitive.
    pub fn new<I, S>(reviewers: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let reviewers: Vec<String> = reviewers.into_iter().map(Into::into).collect();
        if reviewers.is_empty() {
            return Err(ConfigError::EmptyPool);
        }
        let mut seen = HashSet::new();
        for reviewer in &reviewers {
            if !seen.insert(reviewer.as_str()) {
                return Err(ConfigError::DuplicateReviewer(reviewer.clone()));
            }
        }
        Ok(Self { reviewers })
    }

    pub fn len(&self) -> usize {
        self.reviewers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reviewers.is_empty()
    }

    pub fn contains(&self, reviewer: &str) -> bool {
        self.reviewers.iter().any(|r| r == reviewer)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.reviewers
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.reviewers.iter()
    }

    /// Check that `slots` reviewers can be drawn from this pool.
    pub fn check_slots(&self, slots: usize) -> Result<(), ConfigError> {
        if slots == 0 || slots > self.len() {
            return Err(ConfigError::InvalidSlotCount {
                slots,
                pool_size: self.len(),
            });
        }
        Ok(())
    }
}

/// Result of one selection: the chosen reviewers plus the bookkeeping the
/// next call needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Reviewers chosen for this rotation, in draw order.
    pub reviewers: Vec<String>,
    /// Reviewers still waiting for a turn in the current cycle.
    pub pending: Vec<String>,
    /// The pool this selection was drawn from.
    pub known_pool: Vec<String>,
    /// How many new cycles were started while drawing.
    pub cycles_started: u64,
}

/// Draw the next `slots` reviewers.
///
/// Reviewers that left the pool are purged from the pending ordering. Reviewers
/// that joined since the last selection (absent from `known_pool`) are appended
/// to the current cycle. When the pending ordering runs dry a new cycle starts
/// with the full pool in configured order, except that reviewers already drawn
/// in this call go to the end of the new cycle.
pub fn select(
    pool: &ReviewerPool,
    slots: usize,
    state: &RotationState,
) -> Result<Selection, ConfigError> {
    pool.check_slots(slots)?;

    let mut pending = carry_over_pending(pool, state);
    let mut drawn: Vec<String> = Vec::with_capacity(slots);
    // A fresh state seeds its first cycle from the whole pool.
    let mut cycles_started = u64::from(state.known_pool.is_empty());

    while drawn.len() < slots {
        if pending.is_empty() {
            pending = new_cycle(pool, &drawn);
            cycles_started += 1;
        }
        let next = pending.remove(0);
        drawn.push(next);
    }

    Ok(Selection {
        reviewers: drawn,
        pending,
        known_pool: pool.as_slice().to_vec(),
        cycles_started,
    })
}

/// Pending reviewers from the stored state that are still eligible, followed
/// by newcomers in pool order.
fn carry_over_pending(pool: &ReviewerPool, state: &RotationState) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut pending: Vec<String> = Vec::with_capacity(pool.len());

    for reviewer in &state.pending {
        if pool.contains(reviewer) && seen.insert(reviewer.as_str()) {
            pending.push(reviewer.clone());
        }
    }

    let known: HashSet<&str> = state.known_pool.iter().map(String::as_str).collect();
    for reviewer in pool.iter() {
        if !known.contains(reviewer.as_str()) && seen.insert(reviewer.as_str()) {
            pending.push(reviewer.clone());
        }
    }

    pending
}

fn new_cycle(pool: &ReviewerPool, drawn: &[String]) -> Vec<String> {
    let (deferred, fresh): (Vec<String>, Vec<String>) =
        pool.iter().cloned().partition(|r| drawn.contains(r));
    fresh.into_iter().chain(deferred).collect()
}
