//! Acknowledgment Tracker
//!
//! Accumulates acknowledgments for one operation (an election round, a
//! proposal, a pending reconfiguration) against every active quorum
//! configuration at once.
//!
//! In steady state one configuration is registered. While a
//! reconfiguration is pending two are registered, the committed one and the
//! proposed one, and the operation only succeeds once both reach quorum on
//! their own. Any number of configurations is supported so cascading
//! reconfigurations stay correct.
//!
//! A tracker lives for a single operation and is dropped when that operation
//! concludes.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::quorum::{AckSet, QuorumConfig, ServerId};

/// Handle to a registered configuration.
///
/// Slots are never reused, so a handle to a retired configuration stays
/// dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigSlot(usize);

impl ConfigSlot {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Number of active configurations, named
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    /// Nothing registered
    Empty,
    /// Steady state
    Single,
    /// Reconfiguration in flight
    Dual,
    /// More than two configurations active
    Cascading(usize),
}

impl fmt::Display for TrackerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerPhase::Empty => write!(f, "EMPTY"),
            TrackerPhase::Single => write!(f, "SINGLE"),
            TrackerPhase::Dual => write!(f, "DUAL"),
            TrackerPhase::Cascading(n) => write!(f, "CASCADING({})", n),
        }
    }
}

#[derive(Debug)]
struct AckSetPair {
    config: Arc<QuorumConfig>,
    acks: AckSet,
}

/// Tracks acknowledgments against every active configuration.
///
/// With nothing registered, [`has_all_quorums`](Self::has_all_quorums) and
/// [`is_voting_member`](Self::is_voting_member) are vacuously true.
#[derive(Debug, Default)]
pub struct AckTracker {
    pairs: Vec<Option<AckSetPair>>,
}

impl AckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker with a single configuration registered
    pub fn with_config(config: Arc<QuorumConfig>) -> Self {
        let mut tracker = Self::new();
        tracker.register(config);
        tracker
    }

    /// Register a configuration with an empty ack set.
    ///
    /// Registering the same configuration twice yields two independent ack
    /// sets.
    pub fn register(&mut self, config: Arc<QuorumConfig>) -> ConfigSlot {
        let slot = ConfigSlot(self.pairs.len());
        tracing::debug!(
            "Registering quorum config v{:x} ({} voters) in slot {}",
            config.version(),
            config.voting_members().len(),
            slot.0
        );
        self.pairs.push(Some(AckSetPair {
            config,
            acks: AckSet::new(),
        }));
        slot
    }

    /// Stop tracking a configuration. Returns it if the slot was active.
    pub fn retire(&mut self, slot: ConfigSlot) -> Option<Arc<QuorumConfig>> {
        let pair = self.pairs.get_mut(slot.0)?.take()?;
        tracing::debug!(
            "Retired quorum config v{:x} from slot {}",
            pair.config.version(),
            slot.0
        );
        Some(pair.config)
    }

    fn active(&self) -> impl Iterator<Item = &AckSetPair> {
        self.pairs.iter().flatten()
    }

    fn pair(&self, slot: ConfigSlot) -> Option<&AckSetPair> {
        self.pairs.get(slot.0).and_then(Option::as_ref)
    }

    /// Number of active configurations
    pub fn active_configs(&self) -> usize {
        self.active().count()
    }

    pub fn phase(&self) -> TrackerPhase {
        match self.active_configs() {
            0 => TrackerPhase::Empty,
            1 => TrackerPhase::Single,
            2 => TrackerPhase::Dual,
            n => TrackerPhase::Cascading(n),
        }
    }

    /// Record an acknowledgment from `id`.
    ///
    /// The id is added to every active configuration where it is a voter.
    /// Returns true if at least one ack set changed. Acks from servers that
    /// vote nowhere are ignored.
    pub fn record_ack(&mut self, id: ServerId) -> bool {
        let mut changed = false;
        for pair in self.pairs.iter_mut().flatten() {
            if pair.config.is_voter(id) && pair.acks.insert(id) {
                changed = true;
            }
        }

        if changed {
            tracing::debug!("Recorded ack from server {}: {}", id, self.debug_summary());
        } else {
            tracing::trace!("Ack from server {} changed nothing", id);
        }
        changed
    }

    /// True only if `id` votes in every active configuration
    pub fn is_voting_member(&self, id: ServerId) -> bool {
        self.active().all(|pair| pair.config.is_voter(id))
    }

    /// True only if every active configuration has a quorum of its own
    pub fn has_all_quorums(&self) -> bool {
        self.active()
            .all(|pair| pair.config.contains_quorum(&pair.acks))
    }

    /// Whether one configuration has reached quorum. Inactive slots never
    /// have.
    pub fn has_quorum(&self, slot: ConfigSlot) -> bool {
        self.pair(slot)
            .map_or(false, |pair| pair.config.contains_quorum(&pair.acks))
    }

    pub fn config(&self, slot: ConfigSlot) -> Option<&Arc<QuorumConfig>> {
        self.pair(slot).map(|pair| &pair.config)
    }

    pub fn acked(&self, slot: ConfigSlot) -> Option<&AckSet> {
        self.pair(slot).map(|pair| &pair.acks)
    }

    pub fn ack_count(&self, slot: ConfigSlot) -> usize {
        self.acked(slot).map_or(0, AckSet::len)
    }

    /// Ack sets of the active configurations, e.g. `{1, 2, 3},{1, 2}`
    pub fn debug_summary(&self) -> String {
        self.active()
            .map(|pair| format!("{:?}", pair.acks))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// An [`AckTracker`] shared between peer-handling threads.
///
/// Every call takes the one lock, so concurrent acks are serialized and
/// reads see a consistent state. No call blocks on anything but the lock.
///
/// A thread that panicked while holding the lock leaves the tracker
/// poisoned; every later call fails with [`Error::InvariantViolation`].
#[derive(Debug, Clone, Default)]
pub struct SharedAckTracker {
    inner: Arc<Mutex<AckTracker>>,
}

impl SharedAckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Arc<QuorumConfig>) -> Self {
        Self::from(AckTracker::with_config(config))
    }

    fn lock(&self) -> Result<MutexGuard<'_, AckTracker>> {
        self.inner.lock().map_err(|_| {
            tracing::error!("Ack tracker lock poisoned");
            Error::InvariantViolation("ack tracker lock poisoned".into())
        })
    }

    pub fn register(&self, config: Arc<QuorumConfig>) -> Result<ConfigSlot> {
        Ok(self.lock()?.register(config))
    }

    pub fn retire(&self, slot: ConfigSlot) -> Result<Option<Arc<QuorumConfig>>> {
        Ok(self.lock()?.retire(slot))
    }

    pub fn record_ack(&self, id: ServerId) -> Result<bool> {
        Ok(self.lock()?.record_ack(id))
    }

    pub fn is_voting_member(&self, id: ServerId) -> Result<bool> {
        Ok(self.lock()?.is_voting_member(id))
    }

    pub fn has_all_quorums(&self) -> Result<bool> {
        Ok(self.lock()?.has_all_quorums())
    }

    pub fn has_quorum(&self, slot: ConfigSlot) -> Result<bool> {
        Ok(self.lock()?.has_quorum(slot))
    }

    pub fn ack_count(&self, slot: ConfigSlot) -> Result<usize> {
        Ok(self.lock()?.ack_count(slot))
    }

    pub fn phase(&self) -> Result<TrackerPhase> {
        Ok(self.lock()?.phase())
    }

    pub fn debug_summary(&self) -> Result<String> {
        Ok(self.lock()?.debug_summary())
    }

    /// Run `f` with the lock held, for multi-step reads or updates that
    /// must not interleave with other threads
    pub fn with<R>(&self, f: impl FnOnce(&mut AckTracker) -> R) -> Result<R> {
        Ok(f(&mut *self.lock()?))
    }
}

impl From<AckTracker> for SharedAckTracker {
    fn from(tracker: AckTracker) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tracker)),
        }
    }
}
