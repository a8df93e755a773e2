//! Reconfiguration Driver
//!
//! Admits a proposed configuration next to the committed one, tracks acks
//! against both and reports the outcome as a [`ConsensusError`] code when
//! the request cannot proceed. Only one reconfiguration may be pending at a
//! time.
//!
//! The driver never retries. Whether a `NewConfigNoQuorum` is worth waiting
//! on is up to the caller.

use std::sync::Arc;

use crate::error::{ConsensusError, Error, Result};
use crate::quorum::{QuorumConfig, ServerId};
use crate::tracker::{AckTracker, ConfigSlot};

/// A reconfiguration waiting for quorum under both eras
#[derive(Debug)]
struct PendingReconfig {
    proposed: Arc<QuorumConfig>,
    tracker: AckTracker,
    committed_slot: ConfigSlot,
    proposed_slot: ConfigSlot,
}

/// Drives membership changes for one server.
///
/// Methods take `&mut self`; callers sharing a driver between threads wrap
/// it in a mutex.
#[derive(Debug)]
pub struct ReconfigDriver {
    committed: Arc<QuorumConfig>,
    reconfig_enabled: bool,
    pending: Option<PendingReconfig>,
}

impl ReconfigDriver {
    pub fn new(committed: Arc<QuorumConfig>, reconfig_enabled: bool) -> Self {
        Self {
            committed,
            reconfig_enabled,
            pending: None,
        }
    }

    /// Last committed configuration
    pub fn committed(&self) -> &Arc<QuorumConfig> {
        &self.committed
    }

    /// Proposed configuration, while one is pending
    pub fn pending_config(&self) -> Option<&Arc<QuorumConfig>> {
        self.pending.as_ref().map(|p| &p.proposed)
    }

    pub fn is_in_progress(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.reconfig_enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.reconfig_enabled = enabled;
    }

    /// Admit a proposed configuration.
    ///
    /// `from_version`, when given, must match the committed version.
    /// On success the proposal is stamped with `proposal_version` and
    /// returned; acks are then tracked against both configurations.
    pub fn begin(
        &mut self,
        from_version: Option<u64>,
        mut proposed: QuorumConfig,
        proposal_version: u64,
    ) -> Result<Arc<QuorumConfig>> {
        if !self.reconfig_enabled {
            tracing::warn!("Rejecting reconfiguration: reconfig is disabled");
            return Err(ConsensusError::reconfig_disabled().into());
        }

        if let Some(pending) = &self.pending {
            tracing::warn!(
                "Rejecting reconfiguration: v{:x} is still pending",
                pending.proposed.version()
            );
            return Err(ConsensusError::reconfig_in_progress()
                .with_path(format!("v{:x}", pending.proposed.version()))
                .into());
        }

        if let Some(from) = from_version {
            if from != self.committed.version() {
                tracing::warn!(
                    "Rejecting reconfiguration from v{:x}: committed config is v{:x}",
                    from,
                    self.committed.version()
                );
                return Err(ConsensusError::bad_version()
                    .with_path(format!("v{:x}", from))
                    .into());
            }
        }

        if proposed == *self.committed {
            return Err(ConsensusError::bad_arguments()
                .with_path(format!("v{:x} is a no-op", proposed.version()))
                .into());
        }

        if proposal_version <= self.committed.version() {
            return Err(ConsensusError::bad_arguments()
                .with_path(format!(
                    "v{:x} does not follow v{:x}",
                    proposal_version,
                    self.committed.version()
                ))
                .into());
        }

        proposed.set_version(proposal_version);
        let proposed = Arc::new(proposed);

        let mut tracker = AckTracker::new();
        let committed_slot = tracker.register(self.committed.clone());
        let proposed_slot = tracker.register(proposed.clone());

        tracing::info!(
            "Reconfiguration v{:x} -> v{:x} started ({} -> {} voters)",
            self.committed.version(),
            proposed.version(),
            self.committed.voting_members().len(),
            proposed.voting_members().len()
        );

        self.pending = Some(PendingReconfig {
            proposed: proposed.clone(),
            tracker,
            committed_slot,
            proposed_slot,
        });
        Ok(proposed)
    }

    /// Record an ack for the pending reconfiguration.
    ///
    /// Returns false when nothing is pending or the ack changed nothing.
    pub fn record_ack(&mut self, id: ServerId) -> bool {
        match &mut self.pending {
            Some(pending) => pending.tracker.record_ack(id),
            None => false,
        }
    }

    /// Whether `id` votes in every configuration that currently matters
    pub fn is_voting_member(&self, id: ServerId) -> bool {
        match &self.pending {
            Some(pending) => pending.tracker.is_voting_member(id),
            None => self.committed.is_voter(id),
        }
    }

    /// True once the pending reconfiguration has quorum under both eras
    pub fn has_all_quorums(&self) -> bool {
        self.pending
            .as_ref()
            .map_or(false, |p| p.tracker.has_all_quorums())
    }

    /// Ack sets of the pending reconfiguration, committed era first
    pub fn ack_summary(&self) -> Option<String> {
        self.pending.as_ref().map(|p| p.tracker.debug_summary())
    }

    /// Try to commit the pending reconfiguration.
    ///
    /// - `Err(NewConfigNoQuorum)` while the proposed config lacks quorum
    /// - `Ok(None)` while the committed config still lacks quorum
    /// - `Ok(Some(config))` once both agree; `config` is now committed
    pub fn try_commit(&mut self) -> Result<Option<Arc<QuorumConfig>>> {
        let pending = self
            .pending
            .as_ref()
            .ok_or_else(|| Error::InvariantViolation("no reconfiguration pending".into()))?;

        if !pending.tracker.has_quorum(pending.proposed_slot) {
            tracing::debug!(
                "v{:x} has {} of {} voters acked",
                pending.proposed.version(),
                pending.tracker.ack_count(pending.proposed_slot),
                pending.proposed.voting_members().len()
            );
            return Err(ConsensusError::new_config_no_quorum()
                .with_path(format!("v{:x}", pending.proposed.version()))
                .into());
        }

        if !pending.tracker.has_quorum(pending.committed_slot) {
            tracing::debug!(
                "v{:x} has quorum, waiting on committed v{:x}",
                pending.proposed.version(),
                self.committed.version()
            );
            return Ok(None);
        }

        let proposed = pending.proposed.clone();
        self.pending = None;

        tracing::info!(
            "Reconfiguration committed: v{:x} -> v{:x}",
            self.committed.version(),
            proposed.version()
        );
        self.committed = proposed.clone();
        Ok(Some(proposed))
    }

    /// Drop the pending reconfiguration, returning the proposal
    pub fn abandon(&mut self) -> Option<Arc<QuorumConfig>> {
        let pending = self.pending.take()?;
        tracing::info!(
            "Reconfiguration to v{:x} abandoned with acks {}",
            pending.proposed.version(),
            pending.tracker.debug_summary()
        );
        Some(pending.proposed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Code;
    use crate::quorum::test_util::participants;
    use crate::quorum::Member;

    fn committed(ids: impl IntoIterator<Item = ServerId>) -> Arc<QuorumConfig> {
        Arc::new(QuorumConfig::majority(1, participants(ids)).unwrap())
    }

    fn proposal(ids: impl IntoIterator<Item = ServerId>) -> QuorumConfig {
        QuorumConfig::majority(0, participants(ids)).unwrap()
    }

    fn code_of<T: std::fmt::Debug>(result: Result<T>) -> Code {
        result.unwrap_err().code().expect("consensus error")
    }

    #[test]
    fn test_disabled_rejects() {
        let mut driver = ReconfigDriver::new(committed(1..=3), false);
        assert_eq!(code_of(driver.begin(None, proposal(1..=4), 2)), Code::ReconfigDisabled);

        driver.set_enabled(true);
        assert!(driver.begin(None, proposal(1..=4), 2).is_ok());
    }

    #[test]
    fn test_second_reconfig_is_rejected() {
        let mut driver = ReconfigDriver::new(committed(1..=3), true);
        driver.begin(None, proposal(1..=4), 2).unwrap();
        assert_eq!(code_of(driver.begin(None, proposal(1..=5), 3)), Code::ReconfigInProgress);
        assert_eq!(driver.pending_config().unwrap().version(), 2);
    }

    #[test]
    fn test_stale_base_version() {
        let mut driver = ReconfigDriver::new(committed(1..=3), true);
        let err = driver.begin(Some(7), proposal(1..=4), 2).unwrap_err();
        assert_eq!(err.code(), Some(Code::BadVersion));
        assert!(err.is_retryable());
        assert!(!driver.is_in_progress());

        assert!(driver.begin(Some(1), proposal(1..=4), 2).is_ok());
    }

    #[test]
    fn test_noop_and_non_monotonic_versions() {
        let mut driver = ReconfigDriver::new(committed(1..=3), true);
        assert_eq!(code_of(driver.begin(None, proposal(1..=3), 2)), Code::BadArguments);

        // same version as committed short-circuits to equal
        let mut same_version = proposal(4..=6);
        same_version.set_version(1);
        assert_eq!(code_of(driver.begin(None, same_version, 2)), Code::BadArguments);

        assert_eq!(code_of(driver.begin(None, proposal(1..=4), 1)), Code::BadArguments);
        assert!(!driver.is_in_progress());
    }

    #[test]
    fn test_commit_requires_new_config_quorum_first() {
        let mut driver = ReconfigDriver::new(committed(1..=3), true);
        driver.begin(None, proposal([1, 4, 5]), 2).unwrap();

        driver.record_ack(1);
        driver.record_ack(2);
        assert_eq!(code_of(driver.try_commit()), Code::NewConfigNoQuorum);

        driver.record_ack(4);
        let committed = driver.try_commit().unwrap().unwrap();
        assert_eq!(committed.version(), 2);
        assert_eq!(driver.committed().version(), 2);
        assert!(!driver.is_in_progress());
    }

    #[test]
    fn test_commit_waits_for_old_config() {
        let mut driver = ReconfigDriver::new(committed(1..=3), true);
        driver.begin(None, proposal([3, 4, 5]), 2).unwrap();

        driver.record_ack(4);
        driver.record_ack(5);
        assert!(driver.try_commit().unwrap().is_none());
        assert!(!driver.has_all_quorums());

        driver.record_ack(3);
        assert!(driver.try_commit().unwrap().is_none());
        driver.record_ack(1);
        assert!(driver.has_all_quorums());
        assert!(driver.try_commit().unwrap().is_some());
    }

    #[test]
    fn test_voting_membership_during_reconfig() {
        let mut driver = ReconfigDriver::new(committed(1..=3), true);
        assert!(driver.is_voting_member(3));

        let mut members = participants([1, 2]);
        members.push(Member::observer(3, "node-3", 2888, 3888));
        driver
            .begin(None, QuorumConfig::majority(0, members).unwrap(), 2)
            .unwrap();
        assert!(!driver.is_voting_member(3));
        assert!(driver.is_voting_member(1));

        driver.abandon().unwrap();
        assert!(driver.is_voting_member(3));
    }

    #[test]
    fn test_abandon_and_no_pending() {
        let mut driver = ReconfigDriver::new(committed(1..=3), true);
        assert!(driver.abandon().is_none());
        assert!(!driver.record_ack(1));
        assert!(driver.ack_summary().is_none());
        assert!(matches!(driver.try_commit(), Err(Error::InvariantViolation(_))));

        driver.begin(None, proposal(1..=4), 2).unwrap();
        driver.record_ack(1);
        assert_eq!(driver.ack_summary().unwrap(), "{1},{1}");
        assert_eq!(driver.abandon().unwrap().version(), 2);
        assert_eq!(driver.committed().version(), 1);

        assert!(driver.begin(None, proposal(1..=4), 3).is_ok());
    }
}
