//! WolfQuorum - Quorum Membership and Acknowledgment Tracking
//!
//! The decision core of a replicated coordination service: it answers
//! whether the acknowledgments received so far are enough to treat an
//! operation (an election round, a commit, a membership change) as agreed.
//!
//! # Architecture
//!
//! Transport and log replication live outside this crate. They feed acks in
//! through [`tracker::AckTracker::record_ack`] and poll
//! [`tracker::AckTracker::has_all_quorums`]. During a membership change the
//! committed and the proposed configuration are tracked together and both
//! must reach quorum independently.
//!
//! # Features
//!
//! - Majority and weighted-majority quorum policies
//! - Versioned, immutable quorum configurations with a line-based text format
//! - Ack tracking across any number of simultaneously active configurations
//! - Reconfiguration driver reporting typed consensus outcomes
//! - Node configuration in TOML

pub mod config;
pub mod error;
pub mod quorum;
pub mod reconfig;
pub mod tracker;

pub use config::WolfQuorumConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::WolfQuorumConfig;
    pub use crate::error::{Code, ConsensusError, Error, Result};
    pub use crate::quorum::{
        AckSet, LearnerType, Member, Membership, PolicyKind, QuorumConfig, QuorumPolicy,
        QuorumSet, ServerId,
    };
    pub use crate::reconfig::ReconfigDriver;
    pub use crate::tracker::{AckTracker, ConfigSlot, SharedAckTracker, TrackerPhase};
}
