//! Quorum Policies
//!
//! A quorum policy decides whether a set of acknowledging servers is enough
//! to make a decision binding. The set of policies is closed: majority and
//! weighted majority. Both implement [`QuorumSet`] and are selected through
//! [`QuorumPolicy`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

mod config;
mod majority;
mod member;
mod weighted;

pub use config::{MembershipSummary, QuorumConfig};
pub use majority::MajorityQuorum;
pub use member::{LearnerType, Member, ServerId, DEFAULT_WEIGHT};
pub use weighted::WeightedQuorum;

/// Set of acknowledging servers, scoped to one configuration
pub type AckSet = BTreeSet<ServerId>;

/// Membership of one configuration, partitioned by role
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    all: BTreeMap<ServerId, Member>,
    voting: BTreeMap<ServerId, Member>,
    observing: BTreeMap<ServerId, Member>,
    total_voting_weight: u64,
}

impl Membership {
    /// Build a membership, rejecting duplicate ids
    pub fn new(members: impl IntoIterator<Item = Member>) -> Result<Self> {
        let mut all = BTreeMap::new();
        for member in members {
            let id = member.id;
            if all.insert(id, member).is_some() {
                return Err(Error::DuplicateServer(id));
            }
        }
        Self::from_map(all)
    }

    /// Build a membership from a map already keyed by id.
    ///
    /// Fails when the voting weights do not fit in a `u64`.
    pub fn from_map(all: BTreeMap<ServerId, Member>) -> Result<Self> {
        let (voting, observing): (BTreeMap<_, _>, BTreeMap<_, _>) = all
            .iter()
            .map(|(id, m)| (*id, m.clone()))
            .partition(|(_, m)| m.is_participant());

        let total_voting_weight = voting
            .values()
            .try_fold(0u64, |total, m| total.checked_add(m.weight))
            .ok_or_else(|| Error::Config("total voting weight overflows u64".into()))?;

        Ok(Self {
            all,
            voting,
            observing,
            total_voting_weight,
        })
    }

    pub fn all(&self) -> &BTreeMap<ServerId, Member> {
        &self.all
    }

    pub fn voting(&self) -> &BTreeMap<ServerId, Member> {
        &self.voting
    }

    pub fn observing(&self) -> &BTreeMap<ServerId, Member> {
        &self.observing
    }

    pub fn is_voter(&self, id: ServerId) -> bool {
        self.voting.contains_key(&id)
    }

    pub fn get(&self, id: ServerId) -> Option<&Member> {
        self.all.get(&id)
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Sum of configured weights over voting members
    pub fn total_voting_weight(&self) -> u64 {
        self.total_voting_weight
    }
}

/// Decision rule over a fixed membership snapshot.
///
/// `contains_quorum` assumes the ack set was already filtered to voting
/// members; implementations do not filter again.
pub trait QuorumSet {
    fn membership(&self) -> &Membership;

    /// Contribution of one server. Unknown servers weigh 0 unless the
    /// policy says otherwise.
    fn weight(&self, id: ServerId) -> u64;

    /// Largest acknowledged weight that is still not a quorum
    fn threshold(&self) -> u64;

    fn contains_quorum(&self, ack_set: &AckSet) -> bool;
}

/// Which policy a configuration uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Majority,
    Weighted,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 2] = [PolicyKind::Majority, PolicyKind::Weighted];
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Majority => write!(f, "majority"),
            PolicyKind::Weighted => write!(f, "weighted"),
        }
    }
}

/// The closed set of quorum policies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuorumPolicy {
    Majority(MajorityQuorum),
    Weighted(WeightedQuorum),
}

impl QuorumPolicy {
    pub fn build(kind: PolicyKind, membership: Membership) -> Self {
        match kind {
            PolicyKind::Majority => QuorumPolicy::Majority(MajorityQuorum::new(membership)),
            PolicyKind::Weighted => QuorumPolicy::Weighted(WeightedQuorum::new(membership)),
        }
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            QuorumPolicy::Majority(_) => PolicyKind::Majority,
            QuorumPolicy::Weighted(_) => PolicyKind::Weighted,
        }
    }
}

impl QuorumSet for QuorumPolicy {
    fn membership(&self) -> &Membership {
        match self {
            QuorumPolicy::Majority(q) => q.membership(),
            QuorumPolicy::Weighted(q) => q.membership(),
        }
    }

    fn weight(&self, id: ServerId) -> u64 {
        match self {
            QuorumPolicy::Majority(q) => q.weight(id),
            QuorumPolicy::Weighted(q) => q.weight(id),
        }
    }

    fn threshold(&self) -> u64 {
        match self {
            QuorumPolicy::Majority(q) => q.threshold(),
            QuorumPolicy::Weighted(q) => q.threshold(),
        }
    }

    fn contains_quorum(&self, ack_set: &AckSet) -> bool {
        match self {
            QuorumPolicy::Majority(q) => q.contains_quorum(ack_set),
            QuorumPolicy::Weighted(q) => q.contains_quorum(ack_set),
        }
    }
}
