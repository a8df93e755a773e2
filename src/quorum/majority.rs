use super::{AckSet, Membership, QuorumSet, ServerId};

/// Majority is the default quorum definition.
///
/// Any set holding more than half of the voting members is a quorum, so
/// every two quorums of the same membership intersect. Member weights are
/// ignored: every server counts as 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MajorityQuorum {
    membership: Membership,
    /// Precomputed `voting / 2`
    half: u64,
}

impl MajorityQuorum {
    pub fn new(membership: Membership) -> Self {
        let half = membership.voting().len() as u64 / 2;
        Self { membership, half }
    }

    /// Number of acks needed for a quorum
    pub fn quorum_size(&self) -> u64 {
        self.half + 1
    }
}

impl QuorumSet for MajorityQuorum {
    fn membership(&self) -> &Membership {
        &self.membership
    }

    fn weight(&self, _id: ServerId) -> u64 {
        1
    }

    fn threshold(&self) -> u64 {
        self.half
    }

    fn contains_quorum(&self, ack_set: &AckSet) -> bool {
        ack_set.len() as u64 > self.half
    }
}
