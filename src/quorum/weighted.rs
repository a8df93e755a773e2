use super::{AckSet, Membership, QuorumSet, ServerId};

/// Weighted majority: a set is a quorum when its summed weight exceeds half
/// of the total voting weight.
///
/// Observers and unknown servers weigh 0. A voter configured with weight 0
/// may still be tracked but never moves the decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedQuorum {
    membership: Membership,
    total_weight: u64,
    half: u64,
}

impl WeightedQuorum {
    pub fn new(membership: Membership) -> Self {
        let total_weight = membership.total_voting_weight();
        Self {
            membership,
            total_weight,
            half: total_weight / 2,
        }
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Summed weight of an ack set
    pub fn ack_weight(&self, ack_set: &AckSet) -> u64 {
        ack_set.iter().map(|id| self.weight(*id)).sum()
    }
}

impl QuorumSet for WeightedQuorum {
    fn membership(&self) -> &Membership {
        &self.membership
    }

    fn weight(&self, id: ServerId) -> u64 {
        self.membership.voting().get(&id).map_or(0, |m| m.weight)
    }

    fn threshold(&self) -> u64 {
        self.half
    }

    fn contains_quorum(&self, ack_set: &AckSet) -> bool {
        self.ack_weight(ack_set) > self.half
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quorum::test_util::*;
    use crate::quorum::Member;

    fn weighted(weights: &[(ServerId, u64)]) -> WeightedQuorum {
        let members = weights
            .iter()
            .map(|(id, w)| Member::participant(*id, format!("node-{}", id), 2888, 3888).with_weight(*w));
        WeightedQuorum::new(Membership::new(members).unwrap())
    }

    #[test]
    fn test_heavy_member_carries_quorum() {
        let q = weighted(&[(1, 4), (2, 1), (3, 1), (4, 1)]);
        assert_eq!(q.total_weight(), 7);
        assert_eq!(q.threshold(), 3);
        assert!(q.contains_quorum(&acks(&[1])));
        assert!(!q.contains_quorum(&acks(&[2, 3, 4])));
    }

    #[test]
    fn test_ties_are_not_quorum() {
        let q = weighted(&[(1, 2), (2, 2)]);
        assert!(!q.contains_quorum(&acks(&[1])));
        assert!(q.contains_quorum(&acks(&[1, 2])));
    }

    #[test]
    fn test_zero_weight_voter() {
        let q = weighted(&[(1, 1), (2, 1), (3, 0)]);
        assert_eq!(q.threshold(), 1);
        assert_eq!(q.weight(3), 0);
        assert!(!q.contains_quorum(&acks(&[1, 3])));
        assert!(q.contains_quorum(&acks(&[1, 2])));
    }

    #[test]
    fn test_observer_and_unknown_weigh_nothing() {
        let members = vec![
            Member::participant(1, "a", 1, 2),
            Member::observer(2, "b", 1, 2).with_weight(5),
        ];
        let q = WeightedQuorum::new(Membership::new(members).unwrap());
        assert_eq!(q.weight(2), 0);
        assert_eq!(q.weight(99), 0);
        assert_eq!(q.total_weight(), 1);
    }
}
