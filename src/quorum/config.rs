//! Versioned Quorum Configurations
//!
//! A [`QuorumConfig`] pairs a membership snapshot with the policy that
//! governs it and a version stamp. Configurations are immutable once
//! published; the only mutation is [`QuorumConfig::set_version`], used when a
//! reconfiguration is stamped with its proposal version.
//!
//! The text format is line based:
//!
//! ```text
//! server.1=10.0.0.1:2888:3888:participant;2181
//! server.2=10.0.0.2:2888:3888
//! server.4=10.0.0.4:2888:3888:observer
//! weight.1=2
//! version=100000000
//! ```
//!
//! Any `weight.<id>` line selects the weighted policy.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{AckSet, Member, Membership, PolicyKind, QuorumPolicy, QuorumSet, ServerId};
use crate::error::{Error, Result};

/// A versioned membership snapshot with its quorum policy
#[derive(Debug, Clone)]
pub struct QuorumConfig {
    version: u64,
    policy: QuorumPolicy,
}

impl QuorumConfig {
    pub fn new(version: u64, policy: QuorumPolicy) -> Self {
        Self { version, policy }
    }

    /// Majority configuration over `members`
    pub fn majority(version: u64, members: impl IntoIterator<Item = Member>) -> Result<Self> {
        Ok(Self::new(
            version,
            QuorumPolicy::build(PolicyKind::Majority, Membership::new(members)?),
        ))
    }

    /// Weighted configuration over `members`
    pub fn weighted(version: u64, members: impl IntoIterator<Item = Member>) -> Result<Self> {
        Ok(Self::new(
            version,
            QuorumPolicy::build(PolicyKind::Weighted, Membership::new(members)?),
        ))
    }

    /// Parse the text format, choosing the policy from its contents
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_with_policy(text, None)
    }

    /// Parse the text format. `policy` overrides the policy implied by the
    /// text when given.
    pub fn parse_with_policy(text: &str, policy: Option<PolicyKind>) -> Result<Self> {
        let mut members: BTreeMap<ServerId, Member> = BTreeMap::new();
        let mut weights: BTreeMap<ServerId, u64> = BTreeMap::new();
        let mut version: Option<u64> = None;

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                Error::Config(format!("line {}: expected key=value, got '{}'", lineno + 1, line))
            })?;
            let (key, value) = (key.trim(), value.trim());

            if let Some(id) = key.strip_prefix("server.") {
                let id = parse_id(id, lineno)?;
                let member = Member::parse(id, value)?;
                if members.insert(id, member).is_some() {
                    return Err(Error::DuplicateServer(id));
                }
            } else if let Some(id) = key.strip_prefix("weight.") {
                let id = parse_id(id, lineno)?;
                let weight = value.parse::<u64>().map_err(|_| {
                    Error::Config(format!("line {}: invalid weight '{}'", lineno + 1, value))
                })?;
                if weights.insert(id, weight).is_some() {
                    return Err(Error::Config(format!("duplicate weight for server {}", id)));
                }
            } else if key == "version" {
                if version.is_some() {
                    return Err(Error::Config("duplicate version line".into()));
                }
                let parsed = u64::from_str_radix(value, 16)
                    .map_err(|_| Error::InvalidVersion(value.to_string()))?;
                version = Some(parsed);
            } else {
                return Err(Error::Config(format!(
                    "line {}: unknown key '{}'",
                    lineno + 1,
                    key
                )));
            }
        }

        for (id, weight) in &weights {
            let member = members.get_mut(id).ok_or_else(|| {
                Error::Config(format!("weight.{} given for unknown server", id))
            })?;
            member.weight = *weight;
        }

        let membership = Membership::from_map(members)?;
        if membership.voting().is_empty() {
            return Err(Error::Config("configuration has no participants".into()));
        }

        let kind = policy.unwrap_or(if weights.is_empty() {
            PolicyKind::Majority
        } else {
            PolicyKind::Weighted
        });

        Ok(Self::new(version.unwrap_or(0), QuorumPolicy::build(kind, membership)))
    }

    /// Load the text format from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Rewrite the version stamp. Only valid before the configuration is
    /// shared.
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn policy(&self) -> &QuorumPolicy {
        &self.policy
    }

    pub fn policy_kind(&self) -> PolicyKind {
        self.policy.kind()
    }

    pub fn membership(&self) -> &Membership {
        self.policy.membership()
    }

    pub fn all_members(&self) -> &BTreeMap<ServerId, Member> {
        self.membership().all()
    }

    pub fn voting_members(&self) -> &BTreeMap<ServerId, Member> {
        self.membership().voting()
    }

    pub fn observing_members(&self) -> &BTreeMap<ServerId, Member> {
        self.membership().observing()
    }

    pub fn is_voter(&self, id: ServerId) -> bool {
        self.membership().is_voter(id)
    }

    pub fn weight(&self, id: ServerId) -> u64 {
        self.policy.weight(id)
    }

    pub fn contains_quorum(&self, ack_set: &AckSet) -> bool {
        self.policy.contains_quorum(ack_set)
    }

    /// Serializable overview
    pub fn summary(&self) -> MembershipSummary {
        MembershipSummary {
            version: self.version,
            policy: self.policy_kind(),
            voting: self.voting_members().keys().copied().collect(),
            observing: self.observing_members().keys().copied().collect(),
            total_voting_weight: self.membership().total_voting_weight(),
            threshold: self.policy.threshold(),
        }
    }
}

/// Configurations with the same version are equal whatever their
/// membership. Otherwise they are equal when every member matches.
///
/// This relation is not transitive, so `Eq` and `Hash` are not implemented.
impl PartialEq for QuorumConfig {
    fn eq(&self, other: &Self) -> bool {
        if self.version == other.version {
            return true;
        }
        self.all_members() == other.all_members()
    }
}

impl fmt::Display for QuorumConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for member in self.all_members().values() {
            writeln!(f, "server.{}={}", member.id, member)?;
        }
        if self.policy_kind() == PolicyKind::Weighted {
            for member in self.voting_members().values() {
                writeln!(f, "weight.{}={}", member.id, member.weight)?;
            }
        }
        write!(f, "version={:x}", self.version)
    }
}

/// Membership overview, for status output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipSummary {
    pub version: u64,
    pub policy: PolicyKind,
    pub voting: Vec<ServerId>,
    pub observing: Vec<ServerId>,
    pub total_voting_weight: u64,
    pub threshold: u64,
}

fn parse_id(s: &str, lineno: usize) -> Result<ServerId> {
    s.parse::<ServerId>()
        .map_err(|_| Error::Config(format!("line {}: invalid server id '{}'", lineno + 1, s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quorum::test_util::*;
    use crate::quorum::LearnerType;

    const THREE_PLUS_OBSERVER: &str = "\
# initial ensemble
server.1=10.0.0.1:2888:3888:participant;2181
server.2=10.0.0.2:2888:3888
server.3=10.0.0.3:2888:3888

server.4=10.0.0.4:2888:3888:observer
version=1f
";

    #[test]
    fn test_parse_text() {
        let cfg = QuorumConfig::parse(THREE_PLUS_OBSERVER).unwrap();
        assert_eq!(cfg.version(), 0x1f);
        assert_eq!(cfg.policy_kind(), PolicyKind::Majority);
        assert_eq!(cfg.all_members().len(), 4);
        assert_eq!(cfg.voting_members().len(), 3);
        assert_eq!(cfg.observing_members()[&4].learner_type, LearnerType::Observer);
        assert_eq!(
            cfg.all_members()[&1].client_address.as_deref(),
            Some("0.0.0.0:2181")
        );
    }

    #[test]
    fn test_missing_version_defaults_to_zero() {
        let cfg = QuorumConfig::parse("server.1=a:1:2").unwrap();
        assert_eq!(cfg.version(), 0);
    }

    #[test]
    fn test_weights_select_weighted_policy() {
        let text = "server.1=a:1:2\nserver.2=b:1:2\nserver.3=c:1:2\nweight.1=3\nversion=2";
        let cfg = QuorumConfig::parse(text).unwrap();
        assert_eq!(cfg.policy_kind(), PolicyKind::Weighted);
        assert_eq!(cfg.weight(1), 3);
        assert_eq!(cfg.weight(2), 1);
        assert!(cfg.contains_quorum(&acks(&[1])));

        let forced = QuorumConfig::parse_with_policy(text, Some(PolicyKind::Majority)).unwrap();
        assert_eq!(forced.policy_kind(), PolicyKind::Majority);
        assert!(!forced.contains_quorum(&acks(&[1])));
    }

    #[test]
    fn test_parse_errors() {
        let dup = "server.1=a:1:2\nserver.1=b:1:2";
        assert!(matches!(QuorumConfig::parse(dup), Err(Error::DuplicateServer(1))));

        let bad_version = "server.1=a:1:2\nversion=xyz";
        assert!(matches!(QuorumConfig::parse(bad_version), Err(Error::InvalidVersion(_))));

        let bad_spec = "server.1=a:1";
        assert!(matches!(
            QuorumConfig::parse(bad_spec),
            Err(Error::InvalidServerSpec { id: 1, .. })
        ));

        for text in [
            "server.x=a:1:2",
            "server.1=a:1:2\nbogus=1",
            "server.1=a:1:2\nweight.2=1",
            "server.1=a:1:2\nweight.1=heavy",
            "server.1=a:1:2\nversion=1\nversion=2",
            "server.1=a:1:2\nserver.2=b:1:2\nweight.1=18446744073709551615\nweight.2=1\nversion=1",
            "server.1=a:1:2:observer",
            "just a line",
        ] {
            let err = QuorumConfig::parse(text).unwrap_err();
            assert!(err.is_config_error(), "{} -> {:?}", text, err);
        }
    }

    #[test]
    fn test_display_round_trips() {
        let cfg = QuorumConfig::parse(THREE_PLUS_OBSERVER).unwrap();
        let text = cfg.to_string();
        assert!(text.ends_with("version=1f"));
        assert!(text.starts_with("server.1=10.0.0.1:2888:3888:participant;0.0.0.0:2181\n"));

        let reparsed = QuorumConfig::parse(&text).unwrap();
        assert_eq!(reparsed.all_members(), cfg.all_members());
        assert_eq!(reparsed.version(), cfg.version());

        let weighted = QuorumConfig::parse("server.1=a:1:2\nserver.2=b:1:2\nweight.2=5").unwrap();
        let reparsed = QuorumConfig::parse(&weighted.to_string()).unwrap();
        assert_eq!(reparsed.policy_kind(), PolicyKind::Weighted);
        assert_eq!(reparsed.weight(2), 5);
    }

    #[test]
    fn test_equal_versions_short_circuit_membership() {
        let a = QuorumConfig::majority(7, participants(1..=3)).unwrap();
        let b = QuorumConfig::majority(7, participants(4..=9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_versions_compare_members() {
        let a = QuorumConfig::majority(1, participants(1..=3)).unwrap();
        let same = QuorumConfig::majority(2, participants(1..=3)).unwrap();
        let grown = QuorumConfig::majority(3, participants(1..=4)).unwrap();
        let mut moved = participants(1..=3);
        moved[2].peer_port = 9999;
        let moved = QuorumConfig::majority(4, moved).unwrap();

        assert_eq!(a, same);
        assert_ne!(a, grown);
        assert_ne!(a, moved);
    }

    #[test]
    fn test_set_version() {
        let mut cfg = QuorumConfig::majority(1, participants(1..=3)).unwrap();
        cfg.set_version(0x100000002);
        assert_eq!(cfg.version(), 0x100000002);
        assert!(cfg.to_string().ends_with("version=100000002"));
    }

    #[test]
    fn test_summary() {
        let cfg = QuorumConfig::parse(THREE_PLUS_OBSERVER).unwrap();
        let summary = cfg.summary();
        assert_eq!(summary.voting, vec![1, 2, 3]);
        assert_eq!(summary.observing, vec![4]);
        assert_eq!(summary.threshold, 1);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"policy\":\"majority\""));
    }
}
