//! Cluster Members
//!
//! Immutable description of a single server in a quorum configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Server identity, unique within a configuration
pub type ServerId = u64;

/// Default weight of a member
pub const DEFAULT_WEIGHT: u64 = 1;

/// Whether a member votes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearnerType {
    /// Counts toward quorum
    Participant,
    /// Receives state, never counts toward quorum
    Observer,
}

impl fmt::Display for LearnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LearnerType::Participant => write!(f, "participant"),
            LearnerType::Observer => write!(f, "observer"),
        }
    }
}

impl FromStr for LearnerType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "participant" => Ok(LearnerType::Participant),
            "observer" => Ok(LearnerType::Observer),
            other => Err(format!("unknown learner type '{}'", other)),
        }
    }
}

/// One server of a quorum configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Server identity
    pub id: ServerId,
    /// Host used for both quorum ports
    pub host: String,
    /// Port followers use to talk to the leader
    pub peer_port: u16,
    /// Port used for leader election
    pub election_port: u16,
    /// Client-facing address (host:port), if the server serves clients
    #[serde(default)]
    pub client_address: Option<String>,
    /// Voting role
    pub learner_type: LearnerType,
    /// Contribution to quorum under weighted policies
    #[serde(default = "default_weight")]
    pub weight: u64,
}

fn default_weight() -> u64 {
    DEFAULT_WEIGHT
}

impl Member {
    /// Create a voting member
    pub fn participant(id: ServerId, host: impl Into<String>, peer_port: u16, election_port: u16) -> Self {
        Self {
            id,
            host: host.into(),
            peer_port,
            election_port,
            client_address: None,
            learner_type: LearnerType::Participant,
            weight: DEFAULT_WEIGHT,
        }
    }

    /// Create a non-voting member
    pub fn observer(id: ServerId, host: impl Into<String>, peer_port: u16, election_port: u16) -> Self {
        Self {
            learner_type: LearnerType::Observer,
            ..Self::participant(id, host, peer_port, election_port)
        }
    }

    pub fn with_weight(mut self, weight: u64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_client_address(mut self, address: impl Into<String>) -> Self {
        self.client_address = Some(address.into());
        self
    }

    pub fn is_participant(&self) -> bool {
        self.learner_type == LearnerType::Participant
    }

    /// Peer address (host:port)
    pub fn peer_address(&self) -> String {
        format_host_port(&self.host, self.peer_port)
    }

    /// Election address (host:port)
    pub fn election_address(&self) -> String {
        format_host_port(&self.host, self.election_port)
    }

    /// Parse a server string of the form
    /// `host:peerPort:electionPort[:role][;[clientHost:]clientPort]`.
    ///
    /// IPv6 hosts must be bracketed.
    pub fn parse(id: ServerId, spec: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidServerSpec { id, reason };

        if id == 0 {
            return Err(invalid("server id must be positive".into()));
        }

        let (server_part, client_part) = match spec.split_once(';') {
            Some((server, client)) => (server.trim(), Some(client.trim())),
            None => (spec.trim(), None),
        };

        let (host, rest) = split_host(server_part).map_err(invalid)?;
        let fields: Vec<&str> = rest.split(':').collect();
        if fields.len() < 2 || fields.len() > 3 {
            return Err(invalid(format!(
                "expected host:peerPort:electionPort[:role], got '{}'",
                server_part
            )));
        }

        let peer_port = parse_port(fields[0]).map_err(invalid)?;
        let election_port = parse_port(fields[1]).map_err(invalid)?;
        let learner_type = match fields.get(2) {
            Some(role) => role.parse::<LearnerType>().map_err(invalid)?,
            None => LearnerType::Participant,
        };

        let client_address = match client_part {
            Some(client) => Some(parse_client_address(client).map_err(invalid)?),
            None => None,
        };

        Ok(Self {
            id,
            host: host.to_string(),
            peer_port,
            election_port,
            client_address,
            learner_type,
            weight: DEFAULT_WEIGHT,
        })
    }
}

/// Renders the server string accepted by [`Member::parse`]. Weight is
/// carried separately.
impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            format_host(&self.host),
            self.peer_port,
            self.election_port
        )?;
        write!(f, ":{}", self.learner_type)?;
        if let Some(client) = &self.client_address {
            write!(f, ";{}", client)?;
        }
        Ok(())
    }
}

fn format_host(host: &str) -> String {
    if host.contains(':') {
        format!("[{}]", host)
    } else {
        host.to_string()
    }
}

fn format_host_port(host: &str, port: u16) -> String {
    format!("{}:{}", format_host(host), port)
}

/// Split `host:rest`, honouring `[v6]:rest`
fn split_host(s: &str) -> std::result::Result<(&str, &str), String> {
    if let Some(bracketed) = s.strip_prefix('[') {
        let (host, rest) = bracketed
            .split_once(']')
            .ok_or_else(|| format!("unterminated IPv6 address in '{}'", s))?;
        let rest = rest
            .strip_prefix(':')
            .ok_or_else(|| format!("missing ports after '[{}]'", host))?;
        return Ok((host, rest));
    }

    let (host, rest) = s
        .split_once(':')
        .ok_or_else(|| format!("missing ports in '{}'", s))?;
    if host.is_empty() {
        return Err("empty host".into());
    }
    Ok((host, rest))
}

fn parse_port(s: &str) -> std::result::Result<u16, String> {
    match s.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(format!("invalid port '{}'", s)),
        Ok(port) => Ok(port),
    }
}

fn parse_client_address(s: &str) -> std::result::Result<String, String> {
    match s.rsplit_once(':') {
        Some((host, port)) => {
            let port = parse_port(port)?;
            let host = host.trim_start_matches('[').trim_end_matches(']');
            Ok(format_host_port(if host.is_empty() { "0.0.0.0" } else { host }, port))
        }
        None => Ok(format_host_port("0.0.0.0", parse_port(s)?)),
    }
}
