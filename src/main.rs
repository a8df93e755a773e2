//! WolfQuorum - Quorum Membership Tool
//!
//! Inspect dynamic membership files and replay acknowledgments against
//! them, including a full reconfiguration handshake.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wolfquorum::config::WolfQuorumConfig;
use wolfquorum::error::{Error, Result};
use wolfquorum::quorum::{QuorumConfig, ServerId};
use wolfquorum::reconfig::ReconfigDriver;
use wolfquorum::tracker::AckTracker;

/// WolfQuorum - Quorum Membership and Acknowledgment Tracking
#[derive(Parser)]
#[command(name = "wolfquorum")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to node configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a dynamic membership file
    Validate {
        /// Membership file (defaults to quorum.dynamic_config)
        file: Option<PathBuf>,
    },

    /// Print a normalised membership file
    Show {
        /// Membership file (defaults to quorum.dynamic_config)
        file: Option<PathBuf>,

        /// Print a JSON summary instead
        #[arg(long)]
        json: bool,
    },

    /// Replay acks against one or more configurations
    Check {
        /// Membership file (defaults to quorum.dynamic_config)
        file: Option<PathBuf>,

        /// Additional configurations tracked at the same time
        #[arg(long)]
        next: Vec<PathBuf>,

        /// Acknowledging server ids
        #[arg(short, long, value_delimiter = ',')]
        ack: Vec<ServerId>,
    },

    /// Replay a reconfiguration handshake
    Reconfig {
        /// Proposed membership file
        proposed: PathBuf,

        /// Committed membership file (defaults to quorum.dynamic_config)
        #[arg(long)]
        committed: Option<PathBuf>,

        /// Expected committed version (hex)
        #[arg(long, value_parser = parse_hex)]
        from_version: Option<u64>,

        /// Version stamped on the proposal (hex)
        #[arg(long, value_parser = parse_hex)]
        proposal_version: u64,

        /// Acknowledging server ids
        #[arg(short, long, value_delimiter = ',')]
        ack: Vec<ServerId>,
    },

    /// Write a starter membership file
    Init {
        /// Output path
        #[arg(short, long, default_value = "dynamic.cfg")]
        output: PathBuf,

        /// Number of participants
        #[arg(long, default_value_t = 3)]
        servers: u64,

        /// Number of observers
        #[arg(long, default_value_t = 0)]
        observers: u64,
    },

    /// Show node information
    Info,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", failure_line(&e));
            ExitCode::FAILURE
        }
    }
}

/// The one line printed when a command fails
fn failure_line(e: &Error) -> String {
    match e.code() {
        Some(code) => format!("✗ {} (code {})", e, code.int_value()),
        None => format!("✗ {}", e),
    }
}

fn run(cli: Cli) -> Result<()> {
    let node_config = match &cli.config {
        Some(path) => Some(WolfQuorumConfig::from_file(path)?),
        None => None,
    };

    // Initialize logging
    let (level, format) = match &node_config {
        Some(c) => (c.logging.level.as_str(), c.logging.format.as_str()),
        None => ("info", "pretty"),
    };
    init_logging(cli.log_level.as_deref().unwrap_or(level), format);

    match cli.command {
        Commands::Validate { file } => run_validate(file, node_config.as_ref()),
        Commands::Show { file, json } => run_show(file, node_config.as_ref(), json),
        Commands::Check { file, next, ack } => run_check(file, next, ack, node_config.as_ref()),
        Commands::Reconfig {
            proposed,
            committed,
            from_version,
            proposal_version,
            ack,
        } => run_reconfig(
            proposed,
            committed,
            from_version,
            proposal_version,
            ack,
            node_config.as_ref(),
        ),
        Commands::Init {
            output,
            servers,
            observers,
        } => run_init(output, servers, observers),
        Commands::Info => run_info(node_config.as_ref()),
    }
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn parse_hex(s: &str) -> std::result::Result<u64, String> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| format!("invalid hex version '{}': {}", s, e))
}

/// Load an explicit membership file, or the one named by the node config
fn load_membership(file: Option<&Path>, node: Option<&WolfQuorumConfig>) -> Result<QuorumConfig> {
    let policy = node.and_then(|n| n.quorum.policy);
    if let Some(path) = file {
        let content = std::fs::read_to_string(path)?;
        return QuorumConfig::parse_with_policy(&content, policy);
    }

    match node {
        Some(node) => node.load_quorum_config()?.ok_or_else(|| {
            Error::Config("no membership file given and quorum.dynamic_config is not set".into())
        }),
        None => Err(Error::Config(
            "no membership file given (pass a file or --config)".into(),
        )),
    }
}

/// Validate a membership file
fn run_validate(file: Option<PathBuf>, node: Option<&WolfQuorumConfig>) -> Result<()> {
    let config = load_membership(file.as_deref(), node)?;

    println!("✓ Membership is valid");
    println!("  Version:    {:x}", config.version());
    println!("  Policy:     {}", config.policy_kind());
    println!("  Voters:     {:?}", config.voting_members().keys().collect::<Vec<_>>());
    println!("  Observers:  {:?}", config.observing_members().keys().collect::<Vec<_>>());
    println!("  Quorum:     weight > {}", config.summary().threshold);
    Ok(())
}

/// Print a membership file
fn run_show(file: Option<PathBuf>, node: Option<&WolfQuorumConfig>, json: bool) -> Result<()> {
    let config = load_membership(file.as_deref(), node)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&config.summary())?);
    } else {
        println!("{}", config);
    }
    Ok(())
}

/// Replay acks against one or more configurations
fn run_check(
    file: Option<PathBuf>,
    next: Vec<PathBuf>,
    acks: Vec<ServerId>,
    node: Option<&WolfQuorumConfig>,
) -> Result<()> {
    let mut tracker = AckTracker::new();
    let mut slots = vec![tracker.register(Arc::new(load_membership(file.as_deref(), node)?))];
    for path in &next {
        slots.push(tracker.register(Arc::new(load_membership(Some(path), node)?)));
    }

    for id in &acks {
        if !tracker.record_ack(*id) {
            tracing::info!("Ack from {} changed nothing", id);
        }
    }

    for slot in &slots {
        if let Some(config) = tracker.config(*slot) {
            println!(
                "v{:x} ({}): {} of {} voters acked, quorum {}",
                config.version(),
                config.policy_kind(),
                tracker.ack_count(*slot),
                config.voting_members().len(),
                if tracker.has_quorum(*slot) { "reached" } else { "not reached" }
            );
        }
    }
    println!("Phase:       {}", tracker.phase());
    println!("Ack sets:    {}", tracker.debug_summary());
    println!("All quorums: {}", if tracker.has_all_quorums() { "yes" } else { "no" });
    Ok(())
}

/// Replay a reconfiguration handshake
fn run_reconfig(
    proposed: PathBuf,
    committed: Option<PathBuf>,
    from_version: Option<u64>,
    proposal_version: u64,
    acks: Vec<ServerId>,
    node: Option<&WolfQuorumConfig>,
) -> Result<()> {
    let committed = load_membership(committed.as_deref(), node)?;
    let proposed = load_membership(Some(&proposed), node)?;
    let enabled = node.map_or(true, |n| n.quorum.reconfig_enabled);

    let mut driver = ReconfigDriver::new(Arc::new(committed), enabled);
    driver.begin(from_version, proposed, proposal_version)?;

    for id in &acks {
        driver.record_ack(*id);
    }

    match driver.try_commit()? {
        Some(config) => {
            println!("✓ Committed v{:x}", config.version());
            println!("{}", config);
        }
        None => {
            println!(
                "… Proposal has quorum, committed config does not yet ({})",
                driver.ack_summary().unwrap_or_default()
            );
        }
    }
    Ok(())
}

/// Write a starter membership file
fn run_init(output: PathBuf, servers: u64, observers: u64) -> Result<()> {
    if servers == 0 {
        return Err(Error::Config("at least one participant is required".into()));
    }

    let mut content = String::from("# WolfQuorum dynamic membership\n# server.<id>=<host>:<peerPort>:<electionPort>[:role][;clientPort]\n");
    for id in 1..=servers + observers {
        let role = if id <= servers { "participant" } else { "observer" };
        content.push_str(&format!(
            "server.{id}=127.0.0.1:{}:{}:{role};{}\n",
            7700 + id,
            7800 + id,
            7600 + id
        ));
    }
    content.push_str("version=1\n");

    // round-trip before writing so we never emit an invalid file
    QuorumConfig::parse(&content)?;

    std::fs::write(&output, content)?;
    println!("Membership file created: {}", output.display());
    println!("Check it with: wolfquorum validate {}", output.display());
    Ok(())
}

/// Show node information
fn run_info(node: Option<&WolfQuorumConfig>) -> Result<()> {
    let config = node.ok_or_else(|| Error::Config("info requires --config".into()))?;

    println!("WolfQuorum Node Information");
    println!("===========================");
    println!();
    println!("Node ID:          {}", config.node.id);
    println!(
        "Policy:           {}",
        config
            .quorum
            .policy
            .map(|p| p.to_string())
            .unwrap_or_else(|| "(from membership file)".into())
    );
    println!("Reconfig:         {}", if config.quorum.reconfig_enabled { "enabled" } else { "disabled" });
    match &config.quorum.dynamic_config {
        Some(path) => println!("Membership File:  {}", path.display()),
        None => println!("Membership File:  (none)"),
    }
    println!("Log Level:        {}", config.logging.level);
    println!("Log Format:       {}", config.logging.format);

    if let Some(quorum) = config.load_quorum_config()? {
        println!();
        println!("Membership v{:x}:", quorum.version());
        for member in quorum.all_members().values() {
            println!("  server.{} = {} (weight {})", member.id, member, member.weight);
        }
    }

    Ok(())
}
