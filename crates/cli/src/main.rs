//! Fleet Leader CLI
//!
//! A command-line tool for inspecting the leader's resource inventory and
//! registering or removing agents by hand.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use client::{Location, Resource};
use commands::{agents, health, topology};

/// Fleet Leader CLI
#[derive(Parser)]
#[command(name = "fleetctl")]
#[command(author, version, about = "CLI for the Fleet Leader resource inventory", long_about = None)]
pub struct Cli {
    /// Leader URL (can also be set via FLEET_LEADER_URL env var)
    #[arg(long, env = "FLEET_LEADER_URL", default_value = "http://localhost:8930")]
    pub leader_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where an agent lives in the topology
#[derive(Args)]
pub struct LocationArgs {
    /// Data center name
    pub data_center: String,
    /// Rack name
    pub rack: String,
    /// Agent address
    pub address: String,
}

impl From<LocationArgs> for Location {
    fn from(args: LocationArgs) -> Self {
        Location {
            data_center: args.data_center,
            rack: args.rack,
            address: args.address,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show cluster totals and per-rack capacity
    Topology,

    /// List registered agents
    Agents {
        /// Only agents in this data center
        #[arg(long)]
        data_center: Option<String>,

        /// Only agents in racks with this name
        #[arg(long)]
        rack: Option<String>,
    },

    /// Show a single agent
    Agent {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Send a heartbeat and resource report for an agent
    Report {
        #[command(flatten)]
        location: LocationArgs,

        /// Total CPU count
        #[arg(long)]
        cpu: i64,

        /// Total memory in MiB
        #[arg(long)]
        memory_mb: i64,

        /// Allocated CPU count
        #[arg(long, default_value_t = 0)]
        allocated_cpu: i64,

        /// Allocated memory in MiB
        #[arg(long, default_value_t = 0)]
        allocated_memory_mb: i64,
    },

    /// Remove an agent from the inventory
    Remove {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Show leader health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let client = client::ApiClient::new(&cli.leader_url)?;

    match cli.command {
        Commands::Topology => {
            topology::show_topology(&client, cli.format).await?;
        }
        Commands::Agents { data_center, rack } => {
            agents::list_agents(&client, data_center, rack, cli.format).await?;
        }
        Commands::Agent { location } => {
            agents::show_agent(&client, location.into(), cli.format).await?;
        }
        Commands::Report {
            location,
            cpu,
            memory_mb,
            allocated_cpu,
            allocated_memory_mb,
        } => {
            let resource = Resource {
                cpu_count: cpu,
                memory_mb,
            };
            let allocated = Resource {
                cpu_count: allocated_cpu,
                memory_mb: allocated_memory_mb,
            };
            agents::report_agent(&client, location.into(), resource, allocated, cli.format).await?;
        }
        Commands::Remove { location } => {
            agents::remove_agent(&client, location.into(), cli.format).await?;
        }
        Commands::Health => {
            health::show_health(&client, cli.format).await?;
        }
    }

    Ok(())
}
