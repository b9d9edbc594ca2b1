//! Agent listing, lookup, report, and removal commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{AgentReport, AgentView, ApiClient, Location, Resource};
use crate::output::{
    color_utilization, format_age_ms, format_memory_mb, print_info, print_json, print_success,
    print_table, print_warning, OutputFormat,
};

/// Row for the agent table
#[derive(Tabled)]
struct AgentRow {
    #[tabled(rename = "Data Center")]
    data_center: String,
    #[tabled(rename = "Rack")]
    rack: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "CPU (alloc/cap)")]
    cpu: String,
    #[tabled(rename = "Memory (alloc/cap)")]
    memory: String,
    #[tabled(rename = "CPU %")]
    cpu_utilization: String,
    #[tabled(rename = "Last Heartbeat")]
    heartbeat: String,
}

impl From<&AgentView> for AgentRow {
    fn from(agent: &AgentView) -> Self {
        Self {
            data_center: agent.location.data_center.clone(),
            rack: agent.location.rack.clone(),
            address: agent.location.address.clone(),
            cpu: format!("{}/{}", agent.allocated.cpu_count, agent.resource.cpu_count),
            memory: format!(
                "{}/{}",
                format_memory_mb(agent.allocated.memory_mb),
                format_memory_mb(agent.resource.memory_mb)
            ),
            cpu_utilization: color_utilization(agent.allocated.cpu_count, agent.resource.cpu_count),
            heartbeat: format!("{} ago", format_age_ms(agent.heartbeat_age_ms)),
        }
    }
}

/// List agents, optionally restricted to one data center or rack
pub async fn list_agents(
    client: &ApiClient,
    data_center: Option<String>,
    rack: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let topology = client.topology().await?;

    let agents: Vec<AgentView> = topology
        .data_centers
        .into_iter()
        .filter(|dc| data_center.as_ref().map_or(true, |name| &dc.name == name))
        .flat_map(|dc| dc.racks)
        .filter(|r| rack.as_ref().map_or(true, |name| &r.name == name))
        .flat_map(|r| r.agents)
        .collect();

    match format {
        OutputFormat::Json => print_json(&agents)?,
        OutputFormat::Table => {
            let rows: Vec<AgentRow> = agents.iter().map(AgentRow::from).collect();
            print_table(rows);
            println!("\nTotal: {} agents", agents.len());
        }
    }

    Ok(())
}

/// Show one agent in detail
pub async fn show_agent(client: &ApiClient, location: Location, format: OutputFormat) -> Result<()> {
    let Some(agent) = client.agent(&location).await? else {
        print_warning(&format!(
            "No agent registered at {}/{}/{}",
            location.data_center, location.rack, location.address
        ));
        return Ok(());
    };

    match format {
        OutputFormat::Json => print_json(&agent)?,
        OutputFormat::Table => {
            println!("{}", "Agent".bold());
            println!("{}", "=".repeat(50));
            println!("Data Center:            {}", agent.location.data_center.cyan());
            println!("Rack:                   {}", agent.location.rack.cyan());
            println!("Address:                {}", agent.location.address.cyan());
            println!(
                "Last Heartbeat:         {} ago",
                format_age_ms(agent.heartbeat_age_ms)
            );
            println!();
            println!("{}", "Resources".bold());
            println!("{}", "-".repeat(50));
            println!(
                "CPU:                    {}/{} ({})",
                agent.allocated.cpu_count,
                agent.resource.cpu_count,
                color_utilization(agent.allocated.cpu_count, agent.resource.cpu_count)
            );
            println!(
                "Memory:                 {}/{} ({})",
                format_memory_mb(agent.allocated.memory_mb),
                format_memory_mb(agent.resource.memory_mb),
                color_utilization(agent.allocated.memory_mb, agent.resource.memory_mb)
            );
        }
    }

    Ok(())
}

/// Send a report on behalf of an agent
pub async fn report_agent(
    client: &ApiClient,
    location: Location,
    resource: Resource,
    allocated: Resource,
    format: OutputFormat,
) -> Result<()> {
    let report = AgentReport {
        location,
        resource,
        allocated,
    };
    let outcome = client.report(&report).await?;

    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Table => {
            if outcome.registered {
                print_success("Agent registered");
            } else {
                print_success("Heartbeat recorded");
            }
            if outcome.resource_changed {
                print_info("Capacity changed");
            }
            if outcome.allocated_changed {
                print_info("Allocation changed");
            }
        }
    }

    Ok(())
}

/// Deregister an agent
pub async fn remove_agent(client: &ApiClient, location: Location, format: OutputFormat) -> Result<()> {
    let response = client.remove(&location).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            if response.removed {
                print_success("Agent removed");
            } else {
                print_warning("Agent was not registered");
            }
        }
    }

    Ok(())
}
