//! Topology overview command

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, Resource};
use crate::output::{color_utilization, format_memory_mb, print_json, print_table, OutputFormat};

/// Row for the per-rack capacity table
#[derive(Tabled)]
struct RackRow {
    #[tabled(rename = "Data Center")]
    data_center: String,
    #[tabled(rename = "Rack")]
    rack: String,
    #[tabled(rename = "Agents")]
    agents: usize,
    #[tabled(rename = "CPU (alloc/cap)")]
    cpu: String,
    #[tabled(rename = "CPU %")]
    cpu_utilization: String,
    #[tabled(rename = "Memory (alloc/cap)")]
    memory: String,
    #[tabled(rename = "Mem %")]
    memory_utilization: String,
}

fn cpu_cell(allocated: Resource, resource: Resource) -> String {
    format!("{}/{}", allocated.cpu_count, resource.cpu_count)
}

fn memory_cell(allocated: Resource, resource: Resource) -> String {
    format!(
        "{}/{}",
        format_memory_mb(allocated.memory_mb),
        format_memory_mb(resource.memory_mb)
    )
}

/// Show cluster totals and per-rack capacity
pub async fn show_topology(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let topology = client.topology().await?;

    match format {
        OutputFormat::Json => print_json(&topology)?,
        OutputFormat::Table => {
            println!("{}", "Fleet Topology".bold());
            println!("{}", "=".repeat(50));
            println!("Agents:                 {}", topology.agent_count);
            println!("Data Centers:           {}", topology.data_centers.len());
            println!(
                "CPU:                    {} ({})",
                cpu_cell(topology.allocated, topology.resource),
                color_utilization(topology.allocated.cpu_count, topology.resource.cpu_count)
            );
            println!(
                "Memory:                 {} ({})",
                memory_cell(topology.allocated, topology.resource),
                color_utilization(topology.allocated.memory_mb, topology.resource.memory_mb)
            );
            println!();

            let rows: Vec<RackRow> = topology
                .data_centers
                .iter()
                .flat_map(|dc| {
                    dc.racks.iter().map(move |rack| RackRow {
                        data_center: dc.name.clone(),
                        rack: rack.name.clone(),
                        agents: rack.agents.len(),
                        cpu: cpu_cell(rack.allocated, rack.resource),
                        cpu_utilization: color_utilization(
                            rack.allocated.cpu_count,
                            rack.resource.cpu_count,
                        ),
                        memory: memory_cell(rack.allocated, rack.resource),
                        memory_utilization: color_utilization(
                            rack.allocated.memory_mb,
                            rack.resource.memory_mb,
                        ),
                    })
                })
                .collect();

            print_table(rows);
        }
    }

    Ok(())
}
