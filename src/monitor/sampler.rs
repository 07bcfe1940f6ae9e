use crate::monitor::tracker::BuildTracker;
use crate::monitor::MonitorError;
use crate::output::records::{AgentsRow, QueueRow};
use crate::output::sink::DayOutputs;
use crate::teamcity::client::BuildServerClient;
use crate::teamcity::types::Agent;
use chrono::{DateTime, Utc};
use tracing::info;

/// One sampling iteration: fetch the queue listing and the agent pool
/// concurrently, feed newly seen build ids to the tracker, and write the
/// iteration's queue rows and the single agent-snapshot row.
pub async fn sample(
    client: &dyn BuildServerClient,
    tracker: &mut BuildTracker,
    outputs: &mut DayOutputs,
    now: DateTime<Utc>,
) -> Result<(), MonitorError> {
    let (queue, agents) = tokio::try_join!(client.queued_builds(), client.agents())?;

    let mut ids: Vec<i64> = queue.builds.iter().map(|b| b.id).collect();
    ids.extend(agents.iter().filter_map(|a| a.build.as_ref().map(|b| b.id)));
    tracker.observe(ids);

    for build in &queue.builds {
        outputs.queue.append(&QueueRow {
            timestamp: now,
            id: build.id,
            build_type: build.build_type_id.clone(),
            branch: build.branch_name.clone(),
        })?;
    }
    outputs.queue.flush()?;

    outputs.agents.append(&snapshot_row(&agents, now))?;
    outputs.agents.flush()?;

    info!(
        queued = queue.builds.len(),
        agents = agents.len(),
        timestamp = %now,
        "sampled queue and agent pool"
    );
    Ok(())
}

/// Summarizes the agent pool for one iteration. An agent is idle when it is
/// enabled, authorized and has no assigned build; an empty pool has an idle
/// percentage of 0.
pub fn snapshot_row(agents: &[Agent], now: DateTime<Utc>) -> AgentsRow {
    let total = agents.len();
    let disabled = agents.iter().filter(|a| !a.enabled).count();
    let unauthorized = agents.iter().filter(|a| !a.authorized).count();
    let idle: Vec<&str> = agents
        .iter()
        .filter(|a| a.enabled && a.authorized && a.build.is_none())
        .map(|a| a.name.as_str())
        .collect();
    let idle_percentage = if total == 0 {
        0.0
    } else {
        idle.len() as f64 / total as f64 * 100.0
    };

    AgentsRow {
        timestamp: now,
        total,
        disabled,
        unauthorized,
        idle_percentage,
        idle_agents: idle.join(","),
    }
}
