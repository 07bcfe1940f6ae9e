use crate::monitor::MonitorError;
use crate::output::records::BuildRow;
use crate::output::sink::DaySink;
use crate::teamcity::client::BuildServerClient;
use crate::teamcity::timestamp::{self, TimestampError};
use crate::teamcity::types::Build;
use std::collections::HashSet;
use tracing::{debug, info};

/// Per-day-partition tracking of build lifecycles.
///
/// `pending` holds build ids that were seen but not yet durably recorded,
/// `recorded` the ids already written to the detail stream. The two sets are
/// disjoint at all times: ids move from one to the other exactly once, which
/// is what guarantees one detail row per build and day.
#[derive(Debug, Default)]
pub struct BuildTracker {
    pending: HashSet<i64>,
    recorded: HashSet<i64>,
    branches: HashSet<String>,
}

impl BuildTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every id not already recorded to the pending set. Idempotent.
    pub fn observe<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = i64>,
    {
        for id in ids {
            if !self.recorded.contains(&id) {
                self.pending.insert(id);
            }
        }
    }

    /// Resolves pending builds to full detail and writes the final ones.
    ///
    /// A build is final when the server reports a finish timestamp, or
    /// unconditionally under `force` (shutdown and day rotation). Final
    /// builds are appended once, moved to `recorded`, and their branch added
    /// to the day's branch set. Non-final builds stay pending and are
    /// re-fetched next cycle.
    pub async fn resolve(
        &mut self,
        client: &dyn BuildServerClient,
        sink: &mut DaySink<BuildRow>,
        force: bool,
    ) -> Result<usize, MonitorError> {
        let ids: Vec<i64> = self.pending.iter().copied().collect();
        let mut written = 0;

        for id in ids {
            let build = client.build(id).await?;
            if !force && !build.is_finished() {
                debug!(build_id = id, "build not finished, keeping pending");
                continue;
            }

            let row = detail_row(&build)?;
            sink.append(&row)?;
            self.pending.remove(&id);
            self.recorded.insert(id);
            if let Some(branch) = build.branch_name.as_deref() {
                if !branch.is_empty() {
                    self.branches.insert(branch.to_string());
                }
            }
            written += 1;
        }

        sink.flush()?;
        if written > 0 {
            info!(written, pending = self.pending.len(), force, "resolved builds");
        }
        Ok(written)
    }

    /// Hands over the day's branch set, leaving it empty.
    pub fn take_branches(&mut self) -> HashSet<String> {
        std::mem::take(&mut self.branches)
    }

    /// Clears all per-day state; called at the partition boundary.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.recorded.clear();
        self.branches.clear();
    }

    pub fn pending(&self) -> &HashSet<i64> {
        &self.pending
    }

    pub fn recorded(&self) -> &HashSet<i64> {
        &self.recorded
    }

    pub fn branches(&self) -> &HashSet<String> {
        &self.branches
    }
}

/// Converts a build detail payload into its CSV row, parsing the server's
/// native timestamps. A populated-but-unparsable timestamp is a hard error.
pub fn detail_row(build: &Build) -> Result<BuildRow, TimestampError> {
    let triggered = build.triggered.as_ref();
    Ok(BuildRow {
        id: build.id,
        build_type: build.build_type_id.clone(),
        branch: build.branch_name.clone(),
        status: build.status.clone(),
        state: build.state.clone(),
        queued: timestamp::parse_optional(build.queued_date.as_deref())?,
        started: timestamp::parse_optional(build.start_date.as_deref())?,
        finished: timestamp::parse_optional(build.finish_date.as_deref())?,
        agent: build.agent.as_ref().and_then(|a| a.name.clone()),
        trigger_user: triggered
            .and_then(|t| t.user.as_ref())
            .and_then(|u| u.username.clone()),
        trigger_kind: triggered.and_then(|t| t.kind.clone()),
        trigger_time: timestamp::parse_optional(triggered.and_then(|t| t.date.as_deref()))?,
    })
}
