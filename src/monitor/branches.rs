use crate::github::client::PullRequestLookup;
use crate::monitor::MonitorError;
use crate::output::records::BranchRow;
use crate::output::sink::DaySink;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info};

const PR_REF_PREFIX: &str = "refs/pull/";
const PR_REF_SUFFIX: &str = "/head";
const WIP_MARKER: &str = "[WIP]";

/// Extracts the pull-request number from a PR-ref branch name.
///
/// Only `refs/pull/<n>/head` qualifies; anything else (plain branches,
/// merge refs, non-numeric middles) yields `None` and is skipped silently.
pub fn pull_request_number(branch: &str) -> Option<u64> {
    let middle = branch.strip_prefix(PR_REF_PREFIX)?.strip_suffix(PR_REF_SUFFIX)?;
    middle.parse().ok()
}

/// Resolves each PR-ref branch to its current pull-request status and writes
/// one row per resolvable branch, flushing after every row so partial
/// progress survives a later failure. Branches without a matching PR
/// (deleted refs) are skipped without error.
pub async fn collect(
    lookup: &dyn PullRequestLookup,
    sink: &mut DaySink<BranchRow>,
    branches: &HashSet<String>,
    status_date: DateTime<Utc>,
) -> Result<usize, MonitorError> {
    let mut written = 0;

    for branch in branches {
        let number = match pull_request_number(branch) {
            Some(number) => number,
            None => continue,
        };

        let pull_request = match lookup.pull_request(number).await? {
            Some(pull_request) => pull_request,
            None => {
                debug!(branch = %branch, number, "no pull request found, skipping");
                continue;
            }
        };

        let wip = pull_request
            .title
            .as_deref()
            .is_some_and(|title| title.contains(WIP_MARKER));

        sink.append(&BranchRow {
            branch: branch.clone(),
            state: pull_request.state,
            created: pull_request.created_at,
            closed: pull_request.closed_at,
            merged: pull_request.merged_at,
            wip,
            title: pull_request.title,
            url: pull_request.url,
            status_date,
        })?;
        sink.flush()?;
        written += 1;
    }

    info!(
        checked = branches.len(),
        written, "correlated branches with pull requests"
    );
    Ok(written)
}
