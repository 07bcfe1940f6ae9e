use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A CSV row type with its fixed header, written by [`crate::output::DaySink`].
///
/// Headers are written once at sink creation so a stream that never receives
/// a row is still a valid, header-tagged file. Unset timestamps serialize as
/// the empty field and deserialize back to `None`.
pub trait Record: Serialize {
    const HEADERS: &'static [&'static str];
}

/// One queued build at one sampling instant. All rows of an iteration share
/// the same timestamp, so queue depth at an instant is the count of rows
/// grouped on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRow {
    #[serde(rename = "Timestamp UTC")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Build Id")]
    pub id: i64,
    #[serde(rename = "Build Type Id")]
    pub build_type: Option<String>,
    #[serde(rename = "Branch")]
    pub branch: Option<String>,
}

impl Record for QueueRow {
    const HEADERS: &'static [&'static str] =
        &["Timestamp UTC", "Build Id", "Build Type Id", "Branch"];
}

/// Full detail of one build lifecycle; written at most once per build and day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRow {
    #[serde(rename = "Build Id")]
    pub id: i64,
    #[serde(rename = "Build Type Id")]
    pub build_type: Option<String>,
    #[serde(rename = "Branch")]
    pub branch: Option<String>,
    #[serde(rename = "Status")]
    pub status: Option<String>,
    #[serde(rename = "State")]
    pub state: Option<String>,
    #[serde(rename = "Queued time")]
    pub queued: Option<DateTime<Utc>>,
    #[serde(rename = "Start time")]
    pub started: Option<DateTime<Utc>>,
    #[serde(rename = "Finished time")]
    pub finished: Option<DateTime<Utc>>,
    #[serde(rename = "Agent")]
    pub agent: Option<String>,
    #[serde(rename = "Trigger")]
    pub trigger_user: Option<String>,
    #[serde(rename = "Trigger type")]
    pub trigger_kind: Option<String>,
    #[serde(rename = "Trigger time")]
    pub trigger_time: Option<DateTime<Utc>>,
}

impl Record for BuildRow {
    const HEADERS: &'static [&'static str] = &[
        "Build Id",
        "Build Type Id",
        "Branch",
        "Status",
        "State",
        "Queued time",
        "Start time",
        "Finished time",
        "Agent",
        "Trigger",
        "Trigger type",
        "Trigger time",
    ];
}

/// One agent-pool snapshot per iteration (not per agent).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsRow {
    #[serde(rename = "Timestamp UTC")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Total agents")]
    pub total: usize,
    #[serde(rename = "Disabled agents")]
    pub disabled: usize,
    #[serde(rename = "Unauthorized agents")]
    pub unauthorized: usize,
    #[serde(rename = "Idle percentage")]
    pub idle_percentage: f64,
    #[serde(rename = "Idle agents")]
    pub idle_agents: String,
}

impl Record for AgentsRow {
    const HEADERS: &'static [&'static str] = &[
        "Timestamp UTC",
        "Total agents",
        "Disabled agents",
        "Unauthorized agents",
        "Idle percentage",
        "Idle agents",
    ];
}

/// Pull-request status of one branch, as of the lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchRow {
    #[serde(rename = "Branch")]
    pub branch: String,
    #[serde(rename = "State")]
    pub state: Option<String>,
    #[serde(rename = "Created time")]
    pub created: Option<DateTime<Utc>>,
    #[serde(rename = "Closed time")]
    pub closed: Option<DateTime<Utc>>,
    #[serde(rename = "Merged time")]
    pub merged: Option<DateTime<Utc>>,
    #[serde(rename = "WIP")]
    pub wip: bool,
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "Url")]
    pub url: Option<String>,
    #[serde(rename = "Status date")]
    pub status_date: DateTime<Utc>,
}

impl Record for BranchRow {
    const HEADERS: &'static [&'static str] = &[
        "Branch",
        "State",
        "Created time",
        "Closed time",
        "Merged time",
        "WIP",
        "Title",
        "Url",
        "Status date",
    ];
}
