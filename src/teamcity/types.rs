use serde::Deserialize;

/// Response of the build queue listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueuedBuilds {
    #[serde(default, rename = "build")]
    pub builds: Vec<QueuedBuild>,
}

/// One entry of the build queue listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedBuild {
    pub id: i64,
    #[serde(default)]
    pub build_type_id: Option<String>,
    #[serde(default)]
    pub branch_name: Option<String>,
}

/// Full build detail, fetched by id.
///
/// Timestamp fields carry the server's native format and are parsed by
/// [`crate::teamcity::timestamp::parse_optional`] only when a row is written;
/// an absent field means that build phase has not been reached yet.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: i64,
    #[serde(default)]
    pub build_type_id: Option<String>,
    #[serde(default)]
    pub branch_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub queued_date: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub finish_date: Option<String>,
    #[serde(default)]
    pub agent: Option<AgentRef>,
    #[serde(default)]
    pub triggered: Option<Triggered>,
}

impl Build {
    /// A build is finished once the server reports a finish timestamp.
    pub fn is_finished(&self) -> bool {
        self.finish_date.as_deref().is_some_and(|date| !date.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentRef {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Triggered {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub user: Option<TriggerUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerUser {
    #[serde(default)]
    pub username: Option<String>,
}

/// Response of the agent pool listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Agents {
    #[serde(default, rename = "agent")]
    pub agents: Vec<Agent>,
}

/// One agent of the pool; `build` is the currently assigned build, if any.
#[derive(Debug, Clone, Deserialize)]
pub struct Agent {
    pub name: String,
    pub enabled: bool,
    pub authorized: bool,
    #[serde(default)]
    pub build: Option<AgentBuild>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentBuild {
    pub id: i64,
}
