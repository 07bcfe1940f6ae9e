use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use tcmon::github::client::{GithubError, PullRequestLookup, Result as GithubResult};
use tcmon::github::types::PullRequest;
use tcmon::monitor::{drain, rotate_day, sampler, BuildTracker, Monitor};
use tcmon::output::records::{BranchRow, BuildRow, QueueRow};
use tcmon::output::sink::DayOutputs;
use tcmon::teamcity::client::{BuildServerClient, Result as ClientResult};
use tcmon::teamcity::types::{Agent, AgentBuild, Build, QueuedBuild, QueuedBuilds};

struct FakeServer {
    queues: Mutex<VecDeque<Vec<QueuedBuild>>>,
    builds: Mutex<HashMap<i64, Build>>,
    agents: Mutex<Vec<Agent>>,
}

impl FakeServer {
    fn new() -> Self {
        Self {
            queues: Mutex::new(VecDeque::new()),
            builds: Mutex::new(HashMap::new()),
            agents: Mutex::new(Vec::new()),
        }
    }

    fn push_queue(&self, ids: &[i64]) {
        self.queues
            .lock()
            .unwrap()
            .push_back(ids.iter().map(|&id| queued(id)).collect());
    }

    fn set_build(&self, build: Build) {
        self.builds.lock().unwrap().insert(build.id, build);
    }

    fn finish_build(&self, id: i64, finish_date: &str) {
        let mut builds = self.builds.lock().unwrap();
        if let Some(build) = builds.get_mut(&id) {
            build.finish_date = Some(finish_date.to_string());
        }
    }
}

#[async_trait]
impl BuildServerClient for FakeServer {
    async fn queued_builds(&self) -> ClientResult<QueuedBuilds> {
        let mut queues = self.queues.lock().unwrap();
        let builds = if queues.len() > 1 {
            queues.pop_front().unwrap()
        } else {
            queues.front().cloned().unwrap_or_default()
        };
        Ok(QueuedBuilds { builds })
    }

    async fn build(&self, id: i64) -> ClientResult<Build> {
        let builds = self.builds.lock().unwrap();
        Ok(builds.get(&id).cloned().unwrap())
    }

    async fn agents(&self) -> ClientResult<Vec<Agent>> {
        Ok(self.agents.lock().unwrap().clone())
    }
}

struct FakeLookup {
    pull_requests: HashMap<u64, PullRequest>,
}

#[async_trait]
impl PullRequestLookup for FakeLookup {
    async fn pull_request(&self, number: u64) -> GithubResult<Option<PullRequest>> {
        Ok(self.pull_requests.get(&number).cloned())
    }
}

struct FailingLookup;

#[async_trait]
impl PullRequestLookup for FailingLookup {
    async fn pull_request(&self, _number: u64) -> GithubResult<Option<PullRequest>> {
        Err(GithubError::Api {
            status: 500,
            message: "internal error".to_string(),
        })
    }
}

fn queued(id: i64) -> QueuedBuild {
    QueuedBuild {
        id,
        build_type_id: Some("Main_Build".to_string()),
        branch_name: None,
    }
}

fn unfinished_build(id: i64, branch: Option<&str>) -> Build {
    Build {
        id,
        build_type_id: Some("Main_Build".to_string()),
        branch_name: branch.map(str::to_string),
        status: None,
        state: Some("running".to_string()),
        queued_date: Some("20260826T080000+0000".to_string()),
        start_date: Some("20260826T081000+0000".to_string()),
        finish_date: None,
        agent: None,
        triggered: None,
    }
}

fn pull_request(title: &str, state: &str) -> PullRequest {
    PullRequest {
        title: Some(title.to_string()),
        state: Some(state.to_string()),
        created_at: Some(Utc::now() - ChronoDuration::days(2)),
        closed_at: None,
        merged_at: None,
        url: Some("https://api.github.com/repos/acme/app/pulls/482".to_string()),
    }
}

fn read_build_rows(path: &Path) -> Vec<BuildRow> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .unwrap();
    reader.deserialize().map(|r| r.unwrap()).collect()
}

fn read_branch_rows(path: &Path) -> Vec<BranchRow> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .unwrap();
    reader.deserialize().map(|r| r.unwrap()).collect()
}

#[tokio::test]
async fn test_queue_transition_records_finished_build_once() {
    let dir = tempfile::tempdir().unwrap();
    let server = FakeServer::new();
    server.push_queue(&[101, 102]);
    server.push_queue(&[102, 103]);
    server.set_build(unfinished_build(101, Some("refs/pull/482/head")));
    server.set_build(unfinished_build(102, Some("main")));
    server.set_build(unfinished_build(103, None));

    let day = Utc::now().date_naive();
    let mut outputs = DayOutputs::open(dir.path(), day).unwrap();
    let mut tracker = BuildTracker::new();

    // Iteration 1: both builds pending, nothing finished yet
    let now = Utc::now();
    sampler::sample(&server, &mut tracker, &mut outputs, now)
        .await
        .unwrap();
    tracker
        .resolve(&server, &mut outputs.builds, false)
        .await
        .unwrap();
    assert_eq!(tracker.pending(), &HashSet::from([101, 102]));
    assert!(tracker.recorded().is_empty());

    // 101 finishes between iterations
    server.finish_build(101, "20260826T090000+0000");

    // Iteration 2
    let now = Utc::now();
    sampler::sample(&server, &mut tracker, &mut outputs, now)
        .await
        .unwrap();
    tracker
        .resolve(&server, &mut outputs.builds, false)
        .await
        .unwrap();

    assert_eq!(tracker.recorded(), &HashSet::from([101]));
    assert_eq!(tracker.pending(), &HashSet::from([102, 103]));
    assert!(tracker.pending().is_disjoint(tracker.recorded()));

    // Further iterations must not re-emit 101
    let now = Utc::now();
    sampler::sample(&server, &mut tracker, &mut outputs, now)
        .await
        .unwrap();
    tracker
        .resolve(&server, &mut outputs.builds, false)
        .await
        .unwrap();
    outputs.close().unwrap();

    let rows = read_build_rows(&outputs.builds.path().to_path_buf());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, 101);
    assert!(rows[0].finished.is_some());
}

#[tokio::test]
async fn test_drain_writes_unfinished_builds_with_unset_finish() {
    let dir = tempfile::tempdir().unwrap();
    let server = FakeServer::new();
    server.push_queue(&[201, 202]);
    server.set_build(unfinished_build(201, Some("refs/pull/482/head")));
    server.set_build(unfinished_build(202, Some("main")));

    let lookup = FakeLookup {
        pull_requests: HashMap::from([(482, pull_request("[WIP] speed up queries", "open"))]),
    };

    let day = Utc::now().date_naive();
    let mut outputs = DayOutputs::open(dir.path(), day).unwrap();
    let mut tracker = BuildTracker::new();

    sampler::sample(&server, &mut tracker, &mut outputs, Utc::now())
        .await
        .unwrap();
    tracker
        .resolve(&server, &mut outputs.builds, false)
        .await
        .unwrap();
    assert_eq!(tracker.pending().len(), 2);

    let builds_path = outputs.builds.path().to_path_buf();
    let branches_path = outputs.branches.path().to_path_buf();
    drain(&server, &lookup, &mut tracker, &mut outputs)
        .await
        .unwrap();

    assert!(tracker.pending().is_empty());
    assert_eq!(tracker.recorded(), &HashSet::from([201, 202]));

    let rows = read_build_rows(&builds_path);
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.finished, None);
        assert!(row.started.is_some());
    }

    // Only the PR-ref branch got a status row; "main" was skipped silently
    let branch_rows = read_branch_rows(&branches_path);
    assert_eq!(branch_rows.len(), 1);
    assert_eq!(branch_rows[0].branch, "refs/pull/482/head");
    assert!(branch_rows[0].wip);
    assert_eq!(branch_rows[0].state.as_deref(), Some("open"));
}

#[tokio::test]
async fn test_rotation_closes_old_partition_and_opens_new() {
    let dir = tempfile::tempdir().unwrap();
    let server = FakeServer::new();
    server.push_queue(&[301]);
    server.set_build(unfinished_build(301, Some("refs/pull/7/head")));

    let lookup = FakeLookup {
        pull_requests: HashMap::from([(7, pull_request("fix flaky test", "closed"))]),
    };

    let now = Utc::now();
    let yesterday = (now - ChronoDuration::days(1)).date_naive();
    let mut outputs = DayOutputs::open(dir.path(), yesterday).unwrap();
    let mut tracker = BuildTracker::new();

    sampler::sample(&server, &mut tracker, &mut outputs, now)
        .await
        .unwrap();
    tracker
        .resolve(&server, &mut outputs.builds, false)
        .await
        .unwrap();
    assert_eq!(tracker.pending().len(), 1);

    let old_builds = outputs.builds.path().to_path_buf();
    let old_branches = outputs.branches.path().to_path_buf();

    rotate_day(&server, &lookup, &mut tracker, &mut outputs, dir.path(), now)
        .await
        .unwrap();

    // Outgoing partition got the forced row and the branch status
    let rows = read_build_rows(&old_builds);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, 301);
    assert_eq!(rows[0].finished, None);
    assert_eq!(read_branch_rows(&old_branches).len(), 1);

    // Fresh state and fresh streams for the new day
    assert_eq!(outputs.day, now.date_naive());
    assert!(tracker.pending().is_empty());
    assert!(tracker.recorded().is_empty());
    assert!(tracker.branches().is_empty());

    for tag in ["queue", "builds", "agents", "branches"] {
        let old = dir
            .path()
            .join(format!("{}_{}.csv", tag, yesterday.format("%Y%m%d")));
        let new = dir
            .path()
            .join(format!("{}_{}.csv", tag, now.date_naive().format("%Y%m%d")));
        assert!(old.exists(), "missing outgoing file {}", old.display());
        assert!(new.exists(), "missing new file {}", new.display());
    }

    // No record straddled the boundary: the new detail stream is header-only
    assert!(read_build_rows(outputs.builds.path()).is_empty());
    outputs.close().unwrap();
}

#[tokio::test]
async fn test_cancellation_drains_and_closes_all_streams() {
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(FakeServer::new());
    server.push_queue(&[401, 402]);
    server.set_build(unfinished_build(401, None));
    server.set_build(unfinished_build(402, None));
    server.agents.lock().unwrap().push(Agent {
        name: "agent-1".to_string(),
        enabled: true,
        authorized: true,
        build: Some(AgentBuild { id: 401 }),
    });

    let lookup = Arc::new(FakeLookup {
        pull_requests: HashMap::new(),
    });

    let monitor = Monitor::new(
        server.clone(),
        lookup,
        dir.path().to_path_buf(),
        Duration::from_secs(60),
    );

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    let handle = tokio::spawn(async move { monitor.run(shutdown).await });

    // Let the first iteration complete, then cancel mid-wait
    tokio::time::sleep(Duration::from_millis(200)).await;
    trigger.cancel();
    handle.await.unwrap().unwrap();

    let day = Utc::now().date_naive();
    for tag in ["queue", "builds", "agents", "branches"] {
        let path = dir
            .path()
            .join(format!("{}_{}.csv", tag, day.format("%Y%m%d")));
        assert!(path.exists(), "missing {}", path.display());
    }

    // Forced resolution wrote each pending build exactly once, finish unset
    let rows = read_build_rows(&dir.path().join(format!("builds_{}.csv", day.format("%Y%m%d"))));
    let mut ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![401, 402]);
    assert!(rows.iter().all(|r| r.finished.is_none()));

    // Queue rows of one iteration share a timestamp
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .from_path(dir.path().join(format!("queue_{}.csv", day.format("%Y%m%d"))))
        .unwrap();
    let queue_rows: Vec<QueueRow> = reader.deserialize().map(|r| r.unwrap()).collect();
    assert_eq!(queue_rows.len(), 2);
    assert_eq!(queue_rows[0].timestamp, queue_rows[1].timestamp);
}

#[tokio::test]
async fn test_drain_failure_propagates_with_streams_flushed() {
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(FakeServer::new());
    server.push_queue(&[501]);
    let mut finished = unfinished_build(501, Some("refs/pull/9/head"));
    finished.finish_date = Some("20260826T090000+0000".to_string());
    server.set_build(finished);

    let monitor = Monitor::new(
        server.clone(),
        Arc::new(FailingLookup),
        dir.path().to_path_buf(),
        Duration::from_secs(60),
    );

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    let handle = tokio::spawn(async move { monitor.run(shutdown).await });

    // First iteration records 501 and banks its branch; the drain's branch
    // correlation then hits the failing lookup.
    tokio::time::sleep(Duration::from_millis(200)).await;
    trigger.cancel();
    let result = handle.await.unwrap();
    assert!(result.is_err());

    // Everything written before the failure is on disk
    let day = Utc::now().date_naive();
    let rows = read_build_rows(&dir.path().join(format!("builds_{}.csv", day.format("%Y%m%d"))));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, 501);
    for tag in ["queue", "builds", "agents", "branches"] {
        let path = dir
            .path()
            .join(format!("{}_{}.csv", tag, day.format("%Y%m%d")));
        assert!(path.exists(), "missing {}", path.display());
    }
}
