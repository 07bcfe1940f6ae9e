use crate::cli::RunError;
use crate::github::GithubClient;
use crate::monitor::branches;
use crate::output::records::{BranchRow, BuildRow};
use crate::output::sink::{Dataset, DaySink};
use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct BranchesOptions {
    /// Folder holding previously recorded `builds_*.csv` files.
    pub builds: PathBuf,
    /// Folder the branch-status file is written to.
    pub folder: PathBuf,
    pub github_token: String,
    pub repo: String,
}

/// One-shot retrieval of pull-request status for every branch found in
/// recorded build-detail files.
pub async fn run(options: BranchesOptions) -> Result<(), RunError> {
    std::fs::create_dir_all(&options.folder)?;
    let lookup = GithubClient::new(&options.repo, &options.github_token)?;
    let now = Utc::now();

    let branches = scan_branches(&options.builds)?;
    info!(branches = branches.len(), "retrieving pull request status");

    let mut sink: DaySink<BranchRow> =
        DaySink::create(&options.folder, Dataset::Branches, now.date_naive())?;
    branches::collect(&lookup, &mut sink, &branches, now).await?;
    sink.close()?;
    Ok(())
}

/// Collects the distinct branch names from every `builds_*.csv` in the
/// folder. Rows that fail to parse are skipped; the files may stem from older
/// runs with a different column set.
pub fn scan_branches(dir: &Path) -> Result<HashSet<String>, RunError> {
    let mut branches = HashSet::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if !name.starts_with("builds_") || !name.ends_with(".csv") {
            continue;
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .from_path(&path)?;
        for record in reader.deserialize::<BuildRow>() {
            match record {
                Ok(row) => {
                    if let Some(branch) = row.branch {
                        if !branch.is_empty() {
                            branches.insert(branch);
                        }
                    }
                }
                Err(error) => {
                    warn!(file = %path.display(), error = %error, "skipping unreadable row");
                }
            }
        }
    }

    Ok(branches)
}
