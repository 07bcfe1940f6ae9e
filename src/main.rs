use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tcmon::cli::branches::BranchesOptions;
use tcmon::cli::monitor::MonitorOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tcmon")]
#[command(about = "TeamCity build queue and agent monitoring", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Continuously sample the build queue, build details and agent pool
    Monitor {
        /// TeamCity server url
        #[arg(short, long)]
        url: String,

        /// TeamCity REST API token
        #[arg(short, long)]
        token: String,

        /// Folder where the daily CSV files are written
        #[arg(short, long)]
        folder: PathBuf,

        /// Minutes between two samplings
        #[arg(short, long)]
        period: u64,

        /// Overall monitoring duration in hours, 0 = until Ctrl-C
        #[arg(short, long, default_value_t = 0)]
        duration: u64,

        /// GitHub access token for pull-request status lookups
        #[arg(long)]
        github_token: String,

        /// GitHub repository slug (owner/name) the PR refs belong to
        #[arg(long)]
        repo: String,
    },
    /// One-shot pull-request status retrieval from recorded builds files
    Branches {
        /// Folder holding builds_*.csv files from earlier monitoring runs
        #[arg(short, long)]
        builds: PathBuf,

        /// Folder where the branch-status CSV is written
        #[arg(short, long)]
        folder: PathBuf,

        /// GitHub access token for pull-request status lookups
        #[arg(long)]
        github_token: String,

        /// GitHub repository slug (owner/name) the PR refs belong to
        #[arg(long)]
        repo: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tcmon=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Monitor {
            url,
            token,
            folder,
            period,
            duration,
            github_token,
            repo,
        } => {
            let duration = match duration {
                0 => None,
                hours => Some(Duration::from_secs(hours * 3600)),
            };
            tcmon::cli::monitor::run(MonitorOptions {
                url,
                token,
                folder,
                period: Duration::from_secs(period * 60),
                duration,
                github_token,
                repo,
            })
            .await?;
        }
        Commands::Branches {
            builds,
            folder,
            github_token,
            repo,
        } => {
            tcmon::cli::branches::run(BranchesOptions {
                builds,
                folder,
                github_token,
                repo,
            })
            .await?;
        }
    }

    Ok(())
}
