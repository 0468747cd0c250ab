use crate::version::BuildInfo;
use clap::{Parser, Subcommand};
use std::fmt;
use std::str::FromStr;

fn about_message() -> String {
    format!(
        "Tails the live console output of GitHub Actions runs\nVersion: {}",
        BuildInfo::version_str()
    )
}

fn footer_message() -> String {
    "Credentials: GITHUB_TOKEN for the API, GITHUB_USER_SESSION for the live log stream.\n\
     Settings can also come from a TOML file (--config) or GHTAIL_* variables.\n"
        .to_string()
}

#[derive(Parser, Clone)]
#[clap(
    name = "ghtail",
    about = about_message(),
    version = BuildInfo::version_str(),
    after_help = footer_message()
)]
pub struct Cli {
    #[clap(long, global = true)]
    pub config: Option<String>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Follow a workflow, switching to each new run as it starts
    Tail {
        /// Repository as owner/repo
        repo: RepoSlug,
        /// Workflow file name, e.g. ci.yml
        workflow: String,
        /// Only print output of this job
        #[clap(long)]
        job: Option<String>,
    },

    /// Tail a single run until it completes
    Run {
        /// Repository as owner/repo
        repo: RepoSlug,
        /// Numeric id of the workflow run
        run_id: u64,
        /// Only print output of this job
        #[clap(long)]
        job: Option<String>,
    },

    /// Shows the version, commit and build date
    Version,
}

/// `owner/repo`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl FromStr for RepoSlug {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
                Ok(Self {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                })
            }
            _ => Err(format!("expected owner/repo, got {:?}", s)),
        }
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}
