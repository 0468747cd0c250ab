use crate::config_manager::Config;
use crate::discovery::RunLister;
use crate::error::TailResult;
use crate::status::StatusSource;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ghtail_common::types::{
    CheckRunRecord, DiscoveredRun, JobRecord, RunIdentity, RunSnapshot, StatusReport, StepRecord,
};
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use tracing::debug;

const PAGE_SIZE: u8 = 100;

#[derive(Serialize)]
struct PageParams {
    per_page: u8,
    page: u32,
}

#[derive(Deserialize)]
struct JobsPage {
    total_count: u64,
    jobs: Vec<JobDto>,
}

#[derive(Deserialize)]
struct JobDto {
    id: u64,
    name: String,
    status: String,
    #[serde(default)]
    steps: Vec<StepDto>,
}

#[derive(Deserialize)]
struct StepDto {
    number: i64,
    name: String,
    status: String,
}

#[derive(Deserialize)]
struct OwnerDto {
    login: String,
}

#[derive(Deserialize)]
struct RepositoryDto {
    name: String,
    owner: OwnerDto,
}

#[derive(Deserialize)]
struct RunDto {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    run_number: u64,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    run_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    check_suite_id: Option<u64>,
    #[serde(default)]
    repository: Option<RepositoryDto>,
}

#[derive(Deserialize)]
struct CheckRunsPage {
    total_count: u64,
    check_runs: Vec<CheckRunDto>,
}

#[derive(Deserialize)]
struct CheckRunDto {
    id: u64,
    #[serde(default)]
    external_id: Option<String>,
}

#[derive(Deserialize)]
struct WorkflowRunsPage {
    workflow_runs: Vec<RunDto>,
}

#[derive(Serialize)]
struct RecentRunsParams {
    per_page: u8,
}

impl From<JobDto> for JobRecord {
    fn from(job: JobDto) -> Self {
        JobRecord {
            id: job.id,
            name: job.name,
            status: job.status,
            steps: job
                .steps
                .into_iter()
                .map(|step| StepRecord {
                    number: step.number,
                    name: step.name,
                    status: step.status,
                })
                .collect(),
        }
    }
}

impl From<&RunDto> for RunSnapshot {
    fn from(run: &RunDto) -> Self {
        RunSnapshot {
            status: run.status.clone().unwrap_or_default(),
            name: run.name.clone().unwrap_or_default(),
            number: run.run_number,
            started_at: run.run_started_at,
            check_suite_id: run.check_suite_id.unwrap_or_default(),
        }
    }
}

/// Polling API reads backed by octocrab.
pub struct OctocrabGithub {
    api: Octocrab,
}

impl OctocrabGithub {
    pub fn new(api: Octocrab) -> Self {
        Self { api }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut builder = Octocrab::builder()
            .base_uri(config.api_base_url.as_str())
            .context("invalid api_base_url")?;
        if let Some(token) = &config.github_token {
            builder = builder.personal_token(token.clone());
        }
        let api = builder.build().context("Failed to build GitHub API client")?;
        Ok(Self::new(api))
    }

    async fn list_jobs(&self, run: &RunIdentity) -> TailResult<Vec<JobRecord>> {
        let route = format!(
            "/repos/{}/{}/actions/runs/{}/jobs",
            run.owner, run.repo, run.run_id
        );
        let mut jobs = Vec::new();
        for page in 1.. {
            let params = PageParams {
                per_page: PAGE_SIZE,
                page,
            };
            let response: JobsPage = self.api.get(&route, Some(&params)).await?;
            let received = response.jobs.len();
            jobs.extend(response.jobs.into_iter().map(JobRecord::from));
            if received == 0 || jobs.len() as u64 >= response.total_count {
                break;
            }
        }
        Ok(jobs)
    }

    async fn get_run(&self, run: &RunIdentity) -> TailResult<RunDto> {
        let route = format!(
            "/repos/{}/{}/actions/runs/{}",
            run.owner, run.repo, run.run_id
        );
        Ok(self.api.get(route, None::<&()>).await?)
    }

    async fn list_check_runs(
        &self,
        run: &RunIdentity,
        check_suite_id: u64,
    ) -> TailResult<Vec<CheckRunRecord>> {
        let route = format!(
            "/repos/{}/{}/check-suites/{}/check-runs",
            run.owner, run.repo, check_suite_id
        );
        let mut check_runs = Vec::new();
        for page in 1.. {
            let params = PageParams {
                per_page: PAGE_SIZE,
                page,
            };
            let response: CheckRunsPage = self.api.get(&route, Some(&params)).await?;
            let received = response.check_runs.len();
            check_runs.extend(response.check_runs.into_iter().map(|check_run| CheckRunRecord {
                id: check_run.id,
                external_id: check_run.external_id,
            }));
            if received == 0 || check_runs.len() as u64 >= response.total_count {
                break;
            }
        }
        Ok(check_runs)
    }
}

#[async_trait]
impl StatusSource for OctocrabGithub {
    async fn fetch_status(&self, run: &RunIdentity) -> TailResult<StatusReport> {
        let jobs = self.list_jobs(run).await?;
        let run_dto = self.get_run(run).await?;

        let check_runs = match run_dto.check_suite_id {
            Some(check_suite_id) => self.list_check_runs(run, check_suite_id).await?,
            None => {
                debug!(run = %run, "run has no check suite yet");
                Vec::new()
            }
        };

        Ok(StatusReport {
            run: RunSnapshot::from(&run_dto),
            jobs,
            check_runs,
        })
    }
}

#[async_trait]
impl RunLister for OctocrabGithub {
    async fn list_recent_runs(
        &self,
        owner: &str,
        repo: &str,
        workflow_file: &str,
        limit: u8,
    ) -> TailResult<Vec<DiscoveredRun>> {
        let route = format!(
            "/repos/{}/{}/actions/workflows/{}/runs",
            owner, repo, workflow_file
        );
        let params = RecentRunsParams { per_page: limit };
        let response: WorkflowRunsPage = self.api.get(route, Some(&params)).await?;

        Ok(response
            .workflow_runs
            .iter()
            .map(|run| {
                let (run_owner, run_repo) = match &run.repository {
                    Some(repository) => (repository.owner.login.clone(), repository.name.clone()),
                    None => (owner.to_string(), repo.to_string()),
                };
                DiscoveredRun {
                    identity: RunIdentity::new(run_owner, run_repo, run.id),
                    name: run.name.clone().unwrap_or_default(),
                    number: run.run_number,
                    status: run.status.clone().unwrap_or_default(),
                }
            })
            .collect())
    }
}
