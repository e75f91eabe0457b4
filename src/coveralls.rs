//! Coveralls job payload and API client.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CovupError, Result};
use crate::model::SourceFile;

pub const DEFAULT_ENDPOINT: &str = "https://coveralls.io";

/// Services Coveralls accepts without a repo token.
const TOKENLESS_SERVICES: &[&str] = &["travis-ci", "travis-pro"];

/// Build metadata read from the CI environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CiEnv {
    pub service_name: Option<String>,
    pub job_id: Option<String>,
    pub service_number: Option<String>,
    pub pull_request: Option<String>,
    pub commit: Option<String>,
    pub branch: Option<String>,
}

impl CiEnv {
    /// Read GitHub Actions, Travis, CircleCI or Jenkins variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`CiEnv::from_env`], reading variables through `var`.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let var = &var;

        let service_name = [
            ("GITHUB_ACTIONS", "github"),
            ("TRAVIS", "travis-ci"),
            ("CIRCLECI", "circle-ci"),
            ("JENKINS_URL", "jenkins"),
        ]
        .iter()
        .find(|(key, _)| first_set(var, &[*key]).is_some())
        .map(|(_, name)| name.to_string());

        let pull_request = first_set(var, &["GITHUB_REF"])
            .as_deref()
            .and_then(pr_number_from_ref)
            .or_else(|| first_set(var, &["TRAVIS_PULL_REQUEST"]).filter(|v| v != "false"))
            .or_else(|| first_set(var, &["CIRCLE_PR_NUMBER"]));

        Self {
            service_name,
            job_id: first_set(
                var,
                &["GITHUB_RUN_ID", "TRAVIS_JOB_ID", "CIRCLE_BUILD_NUM", "BUILD_NUMBER"],
            ),
            service_number: first_set(
                var,
                &[
                    "GITHUB_RUN_NUMBER",
                    "TRAVIS_BUILD_NUMBER",
                    "CIRCLE_WORKFLOW_ID",
                    "BUILD_NUMBER",
                ],
            ),
            pull_request,
            commit: first_set(var, &["GITHUB_SHA", "TRAVIS_COMMIT", "CIRCLE_SHA1", "GIT_COMMIT"]),
            branch: first_set(
                var,
                &[
                    "GITHUB_HEAD_REF",
                    "GITHUB_REF_NAME",
                    "TRAVIS_BRANCH",
                    "CIRCLE_BRANCH",
                    "GIT_BRANCH",
                ],
            ),
        }
    }
}

/// Value of the first variable in `keys` that is set and non-empty.
fn first_set(var: &impl Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| var(*key).filter(|v| !v.is_empty()))
}

/// Extract PR number from a GitHub ref (e.g. "refs/pull/42/merge" → 42).
fn pr_number_from_ref(github_ref: &str) -> Option<String> {
    let parts: Vec<&str> = github_ref.split('/').collect();
    if parts.len() >= 3 && parts[0] == "refs" && parts[1] == "pull" {
        parts[2].parse::<u64>().ok().map(|n| n.to_string())
    } else {
        None
    }
}

/// Settings given on the command line. Each overrides the CI environment.
#[derive(Debug, Clone, Default)]
pub struct JobSettings {
    pub repo_token: Option<String>,
    pub service_name: Option<String>,
    pub job_id: Option<String>,
    pub pull_request: Option<String>,
    pub parallel: bool,
    pub flag_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GitHead {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Git {
    pub head: GitHead,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// The body of a `POST /api/v1/jobs` request.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_token: Option<String>,
    pub service_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_pull_request: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub parallel: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag_name: Option<String>,
    pub run_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<Git>,
    pub source_files: Vec<SourceFile>,
}

impl Job {
    /// Combine settings, CI metadata and coverage into a job.
    pub fn build(
        settings: &JobSettings,
        ci: &CiEnv,
        source_files: Vec<SourceFile>,
        run_at: DateTime<Utc>,
    ) -> Self {
        let service_name = settings
            .service_name
            .clone()
            .or_else(|| ci.service_name.clone())
            .unwrap_or_else(|| "covup".to_string());

        let git = ci.commit.clone().map(|id| Git {
            head: GitHead { id },
            branch: ci.branch.clone(),
        });

        Self {
            repo_token: settings.repo_token.clone().filter(|t| !t.is_empty()),
            service_name,
            service_job_id: settings.job_id.clone().or_else(|| ci.job_id.clone()),
            service_number: ci.service_number.clone(),
            service_pull_request: settings
                .pull_request
                .clone()
                .or_else(|| ci.pull_request.clone()),
            parallel: settings.parallel,
            flag_name: settings.flag_name.clone(),
            run_at: run_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            git,
            source_files,
        }
    }

    /// Coveralls rejects jobs without a repo token unless the service is
    /// one it can verify on its own.
    pub fn check_token(&self) -> Result<()> {
        if self.repo_token.is_none() && !TOKENLESS_SERVICES.contains(&self.service_name.as_str()) {
            return Err(CovupError::Config(format!(
                "a repo token is required for service '{}' (use --repotoken or COVERALLS_TOKEN)",
                self.service_name
            )));
        }
        Ok(())
    }
}

/// What Coveralls answers to a job upload.
#[derive(Debug, Deserialize)]
pub struct JobResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub error: bool,
}

/// Talks to a Coveralls-compatible endpoint.
pub struct Client {
    endpoint: String,
    agent: ureq::Agent,
}

impl Client {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().user_agent("covup").build(),
        }
    }

    /// Upload a job. The JSON goes in the `json` form field.
    pub fn upload(&self, job: &Job) -> Result<JobResponse> {
        job.check_token()?;
        let body = serde_json::to_string(job)?;
        let url = format!("{}/api/v1/jobs", self.endpoint);
        let resp = self
            .agent
            .post(&url)
            .send_form(&[("json", body.as_str())])
            .map_err(into_error)?;

        let parsed: JobResponse = resp.into_json()?;
        if parsed.error {
            return Err(CovupError::Http {
                status: 200,
                body: parsed.message,
            });
        }
        Ok(parsed)
    }

    /// Tell Coveralls that every parallel job of a build has been uploaded.
    pub fn finish_parallel(&self, repo_token: &str, build_num: Option<&str>) -> Result<()> {
        let url = format!("{}/webhook", self.endpoint);
        self.agent
            .post(&url)
            .query("repo_token", repo_token)
            .send_json(serde_json::json!({
                "payload": { "build_num": build_num, "status": "done" }
            }))
            .map_err(into_error)?;
        Ok(())
    }
}

fn into_error(err: ureq::Error) -> CovupError {
    match err {
        ureq::Error::Status(status, resp) => CovupError::Http {
            status,
            body: resp.into_string().unwrap_or_default(),
        },
        other => CovupError::Transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::TimeZone;

    use super::*;
    use crate::model::LineCoverage;

    fn env(pairs: &[(&str, &str)]) -> CiEnv {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CiEnv::from_lookup(|k| vars.get(k).cloned())
    }

    fn run_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn source_file() -> SourceFile {
        SourceFile {
            name: "pkg/a.go".to_string(),
            source: "package pkg\n".to_string(),
            coverage: vec![LineCoverage::Count(1), LineCoverage::NotExecutable],
        }
    }

    #[test]
    fn test_github_actions_env() {
        let ci = env(&[
            ("GITHUB_ACTIONS", "true"),
            ("GITHUB_RUN_ID", "987"),
            ("GITHUB_RUN_NUMBER", "12"),
            ("GITHUB_REF", "refs/pull/42/merge"),
            ("GITHUB_SHA", "abc123"),
            ("GITHUB_HEAD_REF", "feature"),
        ]);
        assert_eq!(
            ci,
            CiEnv {
                service_name: Some("github".to_string()),
                job_id: Some("987".to_string()),
                service_number: Some("12".to_string()),
                pull_request: Some("42".to_string()),
                commit: Some("abc123".to_string()),
                branch: Some("feature".to_string()),
            }
        );
    }

    #[test]
    fn test_travis_env() {
        let ci = env(&[
            ("TRAVIS", "true"),
            ("TRAVIS_JOB_ID", "55"),
            ("TRAVIS_PULL_REQUEST", "false"),
        ]);
        assert_eq!(ci.service_name.as_deref(), Some("travis-ci"));
        assert_eq!(ci.job_id.as_deref(), Some("55"));
        assert_eq!(ci.pull_request, None);
    }

    #[test]
    fn test_pr_number_from_ref() {
        assert_eq!(pr_number_from_ref("refs/pull/7/merge"), Some("7".to_string()));
        assert_eq!(pr_number_from_ref("refs/heads/main"), None);
    }

    #[test]
    fn test_job_settings_override_env() {
        let ci = env(&[("GITHUB_ACTIONS", "true"), ("GITHUB_RUN_ID", "1")]);
        let settings = JobSettings {
            repo_token: Some("tok".to_string()),
            service_name: Some("custom".to_string()),
            job_id: Some("2".to_string()),
            ..Default::default()
        };
        let job = Job::build(&settings, &ci, vec![], run_at());
        assert_eq!(job.service_name, "custom");
        assert_eq!(job.service_job_id.as_deref(), Some("2"));
    }

    #[test]
    fn test_job_requires_token() {
        let job = Job::build(&JobSettings::default(), &CiEnv::default(), vec![], run_at());
        assert!(matches!(job.check_token(), Err(CovupError::Config(_))));

        let empty = JobSettings {
            repo_token: Some(String::new()),
            ..Default::default()
        };
        let job = Job::build(&empty, &CiEnv::default(), vec![], run_at());
        assert!(job.check_token().is_err());

        let travis = env(&[("TRAVIS", "true")]);
        let job = Job::build(&JobSettings::default(), &travis, vec![], run_at());
        assert!(job.check_token().is_ok());
    }

    #[test]
    fn test_github_actions_still_requires_token() {
        let github = env(&[("GITHUB_ACTIONS", "true"), ("GITHUB_RUN_ID", "987")]);
        let job = Job::build(&JobSettings::default(), &github, vec![], run_at());
        assert_eq!(job.service_name, "github");
        assert!(matches!(job.check_token(), Err(CovupError::Config(_))));

        let settings = JobSettings {
            repo_token: Some("tok".to_string()),
            ..Default::default()
        };
        let job = Job::build(&settings, &github, vec![], run_at());
        assert!(job.check_token().is_ok());
    }

    #[test]
    fn test_job_json_shape() {
        let ci = env(&[("GITHUB_SHA", "abc123"), ("BUILD_NUMBER", "31")]);
        let settings = JobSettings {
            repo_token: Some("tok".to_string()),
            ..Default::default()
        };
        let job = Job::build(&settings, &ci, vec![source_file()], run_at());
        let value = serde_json::to_value(&job).unwrap();

        assert_eq!(value["repo_token"], "tok");
        assert_eq!(value["service_name"], "covup");
        assert_eq!(value["run_at"], "2024-03-01T12:00:00Z");
        assert_eq!(value["git"]["head"]["id"], "abc123");
        assert_eq!(value["service_number"], "31");
        assert_eq!(value["source_files"][0]["name"], "pkg/a.go");
        assert_eq!(value["source_files"][0]["coverage"], serde_json::json!([1, null]));
        // Unset optional fields are left out entirely.
        assert!(value.get("parallel").is_none());
        assert!(value.get("flag_name").is_none());
        assert!(value.get("service_pull_request").is_none());
    }

    #[test]
    fn test_service_number_omitted_when_unknown() {
        let job = Job::build(&JobSettings::default(), &CiEnv::default(), vec![], run_at());
        let value = serde_json::to_value(&job).unwrap();
        assert!(value.get("service_number").is_none());
    }

    #[test]
    fn test_parallel_flag_serialized() {
        let settings = JobSettings {
            repo_token: Some("tok".to_string()),
            parallel: true,
            flag_name: Some("unit".to_string()),
            ..Default::default()
        };
        let job = Job::build(&settings, &CiEnv::default(), vec![], run_at());
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["parallel"], true);
        assert_eq!(value["flag_name"], "unit");
    }
}
