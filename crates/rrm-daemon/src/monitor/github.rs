//! GitHub Actions provider using the `gh` CLI

use super::error::MonitorError;
use super::provider::CiProvider;
use super::types::{Build, BuildState, BuildStatus};
use serde::Deserialize;
use std::process::Command;

const RUN_FIELDS: &str = "databaseId,status,conclusion,headBranch,displayTitle,url";

/// GitHub Actions provider that uses the `gh` CLI
#[derive(Debug, Default)]
pub struct GitHubActionsProvider {
    /// `owner/repo`; when unset, `gh` resolves the repo from the working directory
    repo: Option<String>,
    /// Workflow name or file to restrict runs to
    workflow: Option<String>,
}

impl GitHubActionsProvider {
    pub fn new(repo: Option<String>) -> Self {
        Self {
            repo,
            workflow: None,
        }
    }

    pub fn with_workflow(mut self, workflow: impl Into<String>) -> Self {
        self.workflow = Some(workflow.into());
        self
    }

    /// Build from a `[providers.github]` table (keys: `repo`, `workflow`).
    pub fn from_config(config: Option<&toml::Table>) -> Result<Self, MonitorError> {
        let Some(table) = config else {
            return Ok(Self::default());
        };

        let get = |key: &str| -> Result<Option<String>, MonitorError> {
            match table.get(key) {
                None => Ok(None),
                Some(toml::Value::String(s)) if s.trim().is_empty() => Ok(None),
                Some(toml::Value::String(s)) => Ok(Some(s.trim().to_string())),
                Some(other) => Err(MonitorError::config(format!(
                    "[providers.github] {key} must be a string, got {other}"
                ))),
            }
        };

        let repo = get("repo")?;
        if let Some(repo) = &repo {
            if repo.split('/').filter(|p| !p.is_empty()).count() != 2 {
                return Err(MonitorError::config(format!(
                    "[providers.github] repo must be 'owner/repo', got '{repo}'"
                )));
            }
        }

        let mut provider = Self::new(repo);
        if let Some(workflow) = get("workflow")? {
            provider = provider.with_workflow(workflow);
        }
        Ok(provider)
    }

    fn list_args(&self, branch: &str) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "list".to_string(),
            "--branch".to_string(),
            branch.to_string(),
            "--limit".to_string(),
            "1".to_string(),
            "--json".to_string(),
            RUN_FIELDS.to_string(),
        ];
        if let Some(repo) = &self.repo {
            args.push("--repo".to_string());
            args.push(repo.clone());
        }
        if let Some(workflow) = &self.workflow {
            args.push("--workflow".to_string());
            args.push(workflow.clone());
        }
        args
    }

    /// Execute a `gh` command and return stdout
    async fn run_gh(&self, args: Vec<String>) -> Result<String, MonitorError> {
        tokio::task::spawn_blocking(move || {
            let output = Command::new("gh").args(&args).output().map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MonitorError::Provider {
                        message: "gh CLI not found. Install from https://cli.github.com/"
                            .to_string(),
                        source: Some(Box::new(e)),
                    }
                } else {
                    MonitorError::Provider {
                        message: format!("Failed to execute gh: {e}"),
                        source: Some(Box::new(e)),
                    }
                }
            })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                if stderr.contains("auth login") || stderr.contains("HTTP 401") {
                    return Err(MonitorError::Auth {
                        message: stderr.trim().to_string(),
                    });
                }
                return Err(MonitorError::provider(format!(
                    "gh command failed: {}",
                    stderr.trim()
                )));
            }

            String::from_utf8(output.stdout).map_err(|e| MonitorError::Provider {
                message: format!("Invalid UTF-8 in gh output: {e}"),
                source: Some(Box::new(e)),
            })
        })
        .await
        .map_err(|e| MonitorError::Runtime {
            message: format!("Task join error: {e}"),
            source: Some(Box::new(e)),
        })?
    }

    /// Map a GitHub run status onto a build state
    fn parse_state(status: &str) -> BuildState {
        match status.to_lowercase().as_str() {
            "queued" | "waiting" | "requested" | "pending" => BuildState::Queued,
            "in_progress" => BuildState::Running,
            "completed" => BuildState::Finished,
            _ => BuildState::Unknown,
        }
    }

    /// Map a GitHub run conclusion onto a build status
    fn parse_status(conclusion: Option<&str>) -> BuildStatus {
        match conclusion.map(str::to_lowercase).as_deref() {
            Some("success" | "neutral" | "skipped") => BuildStatus::Success,
            Some("failure" | "timed_out" | "startup_failure") => BuildStatus::Failure,
            Some("cancelled" | "action_required" | "stale") => BuildStatus::Error,
            _ => BuildStatus::Unknown,
        }
    }

    fn parse_run(gh_run: GhRun, branch: &str) -> Build {
        let state = Self::parse_state(&gh_run.status);
        let status = Self::parse_status(gh_run.conclusion.as_deref());
        let status_text = match gh_run.conclusion.as_deref().filter(|c| !c.is_empty()) {
            Some(conclusion) => format!("{}: {conclusion}", gh_run.display_title),
            None => format!("{}: {}", gh_run.display_title, gh_run.status),
        };
        Build {
            id: gh_run.database_id.to_string(),
            branch: if gh_run.head_branch.is_empty() {
                branch.to_string()
            } else {
                gh_run.head_branch
            },
            state,
            status,
            status_text,
            home_url: gh_run.url,
        }
    }

    fn parse_output(output: &str, branch: &str) -> Result<Option<Build>, MonitorError> {
        let runs: Vec<GhRun> = serde_json::from_str(output).map_err(|e| MonitorError::Provider {
            message: format!("Failed to parse gh JSON: {e}"),
            source: Some(Box::new(e)),
        })?;
        Ok(runs.into_iter().next().map(|run| Self::parse_run(run, branch)))
    }
}

impl CiProvider for GitHubActionsProvider {
    async fn latest_build(&self, branch: &str) -> Result<Option<Build>, MonitorError> {
        let output = self.run_gh(self.list_args(branch)).await?;
        Self::parse_output(&output, branch)
    }

    fn provider_name(&self) -> &str {
        "GitHub Actions"
    }
}

/// GitHub run JSON schema (from `gh run list --json`)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhRun {
    database_id: u64,
    status: String,
    conclusion: Option<String>,
    #[serde(default)]
    head_branch: String,
    #[serde(default)]
    display_title: String,
    url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github_actions_provider_creation() {
        let provider = GitHubActionsProvider::new(Some("owner/repo".to_string()));
        assert_eq!(provider.provider_name(), "GitHub Actions");
        assert_eq!(provider.repo.as_deref(), Some("owner/repo"));
    }

    #[test]
    fn test_parse_state() {
        assert_eq!(GitHubActionsProvider::parse_state("queued"), BuildState::Queued);
        assert_eq!(GitHubActionsProvider::parse_state("waiting"), BuildState::Queued);
        assert_eq!(GitHubActionsProvider::parse_state("in_progress"), BuildState::Running);
        assert_eq!(GitHubActionsProvider::parse_state("COMPLETED"), BuildState::Finished);
        assert_eq!(GitHubActionsProvider::parse_state("bogus"), BuildState::Unknown);
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(
            GitHubActionsProvider::parse_status(Some("success")),
            BuildStatus::Success
        );
        assert_eq!(
            GitHubActionsProvider::parse_status(Some("FAILURE")),
            BuildStatus::Failure
        );
        assert_eq!(
            GitHubActionsProvider::parse_status(Some("cancelled")),
            BuildStatus::Error
        );
        assert_eq!(GitHubActionsProvider::parse_status(Some("")), BuildStatus::Unknown);
        assert_eq!(GitHubActionsProvider::parse_status(None), BuildStatus::Unknown);
    }

    #[test]
    fn test_list_args() {
        let provider =
            GitHubActionsProvider::new(Some("owner/repo".to_string())).with_workflow("ci.yml");
        let args = provider.list_args("feature-x");
        assert_eq!(&args[..4], &["run", "list", "--branch", "feature-x"]);
        assert!(args.windows(2).any(|w| w == ["--repo", "owner/repo"]));
        assert!(args.windows(2).any(|w| w == ["--workflow", "ci.yml"]));
    }

    #[test]
    fn test_parse_output_running() {
        let output = r#"[{
            "databaseId": 123456789,
            "status": "in_progress",
            "conclusion": "",
            "headBranch": "feature-x",
            "displayTitle": "Add parser",
            "url": "https://github.com/owner/repo/actions/runs/123456789"
        }]"#;

        let build = GitHubActionsProvider::parse_output(output, "feature-x")
            .unwrap()
            .unwrap();
        assert_eq!(build.id, "123456789");
        assert_eq!(build.state, BuildState::Running);
        assert_eq!(build.status, BuildStatus::Unknown);
        assert_eq!(build.status_text, "Add parser: in_progress");
    }

    #[test]
    fn test_parse_output_empty_is_none() {
        assert!(
            GitHubActionsProvider::parse_output("[]", "feature-x")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_parse_output_invalid_json() {
        let err = GitHubActionsProvider::parse_output("not json", "b").unwrap_err();
        assert!(err.to_string().contains("Failed to parse gh JSON"));
    }

    #[test]
    fn test_from_config() {
        assert!(GitHubActionsProvider::from_config(None).unwrap().repo.is_none());

        let mut table = toml::Table::new();
        table.insert("repo".to_string(), toml::Value::String("nope".to_string()));
        assert!(GitHubActionsProvider::from_config(Some(&table)).is_err());

        table.insert(
            "repo".to_string(),
            toml::Value::String("owner/repo".to_string()),
        );
        table.insert(
            "workflow".to_string(),
            toml::Value::String("ci.yml".to_string()),
        );
        let provider = GitHubActionsProvider::from_config(Some(&table)).unwrap();
        assert_eq!(provider.workflow.as_deref(), Some("ci.yml"));
    }
}
