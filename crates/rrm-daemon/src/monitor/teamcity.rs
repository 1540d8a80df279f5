//! TeamCity provider using the REST API

use super::error::MonitorError;
use super::provider::CiProvider;
use super::types::{Build, BuildState, BuildStatus};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const BUILD_FIELDS: &str = "build(id,number,state,status,statusText,branchName,webUrl)";

/// TeamCity provider querying `/app/rest/builds`
#[derive(Debug)]
pub struct TeamCityProvider {
    client: reqwest::Client,
    server_url: String,
    token: Option<String>,
    build_type: Option<String>,
}

impl TeamCityProvider {
    /// Create a provider for the given server.
    ///
    /// Without a token, requests go through the `guestAuth` prefix.
    pub fn new(server_url: impl Into<String>, token: Option<String>) -> Result<Self, MonitorError> {
        Self::with_timeout(server_url, token, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    fn with_timeout(
        server_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, MonitorError> {
        let server_url = server_url.into().trim().trim_end_matches('/').to_string();
        if server_url.is_empty() {
            return Err(MonitorError::config("teamcity server_url must not be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rrm-daemon/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MonitorError::Init {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            server_url,
            token: token.filter(|t| !t.trim().is_empty()),
            build_type: None,
        })
    }

    /// Restrict queries to one build configuration
    pub fn with_build_type(mut self, build_type: impl Into<String>) -> Self {
        self.build_type = Some(build_type.into());
        self
    }

    /// Build from a `[providers.teamcity]` table.
    ///
    /// Keys: `server_url` (required), `token`, `build_type`, `timeout_secs`.
    pub fn from_config(config: Option<&toml::Table>) -> Result<Self, MonitorError> {
        let table = config.ok_or_else(|| {
            MonitorError::config("[providers.teamcity] requires server_url (or set TEAMCITY_URL)")
        })?;

        let server_url = string_key(table, "server_url")?.ok_or_else(|| {
            MonitorError::config("[providers.teamcity] requires server_url (or set TEAMCITY_URL)")
        })?;
        let token = string_key(table, "token")?;
        let timeout_secs = match table.get("timeout_secs") {
            None => DEFAULT_TIMEOUT_SECS,
            Some(toml::Value::Integer(n)) if *n > 0 => *n as u64,
            Some(other) => {
                return Err(MonitorError::config(format!(
                    "[providers.teamcity] timeout_secs must be a positive integer, got {other}"
                )));
            }
        };

        let mut provider =
            Self::with_timeout(server_url, token, Duration::from_secs(timeout_secs))?;
        if let Some(build_type) = string_key(table, "build_type")? {
            provider = provider.with_build_type(build_type);
        }
        Ok(provider)
    }

    fn builds_url(&self) -> String {
        if self.token.is_some() {
            format!("{}/app/rest/builds", self.server_url)
        } else {
            format!("{}/guestAuth/app/rest/builds", self.server_url)
        }
    }

    fn locator(&self, branch: &str) -> String {
        let mut locator = format!(
            "branch:(name:{}),running:any,canceled:any,count:1",
            locator_value(branch)
        );
        if let Some(build_type) = &self.build_type {
            locator.push_str(&format!(",buildType:(id:{})", locator_value(build_type)));
        }
        locator
    }

    fn to_build(tc: TcBuild, branch: &str) -> Build {
        let status = tc.status.as_deref().map(BuildStatus::parse).unwrap_or(BuildStatus::Unknown);
        let status_text = tc
            .status_text
            .or(tc.status)
            .unwrap_or_default();
        Build {
            id: tc.id.into_string(),
            branch: tc.branch_name.unwrap_or_else(|| branch.to_string()),
            state: tc.state.as_deref().map(BuildState::parse).unwrap_or(BuildState::Unknown),
            status,
            status_text,
            home_url: tc.web_url.unwrap_or_default(),
        }
    }
}

fn string_key(table: &toml::Table, key: &str) -> Result<Option<String>, MonitorError> {
    match table.get(key) {
        None => Ok(None),
        Some(toml::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(toml::Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(other) => Err(MonitorError::config(format!(
            "[providers.teamcity] {key} must be a string, got {other}"
        ))),
    }
}

impl CiProvider for TeamCityProvider {
    async fn latest_build(&self, branch: &str) -> Result<Option<Build>, MonitorError> {
        let locator = self.locator(branch);
        debug!("TeamCity query: locator={locator}");

        let mut request = self
            .client
            .get(self.builds_url())
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[("locator", locator.as_str()), ("fields", BUILD_FIELDS)]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| MonitorError::Provider {
            message: format!("TeamCity request failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(MonitorError::Auth {
                    message: format!("TeamCity rejected credentials ({status})"),
                });
            }
            s if !s.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(MonitorError::provider(format!(
                    "TeamCity returned {status}: {}",
                    body.trim()
                )));
            }
            _ => {}
        }

        let builds: TcBuilds = response.json().await.map_err(|e| MonitorError::Provider {
            message: format!("Failed to parse TeamCity JSON: {e}"),
            source: Some(Box::new(e)),
        })?;

        Ok(builds
            .build
            .into_iter()
            .next()
            .map(|tc| Self::to_build(tc, branch)))
    }

    fn provider_name(&self) -> &str {
        "TeamCity"
    }
}

/// `/app/rest/builds` response body
#[derive(Debug, Deserialize)]
struct TcBuilds {
    #[serde(default)]
    build: Vec<TcBuild>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TcBuild {
    id: TcId,
    state: Option<String>,
    status: Option<String>,
    status_text: Option<String>,
    branch_name: Option<String>,
    web_url: Option<String>,
}

/// TeamCity sends numeric ids; some proxies stringify them
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TcId {
    Number(u64),
    Text(String),
}

impl TcId {
    fn into_string(self) -> String {
        match self {
            TcId::Number(n) => n.to_string(),
            TcId::Text(s) => s,
        }
    }
}

/// Locator dimension value, `$base64:`-encoded when it contains characters
/// the locator syntax reserves
fn locator_value(raw: &str) -> String {
    let plain = raw
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '+' | '@' | '#'));
    if plain && !raw.is_empty() {
        raw.to_string()
    } else {
        format!("$base64:{}", URL_SAFE_NO_PAD.encode(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, toml::Value)]) -> toml::Table {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_locator_without_build_type() {
        let provider = TeamCityProvider::new("https://ci.example.com", None).unwrap();
        assert_eq!(
            provider.locator("feature-x"),
            "branch:(name:feature-x),running:any,canceled:any,count:1"
        );
    }

    #[test]
    fn test_locator_with_build_type() {
        let provider = TeamCityProvider::new("https://ci.example.com", None)
            .unwrap()
            .with_build_type("Kotlin_RemoteRun");
        assert!(provider.locator("b").ends_with(",buildType:(id:Kotlin_RemoteRun)"));
    }

    #[test]
    fn test_locator_encodes_reserved_branch_names() {
        let provider = TeamCityProvider::new("https://ci.example.com", None).unwrap();
        assert_eq!(
            provider.locator("fix),count:50"),
            "branch:(name:$base64:Zml4KSxjb3VudDo1MA),running:any,canceled:any,count:1"
        );
        assert_eq!(
            locator_value("feature (wip), v2"),
            "$base64:ZmVhdHVyZSAod2lwKSwgdjI"
        );
    }

    #[test]
    fn test_locator_value_keeps_plain_names() {
        for name in ["feature-x", "rr/user/fix_1.2", "Kotlin_RemoteRun"] {
            assert_eq!(locator_value(name), name);
        }
        assert!(locator_value("$base64:abc").starts_with("$base64:"));
    }

    #[test]
    fn test_builds_url_guest_vs_token() {
        let guest = TeamCityProvider::new("https://ci.example.com/", None).unwrap();
        assert_eq!(guest.builds_url(), "https://ci.example.com/guestAuth/app/rest/builds");

        let authed =
            TeamCityProvider::new("https://ci.example.com", Some("tok".to_string())).unwrap();
        assert_eq!(authed.builds_url(), "https://ci.example.com/app/rest/builds");
    }

    #[test]
    fn test_blank_token_means_guest() {
        let provider =
            TeamCityProvider::new("https://ci.example.com", Some("  ".to_string())).unwrap();
        assert!(provider.token.is_none());
    }

    #[test]
    fn test_empty_server_url_rejected() {
        let err = TeamCityProvider::new("  ", None).unwrap_err();
        assert!(matches!(err, MonitorError::Config { .. }));
    }

    #[test]
    fn test_from_config_reads_keys() {
        let cfg = table(&[
            ("server_url", toml::Value::String("https://ci.example.com".into())),
            ("token", toml::Value::String("secret".into())),
            ("build_type", toml::Value::String("Proj_Build".into())),
            ("timeout_secs", toml::Value::Integer(5)),
        ]);
        let provider = TeamCityProvider::from_config(Some(&cfg)).unwrap();
        assert_eq!(provider.token.as_deref(), Some("secret"));
        assert_eq!(provider.build_type.as_deref(), Some("Proj_Build"));
    }

    #[test]
    fn test_from_config_rejects_bad_values() {
        assert!(TeamCityProvider::from_config(None).is_err());

        let cfg = table(&[("server_url", toml::Value::Integer(1))]);
        assert!(TeamCityProvider::from_config(Some(&cfg)).is_err());

        let cfg = table(&[
            ("server_url", toml::Value::String("https://ci.example.com".into())),
            ("timeout_secs", toml::Value::Integer(0)),
        ]);
        assert!(TeamCityProvider::from_config(Some(&cfg)).is_err());
    }

    #[test]
    fn test_to_build_maps_fields() {
        let tc: TcBuild = serde_json::from_value(serde_json::json!({
            "id": 42,
            "number": "17",
            "state": "running",
            "status": "SUCCESS",
            "statusText": "Tests passed: 120",
            "branchName": "feature-x",
            "webUrl": "https://ci.example.com/viewLog.html?buildId=42"
        }))
        .unwrap();

        let build = TeamCityProvider::to_build(tc, "feature-x");
        assert_eq!(build.id, "42");
        assert_eq!(build.state, BuildState::Running);
        assert_eq!(build.status, BuildStatus::Success);
        assert_eq!(build.status_text, "Tests passed: 120");
        assert_eq!(build.home_url, "https://ci.example.com/viewLog.html?buildId=42");
    }

    #[test]
    fn test_to_build_missing_fields_fall_back() {
        let tc: TcBuild = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "state": "paused"
        }))
        .unwrap();

        let build = TeamCityProvider::to_build(tc, "requested-branch");
        assert_eq!(build.id, "abc");
        assert_eq!(build.branch, "requested-branch");
        assert_eq!(build.state, BuildState::Unknown);
        assert_eq!(build.status, BuildStatus::Unknown);
        assert_eq!(build.status_text, "");
    }
}
