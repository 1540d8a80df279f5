//! Configuration discovery and resolution

use super::types::Config;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the repo-local config
const REPO_CONFIG_FILE: &str = ".rrm.toml";

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("TOML parsing error in {path}: {source}")]
    TomlParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Command-line overrides for configuration
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Explicit config file, applied on top of discovered files
    pub config_path: Option<PathBuf>,
    /// Override the trigger schedule
    pub schedule: Option<String>,
    /// Override the CI provider name
    pub provider: Option<String>,
    /// Replace the configured branch list (empty = keep configured)
    pub branches: Vec<String>,
}

/// Resolve configuration from all sources
///
/// Priority (highest to lowest):
/// 1. Command-line overrides (an explicit `--config` file sits just below the flags)
/// 2. Environment variables
/// 3. Repo-local config (.rrm.toml in current dir or up to the git root)
/// 4. Global config (~/.config/rrm/config.toml)
/// 5. Defaults
///
/// Any config file that exists must parse; a broken file is an error rather
/// than a silent fallback to the remaining layers. A relative
/// `[monitor].repo_path` is resolved against the directory of the file that
/// set it.
pub fn resolve_config(
    overrides: &ConfigOverrides,
    current_dir: &Path,
    home_dir: &Path,
) -> Result<Config, ConfigError> {
    let mut config = Config::default();

    // 4. Global config
    let global_config_path = crate::home::config_dir(home_dir).join("config.toml");
    if global_config_path.exists() {
        merge_config_file(&mut config, &global_config_path)?;
    }

    // 3. Repo-local config (current dir or git root)
    if let Some(repo_config) = find_repo_local_config(current_dir) {
        merge_config_file(&mut config, &repo_config)?;
    }

    if let Some(ref explicit) = overrides.config_path {
        merge_config_file(&mut config, explicit)?;
    }

    // 2. Environment variables
    apply_env_overrides(&mut config);

    // 1. Command-line overrides
    apply_cli_overrides(&mut config, overrides);

    Ok(config)
}

/// Find repo-local config file
///
/// Searches current directory and parent directories up to git root
fn find_repo_local_config(current_dir: &Path) -> Option<PathBuf> {
    let mut dir = current_dir;

    loop {
        let config_path = dir.join(REPO_CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if dir.join(".git").exists() {
            break;
        }

        dir = dir.parent()?;
    }

    None
}

/// Load config from a TOML file
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })
}

fn merge_config_file(base: &mut Config, path: &Path) -> Result<(), ConfigError> {
    let mut file_config = load_config_file(path)?;
    if let Some(dir) = path.parent() {
        anchor_repo_path(&mut file_config, dir);
    }
    merge_config(base, file_config);
    Ok(())
}

/// Make a relative `repo_path` absolute against `dir`
fn anchor_repo_path(config: &mut Config, dir: &Path) {
    let Some(toml::Value::String(repo_path)) = config.monitor.get_mut("repo_path") else {
        return;
    };
    let path = Path::new(repo_path.as_str());
    if path.is_relative() {
        *repo_path = dir.join(path).to_string_lossy().into_owned();
    }
}

/// Merge file config into base config
///
/// Tables merge key by key so a repo file can override a single monitor
/// setting without restating the rest.
fn merge_config(base: &mut Config, file: Config) {
    for (key, value) in file.monitor {
        base.monitor.insert(key, value);
    }

    if file.event_log.disabled {
        base.event_log.disabled = true;
    }
    if file.event_log.path.is_some() {
        base.event_log.path = file.event_log.path;
    }
    if file.event_log.max_bytes.is_some() {
        base.event_log.max_bytes = file.event_log.max_bytes;
    }
    if file.event_log.max_files.is_some() {
        base.event_log.max_files = file.event_log.max_files;
    }

    for (name, table) in file.providers {
        let target = base.provider_config_mut(&name);
        for (key, value) in table {
            target.insert(key, value);
        }
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn branch_list(values: impl IntoIterator<Item = String>) -> toml::Value {
    toml::Value::Array(values.into_iter().map(toml::Value::String).collect())
}

/// Apply environment variable overrides
fn apply_env_overrides(config: &mut Config) {
    if let Some(schedule) = env_non_empty("RRM_SCHEDULE") {
        config
            .monitor
            .insert("schedule".to_string(), toml::Value::String(schedule));
    }

    if let Some(provider) = env_non_empty("RRM_PROVIDER") {
        config
            .monitor
            .insert("provider".to_string(), toml::Value::String(provider));
    }

    if let Some(branches) = env_non_empty("RRM_BRANCHES") {
        let list = branches
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string);
        config
            .monitor
            .insert("branches".to_string(), branch_list(list));
    }

    if let Some(url) = env_non_empty("TEAMCITY_URL") {
        config
            .provider_config_mut("teamcity")
            .insert("server_url".to_string(), toml::Value::String(url));
    }

    if let Some(token) = env_non_empty("TEAMCITY_TOKEN") {
        config
            .provider_config_mut("teamcity")
            .insert("token".to_string(), toml::Value::String(token));
    }
}

/// Apply command-line overrides
fn apply_cli_overrides(config: &mut Config, overrides: &ConfigOverrides) {
    if let Some(ref schedule) = overrides.schedule {
        config
            .monitor
            .insert("schedule".to_string(), toml::Value::String(schedule.clone()));
    }

    if let Some(ref provider) = overrides.provider {
        config
            .monitor
            .insert("provider".to_string(), toml::Value::String(provider.clone()));
    }

    if !overrides.branches.is_empty() {
        config.monitor.insert(
            "branches".to_string(),
            branch_list(overrides.branches.iter().cloned()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    const ENV_VARS: [&str; 5] = [
        "RRM_SCHEDULE",
        "RRM_PROVIDER",
        "RRM_BRANCHES",
        "TEAMCITY_URL",
        "TEAMCITY_TOKEN",
    ];

    fn clear_env() {
        unsafe {
            for var in ENV_VARS {
                env::remove_var(var);
            }
        }
    }

    fn monitor_str<'a>(config: &'a Config, key: &str) -> Option<&'a str> {
        config.monitor.get(key).and_then(|v| v.as_str())
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();

        let config =
            resolve_config(&ConfigOverrides::default(), temp_dir.path(), temp_dir.path()).unwrap();

        assert!(config.monitor.is_empty());
        assert!(config.providers.is_empty());
        assert_eq!(config.event_log, Default::default());
    }

    #[test]
    #[serial]
    fn test_repo_config_overrides_global() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let home_dir = temp_dir.path();
        let repo_dir = temp_dir.path().join("repo");
        std::fs::create_dir_all(&repo_dir).unwrap();

        let global_dir = home_dir.join(".config/rrm");
        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(
            global_dir.join("config.toml"),
            r#"
[monitor]
schedule = "0/30 * * * * ?"
provider = "teamcity"

[providers.teamcity]
server_url = "https://ci.example.com"
build_type = "Global_Build"
"#,
        )
        .unwrap();

        std::fs::write(
            repo_dir.join(".rrm.toml"),
            r#"
[monitor]
schedule = "0/10 * * * * ?"

[providers.teamcity]
build_type = "Repo_Build"
"#,
        )
        .unwrap();

        let config = resolve_config(&ConfigOverrides::default(), &repo_dir, home_dir).unwrap();

        assert_eq!(monitor_str(&config, "schedule"), Some("0/10 * * * * ?"));
        assert_eq!(monitor_str(&config, "provider"), Some("teamcity"));

        let teamcity = config.provider_config("teamcity").unwrap();
        assert_eq!(
            teamcity.get("server_url").and_then(|v| v.as_str()),
            Some("https://ci.example.com")
        );
        assert_eq!(
            teamcity.get("build_type").and_then(|v| v.as_str()),
            Some("Repo_Build")
        );
    }

    #[test]
    #[serial]
    fn test_repo_config_found_from_subdirectory() {
        clear_env();
        let temp_root = TempDir::new().unwrap();
        std::fs::create_dir(temp_root.path().join(".git")).unwrap();
        std::fs::write(
            temp_root.path().join(".rrm.toml"),
            "[monitor]\nbranches = [\"feature-x\"]\n",
        )
        .unwrap();
        let sub_dir = temp_root.path().join("src/deep");
        std::fs::create_dir_all(&sub_dir).unwrap();

        let home = TempDir::new().unwrap();
        let config = resolve_config(&ConfigOverrides::default(), &sub_dir, home.path()).unwrap();

        let branches = config.monitor.get("branches").and_then(|v| v.as_array()).unwrap();
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].as_str(), Some("feature-x"));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();

        unsafe {
            env::set_var("RRM_SCHEDULE", "@every 5s");
            env::set_var("RRM_BRANCHES", "feature-a, feature-b,,");
            env::set_var("TEAMCITY_TOKEN", "secret");
        }

        let config =
            resolve_config(&ConfigOverrides::default(), temp_dir.path(), temp_dir.path()).unwrap();
        clear_env();

        assert_eq!(monitor_str(&config, "schedule"), Some("@every 5s"));
        let branches: Vec<&str> = config
            .monitor
            .get("branches")
            .and_then(|v| v.as_array())
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(branches, vec!["feature-a", "feature-b"]);
        assert_eq!(
            config
                .provider_config("teamcity")
                .and_then(|t| t.get("token"))
                .and_then(|v| v.as_str()),
            Some("secret")
        );
    }

    #[test]
    #[serial]
    fn test_cli_overrides_beat_env() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        unsafe {
            env::set_var("RRM_PROVIDER", "github");
        }

        let overrides = ConfigOverrides {
            provider: Some("teamcity".to_string()),
            branches: vec!["cli-branch".to_string()],
            ..Default::default()
        };
        let config = resolve_config(&overrides, temp_dir.path(), temp_dir.path()).unwrap();
        clear_env();

        assert_eq!(monitor_str(&config, "provider"), Some("teamcity"));
        assert!(config.monitor.get("branches").is_some());
    }

    #[test]
    #[serial]
    fn test_explicit_config_path_must_exist() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let overrides = ConfigOverrides {
            config_path: Some(temp_dir.path().join("missing.toml")),
            ..Default::default()
        };

        let result = resolve_config(&overrides, temp_dir.path(), temp_dir.path());
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    #[serial]
    fn test_malformed_repo_config_is_fatal() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let home_dir = temp_dir.path().join("home");
        let global_dir = home_dir.join(".config/rrm");
        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(
            global_dir.join("config.toml"),
            "[monitor]\nbranches = [\"global-branch\"]\n",
        )
        .unwrap();

        let repo_dir = temp_dir.path().join("repo");
        std::fs::create_dir_all(repo_dir.join(".git")).unwrap();
        std::fs::write(repo_dir.join(".rrm.toml"), "[monitor]\nbranches = [\"a\"").unwrap();

        let result = resolve_config(&ConfigOverrides::default(), &repo_dir, &home_dir);
        match result {
            Err(ConfigError::TomlParse { path, .. }) => {
                assert_eq!(path, repo_dir.join(".rrm.toml"));
            }
            other => panic!("expected TomlParse error, got {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn test_malformed_global_config_is_fatal() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let global_dir = temp_dir.path().join(".config/rrm");
        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(global_dir.join("config.toml"), "invalid toml [[[").unwrap();

        let result = resolve_config(&ConfigOverrides::default(), temp_dir.path(), temp_dir.path());
        assert!(matches!(result, Err(ConfigError::TomlParse { .. })));
    }

    #[test]
    #[serial]
    fn test_relative_repo_path_resolved_against_config_dir() {
        clear_env();
        let temp_root = TempDir::new().unwrap();
        std::fs::create_dir(temp_root.path().join(".git")).unwrap();
        std::fs::write(
            temp_root.path().join(".rrm.toml"),
            "[monitor]\nrepo_path = \"checkout\"\n",
        )
        .unwrap();
        let sub_dir = temp_root.path().join("src/deep");
        std::fs::create_dir_all(&sub_dir).unwrap();

        let home = TempDir::new().unwrap();
        let config = resolve_config(&ConfigOverrides::default(), &sub_dir, home.path()).unwrap();

        let expected = temp_root.path().join("checkout");
        assert_eq!(
            monitor_str(&config, "repo_path"),
            Some(expected.to_str().unwrap())
        );
    }

    #[test]
    #[serial]
    fn test_absolute_repo_path_kept() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let absolute = temp_dir.path().join("elsewhere");
        let path = temp_dir.path().join("explicit.toml");
        std::fs::write(
            &path,
            format!("[monitor]\nrepo_path = {:?}\n", absolute.to_string_lossy()),
        )
        .unwrap();

        let overrides = ConfigOverrides {
            config_path: Some(path),
            ..Default::default()
        };
        let config = resolve_config(&overrides, temp_dir.path(), temp_dir.path()).unwrap();
        assert_eq!(
            monitor_str(&config, "repo_path"),
            Some(absolute.to_str().unwrap())
        );
    }

    #[test]
    fn test_load_config_file_event_log_section() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[event_log]
path = "/var/log/rrm/events.jsonl"
max_bytes = 1024
max_files = 3
"#,
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(
            config.event_log.path,
            Some(PathBuf::from("/var/log/rrm/events.jsonl"))
        );
        assert_eq!(config.event_log.max_bytes, Some(1024));
        assert_eq!(config.event_log.max_files, Some(3));
        assert!(!config.event_log.disabled);
    }

    #[test]
    fn test_load_config_file_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "[monitor\nschedule = ").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }
}
