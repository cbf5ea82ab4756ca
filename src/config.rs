//! Configuration for the rotator.
//!
//! Configuration is a single YAML file. String values may reference
//! environment variables with `${VAR}`; a handful of well-known variables
//! override file values outright so CI can inject secrets and lists.
//!
//! # Configuration File Format
//!
//! ```yaml
//! gitlab:
//!   url: https://gitlab.example.com
//!   token: ${GITLAB_TOKEN}
//!
//! repositories:
//!   - platform/api
//!   - platform/web
//!
//! reviewers: [alice, bob, carol, dave]
//! num_reviewers: 2
//!
//! rotation:
//!   interval_days: 7
//!   paths: ["*"]
//!
//! storage:
//!   type: gcs
//!   bucket: my-bucket
//!   prefix: codeowners/
//!   token: ${GCS_TOKEN}
//!
//! notification:
//!   slack_token: ${SLACK_TOKEN}
//!   fallback_channel: "#code-review"
//!   user_mapping:
//!     alice: U0123ABC
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::selector::ReviewerPool;

static ENV_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").expect("valid env reference regex"));

/// GitLab connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabConfig {
    #[serde(default = "default_gitlab_url")]
    pub url: String,
    #[serde(default)]
    pub token: String,
}

fn default_gitlab_url() -> String {
    "https://gitlab.com".to_string()
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            url: default_gitlab_url(),
            token: String::new(),
        }
    }
}

/// How and when the rotation advances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Length of a rotation epoch in days. The selection advances at most once per epoch.
    #[serde(default = "default_interval_days")]
    pub interval_days: u32,
    /// Path patterns assigned to the rotating reviewers.
    #[serde(default = "default_paths")]
    pub paths: Vec<String>,
    /// Candidate ownership file locations, checked in order.
    #[serde(default = "default_codeowners_paths")]
    pub codeowners_paths: Vec<String>,
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
}

fn default_interval_days() -> u32 {
    1
}

fn default_paths() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_codeowners_paths() -> Vec<String> {
    vec![
        "CODEOWNERS".to_string(),
        ".gitlab/CODEOWNERS".to_string(),
        "docs/CODEOWNERS".to_string(),
    ]
}

fn default_commit_message() -> String {
    "chore: update codeowners with new reviewer rotation".to_string()
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            interval_days: default_interval_days(),
            paths: default_paths(),
            codeowners_paths: default_codeowners_paths(),
            commit_message: default_commit_message(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Local,
    Gcs,
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageType::Local => write!(f, "local"),
            StorageType::Gcs => write!(f, "gcs"),
        }
    }
}

/// Where rotation state lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(rename = "type", default)]
    pub storage_type: StorageType,
    /// Directory for the local backend.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Bucket for the GCS backend.
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Bearer token for the GCS backend.
    #[serde(default)]
    pub token: Option<String>,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".codeowners-rotator")
}

fn default_prefix() -> String {
    "codeowners/".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::default(),
            state_dir: default_state_dir(),
            bucket: None,
            prefix: default_prefix(),
            token: None,
        }
    }
}

/// Chat notification settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub slack_token: Option<String>,
    /// Reviewer handle to chat user id.
    #[serde(default)]
    pub user_mapping: BTreeMap<String, String>,
    /// Channel used for reviewers without a reachable identity.
    #[serde(default)]
    pub fallback_channel: Option<String>,
}

/// The complete configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotatorConfig {
    #[serde(default)]
    pub gitlab: GitLabConfig,
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default)]
    pub reviewers: Vec<String>,
    #[serde(default = "default_num_reviewers")]
    pub num_reviewers: usize,
    #[serde(default)]
    pub rotation: RotationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
}

fn default_num_reviewers() -> usize {
    2
}

impl Default for RotatorConfig {
    fn default() -> Self {
        Self {
            gitlab: GitLabConfig::default(),
            repositories: Vec::new(),
            reviewers: Vec::new(),
            num_reviewers: default_num_reviewers(),
            rotation: RotationConfig::default(),
            storage: StorageConfig::default(),
            notification: NotificationConfig::default(),
        }
    }
}

impl RotatorConfig {
    /// Load a configuration file, expanding `${VAR}` references and applying
    /// environment overrides from the process environment.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env(path, |name| std::env::var(name).ok())
    }

    /// Like [`RotatorConfig::load`] with an explicit environment lookup.
    pub fn load_with_env(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse_with_env(&content, env)
            .with_context(|| format!("Failed to load config file: {}", path.display()))
    }

    pub fn parse_with_env(content: &str, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut raw: serde_yaml::Value =
            serde_yaml::from_str(content).context("Failed to parse YAML")?;
        if raw.is_null() {
            raw = serde_yaml::Value::Mapping(Default::default());
        }
        expand_value(&mut raw, &env);

        let mut config: RotatorConfig =
            serde_yaml::from_value(raw).context("Invalid configuration structure")?;
        config.apply_env_overrides(&env)?;
        config.normalize();
        Ok(config)
    }

    /// Well-known environment variables take precedence over file values.
    fn apply_env_overrides(&mut self, env: &impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = env("GITLAB_URL") {
            self.gitlab.url = url;
        }
        if let Some(token) = env("GITLAB_TOKEN") {
            self.gitlab.token = token;
        }
        if let Some(repos) = env("REPOSITORIES") {
            self.repositories = split_list(&repos);
        }
        if let Some(reviewers) = env("REVIEWERS") {
            self.reviewers = split_list(&reviewers);
        }
        if let Some(count) = env("NUM_REVIEWERS") {
            self.num_reviewers = count
                .trim()
                .parse()
                .with_context(|| format!("NUM_REVIEWERS must be a number, got '{}'", count))?;
        }
        if let Some(bucket) = env("GCS_BUCKET") {
            self.storage.storage_type = StorageType::Gcs;
            self.storage.bucket = Some(bucket);
        }
        if let Some(token) = env("SLACK_TOKEN") {
            self.notification.slack_token = Some(token);
        }
        Ok(())
    }

    /// Unset variables expand to empty strings; treat those as absent.
    fn normalize(&mut self) {
        fn non_empty(value: &mut Option<String>) {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *value = None;
            }
        }
        non_empty(&mut self.storage.bucket);
        non_empty(&mut self.storage.token);
        non_empty(&mut self.notification.slack_token);
        non_empty(&mut self.notification.fallback_channel);
        self.gitlab.url = self.gitlab.url.trim_end_matches('/').to_string();
    }

    /// The reviewer pool, in configured order.
    pub fn pool(&self) -> Result<ReviewerPool, ConfigError> {
        ReviewerPool::new(self.reviewers.iter().cloned())
    }

    /// Check everything a rotation run depends on. Any error here aborts the
    /// run before a single repository is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pool = self.pool()?;
        pool.check_slots(self.num_reviewers)?;

        if self.repositories.is_empty() {
            return Err(ConfigError::NoRepositories);
        }
        for repo in &self.repositories {
            if !is_valid_repository(repo) {
                return Err(ConfigError::InvalidRepository(repo.clone()));
            }
        }
        if self.gitlab.token.trim().is_empty() {
            return Err(ConfigError::Missing(
                "gitlab.token (set it with ${GITLAB_TOKEN} or the GITLAB_TOKEN variable)"
                    .to_string(),
            ));
        }
        if self.rotation.interval_days == 0 {
            return Err(ConfigError::Invalid(
                "rotation.interval_days must be at least 1".to_string(),
            ));
        }
        if self.rotation.paths.iter().any(|p| p.trim().is_empty()) || self.rotation.paths.is_empty()
        {
            return Err(ConfigError::Invalid(
                "rotation.paths must list at least one non-empty pattern".to_string(),
            ));
        }
        if self.rotation.codeowners_paths.is_empty() {
            return Err(ConfigError::Invalid(
                "rotation.codeowners_paths must not be empty".to_string(),
            ));
        }
        if self.storage.storage_type == StorageType::Gcs && self.storage.bucket.is_none() {
            return Err(ConfigError::Missing("storage.bucket".to_string()));
        }
        Ok(())
    }

    /// Validation for the notification entry point: needs the host and a chat token,
    /// but not a valid rotation setup.
    pub fn validate_for_notify(&self) -> Result<(), ConfigError> {
        if self.gitlab.token.trim().is_empty() {
            return Err(ConfigError::Missing("gitlab.token".to_string()));
        }
        if self.notification.slack_token.is_none() {
            return Err(ConfigError::Missing(
                "notification.slack_token (or the SLACK_TOKEN variable)".to_string(),
            ));
        }
        Ok(())
    }

    /// Non-fatal issues worth surfacing to an operator.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let unmapped: Vec<&str> = self
            .reviewers
            .iter()
            .filter(|r| !self.notification.user_mapping.contains_key(*r))
            .map(String::as_str)
            .collect();
        if !unmapped.is_empty() {
            warnings.push(format!(
                "Reviewers without a chat identity (notified via fallback channel): {}",
                unmapped.join(", ")
            ));
            if self.notification.fallback_channel.is_none() {
                warnings.push(
                    "No notification.fallback_channel configured; unmapped reviewers cannot be notified"
                        .to_string(),
                );
            }
        }

        let stale: Vec<&str> = self
            .notification
            .user_mapping
            .keys()
            .filter(|handle| !self.reviewers.contains(*handle))
            .map(String::as_str)
            .collect();
        if !stale.is_empty() {
            warnings.push(format!(
                "user_mapping entries for handles outside the reviewer pool: {}",
                stale.join(", ")
            ));
        }

        if self.storage.storage_type == StorageType::Gcs && self.storage.token.is_none() {
            warnings.push("storage.token is not set; GCS requests will be unauthenticated".to_string());
        }

        warnings
    }
}

/// Replace every `${VAR}` in `value`. Unknown variables become empty strings.
pub fn expand_env_vars(value: &str, env: &impl Fn(&str) -> Option<String>) -> String {
    ENV_REF
        .replace_all(value, |caps: &regex::Captures<'_>| {
            env(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

fn expand_value(value: &mut serde_yaml::Value, env: &impl Fn(&str) -> Option<String>) {
    match value {
        serde_yaml::Value::String(s) => *s = expand_env_vars(s, env),
        serde_yaml::Value::Sequence(items) => {
            for item in items {
                expand_value(item, env);
            }
        }
        serde_yaml::Value::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                expand_value(v, env);
            }
        }
        serde_yaml::Value::Tagged(tagged) => expand_value(&mut tagged.value, env),
        _ => {}
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// `namespace/name`, possibly with nested groups; no empty or relative segments.
pub fn is_valid_repository(repo: &str) -> bool {
    let segments: Vec<&str> = repo.split('/').collect();
    segments.len() >= 2
        && segments
            .iter()
            .all(|s| !s.is_empty() && *s != "." && *s != ".." && !s.contains(char::is_whitespace))
}
