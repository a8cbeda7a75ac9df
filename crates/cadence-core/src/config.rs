//! Simulation run parameters, loaded from YAML.
//!
//! ```yaml
//! owner: octocat
//! repo: sandbox
//! start_date: 2024-01-01
//! end_date: 2024-03-31
//! min_commits_per_day: 0
//! max_commits_per_day: 4
//! weekend_intensity: 0.3
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::Date;

pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const GEMINI_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config schema validation failed: {0}")]
    Parse(String),
}

/// How simulated work reaches the target branch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BranchingStrategy {
    /// Every commit lands directly on the target branch.
    #[default]
    Simple,
    /// Feature branches merged through pull requests, when `simulate_prs` is on.
    Gitflow,
}

/// Immutable parameters of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default, skip_serializing)]
    pub github_token: Option<String>,
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(with = "crate::date::ymd")]
    pub start_date: Date,
    #[serde(with = "crate::date::ymd")]
    pub end_date: Date,
    /// Signed so that negative values in a file surface as `InvalidConfig`.
    #[serde(default = "default_min_commits")]
    pub min_commits_per_day: i64,
    #[serde(default = "default_max_commits")]
    pub max_commits_per_day: i64,
    /// Multiplier applied to Saturday/Sunday counts, in `[0, 1]`.
    #[serde(default = "default_weekend_intensity")]
    pub weekend_intensity: f64,
    #[serde(default)]
    pub use_ai: bool,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub simulate_prs: bool,
    #[serde(default)]
    pub simulate_issues: bool,
    #[serde(default)]
    pub branching_strategy: BranchingStrategy,
    #[serde(default)]
    pub auto_create_repo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default = "default_issue_probability")]
    pub issue_probability: f64,
    #[serde(default = "default_pr_probability")]
    pub pr_probability: f64,
    #[serde(default = "default_pr_commits")]
    pub pr_commits: u32,
    #[serde(default = "default_snippet_rate")]
    pub snippet_rate: f64,
    #[serde(default)]
    pub co_authors: Vec<String>,
    #[serde(default)]
    pub co_author_rate: f64,
    #[serde(default = "default_per_commit_cost")]
    pub per_commit_cost_secs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
    #[serde(default)]
    pub host: HostSettings,
}

/// Transport tuning for the git host client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostSettings {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Attempts for read-only calls (repo/ref/commit lookups). Mutations are never retried.
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            request_timeout_secs: default_request_timeout(),
            read_retries: default_read_retries(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

fn default_branch() -> String {
    "main".into()
}
fn default_min_commits() -> i64 {
    0
}
fn default_max_commits() -> i64 {
    4
}
fn default_weekend_intensity() -> f64 {
    0.5
}
fn default_issue_probability() -> f64 {
    0.15
}
fn default_pr_probability() -> f64 {
    0.1
}
fn default_pr_commits() -> u32 {
    2
}
fn default_snippet_rate() -> f64 {
    0.25
}
fn default_per_commit_cost() -> f64 {
    2.0
}
fn default_api_base() -> String {
    "https://api.github.com".into()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_read_retries() -> u32 {
    3
}
fn default_retry_backoff() -> u64 {
    500
}

impl SimulationConfig {
    /// A config with every optional field at its default.
    pub fn new(owner: &str, repo: &str, start_date: Date, end_date: Date) -> Self {
        Self {
            github_token: None,
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: default_branch(),
            start_date,
            end_date,
            min_commits_per_day: default_min_commits(),
            max_commits_per_day: default_max_commits(),
            weekend_intensity: default_weekend_intensity(),
            use_ai: false,
            api_key: None,
            simulate_prs: false,
            simulate_issues: false,
            branching_strategy: BranchingStrategy::Simple,
            auto_create_repo: false,
            seed: None,
            issue_probability: default_issue_probability(),
            pr_probability: default_pr_probability(),
            pr_commits: default_pr_commits(),
            snippet_rate: default_snippet_rate(),
            co_authors: Vec::new(),
            co_author_rate: 0.0,
            per_commit_cost_secs: default_per_commit_cost(),
            author_name: None,
            author_email: None,
            host: HostSettings::default(),
        }
    }

    /// Check every invariant. Runs before any remote call.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::InvalidConfig(msg));

        for (field, value) in [
            ("owner", &self.owner),
            ("repo", &self.repo),
            ("branch", &self.branch),
        ] {
            if value.trim().is_empty() {
                return invalid(format!("{field} must not be empty"));
            }
        }
        if self.start_date > self.end_date {
            return invalid(format!(
                "start_date {} is after end_date {}",
                crate::date::format_date(self.start_date),
                crate::date::format_date(self.end_date)
            ));
        }
        if self.min_commits_per_day < 0 {
            return invalid(format!(
                "min_commits_per_day must be >= 0, got {}",
                self.min_commits_per_day
            ));
        }
        if self.max_commits_per_day < 0 {
            return invalid(format!(
                "max_commits_per_day must be >= 0, got {}",
                self.max_commits_per_day
            ));
        }
        if self.min_commits_per_day > self.max_commits_per_day {
            return invalid(format!(
                "min_commits_per_day ({}) exceeds max_commits_per_day ({})",
                self.min_commits_per_day, self.max_commits_per_day
            ));
        }
        if u32::try_from(self.max_commits_per_day).is_err() {
            return invalid(format!(
                "max_commits_per_day is too large: {}",
                self.max_commits_per_day
            ));
        }
        for (field, value) in [
            ("weekend_intensity", self.weekend_intensity),
            ("issue_probability", self.issue_probability),
            ("pr_probability", self.pr_probability),
            ("snippet_rate", self.snippet_rate),
            ("co_author_rate", self.co_author_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{field} must be within [0, 1], got {value}"));
            }
        }
        if self.pr_commits == 0 {
            return invalid("pr_commits must be at least 1".into());
        }
        if !self.per_commit_cost_secs.is_finite() || self.per_commit_cost_secs < 0.0 {
            return invalid(format!(
                "per_commit_cost_secs must be a non-negative number, got {}",
                self.per_commit_cost_secs
            ));
        }
        Ok(())
    }

    /// Validated `(min, max)` daily commit bounds.
    pub fn commit_bounds(&self) -> Result<(u32, u32), ConfigError> {
        self.validate()?;
        // validate() guarantees both fit
        Ok((
            self.min_commits_per_day as u32,
            self.max_commits_per_day as u32,
        ))
    }

    pub fn branch_ref(&self) -> String {
        format!("heads/{}", self.branch)
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Pull requests only happen under gitflow.
    pub fn pull_requests_enabled(&self) -> bool {
        self.simulate_prs && self.branching_strategy == BranchingStrategy::Gitflow
    }

    /// Token from the file, else from `GITHUB_TOKEN`.
    pub fn resolve_github_token(&self) -> Option<String> {
        non_empty(self.github_token.clone()).or_else(|| non_empty(std::env::var(GITHUB_TOKEN_ENV).ok()))
    }

    /// Generative API key from the file, else from `GEMINI_API_KEY`.
    pub fn resolve_api_key(&self) -> Option<String> {
        non_empty(self.api_key.clone()).or_else(|| non_empty(std::env::var(GEMINI_KEY_ENV).ok()))
    }

    pub fn author_name(&self) -> String {
        self.author_name.clone().unwrap_or_else(|| self.owner.clone())
    }

    pub fn author_email(&self) -> String {
        self.author_email
            .clone()
            .unwrap_or_else(|| format!("{}@users.noreply.github.com", self.owner))
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

/// Load and validate a config from a YAML file.
pub fn load_config(path: &Path) -> Result<SimulationConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Parse and validate a config from a YAML string.
pub fn parse_config(yaml: &str) -> Result<SimulationConfig, ConfigError> {
    let config: SimulationConfig =
        serde_yml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Commented starter config written by `cadence init`.
pub const SAMPLE_CONFIG: &str = r#"# cadence simulation config
owner: your-github-login
repo: activity-sandbox
branch: main
# Create the repository (public, initialized with a README) if it is missing.
auto_create_repo: true

start_date: 2024-01-01
end_date: 2024-03-31
min_commits_per_day: 0
max_commits_per_day: 4
# Saturday/Sunday counts are multiplied by this value.
weekend_intensity: 0.3

# Generated text via Gemini. Key from api_key or GEMINI_API_KEY.
use_ai: false

simulate_issues: false
issue_probability: 0.15

# Pull requests need branching_strategy: gitflow.
simulate_prs: false
branching_strategy: simple
pr_probability: 0.1
pr_commits: 2

co_authors: []
co_author_rate: 0.0

# Fix the seed to get the same plan on every run.
# seed: 42

# Token from github_token or GITHUB_TOKEN.
"#;
