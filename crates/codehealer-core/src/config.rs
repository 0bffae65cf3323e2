use std::{collections::HashMap, fmt, time::Duration};

use crate::error::{HealerError, Result};

/// Primary and fallback environment names for the API credential.
pub const TOKEN_KEYS: [&str; 2] = ["GITHUB_TOKEN", "TOKEN"];

pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }

    /// Read `CODEHEALER_LOG_FORMAT` without requiring the rest of the config,
    /// so logging can be up before the credential check runs.
    pub fn from_env() -> Self {
        let dotenv = parse_dotenv();
        get("CODEHEALER_LOG_FORMAT", &dotenv)
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }
}

/// Process configuration. Values come from the environment first, then `.env`.
#[derive(Clone)]
pub struct Config {
    pub github_token: String,
    pub api_url: String,

    // Cycle
    pub action_limit: u32,
    pub action_delay_s: u64,
    pub search_page_size: u32,
    pub max_search_pages: u32,
    /// Delete a created branch when a later publish step fails.
    pub cleanup_orphans: bool,

    // Supervisor
    pub cycle_interval_s: u64,
    pub fatal_backoff_s: u64,

    pub http_timeout_s: u64,
    pub log_format: LogFormat,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("github_token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("action_limit", &self.action_limit)
            .field("action_delay_s", &self.action_delay_s)
            .field("search_page_size", &self.search_page_size)
            .field("max_search_pages", &self.max_search_pages)
            .field("cleanup_orphans", &self.cleanup_orphans)
            .field("cycle_interval_s", &self.cycle_interval_s)
            .field("fatal_backoff_s", &self.fatal_backoff_s)
            .field("http_timeout_s", &self.http_timeout_s)
            .field("log_format", &self.log_format)
            .finish()
    }
}

fn parse_dotenv() -> HashMap<String, String> {
    let mut map = HashMap::new();
    let Ok(contents) = std::fs::read_to_string(".env") else {
        return map;
    };
    parse_dotenv_str(&contents, &mut map);
    map
}

fn parse_dotenv_str(contents: &str, map: &mut HashMap<String, String>) {
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            let v = v.trim().trim_matches('"');
            map.insert(k.trim().to_string(), v.to_string());
        }
    }
}

fn get(key: &str, dotenv: &HashMap<String, String>) -> Option<String> {
    std::env::var(key).ok().or_else(|| dotenv.get(key).cloned())
}

fn get_str(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn get_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key).as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        Some(_) => default,
        None => default,
    }
}

fn get_u32(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u32) -> u32 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn get_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let dotenv = parse_dotenv();
        Self::from_lookup(|key| get(key, &dotenv))
    }

    /// Build from an arbitrary key lookup. An empty credential counts as absent.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let github_token = TOKEN_KEYS
            .iter()
            .filter_map(|key| lookup(key))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
            .ok_or(HealerError::CredentialMissing)?;

        let api_url = get_str(&lookup, "CODEHEALER_API_URL", DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string();
        if !api_url.starts_with("https://") && !api_url.starts_with("http://") {
            return Err(HealerError::Config(format!(
                "CODEHEALER_API_URL must be an http(s) URL, got '{api_url}'"
            )));
        }

        Ok(Self {
            github_token,
            api_url,
            action_limit: get_u32(&lookup, "CODEHEALER_ACTION_LIMIT", 5),
            action_delay_s: get_u64(&lookup, "CODEHEALER_ACTION_DELAY_S", 60),
            search_page_size: get_u32(&lookup, "CODEHEALER_SEARCH_PAGE_SIZE", 30).clamp(1, 100),
            max_search_pages: get_u32(&lookup, "CODEHEALER_MAX_SEARCH_PAGES", 10).max(1),
            cleanup_orphans: get_bool(&lookup, "CODEHEALER_CLEANUP_ORPHANS", false),
            cycle_interval_s: get_u64(&lookup, "CODEHEALER_CYCLE_INTERVAL_S", 3600),
            fatal_backoff_s: get_u64(&lookup, "CODEHEALER_FATAL_BACKOFF_S", 600),
            http_timeout_s: get_u64(&lookup, "CODEHEALER_HTTP_TIMEOUT_S", 30).max(1),
            log_format: lookup("CODEHEALER_LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
        })
    }

    pub fn action_delay(&self) -> Duration {
        Duration::from_secs(self.action_delay_s)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_s)
    }

    pub fn fatal_backoff(&self) -> Duration {
        Duration::from_secs(self.fatal_backoff_s)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_s)
    }
}
