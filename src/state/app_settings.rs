use log::LevelFilter;

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const DEFAULT_WS_URL: &str = "ws://localhost:3001";

#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    pub full_screen: bool,
    pub log_level: Option<LevelFilter>,
    pub api_base: String,
    pub ws_url: String,
    pub match_id: Option<String>,
    /// Token given on the command line or in the environment. Persisted
    /// through the credential store at startup.
    pub token: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            full_screen: false,
            log_level: None,
            api_base: DEFAULT_API_BASE.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            match_id: None,
            token: None,
        }
    }
}

impl AppSettings {
    pub fn load() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();
        Self {
            full_screen: false,
            log_level: var("MATCHDAY_LOG").and_then(|level| level.parse().ok()),
            api_base: var("MATCHDAY_API_BASE").unwrap_or(defaults.api_base),
            ws_url: var("MATCHDAY_WS_URL").unwrap_or(defaults.ws_url),
            match_id: var("MATCHDAY_MATCH_ID"),
            token: var("MATCHDAY_TOKEN"),
        }
    }

    /// Command-line values win over the environment.
    pub fn with_overrides(mut self, match_id: Option<String>, token: Option<String>) -> Self {
        if match_id.is_some() {
            self.match_id = match_id;
        }
        if token.is_some() {
            self.token = token;
        }
        self
    }
}
