use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Default page size for mailbox views, also the cap on search results.
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,
    #[serde(default = "default_advanced_search_limit")]
    pub advanced_search_limit: i64,
}

fn default_database_url() -> String {
    "sqlite:wmail.db?mode=rwc".to_string()
}

fn default_page_size() -> i64 {
    50
}

fn default_max_page_size() -> i64 {
    100
}

fn default_advanced_search_limit() -> i64 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            advanced_search_limit: default_advanced_search_limit(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        use std::fs;
        if let Ok(content) = fs::read_to_string("settings.toml") {
            if let Ok(config) = toml::from_str(&content) {
                return config;
            }
        }
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.page_size, 50);
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.advanced_search_limit, 100);
        assert_eq!(config.database_url, "sqlite:wmail.db?mode=rwc");
    }

    #[test]
    fn partial_toml_falls_back_per_field() {
        let config: Config = toml::from_str("page_size = 25").unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.database_url, "sqlite:wmail.db?mode=rwc");
    }
}
