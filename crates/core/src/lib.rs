pub mod chart;
pub mod client;
pub mod domain;
pub mod store;
pub mod time;

pub mod config {
    use anyhow::Context;

    pub const DEFAULT_BACKEND_BASE_URL: &str = "http://localhost:8000";
    pub const DEFAULT_PORT: u16 = 3000;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub backend_base_url: String,
        /// Unset means requests never time out.
        pub backend_timeout_secs: Option<u64>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let backend_timeout_secs = match non_empty_var("BACKEND_TIMEOUT_SECS") {
                Some(s) => Some(
                    s.parse::<u64>()
                        .with_context(|| format!("BACKEND_TIMEOUT_SECS is not a number: {s}"))?,
                ),
                None => None,
            };

            Ok(Self {
                backend_base_url: non_empty_var("BACKEND_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_BACKEND_BASE_URL.to_string()),
                backend_timeout_secs,
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            })
        }
    }

    /// Listen port for the dashboard. Only the server reads `PORT`.
    pub fn listen_port() -> anyhow::Result<u16> {
        match non_empty_var("PORT") {
            Some(s) => s
                .parse::<u16>()
                .with_context(|| format!("PORT is not a valid port: {s}")),
            None => Ok(DEFAULT_PORT),
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

}
