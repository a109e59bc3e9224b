use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub backend_url: String,
    pub backend_token: Option<String>,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub backend_timeout_secs: u64,
    pub user_agent: String,
    pub scheduler_cron: String,
    pub scheduler_max_concurrent: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("backend_url", &self.backend_url)
            .field(
                "backend_token",
                &self.backend_token.as_ref().map(|_| "[redacted]"),
            )
            .field("backend_timeout_secs", &self.backend_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("scheduler_cron", &self.scheduler_cron)
            .field("scheduler_max_concurrent", &self.scheduler_max_concurrent)
            .finish()
    }
}
