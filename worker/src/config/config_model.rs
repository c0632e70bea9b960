use std::time::Duration;

use url::Url;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub worker_server: WorkerServer,
    pub database: Database,
    pub sweep: Sweep,
    pub notifications: Notifications,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Sweep {
    pub interval: Duration,
    pub run_on_start: bool,
    /// The manual sweep endpoint answers 503 while unset.
    pub internal_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Notifications {
    pub service_url: Option<Url>,
    pub service_token: Option<String>,
}
