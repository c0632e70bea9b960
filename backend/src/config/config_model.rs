use std::time::Duration;

use url::Url;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub user_auth: UserAuth,
    pub billing: Billing,
    pub notifications: Notifications,
    pub admin: Admin,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct UserAuth {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct Billing {
    pub secret_key: String,
    pub base_url: Url,
    pub timeout: Duration,
    /// Public base URL of this service; the payment callback hangs off it.
    pub callback_base_url: Url,
    pub already_inactive_markers: String,
}

#[derive(Debug, Clone)]
pub struct Notifications {
    pub service_url: Option<Url>,
    pub service_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Admin {
    /// Admin endpoints answer 503 while unset.
    pub token: Option<String>,
}
