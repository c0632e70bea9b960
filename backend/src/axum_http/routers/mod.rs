pub mod admin;
pub mod billing_webhook;
pub mod subscriptions;
