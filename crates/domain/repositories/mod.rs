pub mod app_users;
pub mod notifications;
pub mod subscriptions;
pub mod transactions;
