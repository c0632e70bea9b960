pub mod app_users;
pub mod subscriptions;
pub mod transactions;
