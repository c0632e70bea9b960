pub mod billing_events;
pub mod enums;
pub mod notifications;
pub mod plans;
pub mod subscriptions;
