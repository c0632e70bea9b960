pub mod billing_gateway;
pub mod billing_webhook;
pub mod payment_confirmation;
pub mod prior_subscriptions;
pub mod subscriptions;
