pub mod errors;
pub mod models;
pub mod paystack_client;
pub mod signature;
