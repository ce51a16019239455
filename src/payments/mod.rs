pub mod gateway;
pub mod stripe_client;

pub use gateway::*;
pub use stripe_client::StripeGateway;
