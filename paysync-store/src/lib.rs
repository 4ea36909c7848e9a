pub mod app_config;
pub mod database;
pub mod identity_client;
pub mod memory_ledger;
pub mod payment_repo;
pub mod peer_client;
pub mod stripe_gateway;
pub mod upstream;

pub use database::DbClient;
pub use identity_client::HttpTokenVerifier;
pub use memory_ledger::InMemoryPaymentLedger;
pub use payment_repo::PgPaymentLedger;
pub use peer_client::PeerServiceClient;
pub use stripe_gateway::StripeGateway;
pub use upstream::http_client;
