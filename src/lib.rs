pub mod config;
pub mod counter;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod keys;
pub mod middleware;
pub mod rate_gate;
pub mod redirect;
pub mod registry;
pub mod response;
pub mod server;
pub mod store;
pub mod validation;
pub mod verify;

pub use config::Config;
pub use counter::{CounterStore, MemoryCounterStore, RateWindow, RedisCounterStore};
pub use error::ApiError;
pub use rate_gate::RateGate;
pub use registry::Registry;
pub use response::ApiMessage;
pub use server::{create_app, Server};
pub use store::{LinkRecord, LinkStore, MemoryLinkStore, RemoteStore};
pub use verify::VerificationStatus;
