pub mod auth;
pub mod booking;
pub mod config;
mod error;
pub mod events;
pub mod flights;
pub mod regulations;
mod service;
pub mod stats;
mod store;
pub mod validation;

pub use config::{Config, FlightRules};
pub use error::ServerError;
pub use events::FlightEvents;
pub use service::BookingService;
pub use store::{MemoryStore, StoreError};
