pub mod client;
pub mod timestamp;
pub mod types;

pub use client::{BuildServerClient, ClientError, TeamCityClient};
