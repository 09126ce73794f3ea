//! Shared HTTP plumbing for the outbound clients

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
