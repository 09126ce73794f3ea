//! Cluster management API client
//!
//! This module provides the session-authenticated client for the cluster's
//! HTTP management API.
//!
//! # Architecture
//!
//! - [`SessionStore`] holds the current session token, shared via `Arc`
//! - [`Authenticator`] turns a credential into a session (`POST /login`)
//! - [`ClusterApiClient`] attaches `session` and `tenant` cookies and
//!   re-authenticates once when a request comes back 401

pub mod auth;
pub mod client;
pub mod models;
pub mod session;

use url::Url;

pub use auth::{Authenticator, PasswordAuthenticator};
pub use client::ClusterApiClient;
pub use session::{Session, SessionSnapshot, SessionStore};

use crate::errors::ApiError;

/// Append path segments to a base URL, keeping any base path
pub(crate) fn join_path(base: &Url, path: &str) -> Result<Url, ApiError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ApiError::Config(format!("{base} cannot be used as a base URL")))?
        .pop_if_empty()
        .extend(path.split('/').filter(|segment| !segment.is_empty()));
    Ok(url)
}
