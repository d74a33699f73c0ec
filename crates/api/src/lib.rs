//! HTTP host for the security core: adapts axum requests to
//! `warden_auth::RequestContext` and maps firewall answers onto responses.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
pub mod session;
