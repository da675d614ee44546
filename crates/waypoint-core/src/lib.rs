//! waypoint-core library.
//!
//! Keeps a local, ordered list of roadmap initiatives consistent with a
//! hosted table under concurrent local edits and pushed change events.
//!
//! # Conventions
//!
//! - **Errors**: library operations return typed `thiserror` enums
//!   ([`error::SyncError`], [`remote::RemoteError`], [`cache::CacheError`])
//!   that map to stable [`error::ErrorCode`]s. Config loading uses
//!   `anyhow::Result`.
//! - **Logging**: `tracing` macros. `trace!` for every event folded into
//!   the store, `debug!` for events that changed it and for session
//!   bookkeeping, `info!` for loads and seeding, `warn!` for fallbacks and
//!   dropped events, `error!` for failed writes.

pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod feed;
pub mod gateway;
pub mod lock;
pub mod mapper;
pub mod model;
pub mod remote;
pub mod session;
pub mod store;
pub mod view;
