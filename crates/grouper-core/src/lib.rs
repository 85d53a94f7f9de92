//! Tenant-isolated persistence and concurrency-control core for the
//! grouper service: groups, the members that belong to them, and the
//! row-locking protocol that keeps cascading deletes correct under
//! concurrent creation.

pub mod config;
pub mod context;
pub mod database;
pub mod logging;
pub mod services;
