//! In-memory storage backend for the Signet authorization server.
//!
//! This crate implements the storage traits from `signet-auth` on top of
//! `DashMap`, giving a self-contained backend for development, tests, and
//! single-node deployments. Nothing survives a restart.
//!
//! # Example
//!
//! ```ignore
//! use signet_auth_memory::{MemoryAuthorizationCodeStorage, MemoryClientStorage};
//!
//! let clients = MemoryClientStorage::new();
//! let codes = MemoryAuthorizationCodeStorage::new();
//! ```

pub mod audit;
pub mod client;
pub mod code;
pub mod directory;
pub mod token;

pub use audit::MemoryAuditSink;
pub use client::{MemoryClientStorage, hash_client_secret};
pub use code::MemoryAuthorizationCodeStorage;
pub use directory::MemoryUserDirectory;
pub use token::MemoryTokenStorage;
