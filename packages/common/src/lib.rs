//! Shared building blocks for the Instanssi server.

pub mod storage;
