//! # API Route Modules
//!
//! - `packs`: pack CRUD, resource upload, and pack/role/pair deletion.
//! - `media`: the blob read path.
//! - `auth`: session creation and verification.
//! - `health`: dependency probes.

pub mod auth;
pub mod health;
pub mod media;
pub mod packs;
