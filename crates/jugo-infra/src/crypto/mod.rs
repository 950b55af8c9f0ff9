//! Credential hashing and generation.

pub mod hash;
