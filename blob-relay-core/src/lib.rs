#![doc = "blob-relay-core: core logic library for blob-relay."]

//! This crate contains the copy handler and everything it needs that is not tied
//! to a particular cloud SDK: the storage and content contracts, destination naming,
//! connection value resolution and Event Grid trigger parsing.
//! Concrete storage clients live in the `blob-relay` crate.
//!
//! # Usage
//! Construct a [`contract::BlobStore`] for the destination container once per process,
//! then call [`copy::copy_blob`] for every newly observed source blob.

pub mod config;
pub mod connection;
pub mod content;
pub mod contract;
pub mod copy;
pub mod naming;
pub mod trigger;
