#![doc = "store-sync-core: core logic library for store-sync."]

//! This crate holds the UI-agnostic pipeline for store-sync: the remote store
//! contract, payload assembly and the purge/upload orchestration.
//! Concrete HTTP adapters and the command line live in the `store-sync` crate.
//!
//! # Usage
//! Build a [`config::SyncConfig`], supply any [`contract::FileStore`] and call
//! [`synchronise::synchronise`].

pub mod assemble;
pub mod config;
pub mod contract;
pub mod synchronise;
