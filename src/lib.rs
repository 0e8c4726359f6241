//! Versioned schema patcher for Highlander variant-annotation databases.
//!
//! A [`catalog::VersionCatalog`] lists every release in order; the
//! [`runner::MigrationRunner`] compares each one with the version recorded
//! in the database and applies the missing ones, persisting the new
//! version after every step.

pub mod auth;
pub mod bulk;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod console;
pub mod db;
pub mod marker;
pub mod runner;
pub mod tenants;
pub mod version;
