//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep callers (CLI, transports) decoupled from storage details.
//! - Translate repository outcomes into per-use-case typed errors.

pub mod aggregator;
pub mod catalog_service;
pub mod category_service;
pub mod directory_service;
