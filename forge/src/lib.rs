//! pinsmith library.
//!
//! This crate provides the core functionality for reproducible builds of
//! upstream source packages: resolving a pinned or latest release,
//! enforcing SHA-256 agreement, composing optional-feature flags, building
//! native dependencies before the target, and checking the finished
//! binary's self-report. It is used by the `pinsmith` CLI binary and can be
//! consumed programmatically for testing or custom build workflows.
//!
//! # Modules
//!
//! - [`builder`] - Configure-and-make orchestration for one source unit
//! - [`catalog`] - Release listings behind the `ReleaseCatalog` trait
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Layered settings from flags, environment, and TOML
//! - [`digest`] - SHA-256 digest newtype and file hashing
//! - [`error`] - Error taxonomy and the crate `Result` alias
//! - [`executor`] - External command execution
//! - [`features`] - Optional feature catalog and toggle composition
//! - [`graph`] - Dependency ordering and build plans
//! - [`integrity`] - Archive download and checksum enforcement
//! - [`output`] - User-facing progress, warnings, and plan rendering
//! - [`pipeline`] - End-to-end build orchestration
//! - [`report`] - The artifact record and checksum sidecar
//! - [`resolution`] - Pinned or latest release resolution
//! - [`scratch`] - Per-invocation working directories
//! - [`unpack`] - Source archive extraction
//! - [`upstream`] - Upstream source definitions
//! - [`verify`] - Post-build self-report checks
//! - [`version`] - Structured, numerically ordered versions

pub mod builder;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod digest;
pub mod error;
pub mod executor;
pub mod features;
pub mod graph;
pub mod integrity;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod resolution;
pub mod scratch;
pub mod unpack;
pub mod upstream;
pub mod verify;
pub mod version;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
