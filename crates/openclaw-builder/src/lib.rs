//! Image Builder Service and Deployment Lifecycle.
//!
//! Normalizes requested capabilities into apt/pip/npm/tool buckets, renders
//! incremental agent Dockerfiles and minimal deployment Dockerfiles, drives
//! builds through the container runtime adapter, and carries deployments
//! through create -> approve -> build -> start -> stop.

pub mod build_tracker;
pub mod capability;
pub mod deployment;
pub mod dockerfile;
pub mod error;
pub mod image_builder;

pub use build_tracker::{BuildRecord, BuildStatus, BuildTracker};
pub use capability::{normalize_capabilities, Capability, CapabilityKind, NormalizedCapabilities};
pub use deployment::DeploymentService;
pub use error::{BuilderError, BuilderResult};
pub use image_builder::{ImageBuilderConfig, ImageBuilderService};
