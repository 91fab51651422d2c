//! Verdi - Slideshow Video Synthesis
//!
//! Overlays a fixed watermark onto submitted images and appends the
//! results, in submission order, after a base clip, rendering one
//! continuous video off the request path.
//!
//! Hexagonal Architecture:
//! - domain/: Pure pipeline logic (compositing, batching, timeline, jobs)
//! - ports/: Trait definitions for external collaborators
//! - adapters/: Concrete implementations (fs/http stores, ffmpeg, sysinfo)
//! - application/: Services that drive the pipeline through the ports
//! - config: Environment configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports for convenience
pub use config::Config;
pub use domain::job::{Job, JobEvent, JobStatus};
