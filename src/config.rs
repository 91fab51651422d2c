//! Environment configuration, read once at startup.

use crate::application::pipeline::PipelineConfig;
use crate::application::runner::WORKERS_COUNT;
use crate::domain::batch::SkipPolicy;
use crate::domain::overlay::OverlayPlacement;
use crate::ports::encoder::EncodeSettings;
use std::env;

/// Service configuration. Every knob has a default that works for local
/// development.
#[derive(Clone, Debug)]
pub struct Config {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Serve the test index page
    pub is_test: bool,
    /// Root directory of the filesystem asset store
    pub store_root: String,
    /// Store folder submitted images land in
    pub image_folder: String,
    /// Store folder finished videos are published into
    pub video_folder: String,
    /// Number of concurrent pipeline workers
    pub worker_count: usize,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let video_folder = env::var("VIDEO_FOLDER").unwrap_or_else(|_| String::from("vi-video"));

        Self {
            addr: env::var("ADDR").unwrap_or_else(|_| String::from("127.0.0.1")),
            port: env::var("PORT").unwrap_or_else(|_| String::from("3000")),
            is_test: parse_or("IS_TEST", true),
            store_root: env::var("STORE_ROOT").unwrap_or_else(|_| String::from("./store")),
            image_folder: env::var("IMAGE_FOLDER").unwrap_or_else(|_| String::from("vi-image")),
            worker_count: parse_or("WORKERS_COUNT", WORKERS_COUNT),
            pipeline: PipelineConfig {
                base_video: env::var("BASE_VIDEO")
                    .unwrap_or_else(|_| String::from("vi-video/base.mp4")),
                overlay_image: env::var("OVERLAY_IMAGE")
                    .unwrap_or_else(|_| String::from("vi-image-overlay/watermark.png")),
                video_folder: video_folder.clone(),
                placement: parse_or("OVERLAY_PLACEMENT", OverlayPlacement::Centered),
                batch_size: parse_or("BATCH_SIZE", 5),
                memory_ceiling_percent: parse_or("MEMORY_CEILING_PERCENT", 90.0),
                skip_policy: parse_or("SKIP_POLICY", SkipPolicy::Drop),
                image_hold_secs: parse_or("IMAGE_HOLD_SECS", 3.0),
                encode: EncodeSettings {
                    fps: parse_or("OUTPUT_FPS", 24),
                    ..EncodeSettings::default()
                },
            },
            video_folder,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
