use crate::application::fetch::{fetch, FetchError};
use crate::domain::asset::{Asset, ContentKind};
use crate::domain::batch::{self, SkipPolicy};
use crate::domain::compositor::{composite, CompositeError, CompositedFrame};
use crate::domain::overlay::{OverlayPlacement, OverlaySpec};
use crate::domain::timeline::{assemble, AssemblyError};
use crate::ports::encoder::{EncodeError, EncodeSettings, Encoder};
use crate::ports::memory::MemoryProbe;
use crate::ports::store::AssetStore;
use tracing::{debug, info, warn};

/// Everything a pipeline run needs to know besides the job's image list.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Locator of the base clip the slideshow is appended to.
    pub base_video: String,
    /// Locator of the watermark image.
    pub overlay_image: String,
    /// Store folder the finished video is published into.
    pub video_folder: String,
    pub placement: OverlayPlacement,
    pub batch_size: usize,
    pub memory_ceiling_percent: f32,
    pub skip_policy: SkipPolicy,
    pub image_hold_secs: f64,
    pub encode: EncodeSettings,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("watermark: {0}")]
    Overlay(CompositeError),
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("failed to publish the rendered video: {0}")]
    Publish(String),
}

/// Runs one job end to end: fetch the inputs, composite admitted images in
/// batches, assemble the timeline, encode it and publish the artifact.
///
/// Stage-local failures on individual images degrade to skips; failures on
/// the base clip, the watermark, assembly, encoding or the final upload are
/// fatal to the job. Every temp file is owned by a value on this call's
/// stack, so all exit paths reclaim scratch storage.
pub struct PipelineService<S, E, M> {
    store: S,
    encoder: E,
    probe: M,
    config: PipelineConfig,
}

impl<S, E, M> PipelineService<S, E, M>
where
    S: AssetStore,
    E: Encoder,
    M: MemoryProbe,
{
    pub fn new(store: S, encoder: E, probe: M, config: PipelineConfig) -> Self {
        Self {
            store,
            encoder,
            probe,
            config,
        }
    }

    pub async fn run(
        &self,
        job_id: &str,
        images: &[String],
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<String, PipelineError> {
        info!(job_id, images = images.len(), "pipeline started");

        let base = fetch(&self.store, &self.config.base_video, ContentKind::Video).await?;
        let overlay_asset = fetch(&self.store, &self.config.overlay_image, ContentKind::Image).await?;
        let meta = self.encoder.probe(base.path()).await?;

        let overlay_bytes = overlay_asset.read().await.map_err(FetchError::Scratch)?;
        let overlay = OverlaySpec::from_bytes(&overlay_bytes, self.config.placement)
            .map_err(PipelineError::Overlay)?;
        // Decoded; the watermark's temp file is no longer needed.
        drop(overlay_asset);
        progress(5);

        let frames = self
            .composite_all(job_id, images, &overlay, (meta.width, meta.height), progress)
            .await;
        let admitted = frames.len();

        let timeline = assemble(base, meta, frames, self.config.image_hold_secs)?;
        info!(job_id, segments = timeline.len(), "timeline assembled");

        let out = tempfile::Builder::new()
            .prefix("slideshow_")
            .suffix(".mp4")
            .tempfile()
            .map_err(EncodeError::Scratch)?
            .into_temp_path();
        self.encoder
            .render(&timeline, &self.config.encode, &out)
            .await?;
        // Releases the base clip's temp file and every frame buffer.
        drop(timeline);
        progress(90);

        let locator = self
            .store
            .upload(&out, &self.config.video_folder, ContentKind::Video)
            .await
            .map_err(|e| PipelineError::Publish(e.to_string()))?;
        progress(100);

        info!(job_id, admitted, locator = %locator, "pipeline finished");
        Ok(locator)
    }

    /// Composite every admitted image, in submission order, one batch at a
    /// time. Each item passes the memory gate right before it is
    /// materialized; the whole batch's scratch is dropped at one release
    /// point per group.
    async fn composite_all(
        &self,
        job_id: &str,
        images: &[String],
        overlay: &OverlaySpec,
        target: (u32, u32),
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Vec<CompositedFrame> {
        let total = images.len();
        let mut frames = Vec::new();
        let mut processed = 0usize;

        for (group_index, group) in batch::plan(total, self.config.batch_size)
            .into_iter()
            .enumerate()
        {
            let mut group_frames: Vec<(usize, CompositedFrame)> = Vec::new();
            let mut scratch: Vec<Asset> = Vec::new();
            let mut deferred: Vec<usize> = Vec::new();

            for index in group {
                processed += 1;
                if !self.admit() {
                    warn!(job_id, image = %images[index], "memory over ceiling, skipping image");
                    if self.config.skip_policy == SkipPolicy::RetryAfterRelease {
                        deferred.push(index);
                    }
                    continue;
                }
                if let Some(frame) = self
                    .composite_one(job_id, &images[index], overlay, target, &mut scratch)
                    .await
                {
                    group_frames.push((index, frame));
                }
                progress(half_progress(processed, total));
            }

            let released = batch::release_point(scratch);
            debug!(job_id, group = group_index, released_bytes = released, "batch release point");

            // One more pass over this batch's refusals, now that the
            // batch's scratch is gone.
            if !deferred.is_empty() {
                let mut retry_scratch: Vec<Asset> = Vec::new();
                for index in deferred {
                    if !self.admit() {
                        warn!(
                            job_id,
                            image = %images[index],
                            "still over ceiling after release, dropping image"
                        );
                        continue;
                    }
                    if let Some(frame) = self
                        .composite_one(job_id, &images[index], overlay, target, &mut retry_scratch)
                        .await
                    {
                        group_frames.push((index, frame));
                    }
                }
                batch::release_point(retry_scratch);
            }

            // Retries may have landed out of order within the group.
            group_frames.sort_by_key(|(index, _)| *index);
            frames.extend(group_frames.into_iter().map(|(_, frame)| frame));
        }

        frames
    }

    /// The memory gate, sampled fresh for every decision.
    fn admit(&self) -> bool {
        self.probe.utilization_percent() < self.config.memory_ceiling_percent
    }

    /// Fetch and composite a single image. Stage-local failures degrade to
    /// a skip: the slideshow goes on without the image.
    async fn composite_one(
        &self,
        job_id: &str,
        locator: &str,
        overlay: &OverlaySpec,
        target: (u32, u32),
        scratch: &mut Vec<Asset>,
    ) -> Option<CompositedFrame> {
        let asset = match fetch(&self.store, locator, ContentKind::Image).await {
            Ok(asset) => asset,
            Err(e) => {
                warn!(job_id, image = %locator, error = %e, "image fetch failed, skipping");
                return None;
            }
        };

        let bytes = match asset.read().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(job_id, image = %locator, error = %e, "image unreadable, skipping");
                return None;
            }
        };
        // Consumed, but kept until the batch release point.
        scratch.push(asset);

        match composite(&bytes, overlay, target) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(job_id, image = %locator, error = %e, "composite failed, skipping");
                None
            }
        }
    }
}

/// The first half of the bar tracks fetch+composite, item by item; encode
/// and publish fill the second half.
fn half_progress(processed: usize, total: usize) -> u8 {
    if total == 0 {
        50
    } else {
        (processed * 50 / total) as u8
    }
}
