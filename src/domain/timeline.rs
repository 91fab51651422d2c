use crate::domain::asset::{Asset, ContentKind};
use crate::domain::compositor::CompositedFrame;

/// Resolution, frame rate and length of the base clip, as probed by the
/// encoder adapter. The stills render at this resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub duration_secs: f64,
}

/// One entry in the output timeline.
pub enum TimelineSegment {
    /// The base clip, played first at its native duration.
    BaseVideo(Asset),
    /// A composited still held on screen for a fixed time.
    ImageHold {
        frame: CompositedFrame,
        hold_secs: f64,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("base asset '{0}' is not a video")]
    NotAVideo(String),
    #[error("base video reports a degenerate resolution {width}x{height}")]
    DegenerateVideo { width: u32, height: u32 },
    #[error(
        "frame {index} is {got_width}x{got_height}, cannot reconcile with the \
         {want_width}x{want_height} base video"
    )]
    MismatchedFrame {
        index: usize,
        got_width: u32,
        got_height: u32,
        want_width: u32,
        want_height: u32,
    },
}

/// The ordered plan for the final video: the base clip first, then one still
/// per admitted image, in submission order. Append-only; the encoder renders
/// it exactly as sequenced.
pub struct Timeline {
    segments: Vec<TimelineSegment>,
    meta: VideoMeta,
}

impl Timeline {
    pub fn segments(&self) -> &[TimelineSegment] {
        &self.segments
    }

    pub fn meta(&self) -> &VideoMeta {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Base clip duration plus every still's hold time.
    pub fn total_duration_secs(&self) -> f64 {
        self.segments
            .iter()
            .map(|segment| match segment {
                TimelineSegment::BaseVideo(_) => self.meta.duration_secs,
                TimelineSegment::ImageHold { hold_secs, .. } => *hold_secs,
            })
            .sum()
    }
}

/// Build the timeline: `[BaseVideo] ++ [ImageHold(frame) for each frame]`,
/// every still held for `per_image_hold_secs`. Frames must already be at the
/// base video's resolution; assembly never rescales and never encodes.
pub fn assemble(
    base: Asset,
    meta: VideoMeta,
    frames: Vec<CompositedFrame>,
    per_image_hold_secs: f64,
) -> Result<Timeline, AssemblyError> {
    if base.kind() != ContentKind::Video {
        return Err(AssemblyError::NotAVideo(base.locator().to_string()));
    }
    if meta.width == 0 || meta.height == 0 {
        return Err(AssemblyError::DegenerateVideo {
            width: meta.width,
            height: meta.height,
        });
    }

    let mut segments = Vec::with_capacity(1 + frames.len());
    segments.push(TimelineSegment::BaseVideo(base));

    for (index, frame) in frames.into_iter().enumerate() {
        if frame.width() != meta.width || frame.height() != meta.height {
            return Err(AssemblyError::MismatchedFrame {
                index,
                got_width: frame.width(),
                got_height: frame.height(),
                want_width: meta.width,
                want_height: meta.height,
            });
        }
        segments.push(TimelineSegment::ImageHold {
            frame,
            hold_secs: per_image_hold_secs,
        });
    }

    Ok(Timeline { segments, meta })
}
