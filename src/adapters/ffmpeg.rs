use crate::domain::timeline::{Timeline, TimelineSegment, VideoMeta};
use crate::ports::encoder::{EncodeError, EncodeSettings, Encoder};
use async_trait::async_trait;
use regex::Regex;
use std::io;
use std::path::Path;
use std::process::Output;
use tokio::process::Command as TokioCommand;

/// Shell-out seam for ffmpeg/ffprobe. Everything the encoder does to the
/// system goes through here, so tests can script the tool output.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FfmpegRunner: Send + Sync {
    /// ffprobe the first video stream plus the container duration.
    async fn probe_video(&self, path: &Path) -> io::Result<Output>;

    /// Re-encode the base clip to the shared codec/frame rate so the concat
    /// pass can stream-copy it.
    async fn encode_base(
        &self,
        src: &Path,
        settings: &EncodeSettings,
        out: &Path,
    ) -> io::Result<Output>;

    /// Encode one still image into a clip held for `secs` seconds.
    async fn encode_still(
        &self,
        png: &Path,
        secs: f64,
        settings: &EncodeSettings,
        out: &Path,
    ) -> io::Result<Output>;

    /// Concat-demux the listed clips, in order, into the final file.
    async fn concat(&self, list_file: &Path, out: &Path) -> io::Result<Output>;
}

pub struct CliFfmpegRunner;

#[async_trait]
impl FfmpegRunner for CliFfmpegRunner {
    async fn probe_video(&self, path: &Path) -> io::Result<Output> {
        TokioCommand::new("ffprobe")
            .arg("-v").arg("error")
            .arg("-select_streams").arg("v:0")
            .arg("-show_entries").arg("stream=width,height,r_frame_rate")
            .arg("-show_entries").arg("format=duration")
            .arg("-of").arg("default=noprint_wrappers=1")
            .arg(path)
            .output()
            .await
    }

    async fn encode_base(
        &self,
        src: &Path,
        settings: &EncodeSettings,
        out: &Path,
    ) -> io::Result<Output> {
        TokioCommand::new("ffmpeg")
            .arg("-y")
            .arg("-i").arg(src)
            .arg("-r").arg(settings.fps.to_string())
            .arg("-c:v").arg(&settings.codec)
            .arg("-pix_fmt").arg(&settings.pixel_format)
            .arg("-an")
            .arg(out)
            .output()
            .await
    }

    async fn encode_still(
        &self,
        png: &Path,
        secs: f64,
        settings: &EncodeSettings,
        out: &Path,
    ) -> io::Result<Output> {
        TokioCommand::new("ffmpeg")
            .arg("-y")
            .arg("-loop").arg("1")
            .arg("-i").arg(png)
            .arg("-t").arg(secs.to_string())
            .arg("-r").arg(settings.fps.to_string())
            .arg("-c:v").arg(&settings.codec)
            .arg("-pix_fmt").arg(&settings.pixel_format)
            .arg(out)
            .output()
            .await
    }

    async fn concat(&self, list_file: &Path, out: &Path) -> io::Result<Output> {
        TokioCommand::new("ffmpeg")
            .arg("-y")
            .arg("-f").arg("concat")
            .arg("-safe").arg("0")
            .arg("-i").arg(list_file)
            .arg("-c").arg("copy")
            .arg(out)
            .output()
            .await
    }
}

/// ffmpeg-backed implementation of the encoder port. A timeline renders in
/// three passes inside a scratch dir: normalize the base clip, render each
/// still into a held clip, then concat-demux everything in order.
pub struct FfmpegEncoder<R> {
    runner: R,
}

impl<R: FfmpegRunner> FfmpegEncoder<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

fn check(context: &str, output: Output) -> Result<Output, EncodeError> {
    if output.status.success() {
        Ok(output)
    } else {
        Err(EncodeError::CommandFailed {
            context: context.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn capture(text: &str, pattern: &str) -> Option<String> {
    Regex::new(pattern)
        .ok()?
        .captures(text)?
        .get(1)
        .map(|m| m.as_str().to_string())
}

/// `r_frame_rate` comes back as a fraction like `30000/1001`.
fn parse_rate(raw: &str) -> Option<u32> {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                None
            } else {
                Some((num / den).round() as u32)
            }
        }
        None => raw.parse::<f64>().ok().map(|v| v.round() as u32),
    }
}

fn parse_probe(stdout: &[u8]) -> Result<VideoMeta, EncodeError> {
    let text = String::from_utf8_lossy(stdout);

    let width = capture(&text, r"width=(\d+)").and_then(|v| v.parse().ok());
    let height = capture(&text, r"height=(\d+)").and_then(|v| v.parse().ok());
    let fps = capture(&text, r"r_frame_rate=(\d+(?:/\d+)?)").and_then(|v| parse_rate(&v));
    let duration = capture(&text, r"duration=(\d+(?:\.\d+)?)").and_then(|v| v.parse().ok());

    match (width, height, fps, duration) {
        (Some(width), Some(height), Some(fps), Some(duration_secs)) => Ok(VideoMeta {
            width,
            height,
            fps,
            duration_secs,
        }),
        _ => Err(EncodeError::Probe(text.into_owned())),
    }
}

#[async_trait]
impl<R: FfmpegRunner> Encoder for FfmpegEncoder<R> {
    async fn probe(&self, path: &Path) -> Result<VideoMeta, EncodeError> {
        let output = self
            .runner
            .probe_video(path)
            .await
            .map_err(|source| EncodeError::Spawn {
                tool: "ffprobe",
                source,
            })?;
        let output = check("probe base video", output)?;
        parse_probe(&output.stdout)
    }

    async fn render(
        &self,
        timeline: &Timeline,
        settings: &EncodeSettings,
        out_path: &Path,
    ) -> Result<(), EncodeError> {
        let workdir = tempfile::tempdir()?;
        let mut list = String::new();

        for (index, segment) in timeline.segments().iter().enumerate() {
            let clip = workdir.path().join(format!("segment_{index:04}.mp4"));
            match segment {
                TimelineSegment::BaseVideo(asset) => {
                    let output = self
                        .runner
                        .encode_base(asset.path(), settings, &clip)
                        .await
                        .map_err(|source| EncodeError::Spawn {
                            tool: "ffmpeg",
                            source,
                        })?;
                    check("normalize base clip", output)?;
                }
                TimelineSegment::ImageHold { frame, hold_secs } => {
                    let png = workdir.path().join(format!("frame_{index:04}.png"));
                    frame
                        .pixels()
                        .save(&png)
                        .map_err(|e| EncodeError::StageFrame(e.to_string()))?;
                    let output = self
                        .runner
                        .encode_still(&png, *hold_secs, settings, &clip)
                        .await
                        .map_err(|source| EncodeError::Spawn {
                            tool: "ffmpeg",
                            source,
                        })?;
                    check(&format!("render still {index}"), output)?;
                }
            }
            list.push_str(&format!("file '{}'\n", clip.display()));
        }

        let list_file = workdir.path().join("concat.txt");
        tokio::fs::write(&list_file, list).await?;

        let output = self
            .runner
            .concat(&list_file, out_path)
            .await
            .map_err(|source| EncodeError::Spawn {
                tool: "ffmpeg",
                source,
            })?;
        check("concat timeline", output)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::{Asset, ContentKind};
    use crate::domain::compositor::CompositedFrame;
    use crate::domain::timeline::assemble;
    use image::RgbaImage;
    use std::io::Write;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use tempfile::NamedTempFile;

    fn mock_output(stdout: &str, stderr: &str, success: bool) -> io::Result<Output> {
        Ok(Output {
            status: if success {
                ExitStatus::from_raw(0)
            } else {
                ExitStatus::from_raw(1)
            },
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        })
    }

    fn base_asset() -> Asset {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"mp4").unwrap();
        Asset::new(
            "vi-video/base.mp4",
            ContentKind::Video,
            file.into_temp_path(),
            3,
        )
    }

    fn timeline_with_frames(count: usize) -> Timeline {
        let frames = (0..count)
            .map(|_| CompositedFrame::new(RgbaImage::new(8, 6)))
            .collect();
        assemble(
            base_asset(),
            VideoMeta {
                width: 8,
                height: 6,
                fps: 24,
                duration_secs: 5.0,
            },
            frames,
            3.0,
        )
        .unwrap()
    }

    #[test]
    fn probe_output_parses_into_metadata() {
        let stdout = "width=1920\nheight=1080\nr_frame_rate=24/1\nduration=5.000000\n";
        let meta = parse_probe(stdout.as_bytes()).unwrap();
        assert_eq!(
            meta,
            VideoMeta {
                width: 1920,
                height: 1080,
                fps: 24,
                duration_secs: 5.0,
            }
        );
    }

    #[test]
    fn ntsc_frame_rates_round_sensibly() {
        assert_eq!(parse_rate("30000/1001"), Some(30));
        assert_eq!(parse_rate("24"), Some(24));
        assert_eq!(parse_rate("24/0"), None);
    }

    #[test]
    fn incomplete_probe_output_is_an_error() {
        let result = parse_probe(b"width=1920\nheight=1080\n");
        assert!(matches!(result, Err(EncodeError::Probe(_))));
    }

    #[tokio::test]
    async fn probe_runs_ffprobe_and_parses() {
        let mut runner = MockFfmpegRunner::new();
        runner
            .expect_probe_video()
            .times(1)
            .returning(|_| mock_output("width=640\nheight=480\nr_frame_rate=30/1\nduration=2.5\n", "", true));

        let encoder = FfmpegEncoder::new(runner);
        let meta = encoder.probe(Path::new("/tmp/base.mp4")).await.unwrap();
        assert_eq!((meta.width, meta.height, meta.fps), (640, 480, 30));
        assert!((meta.duration_secs - 2.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn probe_failure_carries_stderr() {
        let mut runner = MockFfmpegRunner::new();
        runner
            .expect_probe_video()
            .times(1)
            .returning(|_| mock_output("", "no such file", false));

        let encoder = FfmpegEncoder::new(runner);
        let err = encoder.probe(Path::new("/tmp/missing.mp4")).await.unwrap_err();
        assert!(err.to_string().contains("no such file"));
    }

    #[tokio::test]
    async fn render_encodes_base_then_each_still_then_concats() {
        let mut runner = MockFfmpegRunner::new();
        runner
            .expect_encode_base()
            .times(1)
            .returning(|_, _, _| mock_output("", "", true));
        runner
            .expect_encode_still()
            .withf(|png, secs, _, _| {
                png.to_string_lossy().ends_with(".png") && (*secs - 3.0).abs() < f64::EPSILON
            })
            .times(2)
            .returning(|_, _, _, _| mock_output("", "", true));
        runner
            .expect_concat()
            .withf(|list_file, out| {
                // The concat list references one clip per segment, in order.
                let listing = std::fs::read_to_string(list_file).unwrap_or_default();
                listing.matches("file '").count() == 3
                    && listing.find("segment_0000").unwrap_or(usize::MAX)
                        < listing.find("segment_0002").unwrap_or(0)
                    && out.to_string_lossy().ends_with("final.mp4")
            })
            .times(1)
            .returning(|_, _| mock_output("", "", true));

        let encoder = FfmpegEncoder::new(runner);
        let timeline = timeline_with_frames(2);
        encoder
            .render(
                &timeline,
                &EncodeSettings::default(),
                Path::new("/tmp/final.mp4"),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn render_stops_at_the_first_failing_stage() {
        let mut runner = MockFfmpegRunner::new();
        runner
            .expect_encode_base()
            .times(1)
            .returning(|_, _, _| mock_output("", "unsupported codec", false));
        runner.expect_encode_still().times(0);
        runner.expect_concat().times(0);

        let encoder = FfmpegEncoder::new(runner);
        let timeline = timeline_with_frames(2);
        let err = encoder
            .render(
                &timeline,
                &EncodeSettings::default(),
                Path::new("/tmp/final.mp4"),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported codec"));
    }
}
