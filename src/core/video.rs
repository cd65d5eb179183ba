use crate::core::models::VideoFingerprint;
use crate::core::perceptual::{PerceptualHash, PerceptualService};
use crate::error::DecodeError;
use anyhow::{Context, bail};
use image::DynamicImage;
use log::{debug, info};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Raw stream properties reported by a decoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    pub fps: f64,
    pub frame_count: f64,
}

impl StreamInfo {
    /// Duration in seconds, or `None` when either property is unusable.
    pub fn duration(&self) -> Option<f64> {
        if !(self.fps > 0.0) || !(self.frame_count > 0.0) {
            return None;
        }
        Some(self.frame_count / self.fps)
    }
}

/// Opens a video and decodes single frames from it.
pub trait VideoDecoder: Send + Sync {
    fn probe(&self, path: &Path) -> Result<StreamInfo, DecodeError>;

    /// Decode the frame shown at `seconds`.
    fn frame_at(&self, path: &Path, seconds: f64) -> Result<DynamicImage, DecodeError>;
}

/// Decoder backed by the `ffprobe` and `ffmpeg` executables.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }

    pub fn with_binaries(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Returns true if ffmpeg is installed and accessible.
    pub fn is_available(&self) -> bool {
        Command::new(&self.ffmpeg)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn run_ffprobe(&self, path: &Path) -> anyhow::Result<StreamInfo> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=avg_frame_rate,r_frame_rate,nb_frames,duration",
                "-of",
                "json",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to spawn {}", self.ffprobe.display()))?;

        if !output.status.success() {
            bail!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        parse_probe_output(&output.stdout)
    }

    fn run_ffmpeg_frame(&self, path: &Path, seconds: f64) -> anyhow::Result<DynamicImage> {
        let output = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-ss"])
            .arg(format!("{seconds:.3}"))
            .arg("-i")
            .arg(path)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .with_context(|| format!("Failed to spawn {}", self.ffmpeg.display()))?;

        if !output.status.success() || output.stdout.is_empty() {
            bail!("no frame decoded at {seconds:.3}s (status: {})", output.status);
        }

        image::load_from_memory(&output.stdout).context("Could not decode extracted frame")
    }
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoDecoder for FfmpegDecoder {
    fn probe(&self, path: &Path) -> Result<StreamInfo, DecodeError> {
        self.run_ffprobe(path)
            .map_err(|e| DecodeError::unsupported(path, format!("{e:#}")))
    }

    fn frame_at(&self, path: &Path, seconds: f64) -> Result<DynamicImage, DecodeError> {
        self.run_ffmpeg_frame(path, seconds)
            .map_err(|e| DecodeError::unsupported(path, format!("{e:#}")))
    }
}

fn parse_probe_output(stdout: &[u8]) -> anyhow::Result<StreamInfo> {
    let probe: ProbeOutput = serde_json::from_slice(stdout).context("Malformed ffprobe output")?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .context("No video stream found")?;

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(0.0);

    // Some containers omit nb_frames; derive it from the stream duration
    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .or_else(|| {
            stream
                .duration
                .as_deref()
                .and_then(|value| value.trim().parse::<f64>().ok())
                .map(|seconds| seconds * fps)
        })
        .unwrap_or(0.0);

    Ok(StreamInfo { fps, frame_count })
}

/// Parses ffprobe rates such as `30000/1001` or `25`.
fn parse_frame_rate(value: &str) -> Option<f64> {
    let value = value.trim();
    let rate = match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Timestamps (seconds, ascending) at which frames are sampled.
///
/// Forward sampling uses `0, interval, 2*interval, ...` strictly below
/// `duration`. Backward sampling anchors the grid at the end of the video.
pub fn sample_timestamps(duration: f64, interval_seconds: u32, backwards: bool) -> Vec<f64> {
    if !(duration > 0.0) {
        return Vec::new();
    }
    let step = f64::from(interval_seconds.max(1));

    let mut timestamps = Vec::new();
    if backwards {
        let mut t = duration - step;
        while t >= 0.0 {
            timestamps.push(t);
            t -= step;
        }
        timestamps.reverse();
    } else {
        let mut t = 0.0;
        while t < duration {
            timestamps.push(t);
            t += step;
        }
    }
    timestamps
}

/// Extracts one perceptual hash per fixed interval of a video.
pub struct FrameSampler {
    decoder: Box<dyn VideoDecoder>,
    perceptual: PerceptualService,
    interval_seconds: u32,
    backwards: bool,
}

impl FrameSampler {
    pub fn new(decoder: Box<dyn VideoDecoder>, interval_seconds: u32) -> Self {
        Self {
            decoder,
            perceptual: PerceptualService::new(),
            interval_seconds: interval_seconds.max(1),
            backwards: false,
        }
    }

    pub fn with_backwards(mut self, backwards: bool) -> Self {
        self.backwards = backwards;
        self
    }

    pub fn interval_seconds(&self) -> u32 {
        self.interval_seconds
    }

    /// Total duration in seconds, `None` if frame rate or frame count is unknown.
    pub fn duration(&self, path: &Path) -> Option<f64> {
        match self.decoder.probe(path) {
            Ok(info) => {
                let duration = info.duration();
                if duration.is_none() {
                    info!(
                        "Cannot determine duration (fps={}, frames={}): {}",
                        info.fps,
                        info.frame_count,
                        path.display()
                    );
                }
                duration
            }
            Err(e) => {
                info!("Cannot probe video {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Hash one frame per `interval_seconds`. Timestamps that fail to decode
    /// are skipped, so the result may be shorter than the timestamp grid.
    pub fn sample_sequence(
        &self,
        path: &Path,
        interval_seconds: u32,
        duration: f64,
    ) -> Vec<PerceptualHash> {
        sample_timestamps(duration, interval_seconds, self.backwards)
            .into_iter()
            .filter_map(|t| match self.decoder.frame_at(path, t) {
                Ok(frame) => Some(self.perceptual.hash_image(&frame)),
                Err(e) => {
                    debug!("No sample hash for {} at {:.0}s: {}", path.display(), t, e);
                    None
                }
            })
            .collect()
    }

    /// Probe and sample a video into a fingerprint.
    ///
    /// Fails when the duration cannot be determined. A video whose frames all
    /// fail to decode yields an unusable (empty) fingerprint.
    pub fn fingerprint(&self, path: &Path) -> Result<VideoFingerprint, DecodeError> {
        let duration = self
            .duration(path)
            .ok_or_else(|| DecodeError::unsupported(path, "Unable to determine video duration"))?;

        debug!("Generating hash sequence for {}", path.display());
        let hashes = self.sample_sequence(path, self.interval_seconds, duration);
        if hashes.is_empty() {
            info!("No valid sample hashes for video {}", path.display());
        }

        Ok(VideoFingerprint::new(duration, hashes))
    }
}
