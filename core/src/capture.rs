//! Video capture of slide playback.
//!
//! Each slide stays on screen for the length of its audio clip. The timeline
//! is computed up front from the WAV headers, frames are pushed to the
//! recorder on a fixed-rate ticker, and the recorder is finished as soon as
//! the last slide's frames are out. Nothing waits on a player's end event.
//!
//! Captions come from a WebVTT file built on the same timeline. The ffmpeg
//! recorder burns it into the frames with the `subtitles` filter.

use async_trait::async_trait;
use bytes::Bytes;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use storyreel_client::GenerationClient;
use storyreel_common::{StoryConfig, SILENT_VIDEO_NOTICE};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::assemble::join_ordered;
use crate::audio_output::{AudioOutput, ClipTag};
use crate::error::ExportError;
use crate::session::CycleId;
use crate::slide::{Slide, SlideList};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSettings {
    pub frame_rate: u32,
    /// Used for clips whose length cannot be read
    pub fallback: Duration,
}

impl CaptureSettings {
    pub fn from_config(config: &StoryConfig) -> Self {
        Self {
            frame_rate: config.frame_rate.max(1),
            fallback: config.default_slide_duration(),
        }
    }

    fn frame_time(&self, frame: u64) -> Duration {
        Duration::from_secs_f64(frame as f64 / self.frame_rate.max(1) as f64)
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from_config(&StoryConfig::default())
    }
}

/// One slide's span in the captured video, in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineEntry {
    pub index: usize,
    pub first_frame: u64,
    pub frames: u64,
}

pub fn capture_timeline(slides: &SlideList, settings: &CaptureSettings) -> Vec<TimelineEntry> {
    let fps = settings.frame_rate.max(1) as f64;
    let mut next = 0;
    slides
        .iter()
        .enumerate()
        .map(|(index, slide)| {
            let length = slide.audio.duration().unwrap_or_else(|| {
                warn!(
                    "Slide {index} audio length unknown, showing it for {:?}",
                    settings.fallback
                );
                settings.fallback
            });
            let frames = ((length.as_secs_f64() * fps).ceil() as u64).max(1);
            let entry = TimelineEntry {
                index,
                first_frame: next,
                frames,
            };
            next += frames;
            entry
        })
        .collect()
}

/// WebVTT captions matching the capture timeline.
pub fn webvtt(slides: &SlideList, timeline: &[TimelineEntry], settings: &CaptureSettings) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for (cue, entry) in timeline.iter().enumerate() {
        let Some(slide) = slides.get(entry.index) else {
            continue;
        };
        let start = vtt_timestamp(settings.frame_time(entry.first_frame));
        let end = vtt_timestamp(settings.frame_time(entry.first_frame + entry.frames));
        out.push_str(&format!("{}\n{start} --> {end}\n{}\n\n", cue + 1, slide.caption));
    }
    out
}

fn vtt_timestamp(at: Duration) -> String {
    let total = at.as_millis();
    let hours = total / 3_600_000;
    let minutes = total / 60_000 % 60;
    let seconds = total / 1000 % 60;
    let millis = total % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// What the capture surface shows for one slide.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: usize,
    pub image: Bytes,
    pub caption: String,
}

#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn render(&self, index: usize, slide: &Slide) -> Result<Frame, ExportError>;
}

/// Renders a slide as its downloaded image.
pub struct ImageFrameSource<C: ?Sized> {
    client: Arc<C>,
}

impl<C: GenerationClient + ?Sized> ImageFrameSource<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: GenerationClient + ?Sized> FrameSource for ImageFrameSource<C> {
    async fn render(&self, index: usize, slide: &Slide) -> Result<Frame, ExportError> {
        let image = self
            .client
            .image_bytes(&slide.image_url)
            .await
            .map_err(|e| ExportError::Frame {
                index,
                reason: e.to_string(),
            })?;
        Ok(Frame {
            index,
            image,
            caption: slide.caption.clone(),
        })
    }
}

#[async_trait]
pub trait Recorder: Send {
    /// `captions` names a WebVTT file to draw over the frames.
    async fn start(
        &mut self,
        output: &Path,
        frame_rate: u32,
        captions: Option<&Path>,
    ) -> Result<(), ExportError>;
    async fn push_frame(&mut self, frame: &Frame) -> Result<(), ExportError>;
    async fn finish(&mut self) -> Result<(), ExportError>;
}

/// Encodes piped image frames to VP9 WebM with `ffmpeg`, without audio.
pub struct FfmpegRecorder {
    program: PathBuf,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
}

impl FfmpegRecorder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            child: None,
            stdin: None,
        }
    }

    pub fn args(output: &Path, frame_rate: u32, captions: Option<&Path>) -> Vec<OsString> {
        let mut filters = "scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string();
        if let Some(captions) = captions {
            filters.push(',');
            filters.push_str(&subtitles_filter(captions));
        }

        let mut args: Vec<OsString> = [
            "-y",
            "-loglevel",
            "error",
            "-f",
            "image2pipe",
            "-framerate",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        args.push(frame_rate.to_string().into());
        args.extend(["-i", "-", "-an", "-vf"].iter().map(OsString::from));
        args.push(filters.into());
        args.extend(
            ["-c:v", "libvpx-vp9", "-pix_fmt", "yuv420p"]
                .iter()
                .map(OsString::from),
        );
        args.push(output.as_os_str().to_owned());
        args
    }
}

fn escape(text: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `subtitles=<file>`, escaped once for the filter option and once more for
/// the filtergraph.
fn subtitles_filter(captions: &Path) -> String {
    let option = escape(&captions.to_string_lossy(), &['\\', ':', '\'']);
    let graph = escape(&option, &['\\', '\'', '[', ']', ',', ';']);
    format!("subtitles={graph}")
}

#[async_trait]
impl Recorder for FfmpegRecorder {
    async fn start(
        &mut self,
        output: &Path,
        frame_rate: u32,
        captions: Option<&Path>,
    ) -> Result<(), ExportError> {
        let program = which::which(&self.program).map_err(|e| ExportError::Recorder {
            reason: format!("{} not found: {e}", self.program.display()),
        })?;
        let mut child = Command::new(program)
            .args(Self::args(output, frame_rate, captions))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        self.stdin = child.stdin.take();
        self.child = Some(child);
        debug!("Recording to {}", output.display());
        Ok(())
    }

    async fn push_frame(&mut self, frame: &Frame) -> Result<(), ExportError> {
        let stdin = self.stdin.as_mut().ok_or_else(|| ExportError::Recorder {
            reason: "recorder not started".to_string(),
        })?;
        stdin.write_all(&frame.image).await?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), ExportError> {
        // Closing stdin ends the input stream
        drop(self.stdin.take());
        let child = self.child.take().ok_or_else(|| ExportError::Recorder {
            reason: "recorder not started".to_string(),
        })?;
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(ExportError::Recorder {
                reason: format!(
                    "ffmpeg exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CaptureReport {
    pub frames: u64,
    pub timeline: Vec<TimelineEntry>,
}

/// Record the whole slide list from slide 0 into `output`.
///
/// `captions` is handed to the recorder to burn in. `monitor`, when given,
/// plays each slide's clip as its frames start so the capture can be watched
/// and heard. It never feeds the recording.
pub async fn capture<S, R>(
    slides: &SlideList,
    settings: &CaptureSettings,
    source: &S,
    recorder: &mut R,
    output: &Path,
    captions: Option<&Path>,
    mut monitor: Option<&mut dyn AudioOutput>,
) -> Result<CaptureReport, ExportError>
where
    S: FrameSource + ?Sized,
    R: Recorder + ?Sized,
{
    if slides.is_empty() {
        return Err(ExportError::Empty { what: "slides" });
    }
    warn!("{SILENT_VIDEO_NOTICE}");

    let timeline = capture_timeline(slides, settings);
    let frames = join_ordered(slides.iter(), |index, slide| source.render(index, slide))
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    recorder.start(output, settings.frame_rate, captions).await?;
    let mut ticker = tokio::time::interval(settings.frame_time(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    let mut pushed = 0;
    for (entry, frame) in timeline.iter().zip(&frames) {
        if let (Some(speaker), Some(slide)) = (monitor.as_deref_mut(), slides.get(entry.index)) {
            let tag = ClipTag {
                cycle: CycleId::default(),
                index: entry.index,
                serial: entry.index as u64,
            };
            if let Err(e) = speaker.play(&slide.audio, tag) {
                warn!("Monitor playback failed: {e}");
            }
        }
        for _ in 0..entry.frames {
            ticker.tick().await;
            recorder.push_frame(frame).await?;
            pushed += 1;
        }
    }
    // Hold the last frame for its full period
    ticker.tick().await;
    if let Some(speaker) = monitor.as_deref_mut() {
        speaker.stop();
    }
    recorder.finish().await?;

    info!("Captured {pushed} frames to {}", output.display());
    Ok(CaptureReport {
        frames: pushed,
        timeline,
    })
}
