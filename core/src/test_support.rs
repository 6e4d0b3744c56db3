//! Fakes shared by the unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use storyreel_client::{ClientError, GenerationClient};
use storyreel_common::ImageResult;

use crate::audio_output::{AudioOutput, ClipTag};
use crate::capture::{Frame, Recorder};
use crate::error::{ExportError, PlaybackError};
use crate::segment::caption_for;
use crate::slide::{AudioClip, Slide};

/// 16-bit mono WAV of silence lasting `secs`.
pub fn wav_bytes(secs: f64, sample_rate: u32) -> Bytes {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let frames = (secs * sample_rate as f64).round() as usize;
        for i in 0..frames {
            writer.write_sample((i % 64) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    Bytes::from(cursor.into_inner())
}

pub fn clip(secs: f64) -> AudioClip {
    AudioClip::new(wav_bytes(secs, 8_000)).unwrap()
}

pub fn slide(index: usize, secs: f64) -> Slide {
    Slide {
        image_url: format!("https://img.test/{index}.png"),
        caption: format!("Sentence {index}."),
        audio: clip(secs),
    }
}

fn server_error(endpoint: &str) -> ClientError {
    ClientError::Status {
        endpoint: endpoint.to_string(),
        status: 500,
        body: "generator busy".to_string(),
    }
}

/// In-memory generation service keyed by caption.
#[derive(Default)]
pub struct FakeClient {
    story: Option<String>,
    fail_images: HashSet<String>,
    fail_audio: HashSet<String>,
    missing_image: HashSet<String>,
    delays: HashMap<String, Duration>,
    clip_secs: f64,
    requests: AtomicUsize,
}

impl FakeClient {
    pub fn new() -> Self {
        Self {
            clip_secs: 0.5,
            ..Self::default()
        }
    }

    pub fn with_story(mut self, story: &str) -> Self {
        self.story = Some(story.to_string());
        self
    }

    pub fn fail_images(mut self, unit: &str) -> Self {
        self.fail_images.insert(caption_for(unit));
        self
    }

    pub fn fail_audio(mut self, unit: &str) -> Self {
        self.fail_audio.insert(caption_for(unit));
        self
    }

    pub fn missing_image(mut self, unit: &str) -> Self {
        self.missing_image.insert(caption_for(unit));
        self
    }

    /// Delay both requests of a unit.
    pub fn delay(mut self, unit: &str, delay: Duration) -> Self {
        self.delays.insert(caption_for(unit), delay);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    async fn wait(&self, caption: &str) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(caption) {
            tokio::time::sleep(*delay).await;
        }
    }
}

#[async_trait]
impl GenerationClient for FakeClient {
    async fn story(&self, _prompt: &str) -> Result<String, ClientError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.story
            .clone()
            .ok_or_else(|| server_error("generate/story"))
    }

    async fn images(&self, caption: &str) -> Result<Vec<ImageResult>, ClientError> {
        self.wait(caption).await;
        if self.fail_images.contains(caption) {
            return Err(server_error("generate/images"));
        }
        let image_url = if self.missing_image.contains(caption) {
            None
        } else {
            Some(format!("https://img.test/{caption}"))
        };
        Ok(vec![ImageResult {
            image_url,
            caption: Some(caption.to_string()),
        }])
    }

    async fn audio(&self, caption: &str) -> Result<Bytes, ClientError> {
        self.wait(caption).await;
        if self.fail_audio.contains(caption) {
            return Err(server_error("generate/audio"));
        }
        Ok(wav_bytes(self.clip_secs, 8_000))
    }

    async fn image_bytes(&self, url: &str) -> Result<Bytes, ClientError> {
        Ok(Bytes::from(format!("frame:{url}")))
    }
}

/// Records every call instead of making sound.
#[derive(Default)]
pub struct RecordingOutput {
    plays: Vec<ClipTag>,
    resumes: usize,
    resumable: bool,
    reject: bool,
    accept: Option<usize>,
}

impl RecordingOutput {
    pub fn resumable() -> Self {
        Self {
            resumable: true,
            ..Self::default()
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    /// Accepts the first `plays` clips, then rejects the rest.
    pub fn rejecting_after(plays: usize) -> Self {
        Self {
            accept: Some(plays),
            ..Self::default()
        }
    }

    pub fn played_indices(&self) -> Vec<usize> {
        self.plays.iter().map(|tag| tag.index).collect()
    }

    pub fn last_tag(&self) -> Option<ClipTag> {
        self.plays.last().copied()
    }

    pub fn resumes(&self) -> usize {
        self.resumes
    }
}

impl AudioOutput for RecordingOutput {
    fn play(&mut self, _clip: &AudioClip, tag: ClipTag) -> Result<(), PlaybackError> {
        if self.reject || self.accept.is_some_and(|n| self.plays.len() >= n) {
            return Err(PlaybackError::Rejected {
                reason: "autoplay blocked".to_string(),
            });
        }
        self.plays.push(tag);
        Ok(())
    }

    fn pause(&mut self) -> bool {
        self.resumable
    }

    fn resume(&mut self) -> Result<(), PlaybackError> {
        self.resumes += 1;
        Ok(())
    }

    fn stop(&mut self) {}
}

/// Keeps the indices of pushed frames instead of encoding them.
#[derive(Default)]
pub struct MemoryRecorder {
    pub output: Option<PathBuf>,
    pub captions: Option<PathBuf>,
    pub frame_rate: u32,
    pub frames: Vec<usize>,
    pub finished: bool,
}

#[async_trait]
impl Recorder for MemoryRecorder {
    async fn start(
        &mut self,
        output: &Path,
        frame_rate: u32,
        captions: Option<&Path>,
    ) -> Result<(), ExportError> {
        self.output = Some(output.to_path_buf());
        self.captions = captions.map(Path::to_path_buf);
        self.frame_rate = frame_rate;
        Ok(())
    }

    async fn push_frame(&mut self, frame: &Frame) -> Result<(), ExportError> {
        self.frames.push(frame.index);
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), ExportError> {
        self.finished = true;
        Ok(())
    }
}
