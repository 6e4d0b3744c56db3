use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use storyreel_common::{ensure_output_dir, save_artifact, ExportKind, CAPTIONS_FILE_NAME};
use tracing::info;

use crate::audio_output::AudioOutput;
use crate::capture::{
    capture, capture_timeline, webvtt, CaptureReport, CaptureSettings, FrameSource, Recorder,
};
use crate::error::ExportError;
use crate::slide::SlideList;

/// How slide clips are joined into the story audio file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AudioExportMode {
    /// Raw byte concatenation. Players usually stop after the first clip's
    /// declared length.
    #[default]
    Concatenate,
    /// Decode every clip and write one WAV file holding all samples.
    Remux,
}

pub fn concatenate_audio(slides: &SlideList) -> Vec<u8> {
    let mut out = Vec::with_capacity(slides.total_audio_bytes());
    for slide in slides {
        out.extend_from_slice(slide.audio.bytes());
    }
    out
}

fn describe(spec: WavSpec) -> String {
    format!(
        "{} Hz {}-channel {}-bit {:?}",
        spec.sample_rate, spec.channels, spec.bits_per_sample, spec.sample_format
    )
}

/// Join the clips into one well-formed WAV file. All clips must share the
/// first clip's format.
pub fn remux_audio(slides: &SlideList) -> Result<Vec<u8>, ExportError> {
    let mut readers = Vec::with_capacity(slides.len());
    for (index, slide) in slides.iter().enumerate() {
        let reader = WavReader::new(Cursor::new(slide.audio.bytes().as_ref()))
            .map_err(|source| ExportError::Wav { index, source })?;
        readers.push(reader);
    }
    let spec = readers
        .first()
        .map(WavReader::spec)
        .ok_or(ExportError::Empty { what: "slides" })?;
    for (index, reader) in readers.iter().enumerate() {
        if reader.spec() != spec {
            return Err(ExportError::FormatMismatch {
                index,
                expected: describe(spec),
                found: describe(reader.spec()),
            });
        }
    }

    let mut cursor = Cursor::new(Vec::with_capacity(slides.total_audio_bytes()));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|source| ExportError::Wav { index: 0, source })?;
        for (index, reader) in readers.iter_mut().enumerate() {
            let wav = |source: hound::Error| ExportError::Wav { index, source };
            match spec.sample_format {
                SampleFormat::Float => {
                    for sample in reader.samples::<f32>() {
                        writer.write_sample(sample.map_err(wav)?).map_err(wav)?;
                    }
                }
                SampleFormat::Int => {
                    for sample in reader.samples::<i32>() {
                        writer.write_sample(sample.map_err(wav)?).map_err(wav)?;
                    }
                }
            }
        }
        writer
            .finalize()
            .map_err(|source| ExportError::Wav { index: 0, source })?;
    }
    Ok(cursor.into_inner())
}

/// Write the story text as it stands, including an empty edit. Only a
/// missing story is refused.
pub async fn export_story(output_dir: &Path, story: Option<&str>) -> Result<PathBuf, ExportError> {
    let story = story.ok_or(ExportError::Empty { what: "story" })?;
    let path = save_artifact(output_dir, ExportKind::Story.file_name(), story.as_bytes()).await?;
    info!("Saved story to {}", path.display());
    Ok(path)
}

pub async fn export_audio(
    output_dir: &Path,
    slides: &SlideList,
    mode: AudioExportMode,
) -> Result<PathBuf, ExportError> {
    if slides.is_empty() {
        return Err(ExportError::Empty { what: "slides" });
    }
    let bytes = match mode {
        AudioExportMode::Concatenate => concatenate_audio(slides),
        AudioExportMode::Remux => remux_audio(slides)?,
    };
    let path = save_artifact(output_dir, ExportKind::Audio.file_name(), &bytes).await?;
    info!(
        "Saved {} bytes of audio from {} clips to {}",
        bytes.len(),
        slides.len(),
        path.display()
    );
    Ok(path)
}

#[derive(Debug)]
pub struct VideoExport {
    pub video: PathBuf,
    pub captions: PathBuf,
    pub report: CaptureReport,
}

/// Write the captions, then record the slides to the video file with the
/// captions burned in.
pub async fn export_video<S, R>(
    output_dir: &Path,
    slides: &SlideList,
    settings: &CaptureSettings,
    source: &S,
    recorder: &mut R,
    monitor: Option<&mut dyn AudioOutput>,
) -> Result<VideoExport, ExportError>
where
    S: FrameSource + ?Sized,
    R: Recorder + ?Sized,
{
    if slides.is_empty() {
        return Err(ExportError::Empty { what: "slides" });
    }
    ensure_output_dir(output_dir).await?;
    let vtt = webvtt(slides, &capture_timeline(slides, settings), settings);
    let captions = save_artifact(output_dir, CAPTIONS_FILE_NAME, vtt.as_bytes()).await?;

    let video = output_dir.join(ExportKind::Video.file_name());
    let report = capture(
        slides,
        settings,
        source,
        recorder,
        &video,
        Some(&captions),
        monitor,
    )
    .await?;
    info!("Saved video to {}", video.display());
    Ok(VideoExport {
        video,
        captions,
        report,
    })
}
