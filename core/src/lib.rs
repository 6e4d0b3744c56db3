//! Story orchestration: segmenting, slide assembly, playback and export.

pub mod assemble;
pub mod audio_output;
pub mod capture;
pub mod error;
pub mod export;
pub mod fetch;
pub mod playback;
pub mod player;
pub mod segment;
pub mod session;
pub mod slide;
pub mod studio;

#[cfg(test)]
pub(crate) mod test_support;

pub use assemble::{assemble, Assembly};
pub use audio_output::{AudioOutput, ClipEvent, NullAudioOutput, ProcessAudioOutput};
pub use capture::{CaptureSettings, FfmpegRecorder, ImageFrameSource};
pub use error::{ExportError, PlaybackError, Result, StoryError};
pub use export::{export_audio, export_story, export_video, AudioExportMode};
pub use playback::PlaybackState;
pub use session::{CycleId, Session};
pub use slide::{Slide, SlideList};
pub use studio::{Studio, StudioOptions};
