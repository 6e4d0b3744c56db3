use serde::{Deserialize, Serialize};
use std::fmt;

pub const STORY_FILE_NAME: &str = "story.txt";
pub const AUDIO_FILE_NAME: &str = "full_story_audio.wav";
pub const VIDEO_FILE_NAME: &str = "story_video.webm";
pub const CAPTIONS_FILE_NAME: &str = "story_video.vtt";

/// Shown before a video capture starts.
pub const SILENT_VIDEO_NOTICE: &str =
    "Video recording will start. The final video will not include audio. Keep storyreel open until the story finishes playing.";

/// One element of the image service response. Only the first element's
/// `image_url` is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResult {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

/// What a front end needs to draw one slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideSummary {
    pub caption: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportKind {
    Story,
    Audio,
    Video,
}

impl ExportKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ExportKind::Story => STORY_FILE_NAME,
            ExportKind::Audio => AUDIO_FILE_NAME,
            ExportKind::Video => VIDEO_FILE_NAME,
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportKind::Story => "story",
            ExportKind::Audio => "audio",
            ExportKind::Video => "video",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationPhase {
    #[default]
    Idle,
    StoryPending,
    SlidesPending,
}

/// Phase of the current generation cycle plus the last cycle-level error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStatus {
    pub phase: GenerationPhase,
    pub last_error: Option<String>,
}

impl GenerationStatus {
    pub fn is_busy(&self) -> bool {
        self.phase != GenerationPhase::Idle
    }

    pub fn label(&self) -> &'static str {
        match self.phase {
            GenerationPhase::Idle => "idle",
            GenerationPhase::StoryPending => "Writing your story...",
            GenerationPhase::SlidesPending => "Creating visuals and audio...",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_kinds_map_to_artifact_names() {
        assert_eq!(ExportKind::Story.file_name(), "story.txt");
        assert_eq!(ExportKind::Audio.file_name(), "full_story_audio.wav");
        assert_eq!(ExportKind::Video.file_name(), "story_video.webm");
    }

    #[test]
    fn status_is_busy_only_while_pending() {
        let mut status = GenerationStatus::default();
        assert!(!status.is_busy());
        status.phase = GenerationPhase::SlidesPending;
        assert!(status.is_busy());
    }
}
