use storyreel_client::ClientError;
use thiserror::Error;

/// Cycle-level errors surfaced to the user once per generation cycle.
#[derive(Error, Debug)]
pub enum StoryError {
    #[error("Prompt is empty")]
    EmptyPrompt,

    #[error("Failed to generate the story. Please try again.")]
    StoryGeneration(#[source] ClientError),

    #[error("Failed to generate images or audio for {attempted} sentence(s). The generator might be busy, please try again.")]
    EmptyResult { attempted: usize },

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),

    #[error("Studio has shut down")]
    Closed,
}

/// The audio output refused or failed to play a clip.
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("Failed to start audio player {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Audio play failed: {reason}")]
    Rejected { reason: String },
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Nothing to export: no {what}")]
    Empty { what: &'static str },

    #[error("Audio clip {index} is not a readable WAV file: {source}")]
    Wav {
        index: usize,
        #[source]
        source: hound::Error,
    },

    #[error("Audio clip {index} is {found} but the story audio is {expected}")]
    FormatMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("Frame for slide {index} unavailable: {reason}")]
    Frame { index: usize, reason: String },

    #[error("Recorder failed: {reason}")]
    Recorder { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoryError>;
