use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use storyreel_common::{ExportKind, SlideSummary};

/// Updates emitted by the studio to its front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    StoryStarted,
    StoryReady { text: String },
    SlidesStarted,
    SlidesReady {
        slides: Vec<SlideSummary>,
        dropped: usize,
    },
    PlaybackChanged { index: usize, playing: bool },
    Exported { kind: ExportKind, path: PathBuf },
    Notice { message: String },
    Error { message: String },
    ShutdownComplete,
}

/// Requests a front end can make of the studio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    SubmitPrompt { prompt: String },
    EditStory { text: String },
    Regenerate,
    TogglePlayPause,
    Export { kind: ExportKind },
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub op: Op,
}

impl Submission {
    pub fn new(op: Op) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            op,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submissions_get_distinct_ids() {
        let a = Submission::new(Op::Regenerate);
        let b = Submission::new(Op::Regenerate);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn export_op_serializes_kind_in_kebab_case() {
        let json = serde_json::to_string(&Op::Export {
            kind: ExportKind::Audio,
        })
        .unwrap();
        assert_eq!(json, r#"{"Export":{"kind":"audio"}}"#);
    }
}
