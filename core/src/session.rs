use storyreel_client::ClientError;
use storyreel_common::{GenerationPhase, GenerationStatus};
use tracing::{debug, info};

use crate::assemble::Assembly;
use crate::error::{Result, StoryError};
use crate::slide::SlideList;

/// Identifies one generation cycle. Every new story or slide request gets a
/// fresh id; results carrying an older id are stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CycleId(u64);

impl CycleId {
    fn next(self) -> Self {
        CycleId(self.0 + 1)
    }
}

impl std::fmt::Display for CycleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cycle-{}", self.0)
    }
}

/// State of one single-user session: the story, its slides and the
/// generation status. Nothing here outlives the process.
#[derive(Debug, Default)]
pub struct Session {
    story: Option<String>,
    slides: Option<SlideList>,
    status: GenerationStatus,
    cycle: CycleId,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn story(&self) -> Option<&str> {
        self.story.as_deref()
    }

    pub fn slides(&self) -> Option<&SlideList> {
        self.slides.as_ref()
    }

    pub fn status(&self) -> &GenerationStatus {
        &self.status
    }

    pub fn current_cycle(&self) -> CycleId {
        self.cycle
    }

    pub fn is_current(&self, cycle: CycleId) -> bool {
        self.cycle == cycle
    }

    fn advance_cycle(&mut self, phase: GenerationPhase) -> CycleId {
        self.cycle = self.cycle.next();
        self.status = GenerationStatus {
            phase,
            last_error: None,
        };
        self.cycle
    }

    /// Start a story request. Blank prompts are rejected without touching
    /// the session; otherwise the previous story and slides are cleared.
    pub fn begin_story(&mut self, prompt: &str) -> Result<(CycleId, String)> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(StoryError::EmptyPrompt);
        }
        self.story = None;
        self.slides = None;
        let cycle = self.advance_cycle(GenerationPhase::StoryPending);
        info!("{cycle}: requesting story");
        Ok((cycle, prompt.to_string()))
    }

    /// Apply a story response. Returns `None` when the cycle was superseded.
    pub fn complete_story(
        &mut self,
        cycle: CycleId,
        result: std::result::Result<String, ClientError>,
    ) -> Option<Result<String>> {
        if !self.is_current(cycle) {
            debug!("Ignoring story from stale {cycle}");
            return None;
        }
        match result {
            Ok(text) => {
                self.story = Some(text.clone());
                self.status = GenerationStatus::default();
                Some(Ok(text))
            }
            Err(e) => {
                let err = StoryError::StoryGeneration(e);
                self.fail(&err);
                Some(Err(err))
            }
        }
    }

    /// Start a slide request from the current story text. Returns `None`
    /// when there is no story yet.
    pub fn begin_slides(&mut self) -> Option<(CycleId, String)> {
        let story = self.story.clone()?;
        self.slides = None;
        let cycle = self.advance_cycle(GenerationPhase::SlidesPending);
        info!("{cycle}: assembling slides");
        Some((cycle, story))
    }

    /// Apply an assembly result. The new list replaces the old one
    /// wholesale. Returns `None` when the cycle was superseded.
    pub fn complete_slides(
        &mut self,
        cycle: CycleId,
        result: Result<Assembly>,
    ) -> Option<Result<Assembly>> {
        if !self.is_current(cycle) {
            debug!("Ignoring slides from stale {cycle}");
            return None;
        }
        match result {
            Ok(assembly) => {
                self.slides = Some(assembly.slides.clone());
                self.status = GenerationStatus::default();
                Some(Ok(assembly))
            }
            Err(err) => {
                self.fail(&err);
                Some(Err(err))
            }
        }
    }

    /// Replace the story with a user edit. Refused while a story request is
    /// in flight, since its response would overwrite the edit.
    pub fn edit_story(&mut self, text: String) -> bool {
        if self.status.phase == GenerationPhase::StoryPending {
            return false;
        }
        self.story = Some(text);
        true
    }

    fn fail(&mut self, err: &StoryError) {
        self.status = GenerationStatus {
            phase: GenerationPhase::Idle,
            last_error: Some(err.to_string()),
        };
    }
}
