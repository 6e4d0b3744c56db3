use tracing::{debug, error, warn};

use crate::audio_output::{AudioOutput, ClipEvent, ClipOutcome, ClipTag};
use crate::playback::{PlaybackEffect, PlaybackState};
use crate::session::CycleId;
use crate::slide::SlideList;

/// Drives an [`AudioOutput`] from the playback state machine. Advancing to a
/// slide while playing always starts that slide's clip.
pub struct Player<O: AudioOutput> {
    output: O,
    state: PlaybackState,
    slides: Option<SlideList>,
    cycle: CycleId,
    serial: u64,
    current: Option<ClipTag>,
    paused: Option<ClipTag>,
}

impl<O: AudioOutput> Player<O> {
    pub fn new(output: O) -> Self {
        Self {
            output,
            state: PlaybackState::default(),
            slides: None,
            cycle: CycleId::default(),
            serial: 0,
            current: None,
            paused: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn slides(&self) -> Option<&SlideList> {
        self.slides.as_ref()
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    fn len(&self) -> usize {
        self.slides.as_ref().map_or(0, SlideList::len)
    }

    /// Replace the slide list, stopping playback and rewinding to slide 0.
    pub fn load(&mut self, cycle: CycleId, slides: SlideList) {
        self.clear();
        self.cycle = cycle;
        self.slides = Some(slides);
    }

    /// Drop the slide list and its audio.
    pub fn clear(&mut self) {
        self.output.stop();
        self.state = PlaybackState::default();
        self.slides = None;
        self.current = None;
        self.paused = None;
    }

    pub fn toggle_play_pause(&mut self) -> PlaybackState {
        let effect = self.state.toggle_play_pause(self.len());
        self.apply(effect);
        self.state
    }

    /// Feed a clip completion from the output. Returns the new state, or
    /// `None` if the event belongs to a clip that is no longer current.
    pub fn handle_clip_event(&mut self, event: ClipEvent) -> Option<PlaybackState> {
        if self.current != Some(event.tag) {
            debug!("Ignoring stale clip event {:?}", event.tag);
            return None;
        }
        self.current = None;
        match event.outcome {
            ClipOutcome::Finished => {
                let effect = self.state.on_audio_ended(self.len());
                self.apply(effect);
            }
            ClipOutcome::Failed(reason) => {
                error!("Audio play failed: {reason}");
                self.state = PlaybackState::Stopped(self.state.index());
            }
        }
        Some(self.state)
    }

    fn apply(&mut self, effect: PlaybackEffect) {
        match effect {
            PlaybackEffect::None => {}
            PlaybackEffect::Pause => {
                let tag = self.current.take();
                self.paused = if self.output.pause() { tag } else { None };
            }
            PlaybackEffect::Play(index) => self.start(index),
        }
    }

    fn start(&mut self, index: usize) {
        if let Some(tag) = self.paused.take() {
            if tag.index == index {
                match self.output.resume() {
                    Ok(()) => {
                        self.current = Some(tag);
                        return;
                    }
                    Err(e) => warn!("{e}; restarting slide {index}"),
                }
            }
        }

        let Some(slide) = self.slides.as_ref().and_then(|slides| slides.get(index)) else {
            self.state = PlaybackState::Stopped(0);
            return;
        };
        self.serial += 1;
        let tag = ClipTag {
            cycle: self.cycle,
            index,
            serial: self.serial,
        };
        match self.output.play(&slide.audio, tag) {
            Ok(()) => self.current = Some(tag),
            Err(e) => {
                error!("{e}");
                // Park on the clip that failed to start; the next play retries it
                self.current = None;
                self.state = PlaybackState::Stopped(index);
            }
        }
    }
}
