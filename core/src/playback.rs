/// Slide playback position. Navigation is strictly sequential: play/pause
/// toggles and audio-ended events are the only inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped(usize),
    Playing(usize),
}

/// What the audio side has to do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEffect {
    None,
    /// Load slide `n`'s clip (or continue it if it is the paused one) and play.
    Play(usize),
    Pause,
}

impl Default for PlaybackState {
    fn default() -> Self {
        PlaybackState::Stopped(0)
    }
}

impl PlaybackState {
    pub fn index(self) -> usize {
        match self {
            PlaybackState::Stopped(index) | PlaybackState::Playing(index) => index,
        }
    }

    pub fn is_playing(self) -> bool {
        matches!(self, PlaybackState::Playing(_))
    }

    pub fn toggle_play_pause(&mut self, len: usize) -> PlaybackEffect {
        if len == 0 {
            return PlaybackEffect::None;
        }
        match *self {
            PlaybackState::Stopped(index) => {
                let index = if index < len { index } else { 0 };
                *self = PlaybackState::Playing(index);
                PlaybackEffect::Play(index)
            }
            PlaybackState::Playing(index) => {
                *self = PlaybackState::Stopped(index);
                PlaybackEffect::Pause
            }
        }
    }

    /// The active clip finished: advance, or rewind once the story is done.
    pub fn on_audio_ended(&mut self, len: usize) -> PlaybackEffect {
        match *self {
            PlaybackState::Playing(index) if index + 1 < len => {
                *self = PlaybackState::Playing(index + 1);
                PlaybackEffect::Play(index + 1)
            }
            PlaybackState::Playing(_) => {
                *self = PlaybackState::Stopped(0);
                PlaybackEffect::None
            }
            PlaybackState::Stopped(_) => PlaybackEffect::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plays_through_and_rewinds() {
        let mut state = PlaybackState::default();
        assert_eq!(state, PlaybackState::Stopped(0));

        assert_eq!(state.toggle_play_pause(3), PlaybackEffect::Play(0));
        assert_eq!(state, PlaybackState::Playing(0));

        assert_eq!(state.on_audio_ended(3), PlaybackEffect::Play(1));
        assert_eq!(state, PlaybackState::Playing(1));
        assert_eq!(state.on_audio_ended(3), PlaybackEffect::Play(2));
        assert_eq!(state, PlaybackState::Playing(2));

        assert_eq!(state.on_audio_ended(3), PlaybackEffect::None);
        assert_eq!(state, PlaybackState::Stopped(0));
    }

    #[test]
    fn pause_keeps_position() {
        let mut state = PlaybackState::Playing(1);
        assert_eq!(state.toggle_play_pause(3), PlaybackEffect::Pause);
        assert_eq!(state, PlaybackState::Stopped(1));
        assert_eq!(state.toggle_play_pause(3), PlaybackEffect::Play(1));
        assert_eq!(state, PlaybackState::Playing(1));
    }

    #[test]
    fn toggle_on_empty_list_is_noop() {
        let mut state = PlaybackState::default();
        assert_eq!(state.toggle_play_pause(0), PlaybackEffect::None);
        assert_eq!(state, PlaybackState::Stopped(0));
    }

    #[test]
    fn ended_while_stopped_is_ignored() {
        let mut state = PlaybackState::Stopped(2);
        assert_eq!(state.on_audio_ended(3), PlaybackEffect::None);
        assert_eq!(state, PlaybackState::Stopped(2));
    }

    #[test]
    fn single_slide_story_rewinds_immediately() {
        let mut state = PlaybackState::default();
        state.toggle_play_pause(1);
        assert_eq!(state.on_audio_ended(1), PlaybackEffect::None);
        assert_eq!(state, PlaybackState::Stopped(0));
    }
}
