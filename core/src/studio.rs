//! The studio actor: one background task owning the session and the player.
//!
//! Front ends submit [`Op`]s and read [`Event`]s. Generation and export work
//! runs on spawned tasks and reports back on an internal channel, so the actor
//! stays responsive to play/pause and clip completions while requests are in
//! flight.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use storyreel_client::{ClientError, GenerationClient};
use storyreel_common::{ExportKind, StoryConfig, SILENT_VIDEO_NOTICE};
use storyreel_protocol::{Event, Op, Submission};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::assemble::{assemble, Assembly};
use crate::audio_output::{AudioOutput, ClipEvent, ClipEventSender};
use crate::capture::{CaptureSettings, FfmpegRecorder, ImageFrameSource, Recorder};
use crate::error::{ExportError, Result, StoryError};
use crate::export::{export_audio, export_story, export_video, AudioExportMode};
use crate::player::Player;
use crate::session::{CycleId, Session};
use crate::slide::SlideList;

pub type RecorderFactory = Arc<dyn Fn() -> Box<dyn Recorder> + Send + Sync>;

pub struct StudioOptions {
    pub output_dir: PathBuf,
    pub audio_mode: AudioExportMode,
    pub capture: CaptureSettings,
    /// Play clips on a second output while a video capture runs
    pub monitor_capture: bool,
    pub recorder: RecorderFactory,
}

impl StudioOptions {
    pub fn from_config(config: &StoryConfig) -> Self {
        let ffmpeg = config.ffmpeg_path.clone();
        Self {
            output_dir: config.output_dir.clone(),
            audio_mode: AudioExportMode::default(),
            capture: CaptureSettings::from_config(config),
            monitor_capture: config.monitor_capture,
            recorder: Arc::new(move || -> Box<dyn Recorder> {
                Box::new(FfmpegRecorder::new(ffmpeg.clone()))
            }),
        }
    }
}

#[derive(Clone)]
pub struct Studio {
    inner: Arc<Inner>,
}

struct Inner {
    tx_submit: mpsc::Sender<Submission>,
    rx_event: Mutex<mpsc::Receiver<Event>>,
}

impl Studio {
    /// Start the actor. `make_output` builds the audio output for playback,
    /// and once more for each monitored video capture.
    pub fn spawn<O, F>(client: Arc<dyn GenerationClient>, options: StudioOptions, mut make_output: F) -> Self
    where
        O: AudioOutput + 'static,
        F: FnMut(ClipEventSender) -> O + Send + 'static,
    {
        let (tx_submit, rx_submit) = mpsc::channel::<Submission>(64);
        let (tx_event, rx_event) = mpsc::channel::<Event>(256);
        let (tx_clip, rx_clip) = mpsc::unbounded_channel();
        let (tx_done, rx_done) = mpsc::unbounded_channel();

        let player = Player::new(make_output(tx_clip));
        let actor = Actor {
            client,
            options,
            make_output,
            session: Session::new(),
            player,
            events: tx_event,
            done: tx_done,
            exporting_video: false,
        };
        tokio::spawn(actor.run(rx_submit, rx_clip, rx_done));

        Self {
            inner: Arc::new(Inner {
                tx_submit,
                rx_event: Mutex::new(rx_event),
            }),
        }
    }

    /// Queue an op and return its submission id.
    pub async fn submit(&self, op: Op) -> Result<String> {
        let submission = Submission::new(op);
        let id = submission.id.clone();
        self.inner
            .tx_submit
            .send(submission)
            .await
            .map_err(|_| StoryError::Closed)?;
        Ok(id)
    }

    /// Next event from the actor; `None` once it has shut down.
    pub async fn next_event(&self) -> Option<Event> {
        self.inner.rx_event.lock().await.recv().await
    }
}

enum Completion {
    Story {
        cycle: CycleId,
        result: std::result::Result<String, ClientError>,
    },
    Slides {
        cycle: CycleId,
        result: Result<Assembly>,
    },
    Export {
        kind: ExportKind,
        result: std::result::Result<PathBuf, ExportError>,
    },
}

struct Actor<O: AudioOutput, F> {
    client: Arc<dyn GenerationClient>,
    options: StudioOptions,
    make_output: F,
    session: Session,
    player: Player<O>,
    events: mpsc::Sender<Event>,
    done: mpsc::UnboundedSender<Completion>,
    exporting_video: bool,
}

impl<O, F> Actor<O, F>
where
    O: AudioOutput + 'static,
    F: FnMut(ClipEventSender) -> O + Send + 'static,
{
    async fn run(
        mut self,
        mut submissions: mpsc::Receiver<Submission>,
        mut clips: mpsc::UnboundedReceiver<ClipEvent>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        loop {
            tokio::select! {
                submission = submissions.recv() => match submission {
                    Some(Submission { id, op: Op::Shutdown }) => {
                        debug!("Shutdown requested by {id}");
                        break;
                    }
                    Some(Submission { id, op }) => {
                        debug!("Handling {id}: {op:?}");
                        self.handle_op(op).await;
                    }
                    None => break,
                },
                Some(event) = clips.recv() => self.handle_clip(event).await,
                Some(done) = completions.recv() => self.handle_completion(done).await,
            }
        }
        self.player.clear();
        self.emit(Event::ShutdownComplete).await;
    }

    fn emit(&self, event: Event) -> impl Future<Output = ()> + Send + 'static {
        let events = self.events.clone();
        async move {
            if events.send(event).await.is_err() {
                debug!("No front end listening for studio events");
            }
        }
    }

    fn emit_playback(&self) -> impl Future<Output = ()> + Send + 'static {
        let state = self.player.state();
        self.emit(Event::PlaybackChanged {
            index: state.index(),
            playing: state.is_playing(),
        })
    }

    async fn handle_op(&mut self, op: Op) {
        match op {
            Op::SubmitPrompt { prompt } => self.start_story(&prompt).await,
            Op::EditStory { text } => {
                if !self.session.edit_story(text) {
                    self.emit(Event::Notice {
                        message: "The story is still being written".to_string(),
                    })
                    .await;
                }
            }
            Op::Regenerate => self.start_slides().await,
            Op::TogglePlayPause => {
                if self.player.slides().is_some() {
                    self.player.toggle_play_pause();
                    self.emit_playback().await;
                }
            }
            Op::Export { kind } => self.start_export(kind).await,
            // Handled by the run loop
            Op::Shutdown => {}
        }
    }

    async fn start_story(&mut self, prompt: &str) {
        let (cycle, prompt) = match self.session.begin_story(prompt) {
            Ok(started) => started,
            Err(e) => {
                debug!("{e}");
                return;
            }
        };
        self.player.clear();
        self.emit(Event::StoryStarted).await;

        let client = Arc::clone(&self.client);
        let done = self.done.clone();
        tokio::spawn(async move {
            let result = client.story(&prompt).await;
            let _ = done.send(Completion::Story { cycle, result });
        });
    }

    async fn start_slides(&mut self) {
        let Some((cycle, story)) = self.session.begin_slides() else {
            self.emit(Event::Notice {
                message: "Generate a story first".to_string(),
            })
            .await;
            return;
        };
        self.player.clear();
        self.emit(Event::SlidesStarted).await;

        let client = Arc::clone(&self.client);
        let done = self.done.clone();
        tokio::spawn(async move {
            let result = assemble(client.as_ref(), &story).await;
            let _ = done.send(Completion::Slides { cycle, result });
        });
    }

    async fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Story { cycle, result } => match self.session.complete_story(cycle, result) {
                None => {}
                Some(Ok(text)) => {
                    self.emit(Event::StoryReady { text }).await;
                    self.start_slides().await;
                }
                Some(Err(e)) => {
                    error!("{cycle}: {e}");
                    self.emit(Event::Error {
                        message: e.to_string(),
                    })
                    .await;
                }
            },
            Completion::Slides { cycle, result } => match self.session.complete_slides(cycle, result) {
                None => {}
                Some(Ok(assembly)) => {
                    self.emit(Event::SlidesReady {
                        slides: assembly.slides.summaries(),
                        dropped: assembly.failures.len(),
                    })
                    .await;
                    self.player.load(cycle, assembly.slides);
                    self.emit_playback().await;
                }
                Some(Err(e)) => {
                    self.emit(Event::Error {
                        message: e.to_string(),
                    })
                    .await;
                }
            },
            Completion::Export { kind, result } => {
                if kind == ExportKind::Video {
                    self.exporting_video = false;
                }
                match result {
                    Ok(path) => self.emit(Event::Exported { kind, path }).await,
                    Err(e) => {
                        let e = StoryError::from(e);
                        error!("{kind} {e}");
                        self.emit(Event::Error {
                            message: e.to_string(),
                        })
                        .await;
                    }
                }
            }
        }
    }

    async fn handle_clip(&mut self, event: ClipEvent) {
        if !self.session.is_current(event.tag.cycle) {
            debug!("Ignoring clip event from stale {}", event.tag.cycle);
            return;
        }
        if self.player.handle_clip_event(event).is_some() {
            self.emit_playback().await;
        }
    }

    fn current_slides(&self) -> SlideList {
        self.session
            .slides()
            .cloned()
            .unwrap_or_else(|| SlideList::new(Vec::new()))
    }

    async fn start_export(&mut self, kind: ExportKind) {
        let output_dir = self.options.output_dir.clone();
        let done = self.done.clone();
        match kind {
            ExportKind::Story => {
                let story = self.session.story().map(str::to_owned);
                tokio::spawn(async move {
                    let result = export_story(&output_dir, story.as_deref()).await;
                    let _ = done.send(Completion::Export { kind, result });
                });
            }
            ExportKind::Audio => {
                let slides = self.current_slides();
                let mode = self.options.audio_mode;
                tokio::spawn(async move {
                    let result = export_audio(&output_dir, &slides, mode).await;
                    let _ = done.send(Completion::Export { kind, result });
                });
            }
            ExportKind::Video => self.start_video_export(output_dir, done).await,
        }
    }

    async fn start_video_export(&mut self, output_dir: PathBuf, done: mpsc::UnboundedSender<Completion>) {
        if self.exporting_video {
            self.emit(Event::Notice {
                message: "A video export is already running".to_string(),
            })
            .await;
            return;
        }
        let slides = self.current_slides();
        if slides.is_empty() {
            let e = StoryError::from(ExportError::Empty { what: "slides" });
            self.emit(Event::Error {
                message: e.to_string(),
            })
            .await;
            return;
        }
        if self.player.state().is_playing() {
            self.player.toggle_play_pause();
            self.emit_playback().await;
        }
        warn!("{SILENT_VIDEO_NOTICE}");
        self.emit(Event::Notice {
            message: SILENT_VIDEO_NOTICE.to_string(),
        })
        .await;
        info!("Capturing {} slides", slides.len());

        self.exporting_video = true;
        let mut monitor = if self.options.monitor_capture {
            // Monitor completions are not part of playback
            let (tx, _rx) = mpsc::unbounded_channel();
            Some((self.make_output)(tx))
        } else {
            None
        };
        let mut recorder = (self.options.recorder)();
        let settings = self.options.capture;
        let source = ImageFrameSource::new(Arc::clone(&self.client));
        tokio::spawn(async move {
            let result = export_video(
                &output_dir,
                &slides,
                &settings,
                &source,
                recorder.as_mut(),
                monitor.as_mut().map(|output| output as &mut dyn AudioOutput),
            )
            .await
            .map(|export| export.video);
            let _ = done.send(Completion::Export {
                kind: ExportKind::Video,
                result,
            });
        });
    }
}
