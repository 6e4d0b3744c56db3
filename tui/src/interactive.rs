use anyhow::Result;
use chrono::Local;
use crossterm::event::{Event as TermEvent, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};
use storyreel_common::{ExportKind, GenerationPhase, GenerationStatus, SlideSummary};
use storyreel_core::Studio;
use storyreel_protocol::{Event, Op};

use crate::app;
use crate::preview::SlideView;

const MAX_MESSAGES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Prompt,
    Player,
    EditStory,
}

/// Everything the screen shows, rebuilt from studio events.
#[derive(Debug)]
pub struct ViewState {
    pub focus: Focus,
    pub input: String,
    pub story: String,
    pub editor: String,
    pub slides: Vec<SlideSummary>,
    pub index: usize,
    pub playing: bool,
    pub status: GenerationStatus,
    pub messages: Vec<String>,
    pub running: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            focus: Focus::Prompt,
            input: String::new(),
            story: String::new(),
            editor: String::new(),
            slides: Vec::new(),
            index: 0,
            playing: false,
            status: GenerationStatus::default(),
            messages: Vec::new(),
            running: true,
        }
    }
}

impl ViewState {
    fn log(&mut self, message: impl AsRef<str>) {
        let stamp = Local::now().format("%H:%M:%S");
        self.messages.push(format!("{stamp} {}", message.as_ref()));
        if self.messages.len() > MAX_MESSAGES {
            let excess = self.messages.len() - MAX_MESSAGES;
            self.messages.drain(..excess);
        }
    }

    fn set_phase(&mut self, phase: GenerationPhase) {
        self.status = GenerationStatus {
            phase,
            last_error: None,
        };
    }

    pub fn apply(&mut self, event: Event) {
        match event {
            Event::StoryStarted => {
                self.set_phase(GenerationPhase::StoryPending);
                self.story.clear();
                self.slides.clear();
                self.index = 0;
                self.playing = false;
            }
            Event::StoryReady { text } => {
                self.story = text;
                self.set_phase(GenerationPhase::Idle);
            }
            Event::SlidesStarted => {
                self.set_phase(GenerationPhase::SlidesPending);
                self.slides.clear();
                self.index = 0;
                self.playing = false;
            }
            Event::SlidesReady { slides, dropped } => {
                self.log(format!("{} slides ready", slides.len()));
                if dropped > 0 {
                    self.log(format!("Skipped {dropped} sentence(s) the generator could not illustrate"));
                }
                self.slides = slides;
                self.set_phase(GenerationPhase::Idle);
                self.focus = Focus::Player;
            }
            Event::PlaybackChanged { index, playing } => {
                self.index = index;
                self.playing = playing;
            }
            Event::Exported { kind, path } => self.log(format!("Saved {kind} to {}", path.display())),
            Event::Notice { message } => self.log(message),
            Event::Error { message } => {
                self.log(format!("Error: {message}"));
                self.status = GenerationStatus {
                    phase: GenerationPhase::Idle,
                    last_error: Some(message),
                };
            }
            Event::ShutdownComplete => self.running = false,
        }
    }

    /// Translate a key press into a studio op, updating local edit state.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Op> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return self.quit();
        }
        match self.focus {
            Focus::Prompt => match key.code {
                KeyCode::Enter => {
                    if self.input.trim().is_empty() {
                        return None;
                    }
                    let prompt = std::mem::take(&mut self.input);
                    self.log(format!("Prompt: {}", prompt.trim()));
                    Some(Op::SubmitPrompt { prompt })
                }
                KeyCode::Tab => {
                    self.focus = Focus::Player;
                    None
                }
                KeyCode::Esc => self.quit(),
                KeyCode::Backspace => {
                    self.input.pop();
                    None
                }
                KeyCode::Char(c) => {
                    self.input.push(c);
                    None
                }
                _ => None,
            },
            Focus::Player => match key.code {
                KeyCode::Char(' ') => Some(Op::TogglePlayPause),
                KeyCode::Char('r') => Some(Op::Regenerate),
                KeyCode::Char('e') => {
                    if self.status.phase == GenerationPhase::StoryPending {
                        return None;
                    }
                    self.editor = self.story.clone();
                    self.focus = Focus::EditStory;
                    None
                }
                KeyCode::Char('s') => Some(Op::Export {
                    kind: ExportKind::Story,
                }),
                KeyCode::Char('a') => Some(Op::Export {
                    kind: ExportKind::Audio,
                }),
                KeyCode::Char('v') => Some(Op::Export {
                    kind: ExportKind::Video,
                }),
                KeyCode::Tab => {
                    self.focus = Focus::Prompt;
                    None
                }
                KeyCode::Char('q') | KeyCode::Esc => self.quit(),
                _ => None,
            },
            Focus::EditStory => match key.code {
                KeyCode::Esc => {
                    self.focus = Focus::Player;
                    self.story = std::mem::take(&mut self.editor);
                    Some(Op::EditStory {
                        text: self.story.clone(),
                    })
                }
                KeyCode::Enter => {
                    self.editor.push('\n');
                    None
                }
                KeyCode::Backspace => {
                    self.editor.pop();
                    None
                }
                KeyCode::Char(c) => {
                    self.editor.push(c);
                    None
                }
                _ => None,
            },
        }
    }

    fn quit(&mut self) -> Option<Op> {
        self.running = false;
        Some(Op::Shutdown)
    }

    fn status_line(&self) -> Line<'_> {
        match (&self.status.last_error, self.status.phase) {
            (Some(error), GenerationPhase::Idle) => {
                Line::from(error.as_str()).style(Style::default().fg(Color::Red))
            }
            (_, GenerationPhase::Idle) => Line::from("Ready"),
            _ => Line::from(self.status.label()).style(Style::default().fg(Color::Yellow)),
        }
    }

    fn help(&self) -> &'static str {
        match self.focus {
            Focus::Prompt => "Enter generate · Tab player · Esc quit",
            Focus::Player => {
                "Space play/pause · r regenerate · e edit · s/a/v export story/audio/video · Tab prompt · q quit"
            }
            Focus::EditStory => "Esc save edit",
        }
    }

    pub fn draw(&self, f: &mut Frame) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(1),
                Constraint::Min(6),
                Constraint::Length(6),
                Constraint::Length(1),
            ])
            .split(f.area());

        let focused = |focus: Focus| {
            if self.focus == focus {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            }
        };

        let prompt = Paragraph::new(self.input.as_str()).block(
            Block::default()
                .title("Prompt")
                .borders(Borders::ALL)
                .border_style(focused(Focus::Prompt)),
        );
        f.render_widget(prompt, rows[0]);
        f.render_widget(self.status_line(), rows[1]);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[2]);
        let (title, text) = if self.focus == Focus::EditStory {
            ("Story (editing)", self.editor.as_str())
        } else {
            ("Story", self.story.as_str())
        };
        let story = Paragraph::new(text).wrap(Wrap { trim: false }).block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(focused(Focus::EditStory)),
        );
        f.render_widget(story, columns[0]);
        f.render_widget(
            SlideView {
                slides: &self.slides,
                index: self.index,
                playing: self.playing,
            },
            columns[1],
        );

        let visible = rows[3].height.saturating_sub(2) as usize;
        let items: Vec<ListItem> = self
            .messages
            .iter()
            .skip(self.messages.len().saturating_sub(visible))
            .map(|m| ListItem::new(m.as_str()))
            .collect();
        f.render_widget(
            List::new(items).block(Block::default().title("Messages").borders(Borders::ALL)),
            rows[3],
        );
        f.render_widget(
            Line::from(self.help()).style(Style::default().fg(Color::DarkGray)),
            rows[4],
        );
    }
}

/// Terminal front end for a [`Studio`].
pub struct StoryApp {
    studio: Studio,
    view: ViewState,
}

impl StoryApp {
    pub fn new(studio: Studio) -> Self {
        Self {
            studio,
            view: ViewState::default(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut terminal = app::init()?;
        let result = self.event_loop(&mut terminal).await;
        app::restore(&mut terminal)?;
        result
    }

    async fn event_loop(&mut self, terminal: &mut app::Tui) -> Result<()> {
        let mut keys = EventStream::new();
        while self.view.running {
            terminal.draw(|f| self.view.draw(f))?;

            tokio::select! {
                event = self.studio.next_event() => match event {
                    Some(event) => self.view.apply(event),
                    None => break,
                },
                input = keys.next() => match input {
                    Some(Ok(TermEvent::Key(key))) if key.kind == KeyEventKind::Press => {
                        if let Some(op) = self.view.handle_key(key) {
                            self.studio.submit(op).await?;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                },
            }
        }
        Ok(())
    }
}
