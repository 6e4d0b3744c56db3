use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Wrap},
};
use storyreel_common::SlideSummary;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// The current slide: caption, image location and position in the story.
pub struct SlideView<'a> {
    pub slides: &'a [SlideSummary],
    pub index: usize,
    pub playing: bool,
}

impl SlideView<'_> {
    fn title(&self) -> String {
        if self.slides.is_empty() {
            return "No slides".to_string();
        }
        let marker = if self.playing { "playing" } else { "paused" };
        format!(
            "Slide {}/{} ({marker})",
            self.index + 1,
            self.slides.len()
        )
    }
}

impl Widget for SlideView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default().title(self.title()).borders(Borders::ALL);
        let inner = block.inner(area);
        block.render(area, buf);

        let Some(slide) = self.slides.get(self.index) else {
            Paragraph::new("Submit a prompt to create a story.")
                .wrap(Wrap { trim: true })
                .render(inner, buf);
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);
        Paragraph::new(slide.caption.as_str())
            .style(Style::default().add_modifier(Modifier::BOLD))
            .wrap(Wrap { trim: true })
            .render(chunks[0], buf);
        Line::from(truncate_to_width(&slide.image_url, chunks[1].width as usize))
            .style(Style::default().fg(Color::DarkGray))
            .render(chunks[1], buf);
    }
}

/// Cut `text` to at most `width` terminal columns, ending in an ellipsis
/// when shortened.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        used += w;
        out.push(c);
    }
    if width > 0 {
        out.push('…');
    }
    out
}
