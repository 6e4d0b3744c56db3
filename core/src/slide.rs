use bytes::Bytes;
use std::io::{self, Cursor, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use storyreel_common::SlideSummary;
use tempfile::NamedTempFile;

/// A synthesized audio clip in both of its forms: the raw bytes used for
/// export and a local file an audio player can open. The file is removed when
/// the clip is dropped.
#[derive(Debug)]
pub struct AudioClip {
    bytes: Bytes,
    file: NamedTempFile,
}

impl AudioClip {
    pub fn new(bytes: Bytes) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("storyreel-clip-")
            .suffix(".wav")
            .tempfile()?;
        file.write_all(&bytes)?;
        file.flush()?;
        Ok(Self { bytes, file })
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Play length read from the WAV header, if the clip is a WAV file.
    pub fn duration(&self) -> Option<Duration> {
        wav_duration(&self.bytes)
    }
}

pub fn wav_duration(bytes: &[u8]) -> Option<Duration> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).ok()?;
    let rate = reader.spec().sample_rate;
    if rate == 0 {
        return None;
    }
    Some(Duration::from_secs_f64(reader.duration() as f64 / rate as f64))
}

#[derive(Debug)]
pub struct Slide {
    pub image_url: String,
    pub caption: String,
    pub audio: AudioClip,
}

impl Slide {
    pub fn summary(&self) -> SlideSummary {
        SlideSummary {
            caption: self.caption.clone(),
            image_url: self.image_url.clone(),
        }
    }
}

/// Ordered, immutable slides of one generation cycle. Clones share the same
/// slides; audio files are released once the last clone is dropped.
#[derive(Debug, Clone)]
pub struct SlideList {
    slides: Arc<[Slide]>,
}

impl SlideList {
    pub fn new(slides: Vec<Slide>) -> Self {
        Self {
            slides: Arc::from(slides),
        }
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Slide> {
        self.slides.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Slide> {
        self.slides.iter()
    }

    pub fn summaries(&self) -> Vec<SlideSummary> {
        self.iter().map(Slide::summary).collect()
    }

    pub fn total_audio_bytes(&self) -> usize {
        self.iter().map(|slide| slide.audio.len()).sum()
    }

    /// True when both handles refer to the same assembled list.
    #[cfg(test)]
    pub(crate) fn same_list(&self, other: &SlideList) -> bool {
        Arc::ptr_eq(&self.slides, &other.slides)
    }
}

impl<'a> IntoIterator for &'a SlideList {
    type Item = &'a Slide;
    type IntoIter = std::slice::Iter<'a, Slide>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{slide, wav_bytes};

    #[test]
    fn clip_file_holds_payload_until_dropped() {
        let clip = AudioClip::new(Bytes::from_static(b"not really audio")).unwrap();
        let path = clip.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"not really audio");
        assert!(clip.duration().is_none());

        drop(clip);
        assert!(!path.exists());
    }

    #[test]
    fn wav_duration_reads_header() {
        let bytes = wav_bytes(1.5, 8_000);
        let duration = wav_duration(&bytes).unwrap();
        assert_eq!(duration, Duration::from_millis(1500));
    }

    #[test]
    fn clones_share_one_list() {
        let list = SlideList::new(vec![slide(0, 0.5), slide(1, 0.5)]);
        let other = list.clone();
        assert!(list.same_list(&other));
        assert_eq!(other.len(), 2);

        let rebuilt = SlideList::new(vec![slide(0, 0.5)]);
        assert!(!list.same_list(&rebuilt));
    }

    #[test]
    fn audio_files_outlive_all_but_the_last_clone() {
        let list = SlideList::new(vec![slide(0, 0.5)]);
        let path = list.get(0).unwrap().audio.path().to_path_buf();
        let held = list.clone();

        drop(list);
        assert!(path.exists());
        drop(held);
        assert!(!path.exists());
    }
}
