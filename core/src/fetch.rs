use bytes::Bytes;
use storyreel_client::{ClientError, GenerationClient};
use storyreel_common::ImageResult;
use thiserror::Error;
use tracing::{debug, warn};

use crate::segment::caption_for;
use crate::slide::{AudioClip, Slide};

#[derive(Error, Debug)]
pub enum UnitError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("image response has no image_url in its first element")]
    MissingImageUrl,

    #[error("could not stage audio clip: {0}")]
    Stage(#[from] std::io::Error),
}

/// One sentence unit that produced no slide. Logged, never surfaced on its own.
#[derive(Error, Debug)]
#[error("Failed to generate content for part {index} \"{caption}\": {reason}")]
pub struct FetchFailure {
    pub index: usize,
    pub caption: String,
    #[source]
    pub reason: UnitError,
}

/// Fetch image and audio for one unit concurrently. Both must succeed.
pub async fn fetch_slide<C>(client: &C, index: usize, unit: &str) -> Result<Slide, FetchFailure>
where
    C: GenerationClient + ?Sized,
{
    let caption = caption_for(unit);
    let (images, audio) = tokio::join!(client.images(&caption), client.audio(&caption));

    match build_slide(&caption, images, audio) {
        Ok(slide) => {
            debug!("Slide {index} ready ({} audio bytes)", slide.audio.len());
            Ok(slide)
        }
        Err(reason) => {
            let failure = FetchFailure {
                index,
                caption,
                reason,
            };
            warn!("{failure}");
            Err(failure)
        }
    }
}

fn build_slide(
    caption: &str,
    images: Result<Vec<ImageResult>, ClientError>,
    audio: Result<Bytes, ClientError>,
) -> Result<Slide, UnitError> {
    let images = images?;
    let audio = audio?;
    let image_url = first_image_url(&images).ok_or(UnitError::MissingImageUrl)?;
    Ok(Slide {
        image_url: image_url.to_string(),
        caption: caption.to_string(),
        audio: AudioClip::new(audio)?,
    })
}

pub fn first_image_url(images: &[ImageResult]) -> Option<&str> {
    images
        .first()
        .and_then(|image| image.image_url.as_deref())
        .filter(|url| !url.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeClient;

    #[tokio::test]
    async fn successful_unit_becomes_captioned_slide() {
        let client = FakeClient::new();
        let slide = fetch_slide(&client, 0, "The fox jumped").await.unwrap();
        assert_eq!(slide.caption, "The fox jumped.");
        assert_eq!(slide.image_url, "https://img.test/The fox jumped.");
        assert!(slide.audio.path().exists());
        assert!(slide.audio.duration().is_some());
    }

    #[tokio::test]
    async fn image_failure_fails_the_unit() {
        let client = FakeClient::new().fail_images("Gone");
        let failure = fetch_slide(&client, 3, "Gone").await.unwrap_err();
        assert_eq!(failure.index, 3);
        assert_eq!(failure.caption, "Gone.");
        assert!(matches!(failure.reason, UnitError::Client(_)));
    }

    #[tokio::test]
    async fn audio_failure_fails_the_unit() {
        let client = FakeClient::new().fail_audio("Quiet");
        let failure = fetch_slide(&client, 0, "Quiet").await.unwrap_err();
        assert!(matches!(failure.reason, UnitError::Client(_)));
    }

    #[tokio::test]
    async fn missing_image_url_is_malformed() {
        let client = FakeClient::new().missing_image("Blank");
        let failure = fetch_slide(&client, 0, "Blank").await.unwrap_err();
        assert!(matches!(failure.reason, UnitError::MissingImageUrl));
    }

    #[test]
    fn first_image_url_ignores_later_entries() {
        let images = vec![
            ImageResult {
                image_url: None,
                caption: None,
            },
            ImageResult {
                image_url: Some("https://img.test/second.png".to_string()),
                caption: None,
            },
        ];
        assert_eq!(first_image_url(&images), None);
        assert_eq!(first_image_url(&[]), None);
    }
}
