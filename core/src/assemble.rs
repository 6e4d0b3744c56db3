use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use storyreel_client::GenerationClient;
use tracing::{debug, error, info};

use crate::error::{Result, StoryError};
use crate::fetch::{fetch_slide, FetchFailure};
use crate::segment::segment;
use crate::slide::SlideList;

/// Result of one assembly: the surviving slides and the units that were dropped.
#[derive(Debug)]
pub struct Assembly {
    pub slides: SlideList,
    pub failures: Vec<FetchFailure>,
}

/// Start `task` for every item at once and return the outputs in item order,
/// whatever order they complete in.
pub async fn join_ordered<I, F, Fut>(items: I, mut task: F) -> Vec<Fut::Output>
where
    I: IntoIterator,
    F: FnMut(usize, I::Item) -> Fut,
    Fut: Future,
{
    let mut in_flight: FuturesUnordered<_> = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let fut = task(index, item);
            async move { (index, fut.await) }
        })
        .collect();

    let mut slots: Vec<Option<Fut::Output>> = Vec::with_capacity(in_flight.len());
    slots.resize_with(in_flight.len(), || None);
    while let Some((index, output)) = in_flight.next().await {
        debug!("Unit {index} completed");
        slots[index] = Some(output);
    }
    slots.into_iter().flatten().collect()
}

/// Segment the story and build one slide per unit, fetching all units
/// concurrently. Fails only when no unit yields a slide.
pub async fn assemble<C>(client: &C, story: &str) -> Result<Assembly>
where
    C: GenerationClient + ?Sized,
{
    let units = segment(story);
    if units.is_empty() {
        error!("Story has no sentences to illustrate");
        return Err(StoryError::EmptyResult { attempted: 0 });
    }
    let attempted = units.len();
    info!("Assembling {attempted} slides");

    let results = join_ordered(units.iter(), |index, unit| fetch_slide(client, index, unit)).await;

    let mut slides = Vec::with_capacity(attempted);
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(slide) => slides.push(slide),
            Err(failure) => failures.push(failure),
        }
    }

    if slides.is_empty() {
        error!("Could not generate any slides for the story ({attempted} attempted)");
        return Err(StoryError::EmptyResult { attempted });
    }
    info!(
        "Assembled {} slides, dropped {}",
        slides.len(),
        failures.len()
    );
    Ok(Assembly {
        slides: SlideList::new(slides),
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeClient;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn join_ordered_restores_input_order() {
        let delays = [30u64, 10, 20];
        let out = join_ordered(delays, |index, ms| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            index
        })
        .await;
        assert_eq!(out, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn units_run_concurrently() {
        let client = FakeClient::new()
            .delay("One", Duration::from_secs(2))
            .delay("Two", Duration::from_secs(2))
            .delay("Three", Duration::from_secs(2));
        let started = tokio::time::Instant::now();

        let assembly = assemble(&client, "One. Two. Three.").await.unwrap();
        assert_eq!(assembly.slides.len(), 3);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn partial_failure_keeps_survivors_in_order() {
        let client = FakeClient::new().fail_images("B").fail_audio("D");
        let assembly = assemble(&client, "A. B. C. D. E.").await.unwrap();

        let captions: Vec<&str> = assembly.slides.iter().map(|s| s.caption.as_str()).collect();
        assert_eq!(captions, vec!["A.", "C.", "E."]);
        let dropped: Vec<usize> = assembly.failures.iter().map(|f| f.index).collect();
        assert_eq!(dropped, vec![1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_early_unit_is_not_overtaken() {
        let client = FakeClient::new().delay("First", Duration::from_secs(5));
        let assembly = assemble(&client, "First. Second.").await.unwrap();
        assert_eq!(assembly.slides.get(0).unwrap().caption, "First.");
        assert_eq!(assembly.slides.get(1).unwrap().caption, "Second.");
    }

    #[tokio::test]
    async fn every_unit_failing_is_an_empty_result() {
        let client = FakeClient::new().fail_images("A").missing_image("B");
        let err = assemble(&client, "A. B.").await.unwrap_err();
        assert!(matches!(err, StoryError::EmptyResult { attempted: 2 }));
    }

    #[tokio::test]
    async fn story_without_units_is_an_empty_result() {
        let client = FakeClient::new();
        let err = assemble(&client, " . . ").await.unwrap_err();
        assert!(matches!(err, StoryError::EmptyResult { attempted: 0 }));
        assert_eq!(client.request_count(), 0);
    }
}
