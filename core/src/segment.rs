/// Split story text into sentence units on `.`.
///
/// Fragments are trimmed and empty ones dropped. Ellipses, abbreviations and
/// decimal numbers are split like any other period.
pub fn segment(story: &str) -> Vec<String> {
    story
        .split('.')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Caption shown (and sent to the generators) for a unit.
pub fn caption_for(unit: &str) -> String {
    format!("{unit}.")
}
