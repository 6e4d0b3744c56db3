pub mod app;
pub mod interactive;
pub mod preview;

use anyhow::Result;
use storyreel_core::Studio;

pub use interactive::*;
pub use preview::*;

/// Run the interactive player against a running studio.
pub async fn run_interactive(studio: Studio) -> Result<()> {
    let mut app = StoryApp::new(studio);
    app.run().await
}
