use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    storyreel_cli::run_cli().await
}
