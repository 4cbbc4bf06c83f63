use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    evidence_cli::main_entry().await
}
