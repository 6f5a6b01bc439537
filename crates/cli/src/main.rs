use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    sememe_cli::main_entry().await
}
