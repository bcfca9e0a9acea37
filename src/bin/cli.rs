use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    draftsync::cli::run().await?;
    Ok(())
}
