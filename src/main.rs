#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = exampro_rust::run().await {
        eprintln!("exampro-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
