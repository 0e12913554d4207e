#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = quizora::run().await {
        eprintln!("quizora fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
