#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = quizora::run_worker().await {
        eprintln!("quizora-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
