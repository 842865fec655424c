#[tokio::main]
async fn main() -> anyhow::Result<()> {
    steps_server::run().await
}
