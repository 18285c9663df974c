#[tokio::main]
async fn main() -> anyhow::Result<()> {
    nook::run().await
}
