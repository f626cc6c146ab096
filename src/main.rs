#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fitness_studio::run().await
}
