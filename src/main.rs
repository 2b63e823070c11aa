//! Amoria settlement engine server binary.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    amoria_settlement::server::run().await
}
