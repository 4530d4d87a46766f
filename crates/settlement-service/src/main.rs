#[tokio::main]
async fn main() {
    settlement_service::run::start(std::env::args()).await;
}
