#[tokio::main]
async fn main() {
    print_support_bot::app::run().await;
}
