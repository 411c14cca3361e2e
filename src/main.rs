#[tokio::main]
async fn main() {
    recipehub::start_server().await;
}
