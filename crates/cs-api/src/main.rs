use cs_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!(error = %err, "cs-api failed");
        std::process::exit(1);
    }
}
