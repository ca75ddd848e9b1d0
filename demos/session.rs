use std::sync::Arc;

use receipt_gateway::{FileCredentialStore, GatewayConfig, OutgoingRequest, RequestGateway};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    // Config and stored session live next to the binary
    let cfg = GatewayConfig::from_file("gateway.json")?;
    let store = Arc::new(FileCredentialStore::open("session.json")?);
    let gateway = RequestGateway::from_config(&cfg, store)?;

    let mut ended = gateway.subscribe();
    tokio::spawn(async move {
        if let Ok(event) = ended.recv().await {
            println!("session ended ({}), sign in again", event.reason);
        }
    });

    let resp = gateway.send(OutgoingRequest::get("/api/receipts/")).await?;
    println!("{} {}", resp.status, resp.text());
    Ok(())
}
