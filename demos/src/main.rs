//! Demos
//!
//! Runs the demo authorization server. The nonce service is configured by
//! setting `IDENTUS_URL` to the Credential Issuer's base URL.

use anyhow::Result;
use credibil_vci_bridge::IssuerClient;
use demos::server;
use test_utils::Platform;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

const ADDR: &str = "localhost:8080";

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // refuse to start without a usable nonce service URL
    let client = IssuerClient::from_env()?;
    server::serve(ADDR, Platform::new(), client).await?;

    // block until `ctrl-c`
    Ok(tokio::signal::ctrl_c().await?)
}
