use std::io::Read as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stacklet::clients::certs::HttpCertificateClient;
use stacklet::clients::config::ClientConfig;
use stacklet::clients::dns::HttpDnsClient;
use stacklet::clients::email::HttpEmailClient;
use stacklet::clients::iam::HttpAccessKeyClient;
use stacklet::clients::images::HttpImageClient;
use stacklet::clients::secrets::HttpSecretStoreClient;
use stacklet::event::LifecycleEvent;
use stacklet::handlers::certificate::CertificateIssuer;
use stacklet::handlers::hosted_zone::HostedZoneLocator;
use stacklet::handlers::machine_image::MachineImageLocator;
use stacklet::handlers::smtp_user::SmtpCredentialProvisioner;
use stacklet::handlers::verify_domain::DomainVerifier;
use stacklet::handlers::LifecycleHandler;

#[derive(Parser)]
#[command(name = "resource-handler")]
#[command(about = "Serves custom resource lifecycle events", long_about = None)]
#[command(version)]
struct Cli {
    /// Base URL of the provider API
    #[arg(long, env = "PROVIDER_BASE_URL")]
    base_url: String,

    /// API token for the provider
    #[arg(long, env = "PROVIDER_API_TOKEN")]
    api_token: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Lifecycle event JSON; reads stdin when omitted
    #[arg(long)]
    event_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let event = read_event(&cli)?;
    info!(
        resource_type = %event.resource_type,
        request_type = ?event.request_type,
        "handling lifecycle event"
    );

    let config = ClientConfig::new(&cli.base_url, &cli.api_token)
        .timeout(Duration::from_secs(cli.timeout));

    let handler = select_handler(&event, &config)
        .with_context(|| format!("no handler registered for {}", event.resource_type))?;

    let response = handler
        .handle(&event)
        .await
        .with_context(|| format!("{} handler failed", event.resource_type))?;

    info!(physical_resource_id = %response.physical_resource_id, "event handled");
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}

fn read_event(cli: &Cli) -> Result<LifecycleEvent> {
    let raw = match &cli.event_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read event from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("failed to parse lifecycle event")
}

fn select_handler(
    event: &LifecycleEvent,
    config: &ClientConfig,
) -> Result<Box<dyn LifecycleHandler>> {
    let dns = Arc::new(HttpDnsClient::new(config.clone())?);

    let handler: Box<dyn LifecycleHandler> = match event.resource_type.as_str() {
        stacklet::handlers::hosted_zone::RESOURCE_TYPE => {
            Box::new(HostedZoneLocator::new(dns))
        }
        stacklet::handlers::certificate::RESOURCE_TYPE => {
            let certs = Arc::new(HttpCertificateClient::new(config.clone())?);
            Box::new(CertificateIssuer::new(certs, dns))
        }
        stacklet::handlers::machine_image::RESOURCE_TYPE => {
            let images = Arc::new(HttpImageClient::new(config.clone())?);
            Box::new(MachineImageLocator::new(images))
        }
        stacklet::handlers::verify_domain::RESOURCE_TYPE => {
            let email = Arc::new(HttpEmailClient::new(config.clone())?);
            Box::new(DomainVerifier::new(email, dns))
        }
        stacklet::handlers::smtp_user::RESOURCE_TYPE => {
            let iam = Arc::new(HttpAccessKeyClient::new(config.clone())?);
            let secrets = Arc::new(HttpSecretStoreClient::new(config.clone())?);
            Box::new(SmtpCredentialProvisioner::new(iam, secrets))
        }
        other => anyhow::bail!("unknown resource type: {other}"),
    };
    Ok(handler)
}
