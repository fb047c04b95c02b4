use std::path::PathBuf;

use clap::Parser;

use sni_responder::challenge::{Challenge, ChallengeOutcome, SigningKey, TlsSniChallenge};
use sni_responder::config::{load_config, ResponderConfig};
use sni_responder::observability::{init_logging, metrics};
use sni_responder::StandaloneAuthenticator;

#[derive(Parser)]
#[command(name = "sni-responder")]
#[command(about = "Answer a TLS-SNI domain validation challenge", long_about = None)]
struct Cli {
    /// TOML config file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Domain being validated
    #[arg(short, long)]
    domain: String,

    /// Challenge nonce; the CA asks for `<nonce>.acme.invalid`
    #[arg(short, long)]
    nonce: String,

    /// Shared secret echoed back in the response
    #[arg(short, long)]
    secret: String,

    /// PEM private key the validation certificate is signed with
    #[arg(short, long)]
    key: PathBuf,

    /// Validation port, overriding the config file
    #[arg(short, long)]
    port: Option<u16>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ResponderConfig::default(),
    };
    if let Some(port) = cli.port {
        config.listener.port = port;
    }

    init_logging(&config.observability.log_filter);
    metrics::set_enabled(config.observability.metrics_enabled);

    tracing::info!("sni-responder v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        port = config.listener.port,
        startup_timeout_secs = config.timeouts.startup_secs,
        "Configuration loaded"
    );

    let key = SigningKey::from_pem_file(&cli.key)?;
    let challenge = TlsSniChallenge::new(cli.domain, cli.secret, cli.nonce, key);
    let hostname = challenge.validation_hostname();
    let challenges = vec![Challenge::from(challenge)];

    // The listener is forked before any runtime threads exist.
    let mut authenticator = StandaloneAuthenticator::new(config);
    let outcomes = authenticator.perform(&challenges);

    let Some(response) = outcomes.first().and_then(ChallengeOutcome::response) else {
        tracing::error!("Validation listener could not be started");
        return Err("validation listener could not be started".into());
    };
    println!("{}", serde_json::to_string(response)?);

    tracing::info!(hostname = %hostname, "Serving validation certificate; Ctrl-C to finish");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(tokio::signal::ctrl_c())?;

    authenticator.cleanup(&challenges)?;

    tracing::info!("Shutdown complete");
    Ok(())
}
