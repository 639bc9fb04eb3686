//! flow-sniffer: sniff a captured connection prefix
//!
//! Reads the first bytes of a connection from a file (or stdin), runs them
//! through the same session driver a dispatcher would use, and prints the
//! result as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Sniff a captured TCP prefix
//! flow-sniffer --dest 93.184.216.34:443 client_hello.bin
//!
//! # Sniff a UDP datagram
//! flow-sniffer --network udp --dest 8.8.8.8:53 query.bin
//!
//! # Pretend the destination is a fake-DNS address for a domain
//! flow-sniffer --fake-domain example.com request.bin
//!
//! # Run with environment overrides
//! FLOW_SNIFFER_LOG_LEVEL=debug flow-sniffer -c config.json capture.bin
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde_json::json;
use tokio::io::AsyncRead;
use tracing::{debug, info};

use flow_sniffer::config::{apply_env_overrides, load_config_with_env, Config};
use flow_sniffer::logging::{init_logging, LogHandlerRegistry};
use flow_sniffer::net::{Network, SniffContext};
use flow_sniffer::sniff::{SniffSession, SnifferRegistry};
use flow_sniffer::{SessionError, SniffResult};

/// Command-line arguments
struct Args {
    /// Configuration file path
    config_path: Option<PathBuf>,
    /// Capture to sniff, `-` for stdin
    input: Option<String>,
    /// Transport of the captured connection
    network: Network,
    /// Original destination
    destination: Option<SocketAddr>,
    /// Map this domain in fake DNS and use its address as destination
    fake_domain: Option<String>,
    /// Only run the metadata phase
    metadata_only: bool,
    /// Generate default configuration
    generate_config: bool,
    /// Check configuration only
    check_config: bool,
}

impl Args {
    fn parse() -> Result<Self> {
        let mut args = std::env::args().skip(1);
        let mut parsed = Self {
            config_path: None,
            input: None,
            network: Network::Tcp,
            destination: None,
            fake_domain: None,
            metadata_only: false,
            generate_config: false,
            check_config: false,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-c" | "--config" => {
                    parsed.config_path = args.next().map(PathBuf::from);
                }
                "-n" | "--network" => {
                    let value = args.next().context("--network needs a value")?;
                    parsed.network = value.parse()?;
                }
                "-d" | "--dest" => {
                    let value = args.next().context("--dest needs a value")?;
                    parsed.destination = Some(
                        value
                            .parse()
                            .with_context(|| format!("Invalid destination: {value}"))?,
                    );
                }
                "--fake-domain" => {
                    parsed.fake_domain = Some(args.next().context("--fake-domain needs a value")?);
                }
                "--metadata-only" => {
                    parsed.metadata_only = true;
                }
                "-g" | "--generate-config" => {
                    parsed.generate_config = true;
                }
                "--check" => {
                    parsed.check_config = true;
                }
                "-h" | "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "-v" | "--version" => {
                    println!("flow-sniffer v{}", flow_sniffer::VERSION);
                    std::process::exit(0);
                }
                other if other.starts_with('-') && other != "-" => {
                    eprintln!("Unknown argument: {other}");
                    print_help();
                    std::process::exit(1);
                }
                _ => {
                    parsed.input = Some(arg);
                }
            }
        }

        Ok(parsed)
    }
}

fn print_help() {
    println!(
        r#"flow-sniffer v{}

Identify the protocol and target host of a captured connection prefix.

USAGE:
    flow-sniffer [OPTIONS] <INPUT>

ARGS:
    <INPUT>                 Capture file, or - for stdin

OPTIONS:
    -c, --config <PATH>     Configuration file path
    -n, --network <NET>     tcp or udp [default: tcp]
    -d, --dest <ADDR:PORT>  Original destination of the connection
    --fake-domain <DOMAIN>  Map DOMAIN in fake DNS and use its address as destination
    --metadata-only         Only run the metadata phase
    -g, --generate-config   Write a default configuration to --config and exit
    --check                 Check configuration and exit
    -h, --help              Print help information
    -v, --version           Print version information

ENVIRONMENT:
    FLOW_SNIFFER_LOG_LEVEL  Override log level (trace, debug, info, warn, error)
    FLOW_SNIFFER_MAX_BYTES  Override the sniff byte budget
    FLOW_SNIFFER_FAKEDNS    Enable or disable fake DNS (true/false)
"#,
        flow_sniffer::VERSION
    );
}

fn load(args: &Args) -> Result<Config> {
    if let Some(path) = &args.config_path {
        return load_config_with_env(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()));
    }
    let mut config = Config::default();
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

#[cfg(feature = "fakedns")]
fn build_registry(config: &Config, args: &Args, ctx: &mut SniffContext) -> Result<SnifferRegistry> {
    use std::net::IpAddr;
    use std::sync::Arc;

    use flow_sniffer::fakedns::FakeDnsManager;

    if !config.fakedns.enabled && args.fake_domain.is_none() {
        return Ok(SnifferRegistry::new());
    }

    let manager = Arc::new(FakeDnsManager::new(&config.fakedns));
    if let Some(domain) = &args.fake_domain {
        let ip = manager.map_domain_ipv4(domain)?;
        let port = ctx.destination.map_or(443, |d| d.port());
        ctx.destination = Some(SocketAddr::new(IpAddr::V4(ip), port));
        info!("Mapped {} to fake address {}", domain, ip);
    }

    Ok(SnifferRegistry::new().with_fake_dns(manager))
}

#[cfg(not(feature = "fakedns"))]
fn build_registry(_config: &Config, args: &Args, _ctx: &mut SniffContext) -> Result<SnifferRegistry> {
    if args.fake_domain.is_some() {
        bail!("--fake-domain requires the fakedns feature");
    }
    Ok(SnifferRegistry::new())
}

async fn open_input(input: &str) -> Result<Box<dyn AsyncRead + Unpin + Send>> {
    if input == "-" {
        return Ok(Box::new(tokio::io::stdin()));
    }
    let file = tokio::fs::File::open(input)
        .await
        .with_context(|| format!("Failed to open {input}"))?;
    Ok(Box::new(file))
}

fn report(outcome: &std::result::Result<SniffResult, SessionError>) -> serde_json::Value {
    match outcome {
        Ok(result) => json!({
            "protocol": result.protocol(),
            "domain": result.domain(),
            "result": result,
        }),
        Err(e) => json!({ "error": e.to_string() }),
    }
}

/// Main application entry point
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse()?;

    // Handle generate-config
    if args.generate_config {
        let Some(path) = &args.config_path else {
            bail!("--generate-config needs --config <PATH>");
        };
        flow_sniffer::config::create_default_config(path)?;
        println!("Generated default configuration at {}", path.display());
        return Ok(());
    }

    let mut config = load(&args)?;

    if args.check_config {
        println!("Configuration is valid");
        return Ok(());
    }

    init_logging(&config.log, &LogHandlerRegistry::default())?;
    info!("flow-sniffer v{}", flow_sniffer::VERSION);

    if args.metadata_only {
        config.sniff.metadata_only = true;
    }

    let mut ctx = SniffContext {
        network: args.network,
        destination: args.destination,
    };
    let registry = build_registry(&config, &args, &mut ctx)?;
    debug!("Sniffing with {:?} for {:?}", registry, ctx);

    let mut session = SniffSession::new(&registry, ctx, &config.sniff)?;

    let outcome = match (args.input.as_deref(), ctx.network.is_datagram()) {
        (Some(input), true) => {
            let datagram = if input == "-" {
                let mut buf = Vec::new();
                tokio::io::AsyncReadExt::read_to_end(&mut tokio::io::stdin(), &mut buf).await?;
                buf
            } else {
                tokio::fs::read(input)
                    .await
                    .with_context(|| format!("Failed to read {input}"))?
            };
            session.sniff_datagram(&datagram)
        }
        (Some(input), _) => {
            let mut reader = open_input(input).await?;
            session.sniff_stream(&mut reader).await
        }
        (None, _) if config.sniff.metadata_only => session.feed(&[]),
        (None, _) => bail!("No input given; see --help"),
    };

    info!(
        "Sniffed {} bytes in {} attempts",
        session.buffered().len(),
        session.attempts()
    );
    println!("{}", serde_json::to_string_pretty(&report(&outcome))?);

    if outcome.is_err() {
        std::process::exit(2);
    }
    Ok(())
}
