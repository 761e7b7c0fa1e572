//! h2-session command-line client.
//!
//! Opens one session to an origin, sends a request (or several concurrent
//! copies of it through the session's gate) and prints the response.
//!
//! ```text
//! h2-session https://example.com /api -X POST --json '{"a":1}' -H 'x-trace: 1' -i
//! h2-session http://127.0.0.1:8080 /delay/100 --repeat 20 --concurrency 4
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use futures_util::future::join_all;

use h2_session::config::loader::load_config;
use h2_session::config::ClientConfig;
use h2_session::observability::logging::init_logging;
use h2_session::observability::metrics::init_metrics;
use h2_session::{Method, Protocol, RequestOptions, Response, Session};

#[derive(Parser, Debug)]
#[command(name = "h2-session")]
#[command(about = "Send HTTP/2 requests over a single session", long_about = None)]
struct Cli {
    /// Origin, e.g. https://example.com (falls back to the config file)
    origin: Option<String>,

    /// Request path
    #[arg(default_value = "/")]
    path: String,

    #[arg(short = 'X', long, default_value = "GET")]
    method: Method,

    /// Header as `name: value` (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Text body
    #[arg(short, long, conflicts_with = "json")]
    data: Option<String>,

    /// JSON body
    #[arg(long)]
    json: Option<String>,

    /// Query pair as `key=value` (repeatable)
    #[arg(long)]
    query: Vec<String>,

    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long)]
    protocol: Option<Protocol>,

    /// Skip TLS certificate verification
    #[arg(short = 'k', long)]
    insecure: bool,

    /// Maximum concurrent requests on the session
    #[arg(long)]
    concurrency: Option<usize>,

    /// Send the request this many times concurrently
    #[arg(long, default_value_t = 1)]
    repeat: usize,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    metrics_address: Option<String>,

    #[arg(long)]
    log_level: Option<String>,

    /// Print response headers
    #[arg(short = 'i', long)]
    include: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };

    init_logging(Some(cli.log_level.as_deref().unwrap_or(&config.observability.log_level)));

    let metrics_address = cli.metrics_address.clone().or_else(|| {
        config
            .observability
            .metrics_enabled
            .then(|| config.observability.metrics_address.clone())
    });
    if let Some(address) = metrics_address {
        match address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(metrics_address = %address, "Failed to parse metrics address"),
        }
    }

    let origin = cli
        .origin
        .clone()
        .or_else(|| config.origin.clone())
        .ok_or("no origin given on the command line or in the config file")?;

    let options = &mut config.session;
    if let Some(timeout_ms) = cli.timeout_ms {
        options.timeout_ms = timeout_ms;
    }
    if let Some(protocol) = cli.protocol {
        options.protocol = Some(protocol);
    }
    if cli.insecure {
        options.tls_verify = false;
    }
    if let Some(limit) = cli.concurrency {
        options.concurrency = Some(limit);
    }

    let request = request_options(&cli)?;
    let session = Session::connect(&origin, config.session).await?;

    if cli.repeat <= 1 {
        let result = session.request(cli.method, &cli.path, request).await;
        session.close();
        print_response(&result?, cli.include);
        return Ok(());
    }

    let start = Instant::now();
    let results = join_all(
        (0..cli.repeat).map(|_| session.request(cli.method, &cli.path, request.clone())),
    )
    .await;
    let elapsed = start.elapsed();
    session.close();

    let mut failures = 0;
    for (i, result) in results.iter().enumerate() {
        match result {
            Ok(response) => println!("#{:<4} {}", i, response.status()),
            Err(e) => {
                failures += 1;
                println!("#{:<4} error: {}", i, e);
            }
        }
    }
    println!(
        "{} requests, {} failed, {:?} total ({:?} avg)",
        cli.repeat,
        failures,
        elapsed,
        elapsed / cli.repeat as u32
    );
    Ok(())
}

fn request_options(cli: &Cli) -> Result<RequestOptions, Box<dyn Error>> {
    let mut options = RequestOptions::new();
    for header in &cli.headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| format!("header {:?} is not `name: value`", header))?;
        options = options.header(name.trim(), value.trim());
    }
    for pair in &cli.query {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("query {:?} is not `key=value`", pair))?;
        options = options.query(key, value);
    }
    if let Some(data) = &cli.data {
        options = options.body(data.as_str());
    }
    if let Some(json) = &cli.json {
        let value: serde_json::Value = serde_json::from_str(json)?;
        options = options.body(value);
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        options = options.timeout(Duration::from_millis(timeout_ms));
    }
    Ok(options)
}

fn print_response(response: &Response, include: bool) {
    println!("{}", response.status());
    if include {
        for (name, value) in response.headers().iter() {
            println!("{}: {}", name, value);
        }
        println!();
    }
    if let Some(text) = response.text() {
        println!("{}", text);
    }
}
