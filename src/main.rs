//! `caller`: send one HTTP call through the resilient call pipeline.
//!
//! ```text
//! caller [--config caller.toml] GET https://api.example.com/items \
//!     -H 'Accept: application/json' -q page=2 --cache --service catalog
//! ```

use std::path::PathBuf;

use clap::Parser;
use serde_json::{Map, Value};

use caller::config::{load_config, CallerConfig};
use caller::observability::logging::init_logging;
use caller::{Executor, Method, RequestModel, ResponseModel};

#[derive(Parser)]
#[command(name = "caller")]
#[command(about = "Send an HTTP call with retries, caching and circuit breaking", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP method (GET, POST, ...)
    method: String,

    /// Absolute URL, or a path joined onto the configured base URL
    url: String,

    /// Request header, `Name: value`
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Query parameter, `name=value`
    #[arg(short, long = "query")]
    query: Vec<String>,

    /// JSON request body
    #[arg(long, conflicts_with = "form")]
    json: Option<String>,

    /// Form field, `name=value`
    #[arg(long)]
    form: Vec<String>,

    /// Cache this call regardless of the configured default
    #[arg(long)]
    cache: bool,

    /// Circuit breaker service name
    #[arg(long)]
    service: Option<String>,

    /// Exit with an error on any non-2xx response
    #[arg(long)]
    throw: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => CallerConfig::default(),
    };
    init_logging(&config.logging);

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        retries = config.retry.max_attempts,
        cache = config.cache.enabled,
        circuit_breaker = config.circuit_breaker.enabled,
        "Configuration loaded"
    );

    let request = build_request(&cli)?;
    let executor = Executor::new(config)?;
    let response = executor.execute(request).await?;

    print_response(&response)?;
    Ok(())
}

fn build_request(cli: &Cli) -> Result<RequestModel, Box<dyn std::error::Error>> {
    let method: Method = cli.method.parse()?;
    let mut request = RequestModel::new(method, cli.url.as_str());

    for header in &cli.headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| format!("invalid header '{}', expected 'Name: value'", header))?;
        request = request.with_header(name.trim(), value.trim());
    }
    for pair in &cli.query {
        let (name, value) = split_pair(pair)?;
        request = request.with_query_param(name, value);
    }

    if let Some(json) = &cli.json {
        let value: Value = serde_json::from_str(json)?;
        request = request.with_json(value);
    } else if !cli.form.is_empty() {
        let mut fields = Map::new();
        for pair in &cli.form {
            let (name, value) = split_pair(pair)?;
            fields.insert(name.to_string(), Value::String(value.to_string()));
        }
        request = request.with_form_params(Value::Object(fields));
    }

    if cli.cache {
        request = request.cache(true);
    }
    if let Some(service) = &cli.service {
        request = request.service(service.as_str());
    }
    if cli.throw {
        request = request.throw();
    }
    Ok(request)
}

fn split_pair(pair: &str) -> Result<(&str, &str), String> {
    pair.split_once('=')
        .ok_or_else(|| format!("invalid pair '{}', expected 'name=value'", pair))
}

fn print_response(response: &ResponseModel) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(error) = response.error() {
        eprintln!("Error: {}", error);
        return Ok(());
    }

    let metadata = response.metadata();
    println!(
        "{} (attempts: {}, {:?}{})",
        response.status(),
        metadata.attempts,
        metadata.elapsed,
        if metadata.from_cache { ", cached" } else { "" }
    );
    if let Some(headers) = response.headers() {
        for (name, values) in headers.iter() {
            for value in values {
                println!("{}: {}", name, value);
            }
        }
    }
    println!();

    match response.json()? {
        Some(value) => println!("{}", serde_json::to_string_pretty(value)?),
        None => println!("{}", response.text()),
    }
    Ok(())
}
