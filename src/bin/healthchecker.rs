use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::process;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "healthchecker")]
#[command(about = "Probe a running Khmer NER service", long_about = None)]
struct Args {
    /// Base URL of the service; defaults to KHMER_NER_URL or http://localhost:8000
    #[arg(long)]
    url: Option<String>,
    /// Keep probing every N seconds instead of exiting after one check
    #[arg(long, value_name = "SECS")]
    watch: Option<u64>,
    #[arg(long, default_value_t = 5)]
    timeout: u64,
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    status: String,
    models_loaded: bool,
    #[serde(default)]
    device: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn check(client: &reqwest::blocking::Client, base: &str) -> Result<HealthBody> {
    let url = format!("{}/api/v1/health", base.trim_end_matches('/'));
    let resp = client
        .get(&url)
        .send()
        .with_context(|| format!("cannot reach {}", url))?;
    let status = resp.status();
    let body: HealthBody = resp
        .json()
        .with_context(|| format!("unexpected health response ({})", status))?;

    if status.is_success() && body.models_loaded {
        Ok(body)
    } else {
        Err(anyhow!(
            "{} ({}): {}",
            body.status,
            status,
            body.error.unwrap_or_else(|| "models not loaded".to_string())
        ))
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let base = args
        .url
        .or_else(|| std::env::var("KHMER_NER_URL").ok())
        .unwrap_or_else(|| "http://localhost:8000".to_string());

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()?;

    let Some(interval) = args.watch else {
        match check(&client, &base) {
            Ok(body) => {
                println!("healthy (device: {})", body.device.as_deref().unwrap_or("unknown"));
                return Ok(());
            }
            Err(e) => {
                eprintln!("unhealthy: {:#}", e);
                process::exit(1);
            }
        }
    };

    println!("Watching {} every {}s", base, interval);
    let mut healthy = None;
    loop {
        let result = check(&client, &base);
        let now = result.is_ok();
        if healthy != Some(now) {
            match &result {
                Ok(_) => println!("[healthchecker] service is healthy"),
                Err(e) => eprintln!("[healthchecker] service is unhealthy: {:#}", e),
            }
            healthy = Some(now);
        }
        thread::sleep(Duration::from_secs(interval.max(1)));
    }
}
