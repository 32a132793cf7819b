use serde::Serialize;
use server_onboarding::config::load_config;
use server_onboarding::{CanonicalUrl, ErrorKind, ValidationError, ensure_https, normalize};
use std::env;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_standard_tracing() {
    let default_directives = "server_onboarding=info,onboarding_check=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr);

    registry.with(layer).init();
}

#[derive(Serialize)]
struct CheckReport<'a> {
    input: &'a str,
    locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    canonical_url: Option<CanonicalUrl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn check(address: &str, path_override: Option<&str>) -> Result<CanonicalUrl, ValidationError> {
    let url = normalize(address, path_override)?;
    ensure_https(&url)?;
    Ok(url)
}

fn main() -> color_eyre::eyre::Result<ExitCode> {
    color_eyre::install()?;
    initialize_standard_tracing();

    let config = load_config()?;
    let user_input = env::args().nth(1).unwrap_or_default();
    if user_input.trim().is_empty() && !config.server_url_locked() {
        color_eyre::eyre::bail!("usage: onboarding-check <server-address>");
    }
    if config.server_url_locked() {
        tracing::info!("server address is provided by the deployment, ignoring input");
    }

    let address = config.effective_server_address(&user_input);
    let result = check(address, config.path_override());
    let ok = result.is_ok();
    let report = match result {
        Ok(url) => CheckReport {
            input: address,
            locked: config.server_url_locked(),
            canonical_url: Some(url),
            kind: None,
            error: None,
        },
        Err(e) => CheckReport {
            input: address,
            locked: config.server_url_locked(),
            canonical_url: None,
            kind: Some(e.kind()),
            error: Some(e.to_string()),
        },
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
