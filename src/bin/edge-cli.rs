use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use tenant_edge::config::load_config;
use tenant_edge::http::EdgeSnapshot;
use tenant_edge::proxy::TransportPolicy;
use tenant_edge::routing::RouteRule;

#[derive(Parser)]
#[command(name = "edge-cli")]
#[command(about = "Inspect a tenant-edge configuration offline", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "config/edge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and print the route table
    Check,
    /// Show how a request would be routed, without forwarding it
    Route {
        #[arg(long)]
        host: String,
        #[arg(long)]
        path: String,
        #[arg(long, default_value = "GET")]
        method: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let snapshot = EdgeSnapshot::from_config(&config)?;

    let output = match cli.command {
        Commands::Check => json!({
            "config": cli.config.display().to_string(),
            "default_tenant": snapshot.resolver.default_tenant().as_str(),
            "hosts": config.hosts.iter().map(|h| json!({ "host": h.name, "tenant": h.tenant })).collect::<Vec<_>>(),
            "tls": config.tls.is_some(),
            "routes": snapshot.routes.rules().iter().map(describe_rule).collect::<Vec<_>>(),
        }),
        Commands::Route { host, path, method } => {
            let resolution = snapshot.resolver.resolve(Some(host.as_str()));
            let tenant_source = if resolution.is_fallback() { "default" } else { "configured" };
            let (path, query) = match path.split_once('?') {
                Some((path, query)) => (path.to_string(), Some(query.to_string())),
                None => (path, None),
            };

            let route = match snapshot.routes.match_path(&path) {
                Some(matched) => {
                    let forwarded = match &query {
                        Some(query) => format!("{}?{}", matched.path, query),
                        None => matched.path.to_string(),
                    };
                    json!({
                        "rule": describe_rule(matched.rule),
                        "forwarded_path": forwarded,
                        "rewritten": matched.is_rewritten(),
                    })
                }
                None => json!({ "status": 404, "error": "no matching route" }),
            };

            json!({
                "method": method.to_uppercase(),
                "host": host,
                "tenant": resolution.tenant().as_str(),
                "tenant_source": tenant_source,
                "rejected_host": resolution.is_fallback() && snapshot.strict_hosts,
                "route": route,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn describe_rule(rule: &RouteRule) -> Value {
    json!({
        "name": rule.name,
        "matcher": rule.matcher.describe(),
        "strip_prefix": rule.rewrite.as_ref().map(|r| r.prefix()),
        "upstream": rule.upstream.name(),
        "address": rule.upstream.authority().as_str(),
        "policy": describe_policy(&rule.policy),
    })
}

fn describe_policy(policy: &TransportPolicy) -> Value {
    json!({
        "name": policy.name,
        "connect_timeout_secs": policy.connect_timeout.as_secs(),
        "read_timeout_secs": policy.read_timeout.as_secs(),
        "write_timeout_secs": policy.write_timeout.as_secs(),
        "buffering": policy.buffering,
        "upgrade": policy.upgrade,
        "extra_headers": policy
            .extra_headers
            .iter()
            .map(|(name, value)| (name.to_string(), Value::from(value.to_str().unwrap_or_default())))
            .collect::<serde_json::Map<_, _>>(),
    })
}
