//! Multi-tenant HTTP edge router.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                     TENANT EDGE                      │
//!   :80  ───────────▶│  redirect ── 301 https://host/path                   │
//!                    │                                                      │
//!   :443 ───────────▶│  tls (SNI) ─▶ http server ─▶ tenancy ─▶ routing      │
//!                    │                                            │         │
//!                    │                                            ▼         │
//!                    │                    response ◀── proxy forwarder ─────┼──▶ backend
//!                    │                                  (policy: timeouts,  │     llm-wrapper
//!                    │                                   buffering, upgrade)│     frontend
//!                    │                                                      │
//!                    │  config + reload │ observability │ lifecycle         │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "tenant-edge", version)]
#[command(about = "Multi-tenant HTTP edge router", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config/edge.toml")]
    config: PathBuf,

    /// Validate the configuration and certificates, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.check {
        let config = tenant_edge::lifecycle::check(&args.config)?;
        println!(
            "configuration ok: {} ({} routes, {} hosts)",
            args.config.display(),
            config.routes.len(),
            config.hosts.len()
        );
        return Ok(());
    }

    tenant_edge::lifecycle::run(&args.config).await?;
    Ok(())
}
