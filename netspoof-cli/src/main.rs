use anyhow::{anyhow, Context, Result};
use netspoof_capture::PacketCapture;
use netspoof_cli::{Cli, Shell};
use netspoof_core::Session;
use netspoof_module::ModuleManager;
use netspoof_spoofers::{ArpSpoofer, DnsSpoofer, NdpSpoofer};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let params = cli.parse_params().map_err(|e| anyhow!(e))?;
    let aliases = cli.parse_aliases().map_err(|e| anyhow!(e))?;

    let session = Arc::new(
        Session::open(cli.interface.as_deref())
            .await
            .context("failed to open session")?,
    );
    info!(interface = %session.interface.name, "Using interface");

    let capture = Arc::new(PacketCapture::new(&session.interface.name));
    let manager = Arc::new(ModuleManager::new());
    manager.register(Arc::new(ArpSpoofer::new(Arc::clone(&session))));
    manager.register(Arc::new(NdpSpoofer::new(Arc::clone(&session))));
    manager.register(Arc::new(DnsSpoofer::new(Arc::clone(&session), capture)));

    for (name, value) in &params {
        session
            .params
            .set(name, value)
            .with_context(|| format!("-M {}={}", name, value))?;
    }
    for (name, mac) in aliases {
        session.set_alias(&name, mac);
    }

    let shell = Shell::new(Arc::clone(&session), Arc::clone(&manager));
    let mut stdout = tokio::io::stdout();

    for command in cli.eval_commands() {
        if shell.run_line(&command, &mut stdout).await? {
            return Ok(());
        }
    }

    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    shell
        .run(BufReader::new(tokio::io::stdin()), &mut stdout, interrupted)
        .await?;

    if let Err(e) = manager.stop_all().await {
        warn!(error = %e, "Some modules did not stop cleanly");
    }

    Ok(())
}
