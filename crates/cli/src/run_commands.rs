use std::{io, sync::Arc, time::Instant};

use {
    anyhow::Result,
    beacon_commands::Console,
    beacon_config::BeaconConfig,
    beacon_gateway::{
        ConnectionSupervisor, CredentialRegistry, PresenceSpec, Target, TungsteniteConnector,
    },
    tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    tracing::{error, info, warn},
};

pub async fn run(config: BeaconConfig, autostart: bool, console_enabled: bool) -> Result<()> {
    let started = Instant::now();
    let supervisor =
        ConnectionSupervisor::from_config(&config, Arc::new(TungsteniteConnector::new()))?;
    info!(
        credentials = supervisor.credentials().len(),
        gateway = %config.gateway.url,
        "supervisor ready"
    );

    if config.server.enabled {
        let bind = config.server.bind.clone();
        let port = config.server.port;
        tokio::spawn(async move {
            if let Err(e) = beacon_server::serve(&bind, port, started).await {
                error!(error = %e, "keep-alive server stopped");
            }
        });
    }

    if autostart {
        match supervisor.start(&Target::All).await {
            Ok(report) => info!(count = report.affected.len(), "sessions started"),
            Err(e) => warn!(error = %e, "autostart skipped"),
        }
    }

    let console = Console::new(supervisor.clone(), config.console.prefix.clone());
    if console_enabled {
        info!(prefix = console.prefix(), "console ready, type {}help", console.prefix());
        let stdin = BufReader::new(tokio::io::stdin());
        match read_console(&console, stdin, tokio::signal::ctrl_c()).await? {
            ConsoleExit::Interrupted => info!("interrupt received"),
            ConsoleExit::InputClosed => info!("console input closed"),
        }
    } else {
        tokio::signal::ctrl_c().await?;
        info!("interrupt received");
    }

    supervisor.shutdown_all().await;
    info!("shutdown complete");
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum ConsoleExit {
    Interrupted,
    InputClosed,
}

/// Run console lines until input ends or `interrupt` fires.
///
/// The interrupt only cuts short the wait for the next line. A command
/// already executing, such as a stop waiting on its teardowns, runs to
/// completion first.
async fn read_console<R, I>(console: &Console, reader: R, interrupt: I) -> Result<ConsoleExit>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = io::Result<()>>,
{
    let mut lines = reader.lines();
    tokio::pin!(interrupt);
    loop {
        let next = tokio::select! {
            biased;
            result = &mut interrupt => {
                result?;
                return Ok(ConsoleExit::Interrupted);
            },
            next = lines.next_line() => next,
        };
        match next {
            Ok(Some(line)) => {
                if let Some(reply) = console.handle_line(&line).await {
                    println!("{reply}");
                }
            },
            Ok(None) => return Ok(ConsoleExit::InputClosed),
            Err(e) => {
                warn!(error = %e, "console read failed");
                return Ok(ConsoleExit::InputClosed);
            },
        }
    }
}

/// Validate presence settings and print what would be connected.
pub fn check(config: &BeaconConfig) -> Result<()> {
    let spec = PresenceSpec::from_config(&config.presence)?;
    let registry = CredentialRegistry::new(config.credentials());

    println!("gateway:     {}", config.gateway.url);
    println!("status:      {}", spec.base_status);
    match &spec.activity {
        Some(activity) => println!("activity:    {} (type {})", activity.name, activity.kind),
        None => println!("activity:    disabled"),
    }
    if config.server.enabled {
        println!(
            "keep-alive:  http://{}:{}",
            config.server.bind, config.server.port
        );
    }
    println!("credentials: {}", registry.len());
    for credential in registry.iter() {
        println!("  {} {}", credential.id(), credential.masked());
    }

    if registry.is_empty() {
        anyhow::bail!("no credentials configured; set `credentials` or USER_TOKENS");
    }
    Ok(())
}
