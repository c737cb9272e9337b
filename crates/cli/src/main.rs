use clap::Parser;
use config::Config;
use engine::Error;
use flume::bounded;
use malwatch::{
    app::{App, edit_actions},
    cli::{Cli, Command},
    signals::{SignalEvent, wait_for_signal},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG_FILE: &str = "/etc/malwatch/config.toml";

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // NOTE: The verbosity flag takes precedence over the environment variable
    // for log control. `MALWATCH_LOG` can only set the level per crate, e.g.
    // `MALWATCH_LOG=engine=debug malwatch scan`.
    let env_filter = EnvFilter::builder()
        .with_default_directive("sqlx=warn".parse()?)
        .with_env_var("MALWATCH_LOG")
        .from_env()?
        .add_directive(cli.verbosity.log_level_filter().as_str().parse()?);

    let layer = tracing_subscriber::fmt::layer()
        .with_level(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter)
        .init();

    // load config
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        _ => {
            let mut candidates = glob::glob("/etc/malwatch/config.d/*.toml")?
                .filter_map(Result::ok)
                .collect::<Vec<_>>();
            candidates.insert(0, CONFIG_FILE.into());
            trace!(?candidates, "config file candidates");
            Config::load_multiple(candidates)?
        }
    };
    debug!(command = ?cli.command, identifier = %config.identifier, threads = config.threads);

    if let Command::Actions(command) = &cli.command {
        let path = cli.config.clone().unwrap_or_else(|| CONFIG_FILE.into());
        edit_actions(&path, &config.actions, command)?;
        return Ok(());
    }

    // install signal handlers
    let cancel = CancellationToken::new();
    let (signals_tx, signals_rx) = bounded(8);
    let signal_handle = tokio::spawn(async move { wait_for_signal(signals_tx).await });
    let shutdown = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            while let Ok(event) = signals_rx.recv_async().await {
                match event {
                    SignalEvent::Shutdown if cancel.is_cancelled() => {
                        warn!("already shutting down");
                    }
                    SignalEvent::Shutdown => {
                        info!("shutting down");
                        cancel.cancel();
                    }
                }
            }
        }
    });

    let app = App::new(config).await?;
    let result = match &cli.command {
        Command::Scan { paths, unattended } => app
            .scan(&cancel, paths, *unattended)
            .await
            .map(|hits| info!(hits, "scan complete")),
        Command::Monitor => app.monitor(&cancel).await,
        Command::Restore { path } => app
            .restore(path)
            .await
            .map(|()| info!(path = %path.display(), "restored")),
        Command::Quarantine { path } => app
            .quarantine(path)
            .await
            .map(|status| println!("{status}")),
        Command::Exile { path } => app.exile(path).await.map(|status| println!("{status}")),
        Command::History(command) => app.history(command).await,
        Command::Actions(_) => Ok(()),
    };

    signal_handle.abort();
    shutdown.abort();

    match result {
        Ok(()) => Ok(()),
        Err(Error::Cancelled) => {
            info!("interrupted");
            Ok(())
        }
        Err(err) => {
            error!(%err, "fatal");
            Err(err.into())
        }
    }
}
