use clap::Parser;
use config::Config;
use detector::Agent;
use flume::bounded;
use procsentry::{
    cli::Cli,
    signals::{SignalEvent, wait_for_signal},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // NOTE: The verbosity flag takes precedence over the environment variable
    // for log control. `PROCSENTRY_LOG` can only set the log level per crate,
    // e.g. `PROCSENTRY_LOG=detector::intel=debug procsentry`.
    let env_filter = EnvFilter::builder()
        .with_env_var("PROCSENTRY_LOG")
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
    let mut config = match &cli.conffile {
        Some(path) => Config::load(path)?,
        _ => {
            let mut candidates = glob::glob("/etc/procsentry/config.d/*.toml")?
                .filter_map(Result::ok)
                .collect::<Vec<_>>();
            candidates.insert(0, "/etc/procsentry/config.toml".into());
            trace!(?candidates, "config file candidates");
            Config::load_multiple(candidates)?
        }
    };
    if let Some(port) = cli.port {
        config.monitor.rpc_port = port;
    }
    debug!(?config, ?cli);

    #[cfg(unix)]
    if !nix::unistd::Uid::effective().is_root() {
        warn!("not running as root; some processes will be skipped");
    }

    // install signal handlers
    let (signals_tx, signals_rx) = bounded(8);
    let mut signal_handle = tokio::spawn(async move { wait_for_signal(signals_tx).await });

    let agent = Agent::build(config)?;
    let listener = agent.bind().await?;
    info!(addr = %listener.local_addr()?, "procsentry started");

    let cancel = CancellationToken::new();
    let run = agent.run(listener, cancel.clone());
    tokio::pin!(run);

    loop {
        tokio::select! {
            // bubble up any errors from the signal handlers
            res = &mut signal_handle => {
                let res = res?;
                if let Err(err) = &res {
                    error!("error happened during handling signals: {}", err);
                }
                res?;
                break;
            }

            // the agent only returns after cancellation or a fatal error
            res = &mut run => {
                if let Err(err) = &res {
                    error!("error happened in agent: {}", err);
                }
                res?;
                return Ok(());
            }

            // handle the signal events
            event_res = signals_rx.recv_async() => {
                let event = event_res?;
                debug!(?event, "Received signal event");

                match event {
                    SignalEvent::Shutdown => {
                        info!("shutdown requested");
                        break;
                    }
                    SignalEvent::DumpStatus => agent.dump_status(),
                    SignalEvent::ScanNow => {
                        info!("manual scan requested");
                        agent.request_scan();
                    }
                }
            }
        }
    }

    cancel.cancel();
    run.await?;
    info!("procsentry stopped");
    Ok(())
}
