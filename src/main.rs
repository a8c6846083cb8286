use anyhow::Context;
use clap::{Parser, Subcommand};
use dbus2vdr::config::{self, Config};
use dbus2vdr::{BusKind, DbusTransport, ServiceWatchdog, Signal, Value, WatchdogBuilder};
use std::sync::Arc;
use tracing::{info, Subscriber};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "dbus2vdr")]
#[command(author, version, about = "Talk to VDR over D-Bus", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// VDR instance number (0 = de.tvdr.vdr)
    #[arg(long, global = true)]
    instance: Option<u32>,

    /// Use the session bus instead of the system bus
    #[arg(long, global = true)]
    session: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether VDR is running
    Status,

    /// Follow VDR starting and stopping and print its signals
    Watch,

    /// Query channels
    Channels {
        #[command(subcommand)]
        action: ChannelAction,
    },

    /// Read and write setup options
    Setup {
        #[command(subcommand)]
        action: SetupAction,
    },

    /// Show a message on the OSD
    Message {
        /// Message text
        text: String,
    },

    /// Send remote control keys
    Keys {
        /// Key names (e.g. "Menu", "Down", "Ok")
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Ask VDR whether it may shut down
    Shutdown {
        /// Ignore user activity
        #[arg(long)]
        ignore_user: bool,
    },

    /// List loaded plugins
    Plugins,

    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[derive(Subcommand)]
enum ChannelAction {
    /// Print the current channel
    Current,
    /// Print the number of channels
    Count,
}

#[derive(Subcommand)]
enum SetupAction {
    /// Print the value of one option
    Get {
        /// Option name (e.g. "MarginStart")
        option: String,
    },
    /// Print every option
    List,
    /// Change an option
    Set {
        /// Option name
        option: String,
        /// New value; integers are sent as integers
        value: String,
    },
}

fn log_subscriber(verbose: bool, level: &str) -> impl Subscriber + Send + Sync + 'static {
    let filter = if verbose {
        EnvFilter::new("dbus2vdr=debug,zbus=info")
    } else {
        EnvFilter::new(format!("dbus2vdr={},zbus=warn", level))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
}

fn init_logging(verbose: bool, level: &str) {
    log_subscriber(verbose, level).init();
}

/// Setup values typed on the command line: integers stay integers.
fn parse_setup_value(raw: &str) -> Value {
    match raw.parse::<i32>() {
        Ok(number) => Value::Int32(number),
        Err(_) => Value::from(raw),
    }
}

fn print_signal(signal: &Signal) {
    let params: Vec<String> = signal.parameters.iter().map(ToString::to_string).collect();
    println!(
        "{} {}.{}({})",
        signal.object_path,
        signal.interface,
        signal.member,
        params.join(", ")
    );
}

async fn connect(config: &Config, watchdog: bool) -> anyhow::Result<ServiceWatchdog> {
    let transport = DbusTransport::connect(config.bus.bus)
        .await
        .with_context(|| format!("Failed to connect to the {:?} bus", config.bus.bus))?;
    let watchdog = WatchdogBuilder::new(Arc::new(transport))
        .instance(config.bus.instance)
        .watchdog(watchdog)
        .on_status_change(|running| {
            info!("VDR is {}", if running { "running" } else { "not running" })
        })
        .connect()
        .await?;
    Ok(watchdog)
}

/// Connect and fail unless VDR is up.
async fn connect_running(config: &Config) -> anyhow::Result<ServiceWatchdog> {
    let watchdog = connect(config, false).await?;
    if !watchdog.is_running() {
        anyhow::bail!("{} is not running", watchdog.identity());
    }
    Ok(watchdog)
}

async fn watch(config: &Config) -> anyhow::Result<()> {
    let watchdog = connect(config, true).await?;
    let _status = watchdog.signals().status_signals(print_signal).await?;
    let _service = watchdog.signals().service_signals(print_signal).await?;

    info!("Watching {}, press Ctrl-C to stop", watchdog.identity());
    tokio::signal::ctrl_c().await?;
    info!("Stopped watching");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The configured level is not known yet; log the first-run save at info.
    let mut config = {
        let _guard = tracing::subscriber::set_default(log_subscriber(cli.verbose, "info"));
        Config::load()?
    };
    if let Some(instance) = cli.instance {
        config.bus.instance = instance;
    }
    if cli.session {
        config.bus.bus = BusKind::Session;
    }
    init_logging(cli.verbose, &config.logging.level);

    match cli.command {
        Commands::Status => {
            let watchdog = connect(&config, false).await?;
            if watchdog.is_running() {
                println!("{} is running", watchdog.identity());
            } else {
                println!("{} is not running", watchdog.identity());
            }
        }

        Commands::Watch => watch(&config).await?,

        Commands::Channels { action } => {
            let watchdog = connect_running(&config).await?;
            let channels = watchdog.channels()?;
            match action {
                ChannelAction::Current => {
                    let reply = channels.current().await?;
                    let fields: Vec<String> =
                        reply.values().iter().map(ToString::to_string).collect();
                    println!("{}", fields.join(" "));
                }
                ChannelAction::Count => println!("{}", channels.count().await?),
            }
        }

        Commands::Setup { action } => {
            let watchdog = connect_running(&config).await?;
            let setup = watchdog.setup()?;
            match action {
                SetupAction::Get { option } => {
                    println!("{}", setup.get_value(&option).await?);
                }
                SetupAction::List => {
                    for entry in setup.entries().await? {
                        match (&entry.min, &entry.max) {
                            (Some(min), Some(max)) => {
                                println!("{} = {} [{}..{}]", entry.name, entry.value, min, max)
                            }
                            (None, Some(max)) => {
                                println!("{} = {} [..{}]", entry.name, entry.value, max)
                            }
                            _ => println!("{} = {}", entry.name, entry.value),
                        }
                    }
                }
                SetupAction::Set { option, value } => {
                    let reply = setup.set(&option, parse_setup_value(&value)).await?;
                    let fields: Vec<String> =
                        reply.values().iter().map(ToString::to_string).collect();
                    println!("{}", fields.join(" "));
                }
            }
        }

        Commands::Message { text } => {
            let watchdog = connect_running(&config).await?;
            watchdog.skin()?.queue_message(&text).await?;
        }

        Commands::Keys { keys } => {
            let watchdog = connect_running(&config).await?;
            watchdog.remote()?.hit_keys(keys).await?;
        }

        Commands::Shutdown { ignore_user } => {
            let watchdog = connect_running(&config).await?;
            let reply = watchdog.shutdown()?.confirm(ignore_user).await?;
            println!("{}: {}", reply.code, reply.message);
            if !reply.hook_output.is_empty() {
                println!("{}", reply.hook_output);
            }
        }

        Commands::Plugins => {
            let watchdog = connect_running(&config).await?;
            for plugin in watchdog.plugins()?.list().await? {
                println!("{} {}", plugin.name, plugin.version);
            }
        }

        Commands::Config { show } => {
            if show {
                config::show()?;
            } else {
                println!("Config file: {}", Config::config_path()?.display());
            }
        }
    }

    Ok(())
}
