use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use jmeter_chat::api::BackendClient;
use jmeter_chat::app::App;
use jmeter_chat::config::Config;
use jmeter_chat::credentials::{mask_secret, CredentialStore};
use jmeter_chat::handler::handle_event;
use jmeter_chat::logging::{init_tracing, LOG_FILE};
use jmeter_chat::tui::{self, EventHandler};
use jmeter_chat::ui;

#[derive(Parser)]
#[command(name = "jmeter-chat")]
#[command(about = "Terminal chat client for the JMeter assistant backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Backend base URL
    #[arg(long, env = "JMETER_CHAT_SERVER_URL")]
    server_url: Option<String>,

    /// Seconds between job status polls
    #[arg(long, env = "JMETER_CHAT_POLL_INTERVAL")]
    poll_interval: Option<u64>,

    /// Directory holding config.json and credentials.json
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Log file path (defaults to jmeter-chat.log in the config directory)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective settings and exit
    PrintConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => Config::default_dir()?,
    };
    let store = CredentialStore::in_dir(&config_dir);

    if let Some(Commands::PrintConfig) = cli.command {
        let mut config = Config::load(&config_dir)?;
        config.apply_overrides(cli.server_url, cli.poll_interval);
        print_config(&config, &store);
        return Ok(());
    }

    let log_path = cli.log_file.unwrap_or_else(|| config_dir.join(LOG_FILE));
    init_tracing(&log_path)?;

    let mut config = Config::load_or_init(&config_dir)?;
    config.apply_overrides(cli.server_url, cli.poll_interval);
    tracing::info!(
        server = %config.server_url(),
        poll_interval_secs = config.poll_interval().as_secs(),
        "Starting jmeter-chat"
    );

    let client = BackendClient::new(config.server_url(), config.request_timeout())?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(client, store, config.poll_interval(), events.sender());

    let result = run(&mut terminal, &mut events, &mut app).await;

    tui::restore()?;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Exited with error");
    }
    result
}

async fn run(terminal: &mut tui::Tui, events: &mut EventHandler, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handle_event(app, event).await?;
        app.poll_tasks().await;
    }
    Ok(())
}

fn print_config(config: &Config, store: &CredentialStore) {
    println!("server_url:         {}", config.server_url());
    println!("poll_interval_secs: {}", config.poll_interval().as_secs());
    println!("request_timeout:    {}s", config.request_timeout().as_secs());
    println!("credentials file:   {}", store.path().display());
    match store.get() {
        Some(credentials) => {
            println!("jmeter_path:        {}", credentials.jmeter_path);
            println!("openai_key:         {}", mask_secret(&credentials.openai_key));
        }
        None => println!("credentials:        not configured"),
    }
}
