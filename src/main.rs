//! emolens - command-line client for the video emotion-analysis service.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (connection, config, authentication, etc.)
//!   2 - The followed analysis failed

use anyhow::{bail, Context, Result};
use emolens::analysis::{generate_summary_text, StatusSummary};
use emolens::api::{ApiClient, UploadRequest, VideoBackend};
use emolens::cli::{Args, Command, OutputFormat};
use emolens::config::{Config, CONFIG_FILE_NAME};
use emolens::detail::DetailView;
use emolens::error::StoreError;
use emolens::models::{AnalysisRecord, AnalysisStatus, Credentials, StatusEvent};
use emolens::report;
use emolens::session::{FileTokenStore, MemoryTokenStore, Session, TokenStore, TOKEN_KEY};
use emolens::store::AnalysisCollectionStore;
use emolens::sync::{HttpEventStream, ReconcilePolicy, Reconciler, SyncSession, SyncStats};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    debug!("emolens v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .emolens.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to point at your API server and event stream.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Dispatch the selected command. Returns the process exit code.
async fn run(args: Args) -> Result<i32> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    if let Err(e) = config.validate() {
        bail!("Invalid configuration: {}", e);
    }

    let client = ApiClient::new(&config.api).context("Failed to create API client")?;
    let mut session = Session::new(client.clone(), token_store(&args, &config)?);

    let Some(command) = args.command.clone() else {
        bail!("No command given");
    };

    match command {
        Command::Login { email, password } => {
            let password = password_or_prompt(password)?;
            let user = session.login(&email, &password).await?;
            println!("✅ Logged in as {} ({})", user.username, user.email);
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            let password = password_or_prompt(password)?;
            let credentials = Credentials {
                username: Some(username),
                email,
                password,
            };
            let user = session.register(&credentials).await?;
            println!("✅ Account created for {}. Log in with `emolens login`.", user.email);
        }
        Command::Logout => {
            session.logout()?;
            println!("👋 Logged out.");
        }
        Command::Whoami => match session.restore().await? {
            Some(user) => println!("{} <{}> (id {})", user.username, user.email, user.id),
            None => {
                println!("Not logged in.");
                return Ok(1);
            }
        },
        Command::List => {
            require_login(&mut session).await?;
            let store = new_store(&client);
            store.initialize().await?;
            let records = store.records();
            let output = match args.format {
                OutputFormat::Json => report::generate_list_json(&records)?,
                OutputFormat::Markdown => report::generate_list_markdown(&records),
            };
            println!("{}", output);
        }
        Command::Show { id, follow } => {
            require_login(&mut session).await?;
            let store = initialized_store(&client).await;
            return show(&client, &config, &store, &id, follow, args.format).await;
        }
        Command::Rename { id, title } => {
            require_login(&mut session).await?;
            let store = new_store(&client);
            store.initialize().await?;
            match store.update_title(&id, &title).await {
                Ok(()) => println!("✏️  Renamed {} to \"{}\"", id, title),
                Err(StoreError::UnknownRecord(_)) => bail!("No analysis with id {}", id),
                Err(e) => return Err(e.into()),
            }
        }
        Command::Upload {
            file,
            title,
            follow,
        } => {
            require_login(&mut session).await?;
            let request = UploadRequest::new(file, title)?;
            let store = initialized_store(&client).await;
            let record = upload_with_spinner(&client, &request, args.quiet).await?;
            store.add_record(record.clone());
            println!("✅ Uploaded \"{}\" (id {})", record.title, record.id);
            let summary = StatusSummary::from_records(&store.records());
            println!("   {}", generate_summary_text(&summary));

            if follow {
                return show(&client, &config, &store, &record.id, true, args.format).await;
            }
            println!("   Follow it with: emolens show {} --follow", record.id);
        }
        Command::Watch {
            no_events,
            no_reconcile,
        } => {
            require_login(&mut session).await?;
            watch(&client, &config, !no_events, !no_reconcile).await?;
        }
    }

    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// `--token` wins over the stored session and is never written to disk.
fn token_store(args: &Args, config: &Config) -> Result<Box<dyn TokenStore>> {
    if let Some(ref token) = args.token {
        let store = MemoryTokenStore::default();
        store.set(TOKEN_KEY, token)?;
        return Ok(Box::new(store));
    }

    let store = match config.session.token_file {
        Some(ref path) => FileTokenStore::new(path),
        None => FileTokenStore::default_location()?,
    };
    debug!("Session file: {}", store.path().display());
    Ok(Box::new(store))
}

async fn require_login(session: &mut Session) -> Result<()> {
    if session.restore().await?.is_none() {
        bail!("Not logged in. Run `emolens login --email <EMAIL>` first.");
    }
    Ok(())
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    print!("Password: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read password")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("Password cannot be empty");
    }
    Ok(password)
}

/// A store loaded from the server, or empty with a warning when the list fails.
async fn initialized_store(client: &ApiClient) -> AnalysisCollectionStore {
    let store = new_store(client);
    if let Err(e) = store.initialize().await {
        warn!("{}", e);
    }
    store
}

fn new_store(client: &ApiClient) -> AnalysisCollectionStore {
    let backend: Arc<dyn VideoBackend> = Arc::new(client.clone());
    AnalysisCollectionStore::new(backend)
}

async fn upload_with_spinner(
    client: &ApiClient,
    request: &UploadRequest,
    quiet: bool,
) -> Result<AnalysisRecord> {
    let spinner = if quiet {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    };

    let result = client
        .upload_video(request, |stage| {
            if let Some(ref pb) = spinner {
                pb.set_message(stage.message());
            }
        })
        .await;

    if let Some(pb) = spinner {
        match &result {
            Ok(_) => pb.finish_with_message("Upload complete"),
            Err(_) => pb.abandon_with_message("Upload failed"),
        }
    }

    result.with_context(|| format!("Failed to upload {}", request.path.display()))
}

/// Render one analysis, optionally waiting for it to finish first.
async fn show(
    client: &ApiClient,
    config: &Config,
    store: &AnalysisCollectionStore,
    id: &str,
    follow: bool,
    format: OutputFormat,
) -> Result<i32> {
    let backend: Arc<dyn VideoBackend> = Arc::new(client.clone());
    let mut view = DetailView::new(id, backend, store.clone());
    let status = view.load().await?.status;

    if follow && !status.is_terminal() {
        follow_until_done(client, config, store, &mut view).await?;
    }

    let Some(detail) = view.detail() else {
        bail!("No data for analysis {}", id);
    };
    let output = match format {
        OutputFormat::Json => report::generate_detail_json(detail)?,
        OutputFormat::Markdown => report::generate_detail_markdown(detail),
    };
    println!("{}", output);

    Ok(if detail.status == AnalysisStatus::Failed { 2 } else { 0 })
}

async fn follow_until_done(
    client: &ApiClient,
    config: &Config,
    store: &AnalysisCollectionStore,
    view: &mut DetailView,
) -> Result<()> {
    let mut updates = store.subscribe();
    let (session, reconciler, _) = start_sync(client, config, store, true, true).await;
    println!("⏳ Waiting for analysis {} to finish (Ctrl+C to stop)...", view.id());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let done = view.update_from_store().await?;
        if let Some(d) = view.detail() {
            debug!("{} is {} ({}%)", d.id, d.status, d.progress);
        }
        if done {
            break;
        }
    }

    stop_sync(session, reconciler).await;
    Ok(())
}

/// Follow status changes for the whole collection until Ctrl+C.
async fn watch(
    client: &ApiClient,
    config: &Config,
    events: bool,
    reconcile: bool,
) -> Result<()> {
    let store = initialized_store(client).await;
    let summary = StatusSummary::from_records(&store.records());
    println!("{}", generate_summary_text(&summary));

    let (session, reconciler, observed) =
        start_sync(client, config, &store, events, reconcile).await;
    if session.is_none() && reconciler.is_none() {
        bail!("Neither the event stream nor the reconciliation poll is available");
    }
    let mut observed = observed;
    println!("👀 Watching for changes (Ctrl+C to stop)...");

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = recv_or_pending(&mut observed) => event,
        };
        match event {
            Some(event) => print_event(&store, &event),
            None => {
                warn!("Event stream ended, relying on periodic refresh");
                observed = None;
            }
        }
    }

    let stats = stop_sync(session, reconciler).await;
    println!(
        "\n📊 {} events applied, {} for unknown analyses, {} stale",
        stats.applied, stats.unknown, stats.stale
    );
    Ok(())
}

/// Start the push session and the reconciler as enabled.
async fn start_sync(
    client: &ApiClient,
    config: &Config,
    store: &AnalysisCollectionStore,
    events: bool,
    reconcile: bool,
) -> (
    Option<SyncSession>,
    Option<Reconciler>,
    Option<mpsc::UnboundedReceiver<StatusEvent>>,
) {
    let mut session = None;
    let mut observed = None;
    if events && config.events.enabled {
        let token = client.token();
        match HttpEventStream::connect(&config.events.url, token.as_deref()).await {
            Ok(stream) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let pump = SyncSession::start_with_observer(store.clone(), stream, Some(tx));
                session = Some(pump);
                observed = Some(rx);
            }
            Err(e) => warn!("Push updates unavailable: {}", e),
        }
    }

    let reconciler = (reconcile && config.reconcile.enabled)
        .then(|| Reconciler::start(store.clone(), ReconcilePolicy::from(&config.reconcile)));

    (session, reconciler, observed)
}

async fn stop_sync(session: Option<SyncSession>, reconciler: Option<Reconciler>) -> SyncStats {
    if let Some(reconciler) = reconciler {
        reconciler.stop().await;
    }
    match session {
        Some(session) => session.stop().await,
        None => SyncStats::default(),
    }
}

async fn recv_or_pending(
    rx: &mut Option<mpsc::UnboundedReceiver<StatusEvent>>,
) -> Option<StatusEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn print_event(store: &AnalysisCollectionStore, event: &StatusEvent) {
    let title = store
        .get(&event.video_id)
        .map(|r| r.title)
        .unwrap_or_else(|| event.video_id.clone());

    match event.status {
        AnalysisStatus::Processing => {
            println!("{} {}: {}%", event.status.emoji(), title, event.progress)
        }
        _ => println!("{} {}: {}", event.status.emoji(), title, event.status),
    }

    if let Some(id) = store.consume_just_completed() {
        info!("Analysis {} completed; run `emolens show {}` for insights", id, id);
    }
}
