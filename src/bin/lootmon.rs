use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use lootmon::{
    analytics::{compute_snapshot, EventWindow, StatsSnapshot},
    config_manager::{AppConfig, ConfigManager, MonitorSettings},
    display::{write_snapshot, OutputFormat},
    io::read_events_from_file,
    monitor::{MonitorEvent, MonitorSession, StartOutcome, StopOutcome},
    utils,
};
use std::path::PathBuf;

/// ゲームのチャットログからYangとアイテムの獲得統計をリアルタイム表示
#[derive(Debug, Parser)]
#[command(name = "lootmon", version, about)]
struct Cli {
    /// ログレベル (trace/debug/info/warn/error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// 設定ファイルのパス（省略時はXDG設定ディレクトリ）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// ログを追跡して統計を定期的に表示（デフォルト）
    Watch(WatchArgs),
    /// ログ全体を一度だけ集計
    Analyze(AnalyzeArgs),
    /// 設定ファイルの操作
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Default, Args)]
struct WatchArgs {
    /// 監視するログファイル
    path: Option<PathBuf>,

    /// 集計ウィンドウ（分）
    #[arg(long)]
    window_minutes: Option<u32>,

    /// 更新間隔（秒）
    #[arg(long)]
    refresh_secs: Option<u64>,

    /// ファイル先頭から読み込む
    #[arg(long)]
    from_start: bool,

    /// 設定にかかわらず末尾から追跡する
    #[arg(long, conflicts_with = "from_start")]
    from_end: bool,

    /// NDJSONで出力
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct AnalyzeArgs {
    /// 集計するログファイル
    path: Option<PathBuf>,

    /// 最後のイベントから遡る集計ウィンドウ（分）。省略時はファイル全体
    #[arg(long)]
    window_minutes: Option<u32>,

    /// JSONで出力
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// 現在の設定を表示
    Show,
    /// 設定ファイルのパスを表示
    Path,
    /// 設定をデフォルトに戻す
    Reset,
}

fn output_format(json: bool) -> OutputFormat {
    if json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let command = cli.command.unwrap_or(Command::Watch(WatchArgs::default()));
    let config = load_config_for(&config_manager, &command)?;

    let _log_guard = utils::init_logging(&config.log, cli.log_level.as_deref())?;

    let result = match command {
        Command::Watch(args) => run_watch(&config, args).await,
        Command::Analyze(args) => run_analyze(&config, args),
        Command::Config { action } => run_config(&config_manager, &config, action),
    };

    if let Err(e) = &result {
        utils::log_error_with_context(e, "lootmon");
    }
    result
}

/// `config path` と `config reset` は壊れた設定ファイルでも動くよう読み込まない
fn load_config_for(
    config_manager: &ConfigManager,
    command: &Command,
) -> anyhow::Result<AppConfig> {
    match command {
        Command::Config {
            action: ConfigAction::Path | ConfigAction::Reset,
        } => Ok(AppConfig::default()),
        _ => config_manager.load_config(),
    }
}

/// コマンドライン引数で設定ファイルの監視設定を上書き
fn watch_settings(config: &AppConfig, args: &WatchArgs) -> MonitorSettings {
    let read_from_beginning = if args.from_start {
        true
    } else if args.from_end {
        false
    } else {
        config.monitor.read_from_beginning
    };

    MonitorSettings {
        log_path: args
            .path
            .clone()
            .unwrap_or_else(|| config.monitor.log_path.clone()),
        window_minutes: args
            .window_minutes
            .unwrap_or(config.monitor.window_minutes),
        refresh_secs: args.refresh_secs.unwrap_or(config.monitor.refresh_secs),
        read_from_beginning,
    }
}

async fn run_watch(config: &AppConfig, args: WatchArgs) -> anyhow::Result<()> {
    let settings = watch_settings(config, &args);
    settings.validate()?;
    let format = output_format(args.json);

    let mut session = MonitorSession::new();
    let mut events = match session.start(&settings) {
        StartOutcome::Started(events) => events,
        StartOutcome::AlreadyRunning => bail!("Monitor is already running"),
    };

    tracing::info!(
        file_path = %settings.log_path.display(),
        window_minutes = settings.window_minutes,
        refresh_secs = settings.refresh_secs,
        "👀 Watching loot log (Ctrl+C to stop)"
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome: anyhow::Result<()> = loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("🛑 Interrupt received");
                break Ok(());
            }
            event = events.recv() => match event {
                Some(MonitorEvent::Snapshot(snapshot)) => {
                    let stdout = std::io::stdout();
                    if let Err(e) = write_snapshot(&mut stdout.lock(), &snapshot, format) {
                        break Err(e).context("Failed to write snapshot");
                    }
                }
                Some(MonitorEvent::OpenFailed { path, error }) => {
                    break Err(anyhow::anyhow!(
                        "Cannot open log file '{}': {}",
                        path.display(),
                        error
                    ));
                }
                None => break Ok(()),
            },
        }
    };

    match session.stop().await {
        StopOutcome::Stopped(summary) => tracing::debug!(
            lines_read = summary.lines_read,
            events_parsed = summary.events_parsed,
            snapshots_emitted = summary.snapshots_emitted,
            "👋 Session finished"
        ),
        StopOutcome::TimedOut => tracing::warn!("⚠️ Tailer was aborted after stop timeout"),
        StopOutcome::NotRunning => {}
    }

    outcome
}

fn run_analyze(config: &AppConfig, args: AnalyzeArgs) -> anyhow::Result<()> {
    let path = args
        .path
        .unwrap_or_else(|| config.monitor.log_path.clone());
    if let Some(window_minutes) = args.window_minutes {
        MonitorSettings {
            log_path: path.clone(),
            window_minutes,
            ..MonitorSettings::default()
        }
        .validate()?;
    }

    let events = read_events_from_file(&path)?;
    tracing::info!(
        file_path = %path.display(),
        event_count = events.len(),
        "📊 Analyzing loot log"
    );

    let snapshot = match args.window_minutes {
        Some(window_minutes) => {
            let mut window = EventWindow::with_minutes(window_minutes);
            for event in events {
                window.append(event);
            }
            compute_snapshot(&window)
        }
        None => StatsSnapshot::from_events(&events),
    };

    match snapshot {
        Some(snapshot) => {
            let stdout = std::io::stdout();
            write_snapshot(&mut stdout.lock(), &snapshot, output_format(args.json))?;
        }
        None => println!("No loot events found in {}", path.display()),
    }
    Ok(())
}

fn run_config(
    config_manager: &ConfigManager,
    config: &AppConfig,
    action: ConfigAction,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let rendered = toml::to_string_pretty(config).context("Failed to serialize config")?;
            print!("{}", rendered);
        }
        ConfigAction::Path => {
            println!("{}", config_manager.get_config_file_path().display());
        }
        ConfigAction::Reset => {
            config_manager.reset_config()?;
            println!(
                "Configuration reset: {}",
                config_manager.get_config_file_path().display()
            );
        }
    }
    Ok(())
}
