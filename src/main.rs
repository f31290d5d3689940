use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use tube_downloader::config::{AppConfig, DOWNLOAD_DIR_ENV, INSTALL_DIR_ENV, PROXY_ENV};
use tube_downloader::downloader::tools::{HttpFetcher, ToolState};
use tube_downloader::downloader::{
    diagnose_error, BootstrapError, BootstrapReport, DownloadError, DownloadRequest, InstallationState,
    Orchestrator, ProbeStatus, Prober, RequiredTool, ToolBootstrapper,
};
use tube_downloader::progress::ConsoleProgress;
use tube_downloader::ytdlp::YtDlpSource;

/// Quality and language aware downloader driving yt-dlp and ffmpeg
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory finished downloads are written to
    #[arg(long, global = true, env = DOWNLOAD_DIR_ENV)]
    dest: Option<PathBuf>,

    /// Directory yt-dlp and ffmpeg are installed into when missing
    #[arg(long, global = true, env = INSTALL_DIR_ENV)]
    install_dir: Option<PathBuf>,

    /// Proxy for tool downloads (http://, https:// or socks5://)
    #[arg(long, global = true, env = PROXY_ENV)]
    proxy: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check, and install if missing, the external tools
    Deps,
    /// Show title, duration, qualities and audio tracks
    Info { url: String },
    /// Download at a target height, optionally with a preferred audio language
    Download {
        url: String,
        #[arg(long, default_value_t = 1080)]
        height: u32,
        /// Audio language code, e.g. "en" or "pt-BR"
        #[arg(long)]
        lang: Option<String>,
    },
    /// Show the first video and audio codec of a media file
    Probe { file: PathBuf },
}

/// Failure of one command, mapped to the process exit status
enum CliError {
    Bootstrap(BootstrapError),
    Download(DownloadError),
    Other(String),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            CliError::Bootstrap(_) => 2,
            CliError::Download(_) | CliError::Other(_) => 1,
        }
    }
}

impl From<BootstrapError> for CliError {
    fn from(e: BootstrapError) -> Self {
        CliError::Bootstrap(e)
    }
}

impl From<DownloadError> for CliError {
    fn from(e: DownloadError) -> Self {
        CliError::Download(e)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("FATAL: failed to create Tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn build_config(args: &Args) -> AppConfig {
    let mut config = AppConfig::from_env();
    if let Some(dest) = &args.dest {
        config.download_dir = dest.clone();
    }
    if let Some(dir) = &args.install_dir {
        config.install_dir = dir.clone();
    }
    if args.proxy.is_some() {
        config.proxy = args.proxy.clone();
    }
    config
}

async fn run(args: Args) -> Result<(), CliError> {
    let config = build_config(&args);
    let progress = Arc::new(ConsoleProgress::new());

    let (state, report) = bootstrap(&config, progress.clone()).await?;

    match args.command {
        Command::Deps => print_report(&report, args.json),
        Command::Info { url } => {
            let orchestrator = orchestrator(&config, &state, &report);
            let info = orchestrator.fetch_info(&url).await?;
            if args.json {
                print_json(&info);
            } else {
                println!("Title:    {}", info.title);
                println!("Duration: {}", info.duration);
                let qualities: Vec<&str> = info.qualities.iter().map(|q| q.label.as_str()).collect();
                println!("Quality:  {}", qualities.join(", "));
                if !info.audio_tracks.is_empty() {
                    println!("Audio:");
                    for track in &info.audio_tracks {
                        println!("  {:<8} {}", track.code, track.display_name);
                    }
                }
            }
        }
        Command::Download { url, height, lang } => {
            let destination = config
                .ensure_download_dir()
                .map_err(|e| CliError::Other(format!("cannot create {}: {}", config.download_dir.display(), e)))?
                .to_path_buf();
            let request = DownloadRequest {
                url,
                height,
                language: lang,
                destination,
            };

            let orchestrator = orchestrator(&config, &state, &report);
            let callback = progress.download_callback("download");
            let (outcome, status) = orchestrator.download_and_validate(&request, Some(callback)).await?;

            if args.json {
                print_json(&serde_json::json!({
                    "resolved_file_path": outcome.resolved_file_path,
                    "probe": match &status {
                        ProbeStatus::Verified(info) => serde_json::to_value(info).unwrap_or_default(),
                        _ => serde_json::Value::Null,
                    },
                }));
            } else if outcome.has_path() {
                println!("Saved: {}", outcome.resolved_file_path);
                print_probe_status(&status);
            } else {
                println!("Finished, but the output file name was not reported by yt-dlp");
            }
        }
        Command::Probe { file } => {
            let prober = prober(&config, &state).ok_or_else(|| CliError::Other("ffprobe not found".to_string()))?;
            let info = prober.probe(&file).await?;
            if args.json {
                print_json(&info);
            } else {
                println!("Video: {}", info.video_codec.as_deref().unwrap_or("none"));
                println!("Audio: {}", info.audio_codec.as_deref().unwrap_or("none"));
            }
        }
    }

    Ok(())
}

async fn bootstrap(
    config: &AppConfig,
    progress: Arc<ConsoleProgress>,
) -> Result<(InstallationState, BootstrapReport), BootstrapError> {
    let state = InstallationState::activate(&config.install_dir)?;
    let fetcher = HttpFetcher::new(config.http_timeout_secs, config.proxy.as_deref())?;
    let bootstrapper = ToolBootstrapper::new(state, Arc::new(fetcher)).with_observer(progress);
    let report = bootstrapper.ensure().await?;
    if report.installed_any() {
        log::info!("[main] tools installed into {}", config.install_dir.display());
    }
    Ok((bootstrapper.state().clone(), report))
}

fn orchestrator(config: &AppConfig, state: &InstallationState, report: &BootstrapReport) -> Orchestrator {
    let program = report
        .path_of(RequiredTool::YtDlp)
        .map(|p| p.as_os_str().to_owned())
        .unwrap_or_else(|| RequiredTool::YtDlp.command_name().into());
    let source = YtDlpSource::new(program).with_metadata_timeout(config.metadata_timeout_secs);

    let orchestrator = Orchestrator::new(Box::new(source));
    match prober(config, state) {
        Some(prober) => orchestrator.with_prober(prober),
        None => {
            log::warn!("[main] ffprobe not found; downloads will not be verified");
            orchestrator
        }
    }
}

fn prober(config: &AppConfig, state: &InstallationState) -> Option<Prober> {
    state
        .resolve("ffprobe")
        .map(|path| Prober::new(path).with_timeout(config.probe_timeout_secs))
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => log::error!("[main] failed to serialize output: {}", e),
    }
}

fn print_report(report: &BootstrapReport, json: bool) {
    if json {
        print_json(report);
        return;
    }
    for status in &report.tools {
        let label = match &status.state {
            ToolState::Available => "available",
            ToolState::Installed => "installed",
            other => {
                println!("{:<8} {:?}", status.tool.command_name(), other);
                continue;
            }
        };
        let path = status
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        println!("{:<8} {:<10} {}", status.tool.command_name(), label, path);
    }
}

fn print_probe_status(status: &ProbeStatus) {
    match status {
        ProbeStatus::Verified(info) => {
            println!(
                "Streams: video={} audio={}",
                info.video_codec.as_deref().unwrap_or("none"),
                info.audio_codec.as_deref().unwrap_or("none")
            );
            if !info.has_audio() {
                println!("Warning: the file has no audio stream");
            }
        }
        ProbeStatus::Failed(e) => println!("Could not verify the file: {}", e),
        ProbeStatus::Skipped => {}
    }
}

fn report_error(error: &CliError) {
    match error {
        CliError::Bootstrap(e) => {
            eprintln!("Dependency setup failed: {}", e);
        }
        CliError::Download(e) => {
            eprintln!("Error: {}", e);
            if let Some(hint) = e.diagnostic().and_then(diagnose_error) {
                eprintln!("  {}", hint.description());
                if let Some(suggestion) = hint.suggestion() {
                    eprintln!("  {}", suggestion);
                }
            }
        }
        CliError::Other(message) => eprintln!("Error: {}", message),
    }
}
