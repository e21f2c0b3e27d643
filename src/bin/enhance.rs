use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;
use uhd_camera::{
    client::{
        api::EnhanceApiClient,
        presenter::ResultPresenter,
        session::{FileSession, SessionStore, PROCESS_ID_KEY},
    },
    models::job::{CaptureEvent, CaptureState},
    services::poller::{PollConfig, PollError, PollOutcome, StatusPoller},
};

/// Enhance a photo with the Ultra HD AI Camera service.
#[derive(Debug, Parser)]
#[command(name = "enhance", version, about)]
struct Args {
    /// Image file (JPEG/PNG/WebP), http(s) URL, or data URL
    image: String,

    /// Base URL of the enhance service
    #[arg(long, env = "ENHANCE_SERVER", default_value = "http://localhost:3000")]
    server: String,

    /// Where to save the enhanced image
    #[arg(long, default_value = "enhanced-photo.png")]
    output: PathBuf,

    /// Print the result URL without downloading it
    #[arg(long)]
    no_download: bool,

    /// Session file carrying state between runs
    #[arg(long, default_value = ".uhd-camera-session.json")]
    session: PathBuf,

    /// Session token for servers that require sign-in
    #[arg(long, env = "UHD_SESSION_TOKEN")]
    token: Option<String>,

    #[arg(long, default_value_t = 1500)]
    interval_ms: u64,

    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether the capture ended in success.
async fn run(args: Args) -> Result<bool, Box<dyn std::error::Error>> {
    let image = load_image(&args.image)?;
    let api = Arc::new(EnhanceApiClient::new(&args.server, args.token.clone())?);
    let mut session = FileSession::open(&args.session)?;
    let download_to = (!args.no_download).then_some(args.output.as_path());

    let state = CaptureState::Submitting;
    tracing::info!(state = %state, server = %args.server, "Submitting capture");

    let submitted = match api.submit(&image).await {
        Ok(submitted) => submitted,
        Err(e) => {
            let state = state.on(CaptureEvent::SubmissionRejected)?;
            tracing::warn!(state = %state, error = %e, "Submission rejected");
            let mut presenter = ResultPresenter::new(session, std::io::stdout());
            let shown = presenter
                .present(Ok(PollOutcome::Failed(e.to_string())), None)
                .await?;
            return Ok(shown.is_success());
        }
    };

    let state = state.on(CaptureEvent::JobAccepted)?;
    let job_id = submitted.job_id().to_string();
    tracing::info!(state = %state, job_id = %job_id, "Polling for result");

    session.set(PROCESS_ID_KEY, &job_id)?;

    let poller = StatusPoller::new(PollConfig {
        interval: Duration::from_millis(args.interval_ms),
        timeout: Duration::from_secs(args.timeout_secs),
        ..PollConfig::default()
    });

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner} Enhancing [{bar:40}] {pos}%")?
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(120));

    let handle = poller.spawn(api, job_id);
    let mut progress = handle.progress();
    let progress_bar = bar.clone();
    let progress_task = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let pct = *progress.borrow_and_update();
            progress_bar.set_position(u64::from(pct));
        }
    });

    // Dropping the handle on Ctrl-C cancels the poll loop.
    let outcome = tokio::select! {
        outcome = handle.outcome() => outcome,
        _ = interrupted(tokio::signal::ctrl_c()) => Err(PollError::Cancelled),
    };
    progress_task.abort();
    bar.finish_and_clear();

    let event = match &outcome {
        Ok(PollOutcome::Succeeded(_)) => CaptureEvent::ProviderSucceeded,
        Err(PollError::TimedOut { .. }) => CaptureEvent::BudgetExceeded,
        _ => CaptureEvent::ProviderFailed,
    };
    let state = state.on(event)?;
    tracing::info!(state = %state, "Capture finished");

    let mut presenter = ResultPresenter::new(session, std::io::stdout());
    let shown = presenter.present(outcome, download_to).await?;
    Ok(shown.is_success())
}

/// Resolves when `signal` fires. Never resolves if the handler could not be installed.
async fn interrupted(signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        tracing::warn!(error = %e, "Ctrl-C handler unavailable, polling cannot be interrupted");
        std::future::pending::<()>().await;
    }
}

/// Turn the argument into something the enhance endpoint accepts.
fn load_image(arg: &str) -> Result<String, Box<dyn std::error::Error>> {
    if arg.starts_with("data:") || arg.starts_with("http://") || arg.starts_with("https://") {
        return Ok(arg.to_string());
    }

    let path = Path::new(arg);
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => return Err(format!("unsupported image type: {}", path.display()).into()),
    };

    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        return Err(format!("image file is empty: {}", path.display()).into());
    }

    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{mime};base64,{encoded}"))
}
