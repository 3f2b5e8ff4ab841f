use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use covergen::download::{destination_for, download_client, download_track};
use covergen::format::{format_duration, format_file_size};
use covergen::settings::{DEFAULT_WEIGHT, KNOWN_MODELS};
use covergen::{
    ApiClient, AudioFile, Config, ControllerEvent, GenerationController, GenerationSettings, Track,
};

/// Generate covers of an MP3 in a new style through a remote generation service
#[derive(Parser)]
#[command(name = "covergen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload an MP3 and wait for the generated tracks
    Generate(GenerateArgs),

    /// Persist a new API base URL for later runs
    SetApiUrl {
        /// e.g. https://my-tunnel.ngrok-free.app
        url: String,
    },

    /// Check that the backend answers on /health
    Health {
        /// Override the API base URL for this run
        #[arg(long)]
        api_url: Option<String>,
    },

    /// Print the configuration file location and effective values
    Config,
}

#[derive(Args)]
struct GenerateArgs {
    /// MP3 file to upload (10 MB max)
    file: PathBuf,

    /// Style description for the cover
    #[arg(short, long)]
    prompt: String,

    /// Creative deviation, 0.0 to 1.0
    #[arg(long, default_value_t = DEFAULT_WEIGHT)]
    weirdness: f32,

    /// Style guidance weight, 0.0 to 1.0
    #[arg(long, default_value_t = DEFAULT_WEIGHT)]
    style_weight: f32,

    /// Influence of the input audio, 0.0 to 1.0
    #[arg(long, default_value_t = DEFAULT_WEIGHT)]
    audio_weight: f32,

    /// Model identifier; defaults to the configured model
    #[arg(long)]
    model: Option<String>,

    /// Generate vocals instead of an instrumental
    #[arg(long)]
    vocals: bool,

    /// Override the API base URL for this run
    #[arg(long)]
    api_url: Option<String>,

    /// Save the generated tracks into this directory
    #[arg(long)]
    download_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => generate(&effective_config(), args).await,
        Commands::SetApiUrl { url } => set_api_url(&url),
        Commands::Health { api_url } => {
            let config = effective_config();
            health(api_url.as_deref().unwrap_or(&config.api_base_url)).await
        }
        Commands::Config => show_config(),
    }
}

/// Persisted config plus the session-only environment override.
fn effective_config() -> Config {
    let mut config = Config::load();
    config.apply_env();
    config
}

async fn generate(config: &Config, args: GenerateArgs) -> ExitCode {
    let base_url = args.api_url.as_deref().unwrap_or(&config.api_base_url);
    let client = match ApiClient::new(base_url) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let file = match read_input(&args.file) {
        Ok(file) => file,
        Err(message) => {
            eprintln!("Error: {message}");
            return ExitCode::FAILURE;
        }
    };

    let settings = GenerationSettings::new(
        args.weirdness,
        args.style_weight,
        args.audio_weight,
        args.model.unwrap_or_else(|| config.default_model.clone()),
        !args.vocals,
    );

    let (event_tx, event_rx) = async_channel::unbounded::<ControllerEvent>();
    let mut controller = GenerationController::new(Arc::new(client), config.poll_options(), event_tx);

    println!("Uploading {} ({}) to {base_url}", file.name, format_file_size(file.size));
    if let Err(e) = controller.submit(Some(&file), &args.prompt, settings).await {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    while let Ok(event) = event_rx.recv().await {
        match event {
            ControllerEvent::Loading(message) => println!("{message}"),
            ControllerEvent::TaskCreated(task_id) => println!("Task {task_id} started"),
            ControllerEvent::StatusUpdate { task_id, status, code } => {
                log::debug!("Task {task_id}: {code} -> {status:?}");
            }
            ControllerEvent::TracksReady(tracks) => {
                print_tracks(&tracks);
                if let Some(ref dir) = args.download_dir {
                    save_tracks(dir, &tracks).await;
                }
                return ExitCode::SUCCESS;
            }
            ControllerEvent::Error(err) => {
                eprintln!("Error: {err}");
                if err.is_api() {
                    eprintln!("Check the backend with `covergen health`.");
                }
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::FAILURE
}

/// Open the input file, naming it in the error so a typo is obvious.
fn read_input(path: &Path) -> Result<AudioFile, String> {
    AudioFile::from_path(path).map_err(|e| format!("Cannot read {}: {e}", path.display()))
}

fn print_tracks(tracks: &[Track]) {
    println!("\n{} track(s) ready:", tracks.len());
    for (i, track) in tracks.iter().enumerate() {
        println!(
            "{:>2}. {}  [{}]  model: {}",
            i + 1,
            track.title,
            format_duration(track.duration_seconds),
            track.model_name
        );
        if !track.tags.is_empty() {
            println!("    tags: {}", track.tags);
        }
        match track.audio_url {
            Some(ref url) => println!("    {url}"),
            None => println!("    Audio URL not available"),
        }
    }
}

async fn save_tracks(dir: &Path, tracks: &[Track]) {
    let client = match download_client() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to set up downloads: {e}");
            return;
        }
    };
    for track in tracks.iter().filter(|t| t.audio_url.is_some()) {
        let dest = destination_for(dir, track);
        let name = track.title.clone();
        let result = download_track(&client, track, &dest, move |done, total| {
            if total > 0 {
                log::debug!("{name}: {done} / {total} bytes");
            }
        })
        .await;

        match result {
            Ok(()) => println!("Saved {}", dest.display()),
            Err(e) => eprintln!("Failed to download {:?}: {e}", track.title),
        }
    }
}

fn set_api_url(url: &str) -> ExitCode {
    let mut config = Config::load();
    if let Err(e) = config.set_api_base_url(url) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }
    if let Err(e) = config.save() {
        eprintln!("Failed to save config: {e}");
        return ExitCode::FAILURE;
    }
    println!("API base URL set to {}", config.api_base_url);
    ExitCode::SUCCESS
}

async fn health(base_url: &str) -> ExitCode {
    let result = match ApiClient::new(base_url) {
        Ok(client) => client.health_check().await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => {
            println!("Backend at {base_url} is healthy");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Backend at {base_url} is not reachable: {e}");
            ExitCode::FAILURE
        }
    }
}

fn show_config() -> ExitCode {
    let config = effective_config();
    println!("Config file: {}", Config::path().display());
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    }
    println!("Known models: {}", KNOWN_MODELS.join(", "));
    ExitCode::SUCCESS
}
