use clap::{Parser, Subcommand};
use modern_images::config::{self, AppConfig};
use modern_images::formats::SourceMime;
use modern_images::imaging::{ImageWriter, RustWriter};
use modern_images::metadata::AttachmentMetadata;
use modern_images::output;
use modern_images::policy::FormatResolutionPolicy;
use modern_images::settings::{FileStore, PreferenceStore};
use modern_images::upload::UploadConverter;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "modern-images")]
#[command(about = "Convert uploaded images to modern formats")]
#[command(long_about = "\
Convert uploaded images to modern formats

Each source type (JPEG, PNG, WebP, GIF, AVIF) can be set to keep its
original format or convert to WebP, AVIF or JPEG XL:

  modern-images settings set jpeg=image/webp png=image/avif
  modern-images convert uploads/2024/05/photo.jpg

The converted file is written next to the original (photo.jpg →
photo.webp); the original is never removed. If anything goes wrong the
upload is left as it was.

Run 'modern-images gen-config' to generate a documented config file.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the upload conversion on a file and print the resulting metadata
    Convert {
        /// Uploaded image
        file: PathBuf,
        /// Attachment metadata JSON to rewrite (default: built from the file)
        #[arg(long)]
        metadata: Option<PathBuf>,
    },
    /// Show what `convert` would do without writing anything
    Plan {
        /// Uploaded image
        file: PathBuf,
    },
    /// Show or change the per-type format preferences
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// List upload extensions the host must accept for modern formats
    Mimes,
    /// Print a stock config file with all options documented
    GenConfig,
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print the current choice for every source type
    Show,
    /// Replace the preferences, e.g. `jpeg=image/webp gif=`
    Set {
        /// TYPE=FORMAT pairs; TYPE is a short name (jpeg) or a setting key
        #[arg(value_parser = parse_assignment)]
        assignments: Vec<(String, String)>,
    },
    /// Keep the original format for every type
    Reset,
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected TYPE=FORMAT, got {s:?}"))?;
    // Short names expand to setting keys; anything else goes to sanitize as is.
    let key = SourceMime::from_short_name(key)
        .map(|m| m.setting_key().to_string())
        .unwrap_or_else(|| key.to_string());
    Ok((key, value.to_string()))
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "warn,modern_images=debug"
    } else {
        "warn,modern_images=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Mimes => output::print_upload_mimes(),
        Command::GenConfig => print!("{}", config::stock_config_toml()),
        Command::Convert { file, metadata } => {
            let converter = build_converter(&config::load_config(&cli.config)?);
            let input = match metadata {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => default_metadata(&file, converter.writer()),
            };
            let result = converter.process(input, &file);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Plan { file } => {
            let converter = build_converter(&config::load_config(&cli.config)?);
            output::print_plan(&file, converter.plan(&file).as_ref());
        }
        Command::Settings(SettingsCommand::Show) => {
            output::print_settings(&open_store(&cli.config)?.get()?);
        }
        Command::Settings(SettingsCommand::Set { assignments }) => {
            let raw: BTreeMap<String, String> = assignments.into_iter().collect();
            output::print_settings(&open_store(&cli.config)?.save(&raw)?);
        }
        Command::Settings(SettingsCommand::Reset) => {
            output::print_settings(&open_store(&cli.config)?.save(&BTreeMap::new())?);
        }
    }

    Ok(())
}

fn open_store(config_path: &Path) -> Result<FileStore, config::ConfigError> {
    let app_config = config::load_config(config_path)?;
    Ok(FileStore::new(&app_config.settings_file))
}

/// Wire the store, writer and policy together.
fn build_converter(config: &AppConfig) -> UploadConverter<FileStore, RustWriter> {
    UploadConverter::new(
        FileStore::new(&config.settings_file),
        RustWriter::new(config.encode_settings()),
        FormatResolutionPolicy::default(),
    )
}

/// Metadata for a file with no host-supplied record: its name and size.
fn default_metadata(file: &Path, writer: &impl ImageWriter) -> AttachmentMetadata {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (width, height) = writer
        .identify(file)
        .map(|d| (d.width, d.height))
        .unwrap_or_default();
    AttachmentMetadata::new(name, width, height)
}
