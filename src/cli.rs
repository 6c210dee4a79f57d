use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::tts::{ProviderOptions, ProviderOverrides, ProviderSettings};

#[derive(Parser, Debug)]
#[command(
    name = "vision-clip",
    version,
    about = "Generate simulated phone-call audio clips from dialog scripts"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose (debug) console logging")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        value_enum,
        ignore_case = true,
        default_value = "info",
        help = "Console log level"
    )]
    pub log_level: LogLevel,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        num_args = 0..=1,
        default_missing_value = "vision-clip.log",
        help = "Also log to a file (default: vision-clip.log)"
    )]
    pub log_file: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        ignore_case = true,
        default_value = "debug",
        help = "File log level"
    )]
    pub log_file_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_filter(self) -> tracing_subscriber::filter::LevelFilter {
        use tracing_subscriber::filter::LevelFilter;
        match self {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error | LogLevel::Critical => LevelFilter::ERROR,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a clip from a dialog script
    Generate(GenerateArgs),
    /// Assemble segments kept from an earlier run
    Assemble(AssembleArgs),
    /// List speech providers and their capabilities
    Providers(ProvidersArgs),
    /// Inspect or create the configuration file
    Config(ConfigArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct ProviderArgs {
    #[arg(long, value_name = "ID", help = "Speech provider (google, azure, elevenlabs, aws)")]
    pub provider: Option<String>,

    #[arg(long, value_name = "PATH", help = "Configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "VOICE", help = "Voice for IVA lines")]
    pub va_voice: Option<String>,

    #[arg(long, value_name = "VOICE", help = "Voice for caller lines")]
    pub caller_voice: Option<String>,

    #[arg(long, value_name = "LOCALE", help = "Locale for IVA lines")]
    pub va_locale: Option<String>,

    #[arg(long, value_name = "LOCALE", help = "Locale for caller lines")]
    pub caller_locale: Option<String>,

    #[arg(long, value_name = "RATE", help = "Speaking rate (1.0 is normal)")]
    pub rate: Option<f32>,

    #[arg(
        long = "tts-option",
        value_name = "KEY=VALUE",
        value_parser = parse_key_value,
        help = "Provider-specific option, repeatable"
    )]
    pub tts_options: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[arg(short, long, value_name = "PATH", help = "Dialog script")]
    pub file: PathBuf,

    #[arg(long, help = "Record caller lines from the microphone")]
    pub record: bool,

    #[arg(short, long, value_name = "PATH", help = "Output WAV (default: <script stem>.wav)")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Keep segment files after assembly")]
    pub keep_temp: bool,

    #[command(flatten)]
    pub provider: ProviderArgs,

    #[arg(long, value_name = "DIR", help = "Directory holding effect WAV files")]
    pub effects_dir: Option<PathBuf>,

    #[arg(long, value_name = "DIR", help = "Directory for segment files")]
    pub temp_dir: Option<PathBuf>,

    #[arg(long, value_name = "HZ", value_parser = clap::value_parser!(u32).range(1..), help = "Segment sample rate")]
    pub sample_rate: Option<u32>,

    #[arg(long, help = "Do not play synthesized lines back")]
    pub no_playback: bool,

    #[arg(short, long, help = "Create a missing output directory without asking")]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct AssembleArgs {
    #[arg(long, value_name = "DIR", default_value = ".temp", help = "Directory holding segment files")]
    pub workspace: PathBuf,

    #[arg(short, long, value_name = "PATH", help = "Output WAV")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct ProvidersArgs {
    #[arg(long, help = "Output as JSON")]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[arg(long, help = "Show the merged provider settings (secrets masked)")]
    pub show: bool,

    #[arg(long, help = "Create a default config file")]
    pub init: bool,

    #[arg(long, help = "Print the user config file path")]
    pub path: bool,

    #[arg(long, help = "Validate configuration")]
    pub validate: bool,

    #[arg(long, value_name = "PATH", help = "Configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "ID", help = "Speech provider to show")]
    pub provider: Option<String>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

impl ProviderArgs {
    pub fn overrides(&self) -> ProviderOverrides {
        ProviderOverrides {
            provider: self.provider.clone(),
            settings: ProviderSettings {
                va_voice: self.va_voice.clone(),
                caller_voice: self.caller_voice.clone(),
                va_locale: self.va_locale.clone(),
                caller_locale: self.caller_locale.clone(),
                rate: self.rate,
                ..ProviderSettings::default()
            },
        }
    }

    pub fn options(&self) -> ProviderOptions {
        self.tts_options.iter().cloned().collect()
    }
}
