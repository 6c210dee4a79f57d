pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod output;
pub mod script;
pub mod tts;

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use cli::{Cli, Commands};
use config::FileConfig;
use error::{ConfigError, Error};
use generator::{CallerMode, ClipGenerator, GeneratorOptions, Workspace};
use script::DialogScript;
use serde::Serialize;
use tts::{Environment, ProviderOverrides, ProviderSettings, Resolver};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use error::INTERRUPTED_EXIT_CODE;

pub fn run(cli: Cli) -> Result<(), Error> {
    let console_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        cli.log_level.as_filter()
    };
    setup_tracing(
        console_level,
        cli.verbose,
        cli.log_file.as_deref(),
        cli.log_file_level.as_filter(),
    );

    match cli.command {
        Commands::Generate(args) => generate(args),
        Commands::Assemble(args) => assemble(args),
        Commands::Providers(args) => providers(args),
        Commands::Config(args) => config_cmd(args),
    }
}

fn setup_tracing(console: LevelFilter, force: bool, log_file: Option<&Path>, file_level: LevelFilter) {
    let console_filter = if force {
        EnvFilter::builder()
            .with_default_directive(console.into())
            .parse_lossy("")
    } else {
        EnvFilter::builder()
            .with_default_directive(console.into())
            .from_env_lossy()
    };
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let mut file_error = None;
    let file_layer = log_file.and_then(|path| match File::create(path) {
        Ok(file) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(file_level),
        ),
        Err(err) => {
            file_error = Some(err);
            None
        }
    });

    // A second init (as in tests running `run` more than once) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init();

    match (log_file, file_error) {
        (Some(path), Some(err)) => {
            tracing::warn!("Could not create log file {}: {err}", path.display())
        }
        (Some(path), None) => tracing::info!("Logging to file: {}", path.display()),
        _ => {}
    }
}

fn generate(args: cli::GenerateArgs) -> Result<(), Error> {
    let env = Environment::capture();
    let overrides = args.provider.overrides();
    let resolver = Resolver::new(&overrides, &env);
    resolver.preflight()?;
    let script = DialogScript::load(&args.file)?;

    let located = FileConfig::locate(args.provider.config.as_deref())?;
    let file_config = located.as_ref().map(|(_, config)| config);
    if let Some((path, _)) = &located {
        tracing::debug!("Using configuration file: {}", path.display());
    }

    let resolved = resolver.resolve(file_config)?;
    let mut provider = tts::create_provider(&resolved)?;
    let options = args.provider.options();
    if !options.is_empty() {
        provider.configure(&options)?;
    }
    tracing::info!("Using TTS provider: {}", provider.name());
    tracing::debug!(
        "Voice configuration: VA={}, Caller={}",
        resolved.assistant.voice,
        resolved.caller.voice
    );

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| output::default_output_path(&args.file));
    output::ensure_parent_dir(&output, args.yes)?;

    let settings = file_config
        .map(|config| config.generator.clone())
        .unwrap_or_default();
    let defaults = GeneratorOptions::default();
    let options = GeneratorOptions {
        effects_dir: args
            .effects_dir
            .or(settings.effects_dir)
            .unwrap_or(defaults.effects_dir),
        temp_dir: args.temp_dir.or(settings.temp_dir).unwrap_or(defaults.temp_dir),
        sample_rate: args
            .sample_rate
            .or(settings.sample_rate)
            .unwrap_or(defaults.sample_rate),
        keep_temp: args.keep_temp,
        mode: if args.record {
            CallerMode::Record
        } else {
            CallerMode::Synthesize
        },
    };

    let mut generator = ClipGenerator::new(provider, resolved.voices(), options, !args.no_playback);
    let report = generator.generate(&script, &output)?;
    tracing::info!(
        "Wrote {} ({} segments)",
        report.output.display(),
        report.segments.len()
    );
    Ok(())
}

fn assemble(args: cli::AssembleArgs) -> Result<(), Error> {
    let segments = Workspace::segment_files(&args.workspace)?;
    if segments.is_empty() {
        tracing::warn!("No segment files found in {}", args.workspace.display());
    }
    let assembler = audio::Assembler::for_segments(
        &segments,
        audio::segment_spec(audio::DEFAULT_SAMPLE_RATE),
    )?;
    assembler.assemble(&segments, &args.output)?;
    tracing::info!(
        "Concatenated {} audio segments into {}",
        segments.len(),
        args.output.display()
    );
    Ok(())
}

fn providers(args: cli::ProvidersArgs) -> Result<(), Error> {
    let info = tts::providers_info();
    if args.json {
        let json = serde_json::to_string_pretty(&info)
            .map_err(|err| ConfigError::Render(err.to_string()))?;
        println!("{json}");
        return Ok(());
    }

    println!("Available providers:");
    for provider in info {
        let marker = if provider.default { " (default)" } else { "" };
        println!(
            "- {}{marker}: {}",
            provider.name,
            provider.features.join(", ")
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct ShownConfig {
    provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    settings: ProviderSettings,
}

fn config_cmd(args: cli::ConfigArgs) -> Result<(), Error> {
    if args.init {
        let path = FileConfig::init_default()?;
        println!("Initialized config at {}", path.display());
        return Ok(());
    }

    if args.path || !(args.show || args.validate) {
        let path = FileConfig::default_path()?;
        println!("{}", path.display());
        return Ok(());
    }

    let env = Environment::capture();
    let overrides = ProviderOverrides {
        provider: args.provider.clone(),
        settings: ProviderSettings::default(),
    };
    let resolver = Resolver::new(&overrides, &env);
    resolver.preflight()?;
    let located = FileConfig::locate(args.config.as_deref())?;
    let file_config = located.as_ref().map(|(_, config)| config);

    if args.validate {
        if let Some(config) = file_config {
            config.validate()?;
        }
        let resolved = resolver.resolve(file_config)?;
        println!("Config OK (provider: {})", resolved.provider);
        return Ok(());
    }

    let (id, settings) = resolver.merged(file_config)?;
    let shown = ShownConfig {
        provider: id.to_string(),
        file: located.as_ref().map(|(path, _)| path.display().to_string()),
        settings: settings.masked(),
    };
    let json = serde_json::to_string_pretty(&shown)
        .map_err(|err| ConfigError::Render(err.to_string()))?;
    println!("{json}");
    Ok(())
}
