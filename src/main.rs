use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    if let Err(err) = ctrlc::set_handler(|| {
        eprintln!("\n\nExiting...");
        std::process::exit(vision_clip::INTERRUPTED_EXIT_CODE);
    }) {
        eprintln!("warning: could not install Ctrl-C handler: {err}");
    }

    let cli = vision_clip::cli::Cli::parse();
    match vision_clip::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
