use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::Error;

/// `dialog/call.txt` becomes `call.wav` in the working directory.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_os_string())
        .unwrap_or_else(|| "output".into());
    let mut path = PathBuf::from(stem);
    path.set_extension("wav");
    path
}

/// Makes sure the directory that will hold `output` exists, asking the
/// operator before creating it unless `assume_yes` is set.
pub fn ensure_parent_dir(output: &Path, assume_yes: bool) -> Result<(), Error> {
    let stdin = io::stdin();
    ensure_parent_dir_with(output, assume_yes, &mut stdin.lock(), &mut io::stdout())
}

pub fn ensure_parent_dir_with(
    output: &Path,
    assume_yes: bool,
    input: &mut impl BufRead,
    prompt: &mut impl Write,
) -> Result<(), Error> {
    let Some(dir) = output.parent().filter(|dir| !dir.as_os_str().is_empty()) else {
        return Ok(());
    };
    if dir.is_dir() {
        return Ok(());
    }

    let ancestor = dir
        .ancestors()
        .skip(1)
        .find(|candidate| candidate.as_os_str().is_empty() || candidate.is_dir())
        .map(|candidate| {
            if candidate.as_os_str().is_empty() {
                Path::new(".")
            } else {
                candidate
            }
        })
        .unwrap_or(Path::new("."));
    // Mode bits say nothing about ownership; try creating a file instead.
    if let Err(err) = tempfile::tempfile_in(ancestor) {
        return Err(Error::OutputDir {
            path: dir.to_path_buf(),
            reason: format!(
                "no write permission in {} ({err}); choose another --output or create the directory manually",
                ancestor.display()
            ),
        });
    }

    if !assume_yes {
        let io_err = |err: io::Error| Error::OutputDir {
            path: dir.to_path_buf(),
            reason: err.to_string(),
        };
        write!(
            prompt,
            "\nOutput directory does not exist: {}\nCreate directory? (y/n): ",
            dir.display()
        )
        .and_then(|_| prompt.flush())
        .map_err(io_err)?;

        let mut answer = String::new();
        input.read_line(&mut answer).map_err(io_err)?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            tracing::info!("Directory creation cancelled by user");
            return Err(Error::Cancelled("output directory not created".to_string()));
        }
    }

    fs::create_dir_all(dir).map_err(|err| Error::OutputDir {
        path: dir.to_path_buf(),
        reason: err.to_string(),
    })?;
    tracing::info!("Created output directory: {}", dir.display());
    Ok(())
}
