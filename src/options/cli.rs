//! Command-line option resolution.

use super::{OptionResolver, ValidatedOptions};
use crate::data::{EventRange, InputFormat, RunId};
use crate::error::ConfigError;
use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "petrun", version, about = "Run a task chain over detector data files")]
struct CmdLineArgs {
    /// Input files or directories.
    #[arg(short = 'f', long = "file", required = true, num_args = 1..)]
    files: Vec<PathBuf>,

    /// Input format: scope, hld, root or other.
    #[arg(short = 't', long = "type", default_value = "root")]
    format: String,

    /// Run number selecting the detector parameters.
    #[arg(short = 'i', long = "run-id", allow_negative_numbers = true)]
    run_id: Option<RunId>,

    /// Event range `<first>:<last>` applied to the first task.
    #[arg(short = 'r', long = "range")]
    range: Option<String>,

    /// Output directory.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Local JSON parameter database.
    #[arg(short = 'l', long = "local-db")]
    local_db: Option<PathBuf>,

    /// Process inputs concurrently, one worker per input.
    #[arg(long)]
    threads: bool,
}

/// Resolves `petrun`-style command lines. The first argument is the program name.
#[derive(Debug, Default, Clone, Copy)]
pub struct CmdLineResolver;

impl CmdLineResolver {
    pub fn new() -> Self {
        Self
    }
}

impl OptionResolver for CmdLineResolver {
    fn resolve(&self, args: &[String]) -> Result<ValidatedOptions, ConfigError> {
        let parsed = CmdLineArgs::try_parse_from(args).map_err(|e| match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ConfigError::Usage(e.to_string()),
            _ => ConfigError::Arguments(e.to_string()),
        })?;

        for input in &parsed.files {
            if !input.exists() {
                return Err(ConfigError::MissingInput(input.clone()));
            }
        }
        if let Some(db) = &parsed.local_db {
            if !db.is_file() {
                return Err(ConfigError::StoreUnreachable {
                    path: db.clone(),
                    reason: "no such file".into(),
                });
            }
        }

        let range = match parsed.range.as_deref() {
            Some(text) => text.parse::<EventRange>()?,
            None => EventRange::UNRESTRICTED,
        };
        let format: InputFormat = match parsed.format.parse() {
            Ok(format) => format,
            Err(never) => match never {},
        };

        Ok(ValidatedOptions {
            inputs: parsed.files,
            format,
            run_id: parsed.run_id,
            range,
            output: parsed.output,
            local_db: parsed.local_db,
            threads: parsed.threads,
        })
    }
}
