//! Expansion of run-wide options into per-input options.

use super::{OptionsExpander, ValidatedOptions};
use crate::data::{InputFormat, RunOptions};
use crate::error::ConfigError;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// One [`RunOptions`] per input file.
///
/// Directories are expanded into their files, sorted by name, except for
/// scope input where a directory of traces is a single dataset. An input
/// named twice is processed once.
///
/// Every input gets its own output directory: `<output>/<stem>` with an
/// output directory, `<parent>/<stem>` for a file without one, and the
/// directory itself for scope input. Colliding names get the input's
/// sequence number appended.
#[derive(Debug, Default, Clone, Copy)]
pub struct InputExpander;

impl InputExpander {
    fn discover(&self, options: &ValidatedOptions) -> Result<Vec<PathBuf>, ConfigError> {
        let mut inputs = Vec::new();
        for path in &options.inputs {
            if path.is_dir() && options.format != InputFormat::Scope {
                let mut files: Vec<PathBuf> = fs::read_dir(path)
                    .map_err(|_| ConfigError::MissingInput(path.clone()))?
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|p| p.is_file())
                    .collect();
                files.sort();
                inputs.extend(files);
            } else {
                inputs.push(path.clone());
            }
        }

        let mut seen = HashSet::new();
        inputs.retain(|path| seen.insert(fs::canonicalize(path).unwrap_or_else(|_| path.clone())));
        Ok(inputs)
    }

    fn output_for(&self, options: &ValidatedOptions, input: &Path) -> PathBuf {
        let stem = input.file_stem().unwrap_or(input.as_os_str());
        match &options.output {
            Some(base) => base.join(stem),
            None if input.is_dir() => input.to_path_buf(),
            None => input.parent().unwrap_or(Path::new(".")).join(stem),
        }
    }
}

impl OptionsExpander for InputExpander {
    fn expand(
        &self,
        options: &ValidatedOptions,
        chain_len: usize,
    ) -> Result<Vec<RunOptions>, ConfigError> {
        let inputs = self.discover(options)?;
        tracing::debug!(inputs = inputs.len(), chain_len, "expanded run options");

        let mut taken = HashSet::new();
        Ok(inputs
            .into_iter()
            .enumerate()
            .map(|(seq, input)| {
                let mut output = self.output_for(options, &input);
                while !taken.insert(output.clone()) {
                    let mut name = output.file_name().unwrap_or_default().to_os_string();
                    name.push(format!("_{seq}"));
                    output.set_file_name(name);
                }
                let mut run = RunOptions::new(seq, input, options.format)
                    .with_range(options.range)
                    .with_output(output);
                run.run_id = options.run_id;
                run
            })
            .collect())
    }
}
