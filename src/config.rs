//! Configuration loader (A3). Layers an optional TOML file under
//! explicit CLI overrides to produce the `Options` the core modules
//! consume. File values fill gaps; CLI flags always win.

use std::path::Path;

use serde::Deserialize;

use crate::error::{LogSculptError, Result};
use crate::options::Options;

/// Mirrors `Options` but with every field optional, so a config file
/// can specify a subset and leave the rest at their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub threshold: Option<f64>,
    pub sample_size: Option<usize>,
    pub use_mmap: Option<bool>,
    pub detect_types: Option<bool>,
    pub window_size: Option<usize>,
    pub change_threshold: Option<f64>,
    pub num_workers: Option<usize>,
    pub chunk_size: Option<usize>,
}

/// Reads and parses a TOML config file into a `ConfigFile`.
pub fn load_config_file(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| LogSculptError::io(path, e))?;
    toml::from_str(&text).map_err(|e| LogSculptError::invalid_option(format!("failed to parse {}: {e}", path.display())))
}

/// Overlays of overrides. `None` means "unspecified on the CLI";
/// `Some` always takes precedence over the config file and the
/// built-in default.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub threshold: Option<f64>,
    pub sample_size: Option<usize>,
    pub use_mmap: Option<bool>,
    pub detect_types: Option<bool>,
    pub window_size: Option<usize>,
    pub change_threshold: Option<f64>,
    pub num_workers: Option<usize>,
    pub chunk_size: Option<usize>,
}

/// Builds the effective `Options` from built-in defaults, an optional
/// config file, and CLI overrides, in that ascending priority order.
pub fn build_options(file: Option<ConfigFile>, cli: CliOverrides) -> Result<Options> {
    let mut options = Options::default();
    if let Some(file) = file {
        apply_file(&mut options, file);
    }
    apply_cli(&mut options, cli);

    if !(0.0..=1.0).contains(&options.threshold) {
        return Err(LogSculptError::invalid_option("threshold must be within [0.0, 1.0]"));
    }
    if !(0.0..=1.0).contains(&options.change_threshold) {
        return Err(LogSculptError::invalid_option("change_threshold must be within [0.0, 1.0]"));
    }
    if options.window_size == 0 {
        return Err(LogSculptError::invalid_option("window_size must be positive"));
    }
    if options.chunk_size == 0 {
        return Err(LogSculptError::invalid_option("chunk_size must be positive"));
    }

    Ok(options)
}

fn apply_file(options: &mut Options, file: ConfigFile) {
    if let Some(v) = file.threshold {
        options.threshold = v;
    }
    if let Some(v) = file.sample_size {
        options.sample_size = Some(v);
    }
    if let Some(v) = file.use_mmap {
        options.use_mmap = v;
    }
    if let Some(v) = file.detect_types {
        options.detect_types = v;
    }
    if let Some(v) = file.window_size {
        options.window_size = v;
    }
    if let Some(v) = file.change_threshold {
        options.change_threshold = v;
    }
    if let Some(v) = file.num_workers {
        options.num_workers = v;
    }
    if let Some(v) = file.chunk_size {
        options.chunk_size = v;
    }
}

fn apply_cli(options: &mut Options, cli: CliOverrides) {
    if let Some(v) = cli.threshold {
        options.threshold = v;
    }
    if let Some(v) = cli.sample_size {
        options.sample_size = Some(v);
    }
    if let Some(v) = cli.use_mmap {
        options.use_mmap = v;
    }
    if let Some(v) = cli.detect_types {
        options.detect_types = v;
    }
    if let Some(v) = cli.window_size {
        options.window_size = v;
    }
    if let Some(v) = cli.change_threshold {
        options.change_threshold = v;
    }
    if let Some(v) = cli.num_workers {
        options.num_workers = v;
    }
    if let Some(v) = cli.chunk_size {
        options.chunk_size = v;
    }
}
