use std::path::PathBuf;

use thiserror::Error;

use crate::synth::SynthError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Failures that end the application before or instead of the frame loop.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("window: {0}")]
    Window(#[from] minifb::Error),

    #[error(transparent)]
    Synth(#[from] SynthError),
}
