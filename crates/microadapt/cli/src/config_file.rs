//! Engine configuration from files and flags.
//!
//! A config file (`.toml` or `.json`) or a preset provides the base; individual
//! flags override single fields on top of it.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, ValueEnum};
use microadapt_engine::{EngineConfig, FitStrategy};

/// Built-in configuration presets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    #[default]
    Default,
    /// Small footprint for constrained devices
    Edge,
    /// Short windows that react quickly in demos
    Demo,
}

impl Preset {
    fn config(self) -> EngineConfig {
        match self {
            Self::Default => EngineConfig::default(),
            Self::Edge => EngineConfig::edge(),
            Self::Demo => EngineConfig::demo(),
        }
    }
}

/// Local model family selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    Auto,
    Constant,
    Linear,
    Oscillator,
}

impl From<StrategyArg> for FitStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Auto => FitStrategy::Auto,
            StrategyArg::Constant => FitStrategy::Constant,
            StrategyArg::Linear => FitStrategy::Linear,
            StrategyArg::Oscillator => FitStrategy::Oscillator,
        }
    }
}

/// Flags shared by every command that builds an engine.
#[derive(Args, Debug, Clone, Default)]
pub struct EngineArgs {
    /// Engine configuration file (.toml or .json)
    #[arg(long, env = "MICROADAPT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Preset used when no configuration file is given
    #[arg(long, value_enum, default_value_t = Preset::Default)]
    pub preset: Preset,

    /// Base window length W (also the warm-up length)
    #[arg(long)]
    pub window: Option<usize>,

    /// Number of hierarchical window levels
    #[arg(long)]
    pub levels: Option<usize>,

    /// Maximum number of regime model units
    #[arg(long)]
    pub max_units: Option<usize>,

    /// Normalized distance above which a new regime is opened
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Local model family
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,
}

impl EngineArgs {
    /// Resolve the final, validated configuration.
    pub fn resolve(&self) -> anyhow::Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => self.preset.config(),
        };
        if let Some(w) = self.window {
            config.base_window_length = w;
        }
        if let Some(l) = self.levels {
            config.num_hierarchical_levels = l;
        }
        if let Some(m) = self.max_units {
            config.max_model_units = m;
        }
        if let Some(t) = self.threshold {
            config.novelty_threshold = t;
        }
        if let Some(s) = self.strategy {
            config.fit_strategy = s.into();
        }
        config.validate().context("invalid engine configuration")?;
        Ok(config)
    }
}

/// Load an [`EngineConfig`] from TOML or JSON, chosen by file extension.
/// Missing fields take their defaults.
pub fn load_config(path: &Path) -> anyhow::Result<EngineConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let config = match ext.as_deref() {
        Some("toml") => toml::from_str(&contents)
            .with_context(|| format!("parsing TOML config {}", path.display()))?,
        Some("json") => serde_json::from_str(&contents)
            .with_context(|| format!("parsing JSON config {}", path.display()))?,
        _ => bail!(
            "unsupported config format for {} (expected .toml or .json)",
            path.display()
        ),
    };
    Ok(config)
}
