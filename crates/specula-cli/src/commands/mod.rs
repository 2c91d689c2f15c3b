//! Command implementations

pub mod browse;
pub mod info;
pub mod tree;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use specula_mirrors::{PackageInference, Registry, SpeculaConfig};
use specula_runtime::{Image, Value, Vm};
use termcolor::ColorChoice;

use crate::output::resolve_color_choice;

/// Options shared by every command
pub struct GlobalOptions {
    pub color: Option<String>,
    pub config: Option<PathBuf>,
}

impl GlobalOptions {
    /// Explicit `--config`, else `$SPECULA_CONFIG`, else `./specula.toml`, else defaults
    pub fn load_config(&self) -> anyhow::Result<SpeculaConfig> {
        match &self.config {
            Some(path) => SpeculaConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display())),
            None => SpeculaConfig::discover().context("loading config"),
        }
    }

    pub fn color_choice(&self, config: &SpeculaConfig) -> ColorChoice {
        resolve_color_choice(self.color.as_deref(), config.output.color)
    }
}

/// A loaded image plus the registry used to inspect it
pub struct Session {
    pub vm: Arc<Vm>,
    pub registry: Arc<Registry>,
    pub config: SpeculaConfig,
}

impl Session {
    pub fn open(options: &GlobalOptions, image: &Path) -> anyhow::Result<Self> {
        let config = options.load_config()?;
        let parsed = Image::from_file(image)
            .with_context(|| format!("loading image {}", image.display()))?;
        let vm = Vm::new();
        parsed
            .load(&vm)
            .with_context(|| format!("applying image {}", image.display()))?;

        let registry = Registry::global();
        registry.set_resolver(Arc::new(PackageInference::new(config.resolver.clone())));
        Ok(Self { vm, registry, config })
    }

    /// Display representation of a raw value
    pub fn render(&self, value: &Value) -> String {
        self.vm.with(|rt| rt.inspect(value))
    }
}
