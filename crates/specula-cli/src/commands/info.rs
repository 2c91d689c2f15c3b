//! `specula info` — Display version and environment.

use std::path::Path;

use specula_mirrors::config::{CONFIG_ENV, CONFIG_FILE};
use specula_mirrors::debug::LOG_ENV;

use super::GlobalOptions;

pub fn execute(options: &GlobalOptions) -> anyhow::Result<()> {
    println!("Specula v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("Platform:     {} ({})", std::env::consts::OS, std::env::consts::ARCH);

    let config_path = options
        .config
        .clone()
        .or_else(|| std::env::var_os(CONFIG_ENV).map(Into::into))
        .or_else(|| Some(Path::new(CONFIG_FILE).to_path_buf()).filter(|p| p.is_file()));
    match config_path {
        Some(path) => {
            println!("Config:       {}", path.display());
            let config = options.load_config()?;
            println!("Roots:        {}", config.resolver.roots.len());
            println!("Namespaces:   {}", config.resolver.namespaces.len());
        }
        None => println!("Config:       (defaults)"),
    }

    println!();
    println!("Environment:");
    print_env("  SPECULA_LOG", LOG_ENV);
    print_env("  SPECULA_CONFIG", CONFIG_ENV);
    print_env("  NO_COLOR", "NO_COLOR");

    Ok(())
}

fn print_env(label: &str, var: &str) {
    match std::env::var(var) {
        Ok(val) => println!("{} = {}", label, val),
        Err(_) => println!("{} = (default)", label),
    }
}
