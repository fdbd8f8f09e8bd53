use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, path::PathBuf};

use crate::models::DEFAULT_DELIMITER;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub root: PathBuf,
    pub source_name: String,
    pub cache_dir: PathBuf,
    pub delimiter: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Inventory a directory tree through a local cache")]
pub struct Args {
    /// Directory to inventory (overrides INVENTORY_ROOT)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Name the inventory is cached under (overrides INVENTORY_SOURCE_NAME)
    #[arg(long)]
    pub name: Option<String>,

    /// Directory holding cache databases (overrides INVENTORY_CACHE_DIR)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Delimiter between key segments (overrides INVENTORY_DELIMITER)
    #[arg(long)]
    pub delimiter: Option<String>,

    /// Re-enumerate the source and rebuild its cache
    #[arg(long)]
    pub refresh: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and refresh flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let refresh = args.refresh;
        Ok((Self::merge(args, |name| env::var(name).ok())?, refresh))
    }

    /// Flags win over environment values, which win over defaults.
    fn merge(args: Args, env_var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let root = match args.root.or_else(|| env_var("INVENTORY_ROOT").map(PathBuf::from)) {
            Some(root) => root,
            None => bail!("no directory to inventory: pass --root or set INVENTORY_ROOT"),
        };

        let source_name = match args.name.or_else(|| env_var("INVENTORY_SOURCE_NAME")) {
            Some(name) => name,
            None => root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .with_context(|| format!("deriving a source name from `{}`", root.display()))?,
        };

        let cache_dir = args
            .cache_dir
            .or_else(|| env_var("INVENTORY_CACHE_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("./data/cache"));

        let delimiter = args
            .delimiter
            .or_else(|| env_var("INVENTORY_DELIMITER"))
            .unwrap_or_else(|| DEFAULT_DELIMITER.to_string());
        if delimiter.is_empty() {
            bail!("delimiter must not be empty");
        }

        Ok(Self {
            root,
            source_name,
            cache_dir,
            delimiter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn defaults_derive_name_from_root() {
        let cfg = AppConfig::merge(
            Args {
                root: Some(PathBuf::from("/srv/photos")),
                ..Args::default()
            },
            env_of(&[]),
        )
        .unwrap();
        assert_eq!(cfg.source_name, "photos");
        assert_eq!(cfg.cache_dir, PathBuf::from("./data/cache"));
        assert_eq!(cfg.delimiter, "/");
    }

    #[test]
    fn flags_override_environment() {
        let cfg = AppConfig::merge(
            Args {
                name: Some("flag-name".into()),
                ..Args::default()
            },
            env_of(&[
                ("INVENTORY_ROOT", "/data"),
                ("INVENTORY_SOURCE_NAME", "env-name"),
                ("INVENTORY_CACHE_DIR", "/var/cache/inventory"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.root, PathBuf::from("/data"));
        assert_eq!(cfg.source_name, "flag-name");
        assert_eq!(cfg.cache_dir, PathBuf::from("/var/cache/inventory"));
    }

    #[test]
    fn missing_root_and_empty_delimiter_are_rejected() {
        assert!(AppConfig::merge(Args::default(), env_of(&[])).is_err());
        assert!(
            AppConfig::merge(
                Args {
                    root: Some(PathBuf::from("/data")),
                    delimiter: Some(String::new()),
                    ..Args::default()
                },
                env_of(&[]),
            )
            .is_err()
        );
    }
}
