//! Settings read from ~/.coreptr/config.toml. The file is created with defaults the
//! first time coreptr runs so users have something to edit.
use clap::ValueEnum;
use serde::Deserialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = include_str!("default_config.toml");

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    /// Color output written to a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub color: ColorChoice,
    pub styles: StyleConfig,
}

/// Color names (optionally prefixed with "bold ") for each kind of output.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub warn: String,
    pub note: String,
    pub address: String,
    pub label: String,
    pub module: String,
    pub table_header: String,
}

impl Default for StyleConfig {
    fn default() -> Self {
        StyleConfig {
            warn: "bold red".to_string(),
            note: "dark_gray".to_string(),
            address: "cyan".to_string(),
            label: "green".to_string(),
            module: "bold blue".to_string(),
            table_header: "bold".to_string(),
        }
    }
}

impl Config {
    pub fn parse(text: &str) -> Result<Config, toml::de::Error> {
        toml::from_str(text)
    }

    /// Loads the user's config file. Problems are reported once and defaults used.
    pub fn load() -> Config {
        let Some(path) = config_path() else {
            return Config::default();
        };
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Config::default(),
            Err(err) => {
                eprintln!("couldn't read {}: {err}", path.display()); // don't use warn() here
                return Config::default();
            }
        };
        match Config::parse(&text) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("couldn't parse {}: {err}", path.display()); // don't use warn() here
                Config::default()
            }
        }
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|mut path| {
        path.push(".coreptr");
        path.push("config.toml");
        path
    })
}

/// Create the config file if it is missing.
pub fn generate_config_file() {
    if let Some(mut path) = dirs::home_dir() {
        path.push(".coreptr");
        if make_dir(&path) {
            path.push("config.toml");
            write_defaults(path);
        }
    } else {
        eprintln!("couldn't find home directory"); // don't use warn() here
    }
}

fn make_dir(path: &Path) -> bool {
    match fs::create_dir(path) {
        Ok(_) => true,
        Err(err) => match err.kind() {
            io::ErrorKind::AlreadyExists => true,
            _ => {
                eprintln!("couldn't create {}: {err}", path.display());
                false
            }
        },
    }
}

fn write_defaults(path: PathBuf) {
    match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(mut file) => {
            if let Err(err) = file.write_all(DEFAULT_CONFIG.as_bytes()) {
                eprintln!("error writing defaults to {}: {err}", path.display());
            }
        }
        Err(err) => match err.kind() {
            io::ErrorKind::AlreadyExists => (), // user already has a config file
            _ => eprintln!("error creating {}: {err}", path.display()),
        },
    }
}
