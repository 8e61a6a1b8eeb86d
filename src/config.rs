use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_UPLOAD_LIMIT: usize = 10;
pub const DEFAULT_LEDGER_PATH: &str = "successed_file.txt";
pub const DEFAULT_IGNORED_PATH: &str = "ignored_file.txt";
pub const DEFAULT_API_BASE_URL: &str = "https://photoslibrary.googleapis.com";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory scanned for media.
    pub root_path: PathBuf,
    /// Successful uploads allowed per run.
    pub upload_limit: usize,
    pub allowed_extensions: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub follow_symlinks: bool,
    pub ledger_path: PathBuf,
    pub ignored_path: PathBuf,
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    pub api_base_url: String,
    /// Whether dry runs write to the ledger.
    pub record_dry_run: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::new(),
            upload_limit: DEFAULT_UPLOAD_LIMIT,
            allowed_extensions: vec![".png".into(), ".JPG".into(), ".jpg".into()],
            ignore_patterns: Vec::new(),
            follow_symlinks: false,
            ledger_path: PathBuf::from(DEFAULT_LEDGER_PATH),
            ignored_path: PathBuf::from(DEFAULT_IGNORED_PATH),
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            record_dry_run: false,
        }
    }
}

impl AppConfig {
    /// Apply command-line overrides on top of file and environment values.
    pub fn with_overrides(mut self, root_path: Option<PathBuf>, upload_limit: Option<usize>) -> Self {
        if let Some(path) = root_path {
            self.root_path = path;
        }
        if let Some(limit) = upload_limit {
            self.upload_limit = limit;
        }
        self
    }
}

/// Load `Config.toml` from the working directory (optional) layered under
/// `PHOTO_SYNC_*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    load_configuration_from("Config")
}

pub fn load_configuration_from(name: &str) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name(name).required(false))
        .add_source(
            Environment::with_prefix("PHOTO_SYNC")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("allowed_extensions")
                .with_list_parse_key("ignore_patterns"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
