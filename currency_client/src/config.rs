use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    #[serde(
        default = "default_log_level",
        deserialize_with = "deserialize_log_level"
    )]
    pub log_level: LogLevel,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub upload: UploadLimits,
    #[serde(default)]
    pub pagination: PaginationConfig,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api: ApiConfig::default(),
            upload: UploadLimits::default(),
            pagination: PaginationConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:5000".into()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadLimits {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

fn default_max_file_size() -> usize {
    16 * 1024 * 1024
}

fn default_max_files() -> usize {
    10
}

fn default_allowed_types() -> Vec<String> {
    [
        "image/jpeg",
        "image/jpg",
        "image/png",
        "image/gif",
        "image/bmp",
        "image/tiff",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl UploadLimits {
    /// Matches a MIME type against `allowed_types`. Entries may end in `/*`;
    /// an empty list accepts any image.
    pub fn allows(&self, mime_type: &str) -> bool {
        let mime_type = mime_type.to_lowercase();
        if !mime_type.starts_with("image/") {
            return false;
        }
        if self.allowed_types.is_empty() {
            return true;
        }

        self.allowed_types.iter().any(|allowed| {
            let allowed = allowed.to_lowercase();
            match allowed.strip_suffix("/*") {
                Some(prefix) => mime_type.starts_with(&format!("{}/", prefix)),
                None => allowed == mime_type,
            }
        })
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            max_files: default_max_files(),
            allowed_types: default_allowed_types(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaginationConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_page_size_options")]
    pub page_size_options: Vec<u32>,
}

fn default_page_size() -> u32 {
    10
}

fn default_page_size_options() -> Vec<u32> {
    vec![5, 10, 25, 50]
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            page_size_options: default_page_size_options(),
        }
    }
}

/// Layers `configuration/base.yaml`, `configuration/<APP_ENVIRONMENT>.yaml`
/// and `CC_` prefixed variables over the built-in defaults. Missing files are fine.
pub fn get_configuration() -> Result<ClientConfig, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("current directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .to_lowercase();

    let config = config::Config::builder()
        .add_source(
            config::File::from(configuration_directory.join("base.yaml")).required(false),
        )
        .add_source(
            config::File::from(configuration_directory.join(format!("{}.yaml", environment)))
                .required(false),
        )
        .add_source(
            config::Environment::with_prefix("CC")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    config.try_deserialize::<ClientConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_published_limits() {
        let config = ClientConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:5000");
        assert_eq!(config.api.timeout(), Duration::from_secs(30));
        assert_eq!(config.upload.max_file_size, 16 * 1024 * 1024);
        assert_eq!(config.upload.max_files, 10);
        assert!(config.upload.allowed_types.contains(&"image/tiff".to_string()));
        assert_eq!(config.pagination.default_page_size, 10);
        assert_eq!(config.pagination.page_size_options, vec![5, 10, 25, 50]);
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::try_from("DEBUG".to_string()), Ok(LogLevel::Debug));
        assert!(LogLevel::try_from("verbose".to_string()).is_err());
        assert_eq!(ClientConfig::default().log_level, LogLevel::Info);
    }

    #[test]
    fn test_allowed_types_matching() {
        let limits = UploadLimits::default();
        assert!(limits.allows("image/jpeg"));
        assert!(limits.allows("IMAGE/PNG"));
        assert!(!limits.allows("image/webp"));
        assert!(!limits.allows("application/pdf"));

        let any_image = UploadLimits {
            allowed_types: vec!["image/*".into()],
            ..UploadLimits::default()
        };
        assert!(any_image.allows("image/webp"));
        assert!(!any_image.allows("text/plain"));

        let unrestricted = UploadLimits {
            allowed_types: Vec::new(),
            ..UploadLimits::default()
        };
        assert!(unrestricted.allows("image/webp"));
        assert!(!unrestricted.allows("video/mp4"));
    }
}
