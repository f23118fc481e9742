use std::path::{Path, PathBuf};

use anyhow::{anyhow, ensure, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "BOOKCOVER_ENV";
const CONFIG_DIR_ENV: &str = "BOOKCOVER_CONFIG_DIR";
const ENV_PREFIX: &str = "BOOKCOVER";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub prompt: PromptSettings,
    #[serde(default)]
    pub download: DownloadSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, and environment overlay.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            // Default to repo root `config` directory.
            Err(_) => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        Self::load_from(&config_dir, &environment)
    }

    /// Load configuration from an explicit directory and environment name.
    pub fn load_from(config_dir: &Path, environment: &str) -> anyhow::Result<Self> {
        let parsed_environment: Environment = environment.parse()?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            );

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        // The environment name wins over whatever the files say.
        settings.environment = parsed_environment;
        settings.validate()?;

        Ok(settings)
    }

    /// Reject combinations that deserialize fine but cannot be used.
    pub fn validate(&self) -> anyhow::Result<()> {
        let bands = &self.prompt;
        let total = u32::from(bands.title_band_percent)
            + u32::from(bands.artwork_band_percent)
            + u32::from(bands.author_band_percent);
        ensure!(
            total == 100,
            "prompt band percentages must sum to 100, got {} ({}/{}/{})",
            total,
            bands.title_band_percent,
            bands.artwork_band_percent,
            bands.author_band_percent
        );
        ensure!(
            !self.generation.base_url.trim().is_empty(),
            "generation.base_url must not be empty"
        );
        ensure!(
            !self.download.fallback_name.trim().is_empty(),
            "download.fallback_name must not be empty"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    // Image generation routinely takes tens of seconds.
    fn default_request_timeout_ms() -> u64 {
        120_000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

/// Where generation requests are sent.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationSettings {
    #[serde(default = "GenerationSettings::default_base_url")]
    pub base_url: String,
    #[serde(default = "GenerationSettings::default_path")]
    pub path: String,
}

impl GenerationSettings {
    fn default_base_url() -> String {
        "http://127.0.0.1:3000".to_string()
    }

    fn default_path() -> String {
        "/api/generate-cover".to_string()
    }

    /// Full URL of the generation endpoint.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            path: Self::default_path(),
        }
    }
}

/// How insistently the prompt asks the image model to keep text intact.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Emphasis {
    Standard,
    #[default]
    Strict,
    #[serde(alias = "character-map")]
    CharacterMap,
}

impl std::str::FromStr for Emphasis {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().replace('-', "_").as_str() {
            "standard" => Ok(Emphasis::Standard),
            "strict" => Ok(Emphasis::Strict),
            "character_map" => Ok(Emphasis::CharacterMap),
            other => Err(anyhow!(
                "unsupported emphasis '{}'; expected standard/strict/character_map",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptSettings {
    #[serde(default)]
    pub emphasis: Emphasis,
    #[serde(default = "PromptSettings::default_placeholder_author")]
    pub placeholder_author: String,
    #[serde(default = "PromptSettings::default_title_band")]
    pub title_band_percent: u8,
    #[serde(default = "PromptSettings::default_artwork_band")]
    pub artwork_band_percent: u8,
    #[serde(default = "PromptSettings::default_author_band")]
    pub author_band_percent: u8,
}

impl PromptSettings {
    fn default_placeholder_author() -> String {
        "[Author Name]".to_string()
    }

    fn default_title_band() -> u8 {
        20
    }

    fn default_artwork_band() -> u8 {
        60
    }

    fn default_author_band() -> u8 {
        20
    }
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            emphasis: Emphasis::default(),
            placeholder_author: Self::default_placeholder_author(),
            title_band_percent: Self::default_title_band(),
            artwork_band_percent: Self::default_artwork_band(),
            author_band_percent: Self::default_author_band(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadSettings {
    #[serde(default = "DownloadSettings::default_directory")]
    pub directory: PathBuf,
    #[serde(default = "DownloadSettings::default_fallback_name")]
    pub fallback_name: String,
}

impl DownloadSettings {
    fn default_directory() -> PathBuf {
        PathBuf::from(".")
    }

    fn default_fallback_name() -> String {
        "book-cover".to_string()
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            directory: Self::default_directory(),
            fallback_name: Self::default_fallback_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info,tower_http=debug".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
    }

    #[test]
    fn default_generation_endpoint_joins_base_and_path() {
        let settings = Settings::default();
        assert_eq!(
            settings.generation.endpoint(),
            "http://127.0.0.1:3000/api/generate-cover"
        );
    }

    #[test]
    fn endpoint_join_tolerates_extra_slashes() {
        let generation = GenerationSettings {
            base_url: "https://covers.example/".to_string(),
            path: "/api/generate-cover".to_string(),
        };
        assert_eq!(
            generation.endpoint(),
            "https://covers.example/api/generate-cover"
        );
    }

    #[test]
    fn default_prompt_layout_is_twenty_sixty_twenty() {
        let prompt = PromptSettings::default();
        assert_eq!(prompt.title_band_percent, 20);
        assert_eq!(prompt.artwork_band_percent, 60);
        assert_eq!(prompt.author_band_percent, 20);
        assert_eq!(prompt.placeholder_author, "[Author Name]");
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn bands_that_do_not_sum_to_hundred_are_rejected() {
        let mut settings = Settings::default();
        settings.prompt.artwork_band_percent = 70;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("must sum to 100"));
    }

    #[test]
    fn emphasis_parses_kebab_and_snake_case() {
        assert_eq!("character-map".parse::<Emphasis>().unwrap(), Emphasis::CharacterMap);
        assert_eq!("STRICT".parse::<Emphasis>().unwrap(), Emphasis::Strict);
        assert!("loud".parse::<Emphasis>().is_err());
    }

    #[test]
    fn load_from_layers_base_and_environment_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("base.toml"),
            "[generation]\nbase_url = \"https://base.example\"\n\n[prompt]\nemphasis = \"standard\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("staging.toml"),
            "[generation]\nbase_url = \"https://staging.example\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(dir.path(), "staging").unwrap();
        assert_eq!(settings.environment, Environment::Staging);
        assert_eq!(settings.generation.base_url, "https://staging.example");
        assert_eq!(settings.generation.path, "/api/generate-cover");
        assert_eq!(settings.prompt.emphasis, Emphasis::Standard);
    }

    #[test]
    fn load_from_accepts_kebab_case_emphasis() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("base.toml"),
            "[prompt]\nemphasis = \"character-map\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(dir.path(), "local").unwrap();
        assert_eq!(settings.prompt.emphasis, Emphasis::CharacterMap);
    }

    #[test]
    fn load_from_rejects_unknown_environment() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load_from(dir.path(), "qa").unwrap_err();
        assert!(err.to_string().contains("unsupported environment"));
    }

    #[test]
    fn load_from_rejects_bad_band_split() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("base.toml"),
            "[prompt]\ntitle_band_percent = 30\n",
        )
        .unwrap();
        assert!(Settings::load_from(dir.path(), "local").is_err());
    }
}
