use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use cs_common::blob::ConnectionString;
use cs_common::embedding::{DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAiConfig};
use cs_common::files::Containers;

use crate::error::ApiError;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone, Parser)]
#[command(name = "cs-api", about = "Spreadsheet uploads and company similarity scoring")]
pub struct Cli {
    /// Key for the embedding API
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    /// Azure Storage connection string
    #[arg(long, env = "AZURE_CONNECTION_STRING", hide_env_values = true)]
    pub azure_connection_string: String,

    /// Container holding Companies_in_Milwaukee.xlsx
    #[arg(long, env = "AZURE_CONTAINER_ONE")]
    pub azure_container_one: String,

    /// Container holding Affiliated_Program_Industry_Features.xlsx
    #[arg(long, env = "AZURE_CONTAINER_TWO")]
    pub azure_container_two: String,

    #[arg(long, env = "PORT", default_value_t = 5001)]
    pub port: u16,

    /// Comma separated list of allowed CORS origins, `*` for any
    #[arg(long, env = "CS_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    #[arg(long, env = "CS_EMBEDDING_MODEL", default_value = DEFAULT_MODEL)]
    pub embedding_model: String,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "CS_EMBEDDING_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub embedding_base_url: String,

    #[arg(long, env = "CS_EMBEDDING_TIMEOUT_SECS", default_value_t = 30)]
    pub embedding_timeout_secs: u64,

    /// JSON object of reference company name to description, replacing the built-in set
    #[arg(long, env = "CS_REFERENCE_COMPANIES_PATH")]
    pub reference_companies_path: Option<PathBuf>,

    /// Request body limit in bytes
    #[arg(long, env = "CS_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

impl CorsOrigins {
    fn parse(raw: &str) -> Self {
        let origins = raw
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect::<Vec<_>>();

        if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
            CorsOrigins::Any
        } else {
            CorsOrigins::List(origins)
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    pub cors_origins: CorsOrigins,
    pub storage: ConnectionString,
    pub containers: Containers,
    pub embedding: OpenAiConfig,
    pub reference_companies_path: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("cors_origins", &self.cors_origins)
            .field("account", &self.storage.account_name)
            .field("containers", &self.containers)
            .field("embedding", &self.embedding)
            .field("reference_companies_path", &self.reference_companies_path)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

fn required(value: String, name: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Configuration(format!("{name} must not be empty")));
    }
    Ok(trimmed.to_string())
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ApiError> {
        let api_key = required(cli.openai_api_key, "OPENAI_API_KEY")?;
        let storage = required(cli.azure_connection_string, "AZURE_CONNECTION_STRING")?
            .parse::<ConnectionString>()
            .map_err(|err| {
                ApiError::Configuration(format!("AZURE_CONNECTION_STRING is invalid: {err}"))
            })?;
        let containers = Containers {
            one: required(cli.azure_container_one, "AZURE_CONTAINER_ONE")?,
            two: required(cli.azure_container_two, "AZURE_CONTAINER_TWO")?,
        };
        if containers.one == containers.two {
            return Err(ApiError::Configuration(
                "AZURE_CONTAINER_ONE and AZURE_CONTAINER_TWO must differ".into(),
            ));
        }

        if cli.embedding_timeout_secs == 0 {
            return Err(ApiError::Configuration(
                "CS_EMBEDDING_TIMEOUT_SECS must be positive".into(),
            ));
        }
        if cli.max_upload_bytes == 0 {
            return Err(ApiError::Configuration(
                "CS_MAX_UPLOAD_BYTES must be positive".into(),
            ));
        }

        let embedding = OpenAiConfig {
            api_key,
            model: required(cli.embedding_model, "CS_EMBEDDING_MODEL")?,
            base_url: required(cli.embedding_base_url, "CS_EMBEDDING_BASE_URL")?,
            timeout: Duration::from_secs(cli.embedding_timeout_secs),
        };

        Ok(Self {
            port: cli.port,
            cors_origins: CorsOrigins::parse(&cli.cors_origins),
            storage,
            containers,
            embedding,
            reference_companies_path: cli.reference_companies_path,
            max_upload_bytes: cli.max_upload_bytes,
        })
    }

    pub fn for_tests() -> Self {
        Self {
            port: 5001,
            cors_origins: CorsOrigins::Any,
            storage: "UseDevelopmentStorage=true"
                .parse()
                .expect("development storage connection string parses"),
            containers: Containers {
                one: "companies".into(),
                two: "programs".into(),
            },
            embedding: OpenAiConfig::new("test-key"),
            reference_companies_path: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}
