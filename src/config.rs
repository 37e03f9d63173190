use crate::{services::naming::NamingStrategy, storage::s3::S3Options};
use anyhow::{Result, anyhow};
use clap::Parser;
use std::{env, fmt, str::FromStr, time::Duration};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_STORAGE_TIMEOUT_SECS: u64 = 30;

/// Which object store backs the gateway.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    #[default]
    S3,
    Local,
    Memory,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" | "r2" => Ok(BackendKind::S3),
            "local" | "disk" => Ok(BackendKind::Local),
            "memory" => Ok(BackendKind::Memory),
            other => Err(format!(
                "unknown backend `{}` (expected `s3`, `local` or `memory`)",
                other
            )),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::S3 => f.write_str("s3"),
            BackendKind::Local => f.write_str("local"),
            BackendKind::Memory => f.write_str("memory"),
        }
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Empty when unset; file operations then fail with a configuration error.
    pub bucket: String,
    pub public_base_url: String,
    pub naming: NamingStrategy,
    pub backend: BackendKind,
    pub storage_dir: String,
    pub max_upload_bytes: usize,
    pub owner_header: String,
    pub s3: S3Options,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "HTTP gateway for files stored in an object-storage bucket")]
pub struct Args {
    /// Host to bind to (overrides FILE_GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILE_GATEWAY_PORT / PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Target bucket (overrides FILE_GATEWAY_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// S3-compatible endpoint URL (overrides FILE_GATEWAY_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Storage region (overrides FILE_GATEWAY_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Public base URL for uploaded files (overrides FILE_GATEWAY_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Key naming strategy: collision-avoiding | owner-scoped (overrides FILE_GATEWAY_NAMING)
    #[arg(long)]
    pub naming: Option<NamingStrategy>,

    /// Storage backend: s3 | local | memory (overrides FILE_GATEWAY_BACKEND)
    #[arg(long)]
    pub backend: Option<BackendKind>,

    /// Directory used by the local backend (overrides FILE_GATEWAY_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Maximum accepted upload body in bytes (overrides FILE_GATEWAY_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Per-call storage timeout in seconds (overrides FILE_GATEWAY_STORAGE_TIMEOUT_SECS)
    #[arg(long)]
    pub storage_timeout_secs: Option<u64>,

    /// Header carrying the caller's owner id (overrides FILE_GATEWAY_OWNER_HEADER)
    #[arg(long)]
    pub owner_header: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_sources(Args::parse(), |name| env::var(name).ok())
    }

    /// Merge `args` over values looked up through `lookup`, over defaults.
    pub fn from_sources(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Blank values count as unset.
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        // --- Environment fallback ---
        let env_port = match parse_var::<u16>(&var, "FILE_GATEWAY_PORT")? {
            Some(port) => Some(port),
            None => parse_var::<u16>(&var, "PORT")?,
        };
        let env_naming = parse_var::<NamingStrategy>(&var, "FILE_GATEWAY_NAMING")?;
        let env_backend = parse_var::<BackendKind>(&var, "FILE_GATEWAY_BACKEND")?;
        let env_max_upload = parse_var::<usize>(&var, "FILE_GATEWAY_MAX_UPLOAD_BYTES")?;
        let env_timeout = parse_var::<u64>(&var, "FILE_GATEWAY_STORAGE_TIMEOUT_SECS")?;

        // --- Merge ---
        let timeout_secs = args
            .storage_timeout_secs
            .or(env_timeout)
            .unwrap_or(DEFAULT_STORAGE_TIMEOUT_SECS);

        let cfg = Self {
            host: args
                .host
                .or_else(|| var("FILE_GATEWAY_HOST"))
                .unwrap_or_else(|| "0.0.0.0".into()),
            port: args.port.or(env_port).unwrap_or(3000),
            bucket: args
                .bucket
                .or_else(|| var("FILE_GATEWAY_BUCKET"))
                .map(|b| b.trim().to_string())
                .unwrap_or_default(),
            public_base_url: args
                .public_url
                .or_else(|| var("FILE_GATEWAY_PUBLIC_URL"))
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            naming: args.naming.or(env_naming).unwrap_or_default(),
            backend: args.backend.or(env_backend).unwrap_or_default(),
            storage_dir: args
                .storage_dir
                .or_else(|| var("FILE_GATEWAY_STORAGE_DIR"))
                .unwrap_or_else(|| "./data/objects".into()),
            max_upload_bytes: args
                .max_upload_bytes
                .or(env_max_upload)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            owner_header: args
                .owner_header
                .or_else(|| var("FILE_GATEWAY_OWNER_HEADER"))
                .map(|h| h.trim().to_ascii_lowercase())
                .unwrap_or_else(|| "x-user-id".into()),
            s3: S3Options {
                endpoint: args.endpoint.or_else(|| var("FILE_GATEWAY_ENDPOINT")),
                region: args
                    .region
                    .or_else(|| var("FILE_GATEWAY_REGION"))
                    .unwrap_or_else(|| "auto".into()),
                access_key_id: var("FILE_GATEWAY_ACCESS_KEY_ID"),
                secret_access_key: var("FILE_GATEWAY_SECRET_ACCESS_KEY"),
                operation_timeout: Duration::from_secs(timeout_secs),
            },
        };

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    var(name)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|err| anyhow!("parsing {} value `{}`: {}", name, value, err))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(args: Args, vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_sources(args, move |name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_without_input() {
        let cfg = load(Args::default(), &[]).unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:3000");
        assert_eq!(cfg.bucket, "");
        assert_eq!(cfg.naming, NamingStrategy::CollisionAvoiding);
        assert_eq!(cfg.backend, BackendKind::S3);
        assert_eq!(cfg.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(cfg.owner_header, "x-user-id");
        assert_eq!(cfg.s3.region, "auto");
        assert_eq!(cfg.s3.operation_timeout, Duration::from_secs(30));
    }

    #[test]
    fn env_values_are_read() {
        let cfg = load(
            Args::default(),
            &[
                ("FILE_GATEWAY_BUCKET", " uploads "),
                ("FILE_GATEWAY_PUBLIC_URL", "https://pub.example.dev/"),
                ("FILE_GATEWAY_NAMING", "owner-scoped"),
                ("FILE_GATEWAY_BACKEND", "local"),
                ("FILE_GATEWAY_ACCESS_KEY_ID", "id"),
                ("FILE_GATEWAY_SECRET_ACCESS_KEY", "secret"),
                ("PORT", "8080"),
            ],
        )
        .unwrap();
        assert_eq!(cfg.bucket, "uploads");
        assert_eq!(cfg.public_base_url, "https://pub.example.dev");
        assert_eq!(cfg.naming, NamingStrategy::OwnerScoped);
        assert_eq!(cfg.backend, BackendKind::Local);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.s3.access_key_id.as_deref(), Some("id"));
    }

    #[test]
    fn cli_overrides_env() {
        let args = Args {
            port: Some(9000),
            bucket: Some("from-cli".into()),
            naming: Some(NamingStrategy::CollisionAvoiding),
            ..Args::default()
        };
        let cfg = load(
            args,
            &[
                ("FILE_GATEWAY_PORT", "7000"),
                ("FILE_GATEWAY_BUCKET", "from-env"),
                ("FILE_GATEWAY_NAMING", "owner-scoped"),
            ],
        )
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.bucket, "from-cli");
        assert_eq!(cfg.naming, NamingStrategy::CollisionAvoiding);
    }

    #[test]
    fn invalid_numbers_are_errors() {
        let err = load(Args::default(), &[("FILE_GATEWAY_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("FILE_GATEWAY_PORT"));
        assert!(load(Args::default(), &[("FILE_GATEWAY_BACKEND", "ftp")]).is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let cfg = load(
            Args::default(),
            &[("FILE_GATEWAY_SECRET_ACCESS_KEY", "hunter2")],
        )
        .unwrap();
        assert!(!format!("{:?}", cfg).contains("hunter2"));
    }

    #[test]
    fn cli_parses_enum_flags() {
        let args = Args::try_parse_from([
            "file-gateway",
            "--naming",
            "owner-scoped",
            "--backend",
            "memory",
            "--port",
            "4000",
        ])
        .unwrap();
        assert_eq!(args.naming, Some(NamingStrategy::OwnerScoped));
        assert_eq!(args.backend, Some(BackendKind::Memory));
        assert_eq!(args.port, Some(4000));
    }
}
