use anyhow::{anyhow, Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use config::{Config, Environment, File as ConfigFile};
use hct_ai_core::{FeatureSchema, Model, PredictionService, ScoringBackend};
use hct_rpc::{start_server, AppState};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_CONFIG_PATH: &str = "config/hct.toml";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_MODEL_PATH: &str = "model_gbdt.json";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_FORMAT: &str = "pretty";

/// Service configuration
#[derive(Debug, Clone, PartialEq)]
struct AppConfig {
    config_path: Option<PathBuf>,

    // Network
    host: String,
    port: u16,
    cors_permissive: bool,

    // Model
    model_path: PathBuf,

    // Observability
    prometheus_enabled: bool,

    // Logging
    log_level: String,
    log_format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_permissive: true,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            prometheus_enabled: true,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl AppConfig {
    /// Layer the optional config file under `HCT_*` environment variables
    fn load(config_path_override: Option<&str>) -> Result<Self> {
        let resolved_path = if let Some(path) = config_path_override {
            let path = PathBuf::from(path);
            if !path.exists() {
                anyhow::bail!(
                    "Configuration file {} not found (specified via --config)",
                    path.display()
                );
            }
            Some(path)
        } else {
            Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|path| path.exists())
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder.add_source(Environment::with_prefix("HCT").try_parsing(true));

        let config = builder.build().context("failed to read configuration")?;
        Self::from_config(&config, resolved_path)
    }

    fn from_config(config: &Config, config_path: Option<PathBuf>) -> Result<Self> {
        let defaults = Self::default();

        let port = match get_int_value(config, &["port", "server.port"]) {
            Some(raw) => u16::try_from(raw).map_err(|_| anyhow!("port {raw} is out of range"))?,
            None => defaults.port,
        };

        Ok(Self {
            config_path,
            host: get_string_value(config, &["host", "server.host"]).unwrap_or(defaults.host),
            port,
            cors_permissive: get_bool_value(
                config,
                &["cors_permissive", "server.cors_permissive"],
                defaults.cors_permissive,
            ),
            model_path: get_string_value(config, &["model_path", "model.path"])
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            prometheus_enabled: get_bool_value(
                config,
                &["prometheus_enabled", "metrics.enabled"],
                defaults.prometheus_enabled,
            ),
            log_level: get_string_value(config, &["log_level", "logging.level"])
                .unwrap_or(defaults.log_level),
            log_format: get_string_value(config, &["log_format", "logging.format"])
                .unwrap_or(defaults.log_format),
        })
    }

    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            anyhow::bail!("host must not be empty");
        }
        if self.port == 0 {
            anyhow::bail!("port must be greater than zero");
        }
        if self.model_path.as_os_str().is_empty() {
            anyhow::bail!("model_path must not be empty");
        }
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            anyhow::bail!(
                "log_format must be 'pretty' or 'json', got '{}'",
                self.log_format
            );
        }
        Ok(())
    }

    fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn get_int_value(config: &Config, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| config.get_int(key).ok())
}

fn get_bool_value(config: &Config, keys: &[&str], default: bool) -> bool {
    for key in keys {
        if let Ok(value) = config.get_bool(key) {
            return value;
        }
        if let Ok(raw) = config.get_string(key) {
            if let Ok(parsed) = raw.parse::<bool>() {
                return parsed;
            }
        }
    }
    default
}

fn build_cli() -> Command {
    Command::new("hct-node")
        .version(env!("CARGO_PKG_VERSION"))
        .about("HCT survival prediction service")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Override bind host"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .help("Override bind port"),
        )
        .arg(
            Arg::new("model-path")
                .short('m')
                .long("model-path")
                .value_name("FILE")
                .help("Path to the GBDT model artifact (JSON)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .help("Override the log level"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "json"])
                .help("Select log output format"),
        )
        .arg(
            Arg::new("disable-metrics")
                .long("disable-metrics")
                .action(ArgAction::SetTrue)
                .help("Do not install the Prometheus recorder"),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .action(ArgAction::SetTrue)
                .help("Validate configuration and the model artifact, then exit"),
        )
}

fn load_config_with_overrides(matches: &clap::ArgMatches) -> Result<AppConfig> {
    let config_path = matches
        .get_one::<String>("config")
        .map(|value| value.as_str());
    let mut config = AppConfig::load(config_path)?;
    apply_overrides(matches, &mut config);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(matches: &clap::ArgMatches, config: &mut AppConfig) {
    if let Some(host) = matches.get_one::<String>("host") {
        config.host = host.clone();
    }

    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = *port;
    }

    if let Some(model_path) = matches.get_one::<String>("model-path") {
        config.model_path = PathBuf::from(model_path);
    }

    if let Some(log_level) = matches.get_one::<String>("log-level") {
        config.log_level = log_level.clone();
    }

    if let Some(log_format) = matches.get_one::<String>("log-format") {
        config.log_format = log_format.clone();
    }

    if matches.get_flag("disable-metrics") {
        config.prometheus_enabled = false;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let config = load_config_with_overrides(&matches)?;
    init_logging(&config)?;

    if matches.get_flag("check") {
        return run_self_check(&config);
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config.config_path,
        "Starting HCT prediction service"
    );

    let service = match load_backend(&config.model_path) {
        Ok(backend) => {
            info!(model_type = %backend.model_type(), "Ready to serve predictions");
            PredictionService::new(backend)
        }
        Err(err) => {
            error!("{err:#}");
            warn!("Model not loaded - predictions will not work");
            PredictionService::unavailable()
        }
    };

    let mut state = AppState::new(service).with_cors(config.cors_permissive);
    if let Some(handle) = init_metrics(&config) {
        state = state.with_metrics(handle);
    }

    start_server(state, &config.bind_addr(), shutdown_signal()).await?;
    info!("HCT prediction service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        return;
    }
    info!("Shutting down HCT prediction service");
}

/// Load the model artifact and check it against the feature schema
fn load_backend(path: &Path) -> Result<Arc<dyn ScoringBackend>> {
    if !path.exists() {
        anyhow::bail!("Model file not found at: {}", path.display());
    }

    info!("Loading model from: {}", path.display());
    let model = Model::load_json(path)
        .with_context(|| format!("Error loading model from {}", path.display()))?;
    model
        .verify_feature_contract(FeatureSchema::standard())
        .context("Model does not match the feature schema")?;

    let hash = model
        .hash_hex()
        .context("failed to fingerprint model artifact")?;
    info!(
        trees = model.num_trees(),
        model_hash = %hash,
        "Model loaded successfully"
    );
    Ok(Arc::new(model))
}

fn init_metrics(config: &AppConfig) -> Option<PrometheusHandle> {
    if !config.prometheus_enabled {
        info!("Prometheus metrics exporter disabled via configuration");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            info!("Prometheus metrics exporter registered");
            describe_counter!(
                "hct_predictions_total",
                "Successful predictions, labelled by risk category"
            );
            describe_counter!(
                "hct_prediction_errors_total",
                "Rejected or failed prediction requests, labelled by error kind"
            );
            Some(handle)
        }
        Err(err) => {
            warn!("Failed to install Prometheus metrics exporter: {}", err);
            None
        }
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
    };
    result.map_err(|err| anyhow!("failed to initialise logging: {err}"))
}

fn run_self_check(config: &AppConfig) -> Result<()> {
    info!("Running self-check");
    info!("  bind address: {}", config.bind_addr());
    info!("  model path: {}", config.model_path.display());
    info!(
        "  metrics: {}",
        if config.prometheus_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );

    let backend = load_backend(&config.model_path)?;
    info!(
        "  model: {} ({})",
        backend.model_type(),
        backend.model_hash().unwrap_or_else(|| "no hash".to_string())
    );
    info!("Self-check passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("hct.toml");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults_apply_without_sources() {
        let empty = Config::builder().build().unwrap();
        let config = AppConfig::from_config(&empty, None).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bind_addr(), "0.0.0.0:5000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
port = 8081
model_path = "models/hct.json"
log_format = "json"
prometheus_enabled = false

[server]
host = "127.0.0.1"
"#,
        );

        let config = AppConfig::load(path.to_str()).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8081);
        assert_eq!(config.model_path, PathBuf::from("models/hct.json"));
        assert_eq!(config.log_format, "json");
        assert!(!config.prometheus_enabled);
        assert!(config.cors_permissive);
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn missing_explicit_config_file_is_an_error() {
        let err = AppConfig::load(Some("/no/such/hct.toml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn out_of_range_port_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "port = 70000\n");
        let err = AppConfig::load(path.to_str()).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn cli_flags_override_config() {
        let matches = build_cli()
            .try_get_matches_from([
                "hct-node",
                "--port",
                "9000",
                "--model-path",
                "/srv/model.json",
                "--log-level",
                "debug",
                "--disable-metrics",
            ])
            .unwrap();

        let mut config = AppConfig::default();
        apply_overrides(&matches, &mut config);
        assert_eq!(config.port, 9000);
        assert_eq!(config.model_path, PathBuf::from("/srv/model.json"));
        assert_eq!(config.log_level, "debug");
        assert!(!config.prometheus_enabled);
        assert_eq!(config.host, DEFAULT_HOST);
    }

    #[test]
    fn invalid_values_fail_validation() {
        let config = AppConfig {
            port: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AppConfig {
            log_format: "xml".to_string(),
            ..AppConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn backend_loading_checks_file_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(load_backend(&missing).is_err());

        let path = dir.path().join("model.json");
        Model::new(vec![], 0.5)
            .with_feature_names(FeatureSchema::standard().names())
            .save_json(&path)
            .unwrap();
        let backend = load_backend(&path).unwrap();
        assert_eq!(backend.model_type(), "GBDTModel");

        Model::new(vec![], 0.5)
            .with_feature_names(["donor_age"])
            .save_json(&path)
            .unwrap();
        let err = load_backend(&path).err().unwrap();
        assert!(format!("{err:#}").contains("feature schema"));
    }
}
