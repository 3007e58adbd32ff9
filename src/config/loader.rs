//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, LogFormat};
use crate::port::InterByte;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_LINE";

/// Config file name in the working directory
const LOCAL_FILE_NAME: &str = "serial-line.toml";

/// Config file name inside the platform config directory
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_LINE_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIAL_LINE_CONFIG` environment variable (explicit path)
    /// 2. `./serial-line.toml` (current directory)
    /// 3. `serial-line/config.toml` in the platform config directory
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables can override any config file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;
        validate(&config)?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        validate(&config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Still apply env overrides even with defaults
        if let Err(e) = apply_env_overrides(&mut config) {
            tracing::warn!(error = %e, "ignoring invalid environment override");
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a mutable reference to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to file.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self
            .config_path
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired("No config file path set".to_string()))?;

        save_to_file(&self.config, path)
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(LOCAL_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. Platform config directory
    get_default_config_path().filter(|path| path.exists())
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "serial-line").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Reject values no port would accept.
fn validate(config: &Config) -> ConfigResult<()> {
    config.port.settings().validate().map_err(ConfigError::InvalidPort)?;
    if config.testing.baud == 0 {
        return Err(ConfigError::validation("testing.baud", "must be positive"));
    }
    Ok(())
}

fn env_var(section: &str, key: &str) -> (String, Option<String>) {
    let name = format!("{ENV_PREFIX}_{section}_{key}");
    let value = std::env::var(&name).ok();
    (name, value)
}

fn parse_env<T: FromStr>(var: &str, value: &str, message: &str) -> ConfigResult<T> {
    value.parse().map_err(|_| ConfigError::env_parse(var, message))
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `SERIAL_LINE_<SECTION>_<KEY>`
/// For example:
/// - `SERIAL_LINE_PORT_NAME=/dev/ttyUSB0`
/// - `SERIAL_LINE_PORT_BAUD_RATE=115200`
/// - `SERIAL_LINE_TIMEOUT_READ_CONSTANT_MS=250`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Port overrides
    if let (_, Some(val)) = env_var("PORT", "NAME") {
        config.port.name = Some(val);
    }
    if let (var, Some(val)) = env_var("PORT", "BAUD_RATE") {
        config.port.baud_rate = parse_env(&var, &val, "Invalid baud rate")?;
    }
    if let (var, Some(val)) = env_var("PORT", "BYTE_SIZE") {
        let bits: u8 = parse_env(&var, &val, "Invalid byte size")?;
        config.port.byte_size = bits
            .try_into()
            .map_err(|_| ConfigError::env_parse(&var, "Byte size must be 5, 6, 7 or 8"))?;
    }
    if let (var, Some(val)) = env_var("PORT", "PARITY") {
        config.port.parity = parse_env(&var, &val, "Invalid parity")?;
    }
    if let (var, Some(val)) = env_var("PORT", "STOP_BITS") {
        let bits: f32 = parse_env(&var, &val, "Invalid stop bits")?;
        config.port.stop_bits = bits
            .try_into()
            .map_err(|_| ConfigError::env_parse(&var, "Stop bits must be 1, 1.5 or 2"))?;
    }
    if let (var, Some(val)) = env_var("PORT", "FLOW_CONTROL") {
        config.port.flow_control = parse_env(&var, &val, "Invalid flow control")?;
    }

    // Timeout overrides
    if let (var, Some(val)) = env_var("TIMEOUT", "INTER_BYTE") {
        config.timeout.inter_byte = if val.eq_ignore_ascii_case("disabled") {
            InterByte::Disabled
        } else {
            InterByte::from_millis(parse_env(&var, &val, "Invalid inter-byte timeout")?)
        };
    }
    let millis = [
        ("READ_CONSTANT_MS", &mut config.timeout.read_constant_ms),
        ("READ_MULTIPLIER_MS", &mut config.timeout.read_multiplier_ms),
        ("WRITE_CONSTANT_MS", &mut config.timeout.write_constant_ms),
        ("WRITE_MULTIPLIER_MS", &mut config.timeout.write_multiplier_ms),
    ];
    for (key, field) in millis {
        if let (var, Some(val)) = env_var("TIMEOUT", key) {
            *field = parse_env(&var, &val, "Invalid timeout")?;
        }
    }

    // Logging overrides
    if let (_, Some(val)) = env_var("LOGGING", "LEVEL") {
        config.logging.level = val;
    }
    if let (var, Some(val)) = env_var("LOGGING", "FORMAT") {
        config.logging.format = val
            .parse::<LogFormat>()
            .map_err(|message| ConfigError::env_parse(var, message))?;
    }

    // Testing overrides (also support legacy TEST_PORT etc.)
    if let Some(val) = env_var("TESTING", "PORT")
        .1
        .or_else(|| std::env::var("TEST_PORT").ok())
    {
        config.testing.port = Some(val);
    }
    if let Some(val) = env_var("TESTING", "BAUD")
        .1
        .or_else(|| std::env::var("TEST_BAUD").ok())
    {
        config.testing.baud = parse_env(
            &format!("{ENV_PREFIX}_TESTING_BAUD or TEST_BAUD"),
            &val,
            "Invalid baud rate",
        )?;
    }
    if let Some(val) = env_var("TESTING", "LOOPBACK")
        .1
        .or_else(|| std::env::var("TEST_LOOPBACK").ok())
    {
        config.testing.loopback = val.eq_ignore_ascii_case("true") || val == "1";
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{Parity, Timeout};
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_default_loader() {
        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().port.baud_rate, 9600);
        assert!(loader.config_path.is_none());
    }

    #[test]
    #[serial]
    fn test_env_override() {
        env::set_var("SERIAL_LINE_PORT_BAUD_RATE", "57600");
        env::set_var("SERIAL_LINE_PORT_PARITY", "odd");
        env::set_var("SERIAL_LINE_TIMEOUT_INTER_BYTE", "disabled");

        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().port.baud_rate, 57600);
        assert_eq!(loader.config().port.parity, Parity::Odd);
        assert_eq!(loader.config().timeout.inter_byte, InterByte::Disabled);

        env::remove_var("SERIAL_LINE_PORT_BAUD_RATE");
        env::remove_var("SERIAL_LINE_PORT_PARITY");
        env::remove_var("SERIAL_LINE_TIMEOUT_INTER_BYTE");
    }

    #[test]
    #[serial]
    fn test_bad_env_value_is_reported() {
        env::set_var("SERIAL_LINE_TIMEOUT_READ_CONSTANT_MS", "soon");

        let mut config = Config::default();
        let err = apply_env_overrides(&mut config).unwrap_err();
        assert!(err.to_string().contains("SERIAL_LINE_TIMEOUT_READ_CONSTANT_MS"));

        env::remove_var("SERIAL_LINE_TIMEOUT_READ_CONSTANT_MS");
    }

    #[test]
    #[serial]
    fn test_legacy_test_port_env() {
        env::set_var("TEST_PORT", "COM99");
        env::set_var("TEST_BAUD", "57600");
        env::set_var("TEST_LOOPBACK", "1");

        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().testing.port, Some("COM99".to_string()));
        assert_eq!(loader.config().testing.baud, 57600);
        assert!(loader.config().testing.loopback);

        env::remove_var("TEST_PORT");
        env::remove_var("TEST_BAUD");
        env::remove_var("TEST_LOOPBACK");
    }

    #[test]
    #[serial]
    fn test_save_and_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("serial-line.toml");

        let mut loader = ConfigLoader::with_defaults();
        loader.config_mut().port.name = Some("/dev/ttyACM0".to_string());
        loader.config_mut().timeout = Timeout::simple(250);
        loader.save_to(&path).unwrap();

        let reloaded = ConfigLoader::load_from(&path).unwrap();
        assert_eq!(reloaded.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(reloaded.config().port.name.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(reloaded.config().timeout, Timeout::simple(250));
    }

    #[test]
    #[serial]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::load_from(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    #[serial]
    fn test_load_rejects_zero_baud() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[port]\nbaud_rate = 0\n").unwrap();

        let err = ConfigLoader::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort(_)));
    }

    #[test]
    #[serial]
    fn test_explicit_path_env_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[port]\nbaud_rate = 19200\n").unwrap();
        env::set_var(CONFIG_PATH_ENV, &path);

        let loader = ConfigLoader::load().unwrap();
        assert_eq!(loader.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(loader.config().port.baud_rate, 19200);

        env::remove_var(CONFIG_PATH_ENV);
    }
}
