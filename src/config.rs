pub use config::{Config, File as ConfigFile};
pub use once_cell::sync::OnceCell;
use std::error::Error;

static GLOBAL_CONFIG: OnceCell<Config> = OnceCell::new();

/// Load `config.toml` (optional) into the process-wide config. CLI flags
/// override individual values at the call sites.
pub fn init_global_config() -> Result<(), Box<dyn Error>> {
    let mut config = Config::default();
    config.merge(ConfigFile::with_name("config.toml").required(false))?;
    GLOBAL_CONFIG
        .set(config)
        .map_err(|_| "Config already set")?;
    Ok(())
}

pub fn get_global_config() -> &'static Config {
    GLOBAL_CONFIG.get().expect("Config not initialized")
}

/// String lookup with a fallback default.
pub fn get_str(key: &str, default: &str) -> String {
    get_global_config()
        .get_string(key)
        .unwrap_or_else(|_| default.to_string())
}

/// Default export destinations, derived from the network name the way the
/// node tooling names them: `<network>net_utxo.csv` / `<network>net_address.csv`.
pub fn default_export_paths(network_name: &str) -> (String, String) {
    (
        format!("{}net_utxo.csv", network_name),
        format!("{}net_address.csv", network_name),
    )
}
