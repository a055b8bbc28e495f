//! Build a café from configuration.

use crate::config::CafeConfig;
use crate::core::{Cafe, CafeError, FixedPreparation};

/// Open a café whose baristas spend exactly `cfg.service_time()` on each coffee.
///
/// # Errors
///
/// - `CafeError::InvalidConfig` if validation fails
/// - `CafeError::Runtime` if called outside a tokio runtime
pub fn build_cafe(cfg: &CafeConfig) -> Result<Cafe, CafeError> {
    cfg.validate()
        .map_err(|e| CafeError::InvalidConfig(format!("config invalid: {e}")))?;
    Cafe::open(cfg.clone(), FixedPreparation(cfg.service_time()))
}

/// Parse a JSON configuration and open the café it describes.
///
/// # Errors
///
/// Same as [`build_cafe`], with parse failures reported as `InvalidConfig`.
pub fn build_cafe_from_json(input: &str) -> Result<Cafe, CafeError> {
    let cfg = CafeConfig::from_json_str(input).map_err(CafeError::InvalidConfig)?;
    build_cafe(&cfg)
}
