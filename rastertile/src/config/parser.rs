//! INI → [`EngineConfig`] mapping.
//!
//! The single place where INI key names are mapped to struct fields.

use std::str::FromStr;

use ini::{Ini, Properties};

use super::{ConfigError, EngineConfig};
use crate::legend::Rgba;

/// Parse an `Ini` into an `EngineConfig`.
///
/// Starts from the defaults and overlays every value found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<EngineConfig, ConfigError> {
    let mut config = EngineConfig::default();

    // [pyramid] section
    if let Some(section) = ini.section(Some("pyramid")) {
        if let Some(v) = get(section, "pyramid", "tile_size", "expected a power of two")? {
            config.pyramid.tile_size = v;
        }
        if let Some(v) = get(section, "pyramid", "min_zoom", "expected a zoom between 0 and 22")? {
            config.pyramid.min_zoom = v;
        }
        if let Some(v) = get(section, "pyramid", "zoom_policy", "must be one of: down, up")? {
            config.pyramid.zoom_policy = v;
        }
        if let Some(v) = section.get("resampling") {
            let v = v.trim();
            if !v.is_empty() && v != "auto" {
                config.pyramid.resampling = Some(parse(
                    "pyramid",
                    "resampling",
                    v,
                    "must be one of: auto, nearest, bilinear, majority",
                )?);
            }
        }
        if let Some(v) = get(
            section,
            "pyramid",
            "failure_policy",
            "must be one of: best_effort, all_or_nothing",
        )? {
            config.pyramid.failure_policy = v;
        }
        if let Some(v) = get(section, "pyramid", "workers", "expected a thread count (0 = auto)")? {
            config.pyramid.workers = v;
        }
    }

    // [aggregation] section
    if let Some(section) = ini.section(Some("aggregation")) {
        if let Some(v) = get(section, "aggregation", "bucket_width", "expected a number")? {
            config.aggregation.bucket_width = v;
        }
        if let Some(v) = get(section, "aggregation", "workers", "expected a thread count (0 = auto)")? {
            config.aggregation.workers = v;
        }
    }

    // [render] section
    if let Some(section) = ini.section(Some("render")) {
        if let Some(v) = section.get("background") {
            config.render.background =
                Rgba::from_hex(v.trim()).map_err(|_| ConfigError::InvalidValue {
                    section: "render".to_string(),
                    key: "background".to_string(),
                    value: v.to_string(),
                    reason: "expected a colour like '#RRGGBB' or '#RRGGBBAA'".to_string(),
                })?;
        }
    }

    config.validate()?;
    Ok(config)
}

fn get<T: FromStr>(
    section: &Properties,
    name: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigError> {
    section
        .get(key)
        .map(|v| parse(name, key, v, reason))
        .transpose()
}

fn parse<T: FromStr>(section: &str, key: &str, value: &str, reason: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    })
}
