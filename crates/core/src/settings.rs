// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Dashboard settings carried in the shadow's `client.parameters` subtree.
//!
//! Settings ride the same `update` topic as relay toggles but live under a
//! non-relay desired key, so relay iteration never sees them. Validation
//! happens locally BEFORE any publish is attempted: a publish that the
//! cloud would accept but the dashboard cannot render is worse than a
//! synchronous rejection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// pH classification thresholds, strictly ascending.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhThresholds {
    pub too_acidic: f64,
    pub slightly_acidic: f64,
    pub optimal: f64,
    pub slightly_alkaline: f64,
    pub too_alkaline: f64,
}

/// Linear calibration for one pH sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorCalibration {
    pub offset: f64,
    pub slope: f64,
}

/// Display unit for temperature readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

/// Display unit for light-level readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightUnit {
    Lux,
    Percentage,
}

/// The full settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSettings {
    pub ph_thresholds: PhThresholds,
    pub ph_sensor_calibration: BTreeMap<String, SensorCalibration>,
    pub temperature_unit: TemperatureUnit,
    pub light_unit: LightUnit,
}

impl Default for DashboardSettings {
    /// Factory defaults: four identity-calibrated sensors, celsius, lux.
    fn default() -> Self {
        let mut calibration = BTreeMap::new();
        for n in 1..=4 {
            calibration
                .insert(format!("sensor{n}"), SensorCalibration { offset: 0.0, slope: 1.0 });
        }
        DashboardSettings {
            ph_thresholds: PhThresholds {
                too_acidic: 5.5,
                slightly_acidic: 6.0,
                optimal: 7.0,
                slightly_alkaline: 7.5,
                too_alkaline: 8.0,
            },
            ph_sensor_calibration: calibration,
            temperature_unit: TemperatureUnit::Celsius,
            light_unit: LightUnit::Lux,
        }
    }
}

impl DashboardSettings {
    /// Validates the settings, rejecting them before any publish.
    pub fn validate(&self) -> Result<()> {
        let t = &self.ph_thresholds;
        let ordered = [
            t.too_acidic,
            t.slightly_acidic,
            t.optimal,
            t.slightly_alkaline,
            t.too_alkaline,
        ];
        if ordered.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(Error::InvalidSettings(
                "pH thresholds must be strictly ascending".to_string(),
            ));
        }
        for (sensor, cal) in &self.ph_sensor_calibration {
            if cal.slope <= 0.0 {
                return Err(Error::InvalidSettings(format!(
                    "calibration slope for {sensor} must be positive"
                )));
            }
        }
        Ok(())
    }
}

/// An outbound settings update: the shadow's `client.parameters` path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdateRequest {
    pub state: SettingsDesired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsDesired {
    pub desired: SettingsClient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsClient {
    pub client: SettingsParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsParameters {
    pub parameters: DashboardSettings,
}

impl SettingsUpdateRequest {
    /// Wraps settings in the desired-tree path the device firmware reads.
    pub fn new(settings: &DashboardSettings) -> Self {
        SettingsUpdateRequest {
            state: SettingsDesired {
                desired: SettingsClient {
                    client: SettingsParameters { parameters: settings.clone() },
                },
            },
        }
    }

    /// Serializes the request to JSON.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
