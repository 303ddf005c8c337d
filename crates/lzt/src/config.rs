/* BEGIN LICENSE
  lzt, a Level Zero conformance test harness.
  Copyright (C) 2025 SupaMaggie70 (Magnus Larsson)


  lzt is free software; you can redistribute it and/or
  modify it under the terms of the GNU General Public License
  as published by the Free Software Foundation; either version 3
  of the License, or (at your option) any later version.

  lzt is distributed in the hope that it will be useful,
  but WITHOUT ANY WARRANTY; without even the implied warranty of
  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
  GNU General Public License for more details.

  You should have received a copy of the GNU General Public License
  along with this program.  If not, see <http://www.gnu.org/licenses/>.
END LICENSE */
use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;

pub const CONFIG_PATH_ENV: &str = "LZT_CONFIG";
pub const DRIVER_INDEX_ENV: &str = "LZT_DRIVER_INDEX";
pub const DEVICE_INDEX_ENV: &str = "LZT_DEVICE_INDEX";

/// Settings shared by every scenario. Missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Index into the driver list used as the default driver.
    pub driver_index: usize,
    /// Index into the default driver's device list used as the default device.
    pub device_index: usize,
    /// Number of events in a lazily initialized [`crate::event::EventPool`].
    pub event_pool_size: u32,
    /// Timeout in nanoseconds scenarios use for their waits.
    pub default_timeout_ns: u64,
    pub sim: SimSection,
}
impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            driver_index: 0,
            device_index: 0,
            event_pool_size: 32,
            default_timeout_ns: types::TIMEOUT_INFINITE,
            sim: SimSection::default(),
        }
    }
}

/// Shape of the software driver's device tree.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimSection {
    pub devices: u32,
    pub sub_devices: u32,
}
impl Default for SimSection {
    fn default() -> Self {
        Self {
            devices: 1,
            sub_devices: 0,
        }
    }
}

impl HarnessConfig {
    /// Defaults, then the JSON file named by `LZT_CONFIG`, then the `LZT_DRIVER_INDEX` and
    /// `LZT_DEVICE_INDEX` overrides.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Reading config file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Parsing config file {}", path.display()))
    }
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
    /// Applies index overrides looked up through `var`.
    pub fn apply_overrides(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        if let Some(v) = var(DRIVER_INDEX_ENV) {
            self.driver_index = v
                .trim()
                .parse()
                .with_context(|| format!("{DRIVER_INDEX_ENV}={v:?} is not an index"))?;
        }
        if let Some(v) = var(DEVICE_INDEX_ENV) {
            self.device_index = v
                .trim()
                .parse()
                .with_context(|| format!("{DEVICE_INDEX_ENV}={v:?} is not an index"))?;
        }
        Ok(())
    }
    pub fn sim_config(&self) -> driver::sim::SimConfig {
        driver::sim::SimConfig {
            devices: self.sim.devices,
            sub_devices: self.sim.sub_devices,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = HarnessConfig::from_json(r#"{ "device_index": 1, "sim": { "devices": 3 } }"#)
            .unwrap();
        assert_eq!(config.device_index, 1);
        assert_eq!(config.sim.devices, 3);
        assert_eq!(config.sim.sub_devices, 0);
        assert_eq!(config.event_pool_size, 32);
        assert_eq!(config.default_timeout_ns, u64::MAX);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(HarnessConfig::from_json(r#"{ "device": 1 }"#).is_err());
    }

    #[test]
    fn reads_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "driver_index": 2, "event_pool_size": 4 }}"#).unwrap();
        let config = HarnessConfig::from_file(file.path()).unwrap();
        assert_eq!(config.driver_index, 2);
        assert_eq!(config.event_pool_size, 4);
        assert!(HarnessConfig::from_file(file.path().with_extension("missing")).is_err());
    }

    #[test]
    fn overrides_take_precedence() {
        let mut config = HarnessConfig {
            driver_index: 5,
            ..Default::default()
        };
        config
            .apply_overrides(|name| (name == DEVICE_INDEX_ENV).then(|| " 2 ".to_owned()))
            .unwrap();
        assert_eq!(config.driver_index, 5);
        assert_eq!(config.device_index, 2);
        assert!(
            config
                .apply_overrides(|name| (name == DRIVER_INDEX_ENV).then(|| "first".to_owned()))
                .is_err()
        );
    }
}
