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
use crate::{Driver, DriverInstance, HarnessConfig, HarnessError, LztResult};

/// Everything a scenario runs against: the driver instance and the default driver, device and
/// context picked from it. Passed explicitly to every helper.
pub struct TestContext<B: Driver> {
    instance: B::Instance,
    config: HarnessConfig,
    driver: B::DriverHandle,
    device: B::Device,
    context: B::Context,
    live: bool,
}
impl<B: Driver> TestContext<B> {
    /// Builds a context using [`HarnessConfig::from_env`].
    pub fn new(instance: B::Instance) -> LztResult<B, Self> {
        Self::with_config(instance, HarnessConfig::from_env()?)
    }
    #[tracing::instrument(skip_all)]
    pub fn with_config(instance: B::Instance, config: HarnessConfig) -> LztResult<B, Self> {
        let drivers = instance.drivers().map_err(HarnessError::<B>::Driver)?;
        let Some(&driver) = drivers.get(config.driver_index) else {
            return Err(HarnessError::UnexpectedValue(format!(
                "driver index {} out of range, {} drivers present",
                config.driver_index,
                drivers.len()
            )));
        };
        let devices = instance.devices(driver).map_err(HarnessError::<B>::Driver)?;
        let Some(&device) = devices.get(config.device_index) else {
            return Err(HarnessError::UnexpectedValue(format!(
                "device index {} out of range, {} devices present",
                config.device_index,
                devices.len()
            )));
        };
        let context = instance
            .create_context(driver)
            .map_err(HarnessError::<B>::Driver)?;
        log::debug!(
            "Test context on {} driver {} device {}",
            instance.backend_name(),
            config.driver_index,
            config.device_index
        );
        Ok(Self {
            instance,
            config,
            driver,
            device,
            context,
            live: true,
        })
    }
    pub fn instance(&self) -> &B::Instance {
        &self.instance
    }
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }
    pub fn default_driver(&self) -> B::DriverHandle {
        self.driver
    }
    pub fn default_device(&self) -> B::Device {
        self.device
    }
    pub fn default_context(&self) -> B::Context {
        self.context
    }
    /// The wait timeout scenarios use unless they need a specific one.
    pub fn timeout(&self) -> u64 {
        self.config.default_timeout_ns
    }
    /// Destroys the default context. Everything created from it must already be destroyed.
    pub fn destroy(mut self) -> LztResult<B, ()> {
        self.live = false;
        unsafe { self.instance.destroy_context(self.context) }.map_err(HarnessError::<B>::Driver)
    }
}
impl<B: Driver> Drop for TestContext<B> {
    fn drop(&mut self) {
        if self.live
            && let Err(e) = unsafe { self.instance.destroy_context(self.context) }
        {
            log::warn!("Failed to destroy default context: {e}");
        }
    }
}
