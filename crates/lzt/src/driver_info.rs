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
//! Driver enumeration, properties and contexts.
use types::{ApiVersion, DriverProperties, ExtensionProperties};

use crate::{Driver, DriverInstance, HarnessError, LztResult, TestContext};

pub fn get_all_driver_handles<B: Driver>(
    ctx: &TestContext<B>,
) -> LztResult<B, Vec<B::DriverHandle>> {
    let drivers = ctx.instance().drivers().map_err(HarnessError::<B>::Driver)?;
    if drivers.is_empty() {
        return Err(HarnessError::UnexpectedValue("no drivers present".to_owned()));
    }
    Ok(drivers)
}
pub fn get_default_driver<B: Driver>(ctx: &TestContext<B>) -> B::DriverHandle {
    ctx.default_driver()
}
pub fn get_driver_properties<B: Driver>(
    ctx: &TestContext<B>,
    driver: B::DriverHandle,
) -> LztResult<B, DriverProperties> {
    ctx.instance()
        .driver_properties(driver)
        .map_err(HarnessError::<B>::Driver)
}
pub fn get_api_version<B: Driver>(
    ctx: &TestContext<B>,
    driver: B::DriverHandle,
) -> LztResult<B, ApiVersion> {
    ctx.instance()
        .driver_api_version(driver)
        .map_err(HarnessError::<B>::Driver)
}
pub fn get_extension_properties<B: Driver>(
    ctx: &TestContext<B>,
    driver: B::DriverHandle,
) -> LztResult<B, Vec<ExtensionProperties>> {
    ctx.instance()
        .driver_extension_properties(driver)
        .map_err(HarnessError::<B>::Driver)
}
/// Whether the driver advertises an extension named `name` with at least `min_version`.
pub fn check_if_extension_supported<B: Driver>(
    ctx: &TestContext<B>,
    driver: B::DriverHandle,
    name: &str,
    min_version: u32,
) -> LztResult<B, bool> {
    Ok(get_extension_properties(ctx, driver)?
        .iter()
        .any(|e| e.name == name && e.version >= min_version))
}

pub fn create_context<B: Driver>(
    ctx: &TestContext<B>,
    driver: B::DriverHandle,
) -> LztResult<B, B::Context> {
    ctx.instance()
        .create_context(driver)
        .map_err(HarnessError::<B>::Driver)
}
/// # Safety
/// * All objects created from the context must have been destroyed
pub unsafe fn destroy_context<B: Driver>(
    ctx: &TestContext<B>,
    context: B::Context,
) -> LztResult<B, ()> {
    unsafe { ctx.instance().destroy_context(context) }.map_err(HarnessError::<B>::Driver)
}
