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
//! Device enumeration and properties.
use types::{
    CommandQueueGroupFlags, CommandQueueGroupProperties, DeviceCacheProperties,
    DeviceComputeProperties, DeviceMemoryProperties, DeviceProperties,
};

use crate::{Driver, DriverInstance, HarnessError, LztResult, TestContext};

pub fn get_ze_device_count<B: Driver>(
    ctx: &TestContext<B>,
    driver: B::DriverHandle,
) -> LztResult<B, usize> {
    Ok(get_ze_devices(ctx, driver)?.len())
}
pub fn get_ze_devices<B: Driver>(
    ctx: &TestContext<B>,
    driver: B::DriverHandle,
) -> LztResult<B, Vec<B::Device>> {
    ctx.instance()
        .devices(driver)
        .map_err(HarnessError::<B>::Driver)
}
pub fn get_default_device<B: Driver>(ctx: &TestContext<B>) -> B::Device {
    ctx.default_device()
}
pub fn get_ze_sub_devices<B: Driver>(
    ctx: &TestContext<B>,
    device: B::Device,
) -> LztResult<B, Vec<B::Device>> {
    ctx.instance()
        .sub_devices(device)
        .map_err(HarnessError::<B>::Driver)
}
pub fn get_device_properties<B: Driver>(
    ctx: &TestContext<B>,
    device: B::Device,
) -> LztResult<B, DeviceProperties> {
    ctx.instance()
        .device_properties(device)
        .map_err(HarnessError::<B>::Driver)
}
pub fn get_command_queue_group_properties<B: Driver>(
    ctx: &TestContext<B>,
    device: B::Device,
) -> LztResult<B, Vec<CommandQueueGroupProperties>> {
    let groups = ctx
        .instance()
        .command_queue_group_properties(device)
        .map_err(HarnessError::<B>::Driver)?;
    if groups.is_empty() {
        return Err(HarnessError::UnexpectedValue(
            "device reports no command queue groups".to_owned(),
        ));
    }
    Ok(groups)
}
/// Ordinals of the queue groups whose flags contain all of `flags`.
pub fn get_queue_group_ordinals<B: Driver>(
    ctx: &TestContext<B>,
    device: B::Device,
    flags: CommandQueueGroupFlags,
) -> LztResult<B, Vec<u32>> {
    Ok(get_command_queue_group_properties(ctx, device)?
        .iter()
        .enumerate()
        .filter(|(_, g)| g.flags.contains(flags))
        .map(|(i, _)| i as u32)
        .collect())
}
/// Largest fill pattern the queue group `ordinal` accepts.
pub fn get_max_fill_pattern_size<B: Driver>(
    ctx: &TestContext<B>,
    device: B::Device,
    ordinal: u32,
) -> LztResult<B, usize> {
    get_command_queue_group_properties(ctx, device)?
        .get(ordinal as usize)
        .map(|g| g.max_memory_fill_pattern_size)
        .ok_or_else(|| HarnessError::UnexpectedValue(format!("no queue group {ordinal}")))
}
pub fn get_compute_properties<B: Driver>(
    ctx: &TestContext<B>,
    device: B::Device,
) -> LztResult<B, DeviceComputeProperties> {
    let props = ctx
        .instance()
        .device_compute_properties(device)
        .map_err(HarnessError::<B>::Driver)?;
    if props.max_total_group_size == 0 {
        return Err(HarnessError::UnexpectedValue(
            "device reports a maximum group size of zero".to_owned(),
        ));
    }
    Ok(props)
}
pub fn get_memory_properties<B: Driver>(
    ctx: &TestContext<B>,
    device: B::Device,
) -> LztResult<B, Vec<DeviceMemoryProperties>> {
    ctx.instance()
        .device_memory_properties(device)
        .map_err(HarnessError::<B>::Driver)
}
pub fn get_cache_properties<B: Driver>(
    ctx: &TestContext<B>,
    device: B::Device,
) -> LztResult<B, Vec<DeviceCacheProperties>> {
    ctx.instance()
        .device_cache_properties(device)
        .map_err(HarnessError::<B>::Driver)
}
/// Whether `device` can access memory allocated on `peer`.
pub fn can_access_peer<B: Driver>(
    ctx: &TestContext<B>,
    device: B::Device,
    peer: B::Device,
) -> LztResult<B, bool> {
    ctx.instance()
        .device_can_access_peer(device, peer)
        .map_err(HarnessError::<B>::Driver)
}
