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
//! Scenarios run once per available backend through `dev_utils::all_driver_tests!`. Scenarios
//! that need to look inside the simulated driver are plain tests against `Sim`.
mod bundle;
mod cmdlist;
mod memory;
mod sampler;

use crate::{DevicePtr, Driver, HarnessConfig, LztResult, TestContext, driver::Sim};

/// A `Sim` test context that ignores `LZT_CONFIG` and friends, for tests that inspect the
/// simulated driver through `ctx.instance()`.
fn sim_context() -> TestContext<Sim> {
    dev_utils::init_test_logging();
    let instance = Sim::create_instance().expect("Failed to create sim instance");
    TestContext::with_config(instance, HarnessConfig::default())
        .expect("Failed to create test context")
}

/// Asserts every byte of a host-visible buffer equals `value`.
/// # Safety
/// * `ptr` must be host accessible for `len` bytes
unsafe fn assert_filled<B: Driver>(ptr: DevicePtr, len: usize, value: u8) -> LztResult<B, ()> {
    let bytes = unsafe { ptr.as_slice(len) };
    if let Some(offset) = bytes.iter().position(|b| *b != value) {
        return Err(crate::HarnessError::UnexpectedValue(format!(
            "byte {offset} is {:#04x}, expected {value:#04x}",
            bytes[offset]
        )));
    }
    Ok(())
}
