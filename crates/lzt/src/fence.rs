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
use types::{FenceDesc, FenceFlags, SyncStatus};

use crate::{Driver, DriverInstance, HarnessError, LztResult, TestContext};

pub fn create_fence<B: Driver>(
    ctx: &TestContext<B>,
    queue: B::CommandQueue,
) -> LztResult<B, B::Fence> {
    create_fence_with(ctx, queue, FenceFlags::empty())
}
pub fn create_fence_with<B: Driver>(
    ctx: &TestContext<B>,
    queue: B::CommandQueue,
    flags: FenceFlags,
) -> LztResult<B, B::Fence> {
    ctx.instance()
        .create_fence(queue, &FenceDesc { flags })
        .map_err(HarnessError::<B>::Driver)
}
/// # Safety
/// * No pending submission may signal the fence
pub unsafe fn destroy_fence<B: Driver>(ctx: &TestContext<B>, fence: B::Fence) -> LztResult<B, ()> {
    unsafe { ctx.instance().destroy_fence(fence) }.map_err(HarnessError::<B>::Driver)
}
pub fn reset_fence<B: Driver>(ctx: &TestContext<B>, fence: B::Fence) -> LztResult<B, ()> {
    ctx.instance()
        .fence_reset(fence)
        .map_err(HarnessError::<B>::Driver)
}
pub fn query_fence<B: Driver>(ctx: &TestContext<B>, fence: B::Fence) -> LztResult<B, SyncStatus> {
    ctx.instance()
        .fence_query_status(fence)
        .map_err(HarnessError::<B>::Driver)
}
pub fn sync_fence<B: Driver>(
    ctx: &TestContext<B>,
    fence: B::Fence,
    timeout: u64,
) -> LztResult<B, SyncStatus> {
    ctx.instance()
        .fence_host_synchronize(fence, timeout)
        .map_err(HarnessError::<B>::Driver)
}
