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
use types::{CommandQueueDesc, CommandQueueGroupFlags, CommandQueueMode, SyncStatus};

use crate::{Driver, DriverInstance, HarnessError, LztResult, TestContext};

/// A queue on ordinal 0 of the default device with default flags, mode and priority.
pub fn create_command_queue<B: Driver>(ctx: &TestContext<B>) -> LztResult<B, B::CommandQueue> {
    create_command_queue_with(
        ctx,
        ctx.default_context(),
        ctx.default_device(),
        &CommandQueueDesc::default(),
    )
}
pub fn create_command_queue_mode<B: Driver>(
    ctx: &TestContext<B>,
    mode: CommandQueueMode,
) -> LztResult<B, B::CommandQueue> {
    create_command_queue_with(
        ctx,
        ctx.default_context(),
        ctx.default_device(),
        &CommandQueueDesc {
            mode,
            ..Default::default()
        },
    )
}
#[tracing::instrument(skip(ctx))]
pub fn create_command_queue_with<B: Driver>(
    ctx: &TestContext<B>,
    context: B::Context,
    device: B::Device,
    desc: &CommandQueueDesc,
) -> LztResult<B, B::CommandQueue> {
    ctx.instance()
        .create_command_queue(context, device, desc)
        .map_err(HarnessError::<B>::Driver)
}
/// # Safety
/// * Work submitted to the queue must have completed
pub unsafe fn destroy_command_queue<B: Driver>(
    ctx: &TestContext<B>,
    queue: B::CommandQueue,
) -> LztResult<B, ()> {
    unsafe { ctx.instance().destroy_command_queue(queue) }.map_err(HarnessError::<B>::Driver)
}
/// # Safety
/// * Every list must be closed, and the memory its commands reference must stay valid until the
///   submission completes
pub unsafe fn execute_command_lists<B: Driver>(
    ctx: &TestContext<B>,
    queue: B::CommandQueue,
    lists: &[B::CommandList],
    fence: Option<B::Fence>,
) -> LztResult<B, ()> {
    let _span = tracing::debug_span!("execute_command_lists", lists = lists.len()).entered();
    unsafe { ctx.instance().execute_command_lists(queue, lists, fence) }
        .map_err(HarnessError::<B>::Driver)
}
/// Waits up to `timeout` nanoseconds for the queue to go idle. Running out of time is reported
/// as [`SyncStatus::NotReady`].
pub fn synchronize<B: Driver>(
    ctx: &TestContext<B>,
    queue: B::CommandQueue,
    timeout: u64,
) -> LztResult<B, SyncStatus> {
    ctx.instance()
        .synchronize_command_queue(queue, timeout)
        .map_err(HarnessError::<B>::Driver)
}
pub fn get_compute_queue_group_ordinals<B: Driver>(
    ctx: &TestContext<B>,
    device: B::Device,
) -> LztResult<B, Vec<u32>> {
    crate::device::get_queue_group_ordinals(ctx, device, CommandQueueGroupFlags::COMPUTE)
}
