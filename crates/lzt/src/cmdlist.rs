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
//! Command list creation and the append wrappers.
//!
//! Every `append_*` helper forwards its arguments to one driver append call. The `_with`
//! variants take an [`AppendSync`] with the event to signal on completion and the events to
//! wait on first. Appending to a closed list is forwarded like any other append; the driver
//! decides what happens to the command.
use types::{
    CommandListDesc, CommandListFlags, CommandQueueDesc, CopyRegion, GroupCount, ImageRegion,
    MemoryAdvice, SyncStatus,
};

use crate::{
    AppendSync, DevicePtr, Driver, DriverInstance, HarnessError, LztResult, TestContext,
    driver::ListCommand,
};

/// A regular list on ordinal 0 of the default device.
pub fn create_command_list<B: Driver>(ctx: &TestContext<B>) -> LztResult<B, B::CommandList> {
    create_command_list_with(
        ctx,
        ctx.default_context(),
        ctx.default_device(),
        CommandListFlags::empty(),
        0,
    )
}
pub fn create_command_list_with<B: Driver>(
    ctx: &TestContext<B>,
    context: B::Context,
    device: B::Device,
    flags: CommandListFlags,
    ordinal: u32,
) -> LztResult<B, B::CommandList> {
    ctx.instance()
        .create_command_list(
            context,
            device,
            &CommandListDesc {
                command_queue_group_ordinal: ordinal,
                flags,
            },
        )
        .map_err(HarnessError::<B>::Driver)
}
/// An immediate list on ordinal 0 of the default device.
pub fn create_immediate_command_list<B: Driver>(
    ctx: &TestContext<B>,
) -> LztResult<B, B::CommandList> {
    create_immediate_command_list_with(
        ctx,
        ctx.default_context(),
        ctx.default_device(),
        &CommandQueueDesc::default(),
    )
}
pub fn create_immediate_command_list_with<B: Driver>(
    ctx: &TestContext<B>,
    context: B::Context,
    device: B::Device,
    desc: &CommandQueueDesc,
) -> LztResult<B, B::CommandList> {
    ctx.instance()
        .create_immediate_command_list(context, device, desc)
        .map_err(HarnessError::<B>::Driver)
}
pub fn close_command_list<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
) -> LztResult<B, ()> {
    ctx.instance()
        .close_command_list(list)
        .map_err(HarnessError::<B>::Driver)
}
/// Discards everything recorded so far and reopens the list.
/// # Safety
/// * The list must not be pending execution
pub unsafe fn reset_command_list<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
) -> LztResult<B, ()> {
    unsafe { ctx.instance().reset_command_list(list) }.map_err(HarnessError::<B>::Driver)
}
/// # Safety
/// * The list must not be pending execution
pub unsafe fn destroy_command_list<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
) -> LztResult<B, ()> {
    unsafe { ctx.instance().destroy_command_list(list) }.map_err(HarnessError::<B>::Driver)
}
/// Waits for everything appended to an immediate list so far.
pub fn synchronize_command_list_host<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    timeout: u64,
) -> LztResult<B, SyncStatus> {
    ctx.instance()
        .synchronize_command_list_host(list, timeout)
        .map_err(HarnessError::<B>::Driver)
}

/// # Safety
/// * See the safety section of the matching [`ListCommand`] variant
pub unsafe fn append<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    command: ListCommand<'_, B>,
    sync: AppendSync<'_, B>,
) -> LztResult<B, ()> {
    log::trace!("Appending {command:?}");
    unsafe { ctx.instance().append(list, command, sync) }.map_err(HarnessError::<B>::Driver)
}

/// # Safety
/// * Both ranges must stay valid for `size` bytes until execution completes
pub unsafe fn append_memory_copy<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    dst: DevicePtr,
    src: DevicePtr,
    size: usize,
) -> LztResult<B, ()> {
    unsafe { append_memory_copy_with(ctx, list, dst, src, size, AppendSync::default()) }
}
/// # Safety
/// * Both ranges must stay valid for `size` bytes until execution completes
pub unsafe fn append_memory_copy_with<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    dst: DevicePtr,
    src: DevicePtr,
    size: usize,
    sync: AppendSync<'_, B>,
) -> LztResult<B, ()> {
    unsafe { append(ctx, list, ListCommand::MemoryCopy { dst, src, size }, sync) }
}
/// Fills `size` bytes with `value`.
/// # Safety
/// * The destination must stay valid for `size` bytes until execution completes
pub unsafe fn append_memory_set<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    dst: DevicePtr,
    value: u8,
    size: usize,
) -> LztResult<B, ()> {
    unsafe { append_memory_fill(ctx, list, dst, &[value], size) }
}
/// # Safety
/// * The destination must stay valid for `size` bytes until execution completes
pub unsafe fn append_memory_fill<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    dst: DevicePtr,
    pattern: &[u8],
    size: usize,
) -> LztResult<B, ()> {
    unsafe { append_memory_fill_with(ctx, list, dst, pattern, size, AppendSync::default()) }
}
/// # Safety
/// * The destination must stay valid for `size` bytes until execution completes
pub unsafe fn append_memory_fill_with<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    dst: DevicePtr,
    pattern: &[u8],
    size: usize,
    sync: AppendSync<'_, B>,
) -> LztResult<B, ()> {
    unsafe {
        append(
            ctx,
            list,
            ListCommand::MemoryFill { dst, pattern, size },
            sync,
        )
    }
}

/// One side of a region copy: base pointer, region and byte pitches.
#[derive(Clone, Copy, Debug)]
pub struct RegionSide {
    pub ptr: DevicePtr,
    pub region: CopyRegion,
    pub pitch: u32,
    pub slice_pitch: u32,
}
/// # Safety
/// * Both regions must lie within memory that stays valid until execution completes
pub unsafe fn append_memory_copy_region<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    dst: &RegionSide,
    src: &RegionSide,
) -> LztResult<B, ()> {
    unsafe { append_memory_copy_region_with(ctx, list, dst, src, AppendSync::default()) }
}
/// # Safety
/// * Both regions must lie within memory that stays valid until execution completes
pub unsafe fn append_memory_copy_region_with<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    dst: &RegionSide,
    src: &RegionSide,
    sync: AppendSync<'_, B>,
) -> LztResult<B, ()> {
    unsafe {
        append(
            ctx,
            list,
            ListCommand::MemoryCopyRegion {
                dst: dst.ptr,
                dst_region: dst.region,
                dst_pitch: dst.pitch,
                dst_slice_pitch: dst.slice_pitch,
                src: src.ptr,
                src_region: src.region,
                src_pitch: src.pitch,
                src_slice_pitch: src.slice_pitch,
            },
            sync,
        )
    }
}

pub fn append_barrier<B: Driver>(ctx: &TestContext<B>, list: B::CommandList) -> LztResult<B, ()> {
    append_barrier_with(ctx, list, AppendSync::default())
}
pub fn append_barrier_with<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    sync: AppendSync<'_, B>,
) -> LztResult<B, ()> {
    unsafe { append(ctx, list, ListCommand::Barrier, sync) }
}
pub fn append_memory_ranges_barrier<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    ranges: &[(DevicePtr, usize)],
    sync: AppendSync<'_, B>,
) -> LztResult<B, ()> {
    unsafe { append(ctx, list, ListCommand::MemoryRangesBarrier { ranges }, sync) }
}

/// # Safety
/// * Memory passed to the kernel as arguments must stay valid until execution completes
pub unsafe fn append_launch_function<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    kernel: B::Kernel,
    group_count: GroupCount,
    sync: AppendSync<'_, B>,
) -> LztResult<B, ()> {
    unsafe {
        append(
            ctx,
            list,
            ListCommand::LaunchKernel {
                kernel,
                group_count,
                cooperative: false,
            },
            sync,
        )
    }
}
/// # Safety
/// * Memory passed to the kernel as arguments must stay valid until execution completes
pub unsafe fn append_launch_cooperative_function<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    kernel: B::Kernel,
    group_count: GroupCount,
    sync: AppendSync<'_, B>,
) -> LztResult<B, ()> {
    unsafe {
        append(
            ctx,
            list,
            ListCommand::LaunchKernel {
                kernel,
                group_count,
                cooperative: true,
            },
            sync,
        )
    }
}

pub fn append_signal_event<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    event: B::Event,
) -> LztResult<B, ()> {
    unsafe {
        append(
            ctx,
            list,
            ListCommand::SignalEvent { event },
            AppendSync::default(),
        )
    }
}
pub fn append_wait_on_events<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    events: &[B::Event],
) -> LztResult<B, ()> {
    unsafe {
        append(
            ctx,
            list,
            ListCommand::WaitOnEvents { events },
            AppendSync::default(),
        )
    }
}
pub fn append_reset_event<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    event: B::Event,
) -> LztResult<B, ()> {
    unsafe {
        append(
            ctx,
            list,
            ListCommand::ResetEvent { event },
            AppendSync::default(),
        )
    }
}

/// # Safety
/// * `dst` must stay valid for 8 bytes until execution completes
pub unsafe fn append_write_global_timestamp<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    dst: DevicePtr,
    sync: AppendSync<'_, B>,
) -> LztResult<B, ()> {
    unsafe { append(ctx, list, ListCommand::WriteGlobalTimestamp { dst }, sync) }
}
pub fn append_memory_prefetch<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    ptr: DevicePtr,
    size: usize,
) -> LztResult<B, ()> {
    unsafe {
        append(
            ctx,
            list,
            ListCommand::MemoryPrefetch { ptr, size },
            AppendSync::default(),
        )
    }
}
pub fn append_memory_advise<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    device: B::Device,
    ptr: DevicePtr,
    size: usize,
    advice: MemoryAdvice,
) -> LztResult<B, ()> {
    unsafe {
        append(
            ctx,
            list,
            ListCommand::MemAdvise {
                device,
                ptr,
                size,
                advice,
            },
            AppendSync::default(),
        )
    }
}

pub fn append_image_copy<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    dst: B::Image,
    src: B::Image,
    sync: AppendSync<'_, B>,
) -> LztResult<B, ()> {
    unsafe { append(ctx, list, ListCommand::ImageCopy { dst, src }, sync) }
}
pub fn append_image_copy_region<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    dst: B::Image,
    src: B::Image,
    dst_region: Option<ImageRegion>,
    src_region: Option<ImageRegion>,
    sync: AppendSync<'_, B>,
) -> LztResult<B, ()> {
    unsafe {
        append(
            ctx,
            list,
            ListCommand::ImageCopyRegion {
                dst,
                src,
                dst_region,
                src_region,
            },
            sync,
        )
    }
}
/// # Safety
/// * `dst` must hold the whole region, tightly packed, until execution completes
pub unsafe fn append_image_copy_to_mem<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    dst: DevicePtr,
    src: B::Image,
    region: Option<ImageRegion>,
    sync: AppendSync<'_, B>,
) -> LztResult<B, ()> {
    unsafe {
        append(
            ctx,
            list,
            ListCommand::ImageCopyToMemory { dst, src, region },
            sync,
        )
    }
}
/// # Safety
/// * `src` must hold the whole region, tightly packed, until execution completes
pub unsafe fn append_image_copy_from_mem<B: Driver>(
    ctx: &TestContext<B>,
    list: B::CommandList,
    dst: B::Image,
    src: DevicePtr,
    region: Option<ImageRegion>,
    sync: AppendSync<'_, B>,
) -> LztResult<B, ()> {
    unsafe {
        append(
            ctx,
            list,
            ListCommand::ImageCopyFromMemory { dst, src, region },
            sync,
        )
    }
}

/// Runs closed regular lists on an immediate list.
/// # Safety
/// * The lists must not be reset or destroyed until execution completes
pub unsafe fn append_command_lists_immediate<B: Driver>(
    ctx: &TestContext<B>,
    immediate: B::CommandList,
    lists: &[B::CommandList],
    sync: AppendSync<'_, B>,
) -> LztResult<B, ()> {
    unsafe {
        append(
            ctx,
            immediate,
            ListCommand::ExecuteCommandLists { lists },
            sync,
        )
    }
}
