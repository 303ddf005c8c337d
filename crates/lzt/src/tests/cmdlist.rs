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
use types::{CommandListFlags, CommandQueueGroupFlags, MemoryAdvice};

use super::{assert_filled, sim_context};
use crate::{
    DevicePtr, Driver, LztResult, SyncStatus, TestContext, cmdlist, cmdqueue, device, memory,
};

/// Runs `list` on `queue` and waits for it.
unsafe fn run<B: Driver>(
    ctx: &TestContext<B>,
    queue: B::CommandQueue,
    list: B::CommandList,
) -> LztResult<B, ()> {
    unsafe { cmdqueue::execute_command_lists(ctx, queue, &[list], None)? };
    assert_eq!(cmdqueue::synchronize(ctx, queue, ctx.timeout())?, SyncStatus::Ready);
    Ok(())
}

/// Starts with eight memory sets, then resets and records one fewer each round. Only the sets
/// recorded since the last reset may land.
fn reset_runs_only_later_commands<B: Driver>(instance: B::Instance) -> LztResult<B, ()> {
    const NUM_INSTR: usize = 8;
    const SIZE: usize = 16;
    let ctx = TestContext::new(instance)?;
    for flags in [
        CommandListFlags::empty(),
        CommandListFlags::RELAXED_ORDERING,
        CommandListFlags::MAXIMIZE_THROUGHPUT,
        CommandListFlags::EXPLICIT_ONLY,
    ] {
        let queue = cmdqueue::create_command_queue(&ctx)?;
        let list = cmdlist::create_command_list_with(
            &ctx,
            ctx.default_context(),
            ctx.default_device(),
            flags,
            0,
        )?;
        let buffers = (0..NUM_INSTR)
            .map(|_| unsafe { memory::allocate_shared_memory(&ctx, SIZE) })
            .collect::<LztResult<B, Vec<DevicePtr>>>()?;
        let values: Vec<u8> = (1..=NUM_INSTR as u8).collect();

        for count in (0..=NUM_INSTR).rev() {
            unsafe {
                for buffer in &buffers {
                    buffer.as_mut_slice(SIZE).fill(0);
                }
                for (i, buffer) in buffers.iter().take(count).enumerate() {
                    cmdlist::append_memory_set(&ctx, list, *buffer, values[count - (i + 1)], SIZE)?;
                }
                cmdlist::append_barrier(&ctx, list)?;
                cmdlist::close_command_list(&ctx, list)?;
                run(&ctx, queue, list)?;

                for (i, buffer) in buffers.iter().enumerate() {
                    let expected = if i < count { values[count - (i + 1)] } else { 0 };
                    assert_filled::<B>(*buffer, SIZE, expected)?;
                }
                cmdlist::reset_command_list(&ctx, list)?;
            }
        }

        unsafe {
            for buffer in buffers {
                memory::free_memory(&ctx, buffer)?;
            }
            cmdlist::destroy_command_list(&ctx, list)?;
            cmdqueue::destroy_command_queue(&ctx, queue)?;
        }
    }
    ctx.destroy()
}
dev_utils::all_driver_tests!(reset_runs_only_later_commands);

/// A closed list executes what was recorded before the close. Reset discards it all, so a reset
/// and closed list executes nothing.
fn append_after_close_is_not_executed<B: Driver>(instance: B::Instance) -> LztResult<B, ()> {
    const SIZE: usize = 16;
    let ctx = TestContext::new(instance)?;
    let queue = cmdqueue::create_command_queue(&ctx)?;
    let list = cmdlist::create_command_list(&ctx)?;
    unsafe {
        let buffer = memory::allocate_shared_memory(&ctx, SIZE)?;
        buffer.as_mut_slice(SIZE).fill(0);

        cmdlist::append_memory_set(&ctx, list, buffer, 0x1, SIZE)?;
        cmdlist::append_barrier(&ctx, list)?;
        cmdlist::close_command_list(&ctx, list)?;
        // Whether the driver rejects these or not, they must not run
        if let Err(e) = cmdlist::append_memory_set(&ctx, list, buffer, 0x2, SIZE) {
            log::info!("Append after close rejected: {e}");
        }
        run(&ctx, queue, list)?;
        assert_filled::<B>(buffer, SIZE, 0x1)?;

        buffer.as_mut_slice(SIZE).fill(0);
        cmdlist::reset_command_list(&ctx, list)?;
        cmdlist::close_command_list(&ctx, list)?;
        if let Err(e) = cmdlist::append_memory_set(&ctx, list, buffer, 0x3, SIZE) {
            log::info!("Append after reset and close rejected: {e}");
        }
        run(&ctx, queue, list)?;
        assert_filled::<B>(buffer, SIZE, 0x0)?;

        memory::free_memory(&ctx, buffer)?;
        cmdlist::destroy_command_list(&ctx, list)?;
        cmdqueue::destroy_command_queue(&ctx, queue)?;
    }
    ctx.destroy()
}
dev_utils::all_driver_tests!(append_after_close_is_not_executed);

fn executed_list_can_run_again<B: Driver>(instance: B::Instance) -> LztResult<B, ()> {
    const SIZE: usize = 16;
    let ctx = TestContext::new(instance)?;
    let queue = cmdqueue::create_command_queue(&ctx)?;
    let set_one = cmdlist::create_command_list(&ctx)?;
    let set_zero = cmdlist::create_command_list(&ctx)?;
    unsafe {
        let device_buffer = memory::allocate_device_memory(&ctx, SIZE)?;
        let host_buffer = memory::allocate_host_memory(&ctx, SIZE)?;
        for (list, value) in [(set_one, 1), (set_zero, 0)] {
            cmdlist::append_memory_set(&ctx, list, device_buffer, value, SIZE)?;
            cmdlist::append_barrier(&ctx, list)?;
            cmdlist::append_memory_copy(&ctx, list, host_buffer, device_buffer, SIZE)?;
            cmdlist::close_command_list(&ctx, list)?;
        }
        for _ in 0..5 {
            run(&ctx, queue, set_zero)?;
            assert_filled::<B>(host_buffer, SIZE, 0)?;
            run(&ctx, queue, set_one)?;
            assert_filled::<B>(host_buffer, SIZE, 1)?;
        }
        memory::free_memory(&ctx, device_buffer)?;
        memory::free_memory(&ctx, host_buffer)?;
        cmdlist::destroy_command_list(&ctx, set_one)?;
        cmdlist::destroy_command_list(&ctx, set_zero)?;
        cmdqueue::destroy_command_queue(&ctx, queue)?;
    }
    ctx.destroy()
}
dev_utils::all_driver_tests!(executed_list_can_run_again);

fn immediate_list_executes_on_append<B: Driver>(instance: B::Instance) -> LztResult<B, ()> {
    const SIZE: usize = 256;
    let ctx = TestContext::new(instance)?;
    let list = cmdlist::create_immediate_command_list(&ctx)?;
    unsafe {
        let src = memory::allocate_host_memory(&ctx, SIZE)?;
        let dst = memory::allocate_shared_memory(&ctx, SIZE)?;
        memory::write_data_pattern(src, SIZE, 3);
        dst.as_mut_slice(SIZE).fill(0);
        cmdlist::append_memory_copy(&ctx, list, dst, src, SIZE)?;
        assert_eq!(
            cmdlist::synchronize_command_list_host(&ctx, list, ctx.timeout())?,
            SyncStatus::Ready
        );
        memory::validate_data_pattern::<B>(dst, SIZE, 3)?;
        memory::free_memory(&ctx, src)?;
        memory::free_memory(&ctx, dst)?;
        cmdlist::destroy_command_list(&ctx, list)?;
    }
    ctx.destroy()
}
dev_utils::all_driver_tests!(immediate_list_executes_on_append);

fn regular_lists_run_on_immediate_list<B: Driver>(instance: B::Instance) -> LztResult<B, ()> {
    const SIZE: usize = 32;
    let ctx = TestContext::new(instance)?;
    let immediate = cmdlist::create_immediate_command_list(&ctx)?;
    let first = cmdlist::create_command_list(&ctx)?;
    let second = cmdlist::create_command_list(&ctx)?;
    unsafe {
        let buffer = memory::allocate_shared_memory(&ctx, SIZE)?;
        buffer.as_mut_slice(SIZE).fill(0);
        cmdlist::append_memory_set(&ctx, first, buffer, 0x11, SIZE)?;
        cmdlist::close_command_list(&ctx, first)?;
        cmdlist::append_memory_set(&ctx, second, buffer.offset(SIZE / 2), 0x22, SIZE / 2)?;
        cmdlist::close_command_list(&ctx, second)?;

        cmdlist::append_command_lists_immediate(
            &ctx,
            immediate,
            &[first, second],
            Default::default(),
        )?;
        assert_eq!(
            cmdlist::synchronize_command_list_host(&ctx, immediate, ctx.timeout())?,
            SyncStatus::Ready
        );
        assert_filled::<B>(buffer, SIZE / 2, 0x11)?;
        assert_filled::<B>(buffer.offset(SIZE / 2), SIZE / 2, 0x22)?;

        memory::free_memory(&ctx, buffer)?;
        cmdlist::destroy_command_list(&ctx, first)?;
        cmdlist::destroy_command_list(&ctx, second)?;
        cmdlist::destroy_command_list(&ctx, immediate)?;
    }
    ctx.destroy()
}
dev_utils::all_driver_tests!(regular_lists_run_on_immediate_list);

/// Hints, timestamps and a ranges barrier around a memory set. The hints have no observable
/// effect; the timestamps must not go backwards.
fn hints_and_timestamps_are_accepted<B: Driver>(instance: B::Instance) -> LztResult<B, ()> {
    const SIZE: usize = 64;
    let ctx = TestContext::new(instance)?;
    let queue = cmdqueue::create_command_queue(&ctx)?;
    let list = cmdlist::create_command_list(&ctx)?;
    unsafe {
        let buffer = memory::allocate_shared_memory(&ctx, SIZE)?;
        let stamps = memory::allocate_host_memory(&ctx, 16)?;
        buffer.as_mut_slice(SIZE).fill(0);
        stamps.as_mut_slice(16).fill(0);

        cmdlist::append_write_global_timestamp(&ctx, list, stamps, Default::default())?;
        cmdlist::append_memory_advise(
            &ctx,
            list,
            ctx.default_device(),
            buffer,
            SIZE,
            MemoryAdvice::SetReadMostly,
        )?;
        cmdlist::append_memory_prefetch(&ctx, list, buffer, SIZE)?;
        cmdlist::append_memory_set(&ctx, list, buffer, 0x33, SIZE)?;
        cmdlist::append_memory_ranges_barrier(&ctx, list, &[(buffer, SIZE)], Default::default())?;
        cmdlist::append_write_global_timestamp(&ctx, list, stamps.offset(8), Default::default())?;
        cmdlist::close_command_list(&ctx, list)?;
        run(&ctx, queue, list)?;

        assert_filled::<B>(buffer, SIZE, 0x33)?;
        let [before, after]: [u64; 2] = bytemuck::pod_read_unaligned(stamps.as_slice(16));
        if after < before {
            return Err(crate::HarnessError::UnexpectedValue(format!(
                "timestamp went backwards: {before} then {after}"
            )));
        }

        memory::free_memory(&ctx, buffer)?;
        memory::free_memory(&ctx, stamps)?;
        cmdlist::destroy_command_list(&ctx, list)?;
        cmdqueue::destroy_command_queue(&ctx, queue)?;
    }
    ctx.destroy()
}
dev_utils::all_driver_tests!(hints_and_timestamps_are_accepted);

#[test]
fn unclosed_list_is_rejected_on_execute() {
    let ctx = sim_context();
    let queue = cmdqueue::create_command_queue(&ctx).unwrap();
    let list = cmdlist::create_command_list(&ctx).unwrap();
    cmdlist::append_barrier(&ctx, list).unwrap();
    let err = unsafe { cmdqueue::execute_command_lists(&ctx, queue, &[list], None) }.unwrap_err();
    assert_eq!(err.result(), Some(types::ZeResult::ErrorInvalidArgument));
    // Host synchronization is only meaningful for immediate lists
    let err = cmdlist::synchronize_command_list_host(&ctx, list, 0).unwrap_err();
    assert_eq!(err.result(), Some(types::ZeResult::ErrorInvalidArgument));
    unsafe {
        cmdlist::destroy_command_list(&ctx, list).unwrap();
        cmdqueue::destroy_command_queue(&ctx, queue).unwrap();
    }
    ctx.destroy().unwrap();
}

#[test]
fn list_and_queue_ordinals_must_match() {
    let ctx = sim_context();
    let copy_ordinals = device::get_queue_group_ordinals(
        &ctx,
        ctx.default_device(),
        CommandQueueGroupFlags::COPY,
    )
    .unwrap();
    assert_eq!(copy_ordinals, [0, 1]);
    let queue = cmdqueue::create_command_queue(&ctx).unwrap();
    let list = cmdlist::create_command_list_with(
        &ctx,
        ctx.default_context(),
        ctx.default_device(),
        CommandListFlags::empty(),
        1,
    )
    .unwrap();
    cmdlist::close_command_list(&ctx, list).unwrap();
    let err = unsafe { cmdqueue::execute_command_lists(&ctx, queue, &[list], None) }.unwrap_err();
    assert_eq!(err.result(), Some(types::ZeResult::ErrorInvalidCommandListType));
    unsafe {
        cmdlist::destroy_command_list(&ctx, list).unwrap();
        cmdqueue::destroy_command_queue(&ctx, queue).unwrap();
    }
    ctx.destroy().unwrap();
}
