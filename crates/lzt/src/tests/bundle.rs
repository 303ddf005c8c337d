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
use std::time::Duration;

use types::{CommandListFlags, CommandQueueFlags, CommandQueueMode, TIMEOUT_INFINITE};

use super::{assert_filled, sim_context};
use crate::{
    Driver, HarnessError, LztResult, TestContext,
    bundle::{
        BundleDesc, CommandBundle, create_command_bundle, create_command_bundle_with,
        create_command_bundle_with_flags, destroy_command_bundle,
        execute_and_sync_command_bundle, synchronize_command_bundle,
    },
    cmdlist, cmdqueue, driver_info, event,
    event::EventPool,
    memory::{self, SharedAlloc},
};

fn bundle_has_queue_only_when_deferred<B: Driver>(instance: B::Instance) -> LztResult<B, ()> {
    let ctx = TestContext::new(instance)?;
    for is_immediate in [false, true] {
        let bundle = create_command_bundle(&ctx, is_immediate)?;
        assert_eq!(bundle.is_immediate(), is_immediate);
        assert_eq!(bundle.queue().is_some(), !is_immediate);
        match &bundle {
            CommandBundle::Immediate { list } | CommandBundle::Deferred { list, .. } => {
                assert_eq!(*list, bundle.list())
            }
        }
        unsafe { destroy_command_bundle(&ctx, bundle)? };
    }
    ctx.destroy()
}
dev_utils::all_driver_tests!(bundle_has_queue_only_when_deferred);

/// Fills a 16 byte device buffer, copies it back and checks every byte, for both bundle kinds.
fn bundle_fill_then_copy_to_host<B: Driver>(instance: B::Instance) -> LztResult<B, ()> {
    const SIZE: usize = 16;
    let ctx = TestContext::new(instance)?;
    for is_immediate in [false, true] {
        let bundle = create_command_bundle(&ctx, is_immediate)?;
        unsafe {
            let device_buffer = memory::allocate_device_memory(&ctx, SIZE)?;
            let host_buffer = memory::allocate_host_memory(&ctx, SIZE)?;
            host_buffer.as_mut_slice(SIZE).fill(0);

            cmdlist::append_memory_set(&ctx, bundle.list(), device_buffer, 0xAB, SIZE)?;
            cmdlist::append_barrier(&ctx, bundle.list())?;
            cmdlist::append_memory_copy(&ctx, bundle.list(), host_buffer, device_buffer, SIZE)?;
            if !bundle.is_immediate() {
                cmdlist::close_command_list(&ctx, bundle.list())?;
            }
            execute_and_sync_command_bundle(&ctx, &bundle, ctx.timeout())?;
            assert_filled::<B>(host_buffer, SIZE, 0xAB)?;

            memory::free_memory(&ctx, host_buffer)?;
            memory::free_memory(&ctx, device_buffer)?;
            destroy_command_bundle(&ctx, bundle)?;
        }
    }
    ctx.destroy()
}
dev_utils::all_driver_tests!(bundle_fill_then_copy_to_host);

fn bundle_with_list_flags<B: Driver>(instance: B::Instance) -> LztResult<B, ()> {
    const SIZE: usize = 64;
    let ctx = TestContext::new(instance)?;
    for flags in [
        CommandListFlags::empty(),
        CommandListFlags::RELAXED_ORDERING,
        CommandListFlags::MAXIMIZE_THROUGHPUT,
        CommandListFlags::EXPLICIT_ONLY,
    ] {
        for is_immediate in [false, true] {
            let bundle =
                create_command_bundle_with_flags(&ctx, ctx.default_device(), flags, is_immediate)?;
            unsafe {
                let buffer = memory::allocate_shared_memory(&ctx, SIZE)?;
                buffer.as_mut_slice(SIZE).fill(0);
                cmdlist::append_memory_fill(&ctx, bundle.list(), buffer, &[0x12, 0x34], SIZE)?;
                if !bundle.is_immediate() {
                    cmdlist::close_command_list(&ctx, bundle.list())?;
                }
                execute_and_sync_command_bundle(&ctx, &bundle, ctx.timeout())?;
                let bytes = buffer.as_slice(SIZE);
                assert!(bytes.chunks(2).all(|c| c == [0x12, 0x34]), "{bytes:?}");
                memory::free_memory(&ctx, buffer)?;
                destroy_command_bundle(&ctx, bundle)?;
            }
        }
    }
    ctx.destroy()
}
dev_utils::all_driver_tests!(bundle_with_list_flags);

fn bundle_rejects_index_without_explicit_only<B: Driver>(
    instance: B::Instance,
) -> LztResult<B, ()> {
    let ctx = TestContext::new(instance)?;
    let desc = BundleDesc::<B> {
        index: 1,
        ..Default::default()
    };
    match create_command_bundle_with(&ctx, &desc) {
        Err(HarnessError::UnexpectedValue(_)) => (),
        Err(e) => return Err(e),
        Ok(bundle) => {
            unsafe { destroy_command_bundle(&ctx, bundle)? };
            panic!("Bundle with queue index 1 and no EXPLICIT_ONLY was created");
        }
    }
    ctx.destroy()
}
dev_utils::all_driver_tests!(bundle_rejects_index_without_explicit_only);

/// Bundles, and the memory they write, can live on a context other than the default one.
fn bundle_runs_on_another_context<B: Driver>(instance: B::Instance) -> LztResult<B, ()> {
    const SIZE: usize = 48;
    let ctx = TestContext::new(instance)?;
    let context = driver_info::create_context(&ctx, ctx.default_driver())?;
    for is_immediate in [false, true] {
        let bundle = create_command_bundle_with(
            &ctx,
            &BundleDesc {
                context: Some(context),
                is_immediate,
                ..Default::default()
            },
        )?;
        unsafe {
            let buffer = memory::allocate_shared_memory_with(
                &ctx,
                SIZE,
                &SharedAlloc {
                    context: Some(context),
                    ..Default::default()
                },
            )?;
            buffer.as_mut_slice(SIZE).fill(0);
            cmdlist::append_memory_set(&ctx, bundle.list(), buffer, 0x3e, SIZE)?;
            if !is_immediate {
                cmdlist::close_command_list(&ctx, bundle.list())?;
            }
            execute_and_sync_command_bundle(&ctx, &bundle, ctx.timeout())?;
            assert_filled::<B>(buffer, SIZE, 0x3e)?;
            memory::free_memory_in(&ctx, context, buffer)?;
            destroy_command_bundle(&ctx, bundle)?;
        }
    }
    unsafe { driver_info::destroy_context(&ctx, context)? };
    ctx.destroy()
}
dev_utils::all_driver_tests!(bundle_runs_on_another_context);

/// Work blocked on a host event outlives a 1 ms wait, which reports `NotReady`. Once another
/// thread signals the event an unbounded wait completes the work.
fn bundle_sync_times_out_on_blocked_work<B: Driver>(instance: B::Instance) -> LztResult<B, ()> {
    const SIZE: usize = 32;
    let ctx = TestContext::new(instance)?;
    for is_immediate in [false, true] {
        let mut pool = EventPool::new(&ctx);
        let gate = pool.create_event()?;
        let bundle = create_command_bundle(&ctx, is_immediate)?;
        unsafe {
            let buffer = memory::allocate_host_memory(&ctx, SIZE)?;
            buffer.as_mut_slice(SIZE).fill(0);
            cmdlist::append_wait_on_events(&ctx, bundle.list(), &[gate])?;
            cmdlist::append_memory_set(&ctx, bundle.list(), buffer, 0x71, SIZE)?;
            if !is_immediate {
                cmdlist::close_command_list(&ctx, bundle.list())?;
            }
            match execute_and_sync_command_bundle(&ctx, &bundle, 1_000_000) {
                Err(HarnessError::NotReady(_)) => (),
                Err(e) => return Err(e),
                Ok(()) => panic!("bundle blocked on an unsignalled event completed"),
            }

            std::thread::scope(|s| {
                let signaller = s.spawn(|| {
                    std::thread::sleep(Duration::from_millis(20));
                    event::signal_event_from_host(&ctx, gate)
                });
                let synced = synchronize_command_bundle(&ctx, &bundle, TIMEOUT_INFINITE);
                match signaller.join() {
                    Ok(result) => result?,
                    Err(e) => std::panic::resume_unwind(e),
                }
                synced
            })?;
            assert_filled::<B>(buffer, SIZE, 0x71)?;

            memory::free_memory(&ctx, buffer)?;
            destroy_command_bundle(&ctx, bundle)?;
            pool.destroy_event(gate)?;
        }
    }
    ctx.destroy()
}
dev_utils::all_driver_tests!(bundle_sync_times_out_on_blocked_work);

#[test]
fn destroying_bundles_releases_exactly_their_objects() {
    let ctx = sim_context();
    let before = ctx.instance().live_objects();

    let deferred = create_command_bundle(&ctx, false).unwrap();
    let immediate = create_command_bundle(&ctx, true).unwrap();
    let live = ctx.instance().live_objects();
    assert_eq!(live.queues, before.queues + 1);
    assert_eq!(live.lists, before.lists + 2);

    unsafe { destroy_command_bundle(&ctx, immediate).unwrap() };
    let live = ctx.instance().live_objects();
    assert_eq!(live.queues, before.queues + 1);
    assert_eq!(live.lists, before.lists + 1);

    unsafe { destroy_command_bundle(&ctx, deferred).unwrap() };
    assert_eq!(ctx.instance().live_objects(), before);
    ctx.destroy().unwrap();
}

#[test]
fn bundle_honors_queue_descriptor() {
    let ctx = sim_context();
    let desc = BundleDesc {
        queue_flags: CommandQueueFlags::EXPLICIT_ONLY,
        mode: CommandQueueMode::Synchronous,
        ordinal: 1,
        index: 1,
        ..Default::default()
    };
    for is_immediate in [false, true] {
        let bundle = create_command_bundle_with(
            &ctx,
            &BundleDesc {
                is_immediate,
                ..desc
            },
        )
        .unwrap();
        unsafe {
            let host = memory::allocate_host_memory(&ctx, 8).unwrap();
            cmdlist::append_memory_set(&ctx, bundle.list(), host, 7, 8).unwrap();
            if !is_immediate {
                cmdlist::close_command_list(&ctx, bundle.list()).unwrap();
            }
            execute_and_sync_command_bundle(&ctx, &bundle, 0).unwrap();
            assert_eq!(host.as_slice(8), [7; 8]);
            memory::free_memory(&ctx, host).unwrap();
            destroy_command_bundle(&ctx, bundle).unwrap();
        }
    }
    // Ordinal 1 has two queues
    let err = create_command_bundle_with(
        &ctx,
        &BundleDesc {
            index: 2,
            ..desc
        },
    )
    .unwrap_err();
    assert_eq!(err.result(), Some(types::ZeResult::ErrorInvalidArgument));
    ctx.destroy().unwrap();
}

#[test]
fn failed_bundle_creation_leaves_nothing_behind() {
    let ctx = sim_context();
    let before = ctx.instance().live_objects();
    for is_immediate in [false, true] {
        let desc = BundleDesc {
            device: Some(ctx.default_device()),
            ordinal: 7,
            is_immediate,
            ..Default::default()
        };
        let err = create_command_bundle_with(&ctx, &desc).unwrap_err();
        assert_eq!(err.result(), Some(types::ZeResult::ErrorInvalidArgument));
    }
    assert_eq!(ctx.instance().live_objects(), before);
    ctx.destroy().unwrap();
}

#[test]
fn list_is_destroyed_when_queue_destroy_fails() {
    let ctx = sim_context();
    let before = ctx.instance().live_objects();
    let bundle = create_command_bundle(&ctx, false).unwrap();
    unsafe {
        cmdqueue::destroy_command_queue(&ctx, bundle.queue().unwrap()).unwrap();
        let err = destroy_command_bundle(&ctx, bundle).unwrap_err();
        assert!(err.result().is_some(), "{err:?}");
    }
    assert_eq!(ctx.instance().live_objects(), before);
    ctx.destroy().unwrap();
}
