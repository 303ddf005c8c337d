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
use rand::Rng;
use types::{CopyRegion, MemoryAccess, MemoryType, ZeResult};

use super::{assert_filled, sim_context};
use crate::{
    Driver, HarnessError, LztResult, TestContext,
    bundle::{create_command_bundle, destroy_command_bundle, execute_and_sync_command_bundle},
    cmdlist::{self, RegionSide},
    memory::{self, DeviceAlloc, HostAlloc},
};

fn allocations_report_their_type<B: Driver>(instance: B::Instance) -> LztResult<B, ()> {
    const SIZE: usize = 4096;
    let ctx = TestContext::new(instance)?;
    for ty in [MemoryType::Host, MemoryType::Device, MemoryType::Shared] {
        unsafe {
            let ptr = memory::allocate_mem(&ctx, ty, SIZE)?;
            let (props, device) = memory::get_mem_alloc_properties(&ctx, ptr)?;
            assert_eq!(props.ty, ty);
            match ty {
                MemoryType::Host => assert!(device.is_none()),
                _ => assert_eq!(device, Some(ctx.default_device())),
            }
            // Interior pointers resolve to the same allocation
            let (interior, _) = memory::get_mem_alloc_properties(&ctx, ptr.offset(SIZE / 2))?;
            assert_eq!(interior.id, props.id);
            memory::free_memory(&ctx, ptr)?;
        }
    }
    match unsafe { memory::allocate_mem(&ctx, MemoryType::Unknown, SIZE) } {
        Err(HarnessError::UnexpectedValue(_)) => (),
        other => panic!("Allocating unknown memory gave {other:?}"),
    }
    ctx.destroy()
}
dev_utils::all_driver_tests!(allocations_report_their_type);

fn aligned_allocations<B: Driver>(instance: B::Instance) -> LztResult<B, ()> {
    let ctx = TestContext::new(instance)?;
    for alignment in [1, 8, 64, 4096] {
        unsafe {
            let host = memory::allocate_host_memory_with(
                &ctx,
                100,
                &HostAlloc {
                    alignment,
                    ..Default::default()
                },
            )?;
            let device = memory::allocate_device_memory_with(
                &ctx,
                100,
                &DeviceAlloc {
                    alignment,
                    ..Default::default()
                },
            )?;
            assert_eq!(host.addr() % alignment, 0);
            assert_eq!(device.addr() % alignment, 0);
            memory::free_memory(&ctx, host)?;
            memory::free_memory(&ctx, device)?;
        }
    }
    ctx.destroy()
}
dev_utils::all_driver_tests!(aligned_allocations);

/// Copies a 2D box out of a pitched buffer into a tightly packed one.
fn copy_region_moves_a_box<B: Driver>(instance: B::Instance) -> LztResult<B, ()> {
    const SRC_PITCH: u32 = 32;
    const SRC_ROWS: u32 = 16;
    const BOX: CopyRegion = CopyRegion {
        origin_x: 5,
        origin_y: 3,
        origin_z: 0,
        width: 12,
        height: 7,
        depth: 1,
    };
    let src_size = (SRC_PITCH * SRC_ROWS) as usize;
    let dst_size = (BOX.width * BOX.height) as usize;
    let ctx = TestContext::new(instance)?;
    for is_immediate in [false, true] {
        let bundle = create_command_bundle(&ctx, is_immediate)?;
        unsafe {
            let src = memory::allocate_host_memory(&ctx, src_size)?;
            let dst = memory::allocate_host_memory(&ctx, dst_size)?;
            rand::rng().fill(src.as_mut_slice(src_size));
            dst.as_mut_slice(dst_size).fill(0);

            cmdlist::append_memory_copy_region(
                &ctx,
                bundle.list(),
                &RegionSide {
                    ptr: dst,
                    region: CopyRegion {
                        origin_x: 0,
                        origin_y: 0,
                        ..BOX
                    },
                    pitch: BOX.width,
                    slice_pitch: 0,
                },
                &RegionSide {
                    ptr: src,
                    region: BOX,
                    pitch: SRC_PITCH,
                    slice_pitch: 0,
                },
            )?;
            if !is_immediate {
                cmdlist::close_command_list(&ctx, bundle.list())?;
            }
            execute_and_sync_command_bundle(&ctx, &bundle, ctx.timeout())?;

            let src_bytes = src.as_slice(src_size);
            let dst_bytes = dst.as_slice(dst_size);
            for row in 0..BOX.height as usize {
                let s = (BOX.origin_y as usize + row) * SRC_PITCH as usize + BOX.origin_x as usize;
                let d = row * BOX.width as usize;
                let w = BOX.width as usize;
                assert_eq!(dst_bytes[d..d + w], src_bytes[s..s + w], "row {row}");
            }
            memory::free_memory(&ctx, src)?;
            memory::free_memory(&ctx, dst)?;
            destroy_command_bundle(&ctx, bundle)?;
        }
    }
    ctx.destroy()
}
dev_utils::all_driver_tests!(copy_region_moves_a_box);

/// Reserves a range, backs it with physical memory and moves data through it.
fn virtual_memory_map_write_read<B: Driver>(instance: B::Instance) -> LztResult<B, ()> {
    const SIZE: usize = 1024 * 1024;
    let ctx = TestContext::new(instance)?;
    let page_size = memory::query_page_size(&ctx, SIZE)?;
    let size = memory::create_page_aligned_size(SIZE, page_size);
    assert_eq!(size % page_size, 0);
    assert!(size >= SIZE);

    let bundle = create_command_bundle(&ctx, true)?;
    unsafe {
        let reserved = memory::reserve_virtual_memory(&ctx, size)?;
        let physical = memory::create_physical_memory(&ctx, size)?;
        memory::map_virtual_memory(&ctx, reserved, size, physical, 0, MemoryAccess::ReadWrite)?;

        let src = memory::allocate_host_memory(&ctx, size)?;
        let dst = memory::allocate_host_memory(&ctx, size)?;
        memory::write_data_pattern(src, size, 5);
        dst.as_mut_slice(size).fill(0);
        cmdlist::append_memory_copy(&ctx, bundle.list(), reserved, src, size)?;
        cmdlist::append_barrier(&ctx, bundle.list())?;
        cmdlist::append_memory_copy(&ctx, bundle.list(), dst, reserved, size)?;
        execute_and_sync_command_bundle(&ctx, &bundle, ctx.timeout())?;
        memory::validate_data_pattern::<B>(dst, size, 5)?;

        memory::unmap_virtual_memory(&ctx, reserved, size)?;
        memory::destroy_physical_memory(&ctx, physical)?;
        memory::free_virtual_memory(&ctx, reserved, size)?;
        memory::free_memory(&ctx, src)?;
        memory::free_memory(&ctx, dst)?;
        destroy_command_bundle(&ctx, bundle)?;
    }
    ctx.destroy()
}
dev_utils::all_driver_tests!(virtual_memory_map_write_read);

/// Access rights change per page and queries report the run of pages sharing them.
fn virtual_memory_access_attributes<B: Driver>(instance: B::Instance) -> LztResult<B, ()> {
    let ctx = TestContext::new(instance)?;
    let page_size = memory::query_page_size(&ctx, 1)?;
    let size = page_size * 2;
    unsafe {
        let reserved = memory::reserve_virtual_memory(&ctx, size)?;
        let second_page = reserved.offset(page_size);
        let physical = memory::create_physical_memory(&ctx, size)?;
        memory::map_virtual_memory(&ctx, reserved, size, physical, 0, MemoryAccess::ReadWrite)?;
        assert_eq!(
            memory::get_virtual_memory_access(&ctx, reserved, size)?,
            (MemoryAccess::ReadWrite, size)
        );

        memory::set_virtual_memory_access(&ctx, reserved, page_size, MemoryAccess::ReadOnly)?;
        assert_eq!(
            memory::get_virtual_memory_access(&ctx, reserved, size)?,
            (MemoryAccess::ReadOnly, page_size)
        );
        assert_eq!(
            memory::get_virtual_memory_access(&ctx, second_page, page_size)?,
            (MemoryAccess::ReadWrite, page_size)
        );

        memory::set_virtual_memory_access(&ctx, reserved, size, MemoryAccess::None)?;
        assert_eq!(
            memory::get_virtual_memory_access(&ctx, reserved, size)?,
            (MemoryAccess::None, size)
        );

        memory::unmap_virtual_memory(&ctx, reserved, size)?;
        memory::destroy_physical_memory(&ctx, physical)?;
        memory::free_virtual_memory(&ctx, reserved, size)?;
    }
    ctx.destroy()
}
dev_utils::all_driver_tests!(virtual_memory_access_attributes);

/// Exports device memory, imports it again and reads the data through the imported pointer.
fn ipc_handle_round_trip<B: Driver>(instance: B::Instance) -> LztResult<B, ()> {
    const SIZE: usize = 512;
    let ctx = TestContext::new(instance)?;
    let bundle = create_command_bundle(&ctx, true)?;
    unsafe {
        let (exported, handle) = memory::allocate_mem_and_get_ipc_handle(&ctx, SIZE)?;
        let src = memory::allocate_host_memory(&ctx, SIZE)?;
        let dst = memory::allocate_host_memory(&ctx, SIZE)?;
        memory::write_data_pattern(src, SIZE, 9);
        dst.as_mut_slice(SIZE).fill(0);
        cmdlist::append_memory_copy(&ctx, bundle.list(), exported, src, SIZE)?;
        execute_and_sync_command_bundle(&ctx, &bundle, ctx.timeout())?;

        let imported = memory::open_ipc_handle(&ctx, handle)?;
        cmdlist::append_memory_copy(&ctx, bundle.list(), dst, imported, SIZE)?;
        execute_and_sync_command_bundle(&ctx, &bundle, ctx.timeout())?;
        memory::validate_data_pattern::<B>(dst, SIZE, 9)?;

        memory::close_ipc_handle(&ctx, imported)?;
        memory::free_memory(&ctx, exported)?;
        memory::free_memory(&ctx, src)?;
        memory::free_memory(&ctx, dst)?;
        destroy_command_bundle(&ctx, bundle)?;
    }
    ctx.destroy()
}
dev_utils::all_driver_tests!(ipc_handle_round_trip);

#[test]
fn invalid_allocations_are_rejected() {
    let ctx = sim_context();
    let err = unsafe { memory::allocate_device_memory(&ctx, 0) }.unwrap_err();
    assert_eq!(err.result(), Some(ZeResult::ErrorUnsupportedSize));
    let err = unsafe {
        memory::allocate_host_memory_with(
            &ctx,
            64,
            &HostAlloc {
                alignment: 24,
                ..Default::default()
            },
        )
    }
    .unwrap_err();
    assert_eq!(err.result(), Some(ZeResult::ErrorUnsupportedAlignment));
    assert_eq!(ctx.instance().live_objects().allocations, 0);
    ctx.destroy().unwrap();
}

#[test]
fn host_memory_cannot_be_exported() {
    let ctx = sim_context();
    unsafe {
        let host = memory::allocate_host_memory(&ctx, 64).unwrap();
        let err = memory::get_ipc_handle(&ctx, host).unwrap_err();
        assert_eq!(err.result(), Some(ZeResult::ErrorInvalidArgument));
        memory::free_memory(&ctx, host).unwrap();
    }
    ctx.destroy().unwrap();
}

#[test]
fn mapped_physical_memory_cannot_be_destroyed() {
    let ctx = sim_context();
    let page_size = memory::query_page_size(&ctx, 1).unwrap();
    unsafe {
        let reserved = memory::reserve_virtual_memory(&ctx, page_size * 2).unwrap();
        let physical = memory::create_physical_memory(&ctx, page_size).unwrap();
        let second_page = reserved.offset(page_size);
        memory::map_virtual_memory(
            &ctx,
            second_page,
            page_size,
            physical,
            0,
            MemoryAccess::ReadWrite,
        )
        .unwrap();
        let (props, _) = memory::get_mem_alloc_properties(&ctx, second_page).unwrap();
        assert_eq!(props.ty, MemoryType::Device);
        let (props, _) = memory::get_mem_alloc_properties(&ctx, reserved).unwrap();
        assert_eq!(props.ty, MemoryType::Unknown);

        let err = memory::destroy_physical_memory(&ctx, physical).unwrap_err();
        assert_eq!(err.result(), Some(ZeResult::ErrorHandleObjectInUse));
        let err = memory::free_virtual_memory(&ctx, reserved, page_size * 2).unwrap_err();
        assert_eq!(err.result(), Some(ZeResult::ErrorHandleObjectInUse));

        memory::unmap_virtual_memory(&ctx, second_page, page_size).unwrap();
        memory::destroy_physical_memory(&ctx, physical).unwrap();
        memory::free_virtual_memory(&ctx, reserved, page_size * 2).unwrap();
    }
    ctx.destroy().unwrap();
}

#[test]
fn zeroed_device_memory_reads_back_through_host() {
    let ctx = sim_context();
    let bundle = create_command_bundle(&ctx, false).unwrap();
    unsafe {
        let device = memory::allocate_device_memory(&ctx, 16).unwrap();
        let host = memory::allocate_host_memory(&ctx, 16).unwrap();
        host.as_mut_slice(16).fill(0xff);
        cmdlist::append_memory_copy(&ctx, bundle.list(), host, device, 16).unwrap();
        cmdlist::close_command_list(&ctx, bundle.list()).unwrap();
        execute_and_sync_command_bundle(&ctx, &bundle, ctx.timeout()).unwrap();
        assert_filled::<driver::Sim>(host, 16, 0).unwrap();
        let overlapping = cmdlist::append_memory_copy(
            &ctx,
            bundle.list(),
            host.offset(4),
            host,
            8,
        )
        .unwrap_err();
        assert_eq!(overlapping.result(), Some(ZeResult::ErrorOverlappingRegions));
        memory::free_memory(&ctx, device).unwrap();
        memory::free_memory(&ctx, host).unwrap();
        destroy_command_bundle(&ctx, bundle).unwrap();
    }
    ctx.destroy().unwrap();
}

#[test]
fn copy_region_past_the_pitch_is_rejected() {
    let ctx = sim_context();
    let list = cmdlist::create_command_list(&ctx).unwrap();
    unsafe {
        let buffer = memory::allocate_host_memory(&ctx, 256).unwrap();
        let side = |origin_x, width| RegionSide {
            ptr: buffer,
            region: CopyRegion {
                origin_x,
                origin_y: 0,
                origin_z: 0,
                width,
                height: 1,
                depth: 1,
            },
            pitch: 16,
            slice_pitch: 256,
        };
        for (origin_x, width) in [(12, 8), (u32::MAX, 4), (4, u32::MAX)] {
            let err = cmdlist::append_memory_copy_region(
                &ctx,
                list,
                &side(origin_x, width),
                &side(0, width),
            )
            .unwrap_err();
            assert_eq!(err.result(), Some(ZeResult::ErrorInvalidSize), "origin {origin_x}");
        }
        memory::free_memory(&ctx, buffer).unwrap();
        cmdlist::destroy_command_list(&ctx, list).unwrap();
    }
    ctx.destroy().unwrap();
}

#[test]
fn access_queries_need_whole_pages() {
    let ctx = sim_context();
    let page_size = memory::query_page_size(&ctx, 1).unwrap();
    assert_eq!(page_size, crate::driver::sim::SIM_PAGE_SIZE);
    unsafe {
        let reserved = memory::reserve_virtual_memory(&ctx, page_size * 2).unwrap();
        // Reserved but unmapped pages carry no access rights
        assert_eq!(
            memory::get_virtual_memory_access(&ctx, reserved, page_size * 2).unwrap(),
            (MemoryAccess::None, page_size * 2)
        );
        let err = memory::get_virtual_memory_access(&ctx, reserved, page_size / 2).unwrap_err();
        assert_eq!(err.result(), Some(ZeResult::ErrorUnsupportedSize));
        let err = memory::set_virtual_memory_access(
            &ctx,
            reserved.offset(page_size / 2),
            page_size,
            MemoryAccess::ReadOnly,
        )
        .unwrap_err();
        assert_eq!(err.result(), Some(ZeResult::ErrorUnsupportedAlignment));
        let err = memory::get_virtual_memory_access(&ctx, reserved, page_size * 3).unwrap_err();
        assert_eq!(err.result(), Some(ZeResult::ErrorInvalidArgument));
        memory::free_virtual_memory(&ctx, reserved, page_size * 2).unwrap();
    }
    ctx.destroy().unwrap();
}
