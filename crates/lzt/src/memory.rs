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
//! Allocation, IPC and virtual memory helpers.
//!
//! Allocations are plain [`DevicePtr`]s. Nothing tracks them, so every allocation must be
//! freed explicitly with [`free_memory`] on the context it came from.
use types::{
    DeviceMemAllocDesc, DeviceMemAllocFlags, HostMemAllocDesc, HostMemAllocFlags, IpcMemHandle,
    MemoryAccess, MemoryAllocationProperties, MemoryType,
};

use crate::{DevicePtr, Driver, DriverInstance, HarnessError, LztResult, TestContext};

#[derive(Clone, Copy, Debug, Default)]
pub struct HostAlloc {
    pub flags: HostMemAllocFlags,
    pub alignment: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct DeviceAlloc<B: Driver> {
    pub flags: DeviceMemAllocFlags,
    pub ordinal: u32,
    pub alignment: usize,
    /// `None` means the default device.
    pub device: Option<B::Device>,
    /// `None` means the default context.
    pub context: Option<B::Context>,
}
impl<B: Driver> Default for DeviceAlloc<B> {
    fn default() -> Self {
        Self {
            flags: DeviceMemAllocFlags::empty(),
            ordinal: 0,
            alignment: 1,
            device: None,
            context: None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SharedAlloc<B: Driver> {
    pub device_flags: DeviceMemAllocFlags,
    pub host_flags: HostMemAllocFlags,
    pub ordinal: u32,
    pub alignment: usize,
    pub device: Option<B::Device>,
    pub context: Option<B::Context>,
}
impl<B: Driver> Default for SharedAlloc<B> {
    fn default() -> Self {
        Self {
            device_flags: DeviceMemAllocFlags::empty(),
            host_flags: HostMemAllocFlags::empty(),
            ordinal: 0,
            alignment: 1,
            device: None,
            context: None,
        }
    }
}

/// # Safety
/// * The returned memory must be freed with [`free_memory`]
pub unsafe fn allocate_host_memory<B: Driver>(
    ctx: &TestContext<B>,
    size: usize,
) -> LztResult<B, DevicePtr> {
    unsafe {
        allocate_host_memory_with(
            ctx,
            size,
            &HostAlloc {
                alignment: 1,
                ..Default::default()
            },
        )
    }
}
/// # Safety
/// * The returned memory must be freed with [`free_memory`]
pub unsafe fn allocate_host_memory_with<B: Driver>(
    ctx: &TestContext<B>,
    size: usize,
    alloc: &HostAlloc,
) -> LztResult<B, DevicePtr> {
    let ptr = unsafe {
        ctx.instance().mem_alloc_host(
            ctx.default_context(),
            &HostMemAllocDesc { flags: alloc.flags },
            size,
            alloc.alignment,
        )
    }
    .map_err(HarnessError::<B>::Driver)?;
    check_allocation(ptr, alloc.alignment)
}
/// # Safety
/// * The returned memory must be freed with [`free_memory`]
pub unsafe fn allocate_device_memory<B: Driver>(
    ctx: &TestContext<B>,
    size: usize,
) -> LztResult<B, DevicePtr> {
    unsafe { allocate_device_memory_with(ctx, size, &DeviceAlloc::default()) }
}
/// # Safety
/// * The returned memory must be freed with [`free_memory`]
pub unsafe fn allocate_device_memory_with<B: Driver>(
    ctx: &TestContext<B>,
    size: usize,
    alloc: &DeviceAlloc<B>,
) -> LztResult<B, DevicePtr> {
    let ptr = unsafe {
        ctx.instance().mem_alloc_device(
            alloc.context.unwrap_or(ctx.default_context()),
            &DeviceMemAllocDesc {
                flags: alloc.flags,
                ordinal: alloc.ordinal,
            },
            size,
            alloc.alignment,
            alloc.device.unwrap_or(ctx.default_device()),
        )
    }
    .map_err(HarnessError::<B>::Driver)?;
    check_allocation(ptr, alloc.alignment)
}
/// # Safety
/// * The returned memory must be freed with [`free_memory`]
pub unsafe fn allocate_shared_memory<B: Driver>(
    ctx: &TestContext<B>,
    size: usize,
) -> LztResult<B, DevicePtr> {
    unsafe { allocate_shared_memory_with(ctx, size, &SharedAlloc::default()) }
}
/// # Safety
/// * The returned memory must be freed with [`free_memory`]
pub unsafe fn allocate_shared_memory_with<B: Driver>(
    ctx: &TestContext<B>,
    size: usize,
    alloc: &SharedAlloc<B>,
) -> LztResult<B, DevicePtr> {
    let ptr = unsafe {
        ctx.instance().mem_alloc_shared(
            alloc.context.unwrap_or(ctx.default_context()),
            &DeviceMemAllocDesc {
                flags: alloc.device_flags,
                ordinal: alloc.ordinal,
            },
            &HostMemAllocDesc {
                flags: alloc.host_flags,
            },
            size,
            alloc.alignment,
            Some(alloc.device.unwrap_or(ctx.default_device())),
        )
    }
    .map_err(HarnessError::<B>::Driver)?;
    check_allocation(ptr, alloc.alignment)
}
/// Allocates `size` bytes of the given kind with default settings.
/// # Safety
/// * The returned memory must be freed with [`free_memory`]
pub unsafe fn allocate_mem<B: Driver>(
    ctx: &TestContext<B>,
    ty: MemoryType,
    size: usize,
) -> LztResult<B, DevicePtr> {
    unsafe {
        match ty {
            MemoryType::Host => allocate_host_memory(ctx, size),
            MemoryType::Device => allocate_device_memory(ctx, size),
            MemoryType::Shared => allocate_shared_memory(ctx, size),
            MemoryType::Unknown => Err(HarnessError::UnexpectedValue(
                "cannot allocate memory of unknown type".to_owned(),
            )),
        }
    }
}

fn check_allocation<B: Driver>(ptr: DevicePtr, alignment: usize) -> LztResult<B, DevicePtr> {
    if ptr.is_null() {
        return Err(HarnessError::UnexpectedValue(
            "allocation returned null".to_owned(),
        ));
    }
    if alignment > 1 && ptr.addr() % alignment != 0 {
        return Err(HarnessError::UnexpectedValue(format!(
            "allocation {:#x} is not aligned to {alignment}",
            ptr.addr()
        )));
    }
    Ok(ptr)
}

/// # Safety
/// * No pending device work may reference the memory, and it must not be used afterwards
pub unsafe fn free_memory<B: Driver>(ctx: &TestContext<B>, ptr: DevicePtr) -> LztResult<B, ()> {
    unsafe { free_memory_in(ctx, ctx.default_context(), ptr) }
}
/// # Safety
/// * No pending device work may reference the memory, and it must not be used afterwards
pub unsafe fn free_memory_in<B: Driver>(
    ctx: &TestContext<B>,
    context: B::Context,
    ptr: DevicePtr,
) -> LztResult<B, ()> {
    unsafe { ctx.instance().mem_free(context, ptr) }.map_err(HarnessError::<B>::Driver)
}

pub fn get_mem_alloc_properties<B: Driver>(
    ctx: &TestContext<B>,
    ptr: DevicePtr,
) -> LztResult<B, (MemoryAllocationProperties, Option<B::Device>)> {
    ctx.instance()
        .mem_alloc_properties(ctx.default_context(), ptr)
        .map_err(HarnessError::<B>::Driver)
}

pub fn get_ipc_handle<B: Driver>(
    ctx: &TestContext<B>,
    ptr: DevicePtr,
) -> LztResult<B, IpcMemHandle> {
    ctx.instance()
        .mem_get_ipc_handle(ctx.default_context(), ptr)
        .map_err(HarnessError::<B>::Driver)
}
/// # Safety
/// * The handle must name a live allocation
pub unsafe fn open_ipc_handle<B: Driver>(
    ctx: &TestContext<B>,
    handle: IpcMemHandle,
) -> LztResult<B, DevicePtr> {
    unsafe {
        ctx.instance()
            .mem_open_ipc_handle(ctx.default_context(), ctx.default_device(), handle)
    }
    .map_err(HarnessError::<B>::Driver)
}
/// # Safety
/// * The pointer must come from [`open_ipc_handle`] and not be used afterwards
pub unsafe fn close_ipc_handle<B: Driver>(
    ctx: &TestContext<B>,
    ptr: DevicePtr,
) -> LztResult<B, ()> {
    unsafe {
        ctx.instance()
            .mem_close_ipc_handle(ctx.default_context(), ptr)
    }
    .map_err(HarnessError::<B>::Driver)
}
/// Allocates device memory and exports it. The allocation is freed again if the export fails.
/// # Safety
/// * The returned memory must be freed with [`free_memory`]
pub unsafe fn allocate_mem_and_get_ipc_handle<B: Driver>(
    ctx: &TestContext<B>,
    size: usize,
) -> LztResult<B, (DevicePtr, IpcMemHandle)> {
    let ptr = unsafe { allocate_device_memory(ctx, size)? };
    match get_ipc_handle(ctx, ptr) {
        Ok(handle) => Ok((ptr, handle)),
        Err(e) => {
            if let Err(free_err) = unsafe { free_memory(ctx, ptr) } {
                log::warn!("Failed to free memory after IPC export failure: {free_err}");
            }
            Err(e)
        }
    }
}

/// Page size for a reservation of `size` bytes on the default device.
pub fn query_page_size<B: Driver>(ctx: &TestContext<B>, size: usize) -> LztResult<B, usize> {
    ctx.instance()
        .virtual_mem_query_page_size(ctx.default_context(), ctx.default_device(), size)
        .map_err(HarnessError::<B>::Driver)
}
/// Rounds `size` up to a multiple of `page_size`.
pub fn create_page_aligned_size(size: usize, page_size: usize) -> usize {
    size.div_ceil(page_size) * page_size
}
/// # Safety
/// * The reservation must be released with [`free_virtual_memory`]
pub unsafe fn reserve_virtual_memory<B: Driver>(
    ctx: &TestContext<B>,
    size: usize,
) -> LztResult<B, DevicePtr> {
    unsafe {
        ctx.instance()
            .virtual_mem_reserve(ctx.default_context(), DevicePtr::null(), size)
    }
    .map_err(HarnessError::<B>::Driver)
}
/// # Safety
/// * Every mapping in the range must have been unmapped
pub unsafe fn free_virtual_memory<B: Driver>(
    ctx: &TestContext<B>,
    ptr: DevicePtr,
    size: usize,
) -> LztResult<B, ()> {
    unsafe {
        ctx.instance()
            .virtual_mem_free(ctx.default_context(), ptr, size)
    }
    .map_err(HarnessError::<B>::Driver)
}
pub fn create_physical_memory<B: Driver>(
    ctx: &TestContext<B>,
    size: usize,
) -> LztResult<B, B::PhysicalMem> {
    ctx.instance()
        .physical_mem_create(ctx.default_context(), ctx.default_device(), size)
        .map_err(HarnessError::<B>::Driver)
}
/// # Safety
/// * The physical memory must not be mapped anywhere
pub unsafe fn destroy_physical_memory<B: Driver>(
    ctx: &TestContext<B>,
    memory: B::PhysicalMem,
) -> LztResult<B, ()> {
    unsafe {
        ctx.instance()
            .physical_mem_destroy(ctx.default_context(), memory)
    }
    .map_err(HarnessError::<B>::Driver)
}
/// # Safety
/// * The range must lie inside a reservation and not be mapped already
pub unsafe fn map_virtual_memory<B: Driver>(
    ctx: &TestContext<B>,
    ptr: DevicePtr,
    size: usize,
    memory: B::PhysicalMem,
    offset: usize,
    access: MemoryAccess,
) -> LztResult<B, ()> {
    unsafe {
        ctx.instance()
            .virtual_mem_map(ctx.default_context(), ptr, size, memory, offset, access)
    }
    .map_err(HarnessError::<B>::Driver)
}
/// # Safety
/// * No pending device work may reference the range
pub unsafe fn unmap_virtual_memory<B: Driver>(
    ctx: &TestContext<B>,
    ptr: DevicePtr,
    size: usize,
) -> LztResult<B, ()> {
    unsafe {
        ctx.instance()
            .virtual_mem_unmap(ctx.default_context(), ptr, size)
    }
    .map_err(HarnessError::<B>::Driver)
}
/// # Safety
/// * Device work touching the range must tolerate the new access rights
#[tracing::instrument(skip(ctx))]
pub unsafe fn set_virtual_memory_access<B: Driver>(
    ctx: &TestContext<B>,
    ptr: DevicePtr,
    size: usize,
    access: MemoryAccess,
) -> LztResult<B, ()> {
    unsafe {
        ctx.instance()
            .virtual_mem_set_access(ctx.default_context(), ptr, size, access)
    }
    .map_err(HarnessError::<B>::Driver)
}
/// Access rights at `ptr` and the length of the range starting there that shares them.
pub fn get_virtual_memory_access<B: Driver>(
    ctx: &TestContext<B>,
    ptr: DevicePtr,
    size: usize,
) -> LztResult<B, (MemoryAccess, usize)> {
    ctx.instance()
        .virtual_mem_get_access(ctx.default_context(), ptr, size)
        .map_err(HarnessError::<B>::Driver)
}

/// Byte `i` of the pattern seeded with `pattern`: `pattern * (i + 1)`, wrapping at 8 bits.
pub fn data_pattern_byte(pattern: i8, index: usize) -> u8 {
    (pattern as u8).wrapping_mul(index.wrapping_add(1) as u8)
}
/// Writes `pattern, 2 * pattern, 3 * pattern, ...` into the buffer.
/// # Safety
/// * `ptr` must be host accessible and valid for writes of `size` bytes
pub unsafe fn write_data_pattern(ptr: DevicePtr, size: usize, pattern: i8) {
    let buf = unsafe { ptr.as_mut_slice(size) };
    fill_data_pattern(buf, pattern);
}
pub fn fill_data_pattern(buf: &mut [u8], pattern: i8) {
    for (i, b) in buf.iter_mut().enumerate() {
        *b = data_pattern_byte(pattern, i);
    }
}
/// Checks a buffer written by [`write_data_pattern`], reporting the first mismatch.
/// # Safety
/// * `ptr` must be host accessible and valid for reads of `size` bytes
pub unsafe fn validate_data_pattern<B: Driver>(
    ptr: DevicePtr,
    size: usize,
    pattern: i8,
) -> LztResult<B, ()> {
    check_data_pattern(unsafe { ptr.as_slice(size) }, pattern)
}
pub fn check_data_pattern<B: Driver>(buf: &[u8], pattern: i8) -> LztResult<B, ()> {
    match buf
        .iter()
        .enumerate()
        .find(|(i, b)| **b != data_pattern_byte(pattern, *i))
    {
        Some((offset, found)) => Err(HarnessError::PatternMismatch {
            offset,
            expected: data_pattern_byte(pattern, offset),
            found: *found,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use driver::Sim;

    use super::*;

    #[test]
    fn pattern_wraps_at_eight_bits() {
        let mut buf = [0u8; 300];
        fill_data_pattern(&mut buf, 1);
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);
        assert_eq!(buf[255], 0);
        assert_eq!(buf[256], 1);

        fill_data_pattern(&mut buf, -3);
        assert_eq!(&buf[..3], &[0xfd, 0xfa, 0xf7]);
        check_data_pattern::<Sim>(&buf, -3).unwrap();
    }

    #[test]
    fn first_mismatch_is_reported() {
        let mut buf = [0u8; 16];
        fill_data_pattern(&mut buf, 7);
        buf[9] = 0;
        buf[12] = 0;
        match check_data_pattern::<Sim>(&buf, 7) {
            Err(HarnessError::PatternMismatch {
                offset,
                expected,
                found,
            }) => {
                assert_eq!(offset, 9);
                assert_eq!(expected, 70);
                assert_eq!(found, 0);
            }
            other => panic!("Unexpected result {other:?}"),
        }
    }

    #[test]
    fn page_aligned_size_rounds_up() {
        assert_eq!(create_page_aligned_size(1, 4096), 4096);
        assert_eq!(create_page_aligned_size(4096, 4096), 4096);
        assert_eq!(create_page_aligned_size(4097, 4096), 8192);
    }
}
