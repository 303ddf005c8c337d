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
use std::{alloc::Layout, collections::BTreeMap, ffi::c_void};

use types::{IpcMemHandle, MemoryAccess, MemoryType, ZeResult};

use super::SimError;
use crate::DevicePtr;

pub const SIM_PAGE_SIZE: usize = 1 << 16;
const MIN_ALIGNMENT: usize = 64;
const IPC_MAGIC: &[u8; 8] = b"LZTSIMIP";

pub(crate) struct Allocation {
    pub size: usize,
    layout: Layout,
    pub ty: MemoryType,
    pub device: Option<u64>,
    pub context: u64,
    pub id: u64,
    pub ipc_opens: u32,
}

struct Mapping {
    size: usize,
    physical: u64,
}

struct Reservation {
    size: usize,
    layout: Layout,
    context: u64,
    // Keyed by offset into the reservation
    mappings: BTreeMap<usize, Mapping>,
    // One entry per page
    access: Vec<MemoryAccess>,
}

/// Host-backed memory for every allocation kind. Device memory lives in host RAM too, which is
/// what lets the worker threads execute copies with plain pointer writes.
pub(crate) struct MemoryRegistry {
    allocations: BTreeMap<usize, Allocation>,
    reservations: BTreeMap<usize, Reservation>,
    next_id: u64,
    max_alloc_size: usize,
}

fn fail<T>(result: ZeResult) -> Result<T, SimError> {
    Err(SimError::Raw(result))
}

impl MemoryRegistry {
    pub fn new(max_alloc_size: usize) -> Self {
        Self {
            allocations: BTreeMap::new(),
            reservations: BTreeMap::new(),
            next_id: 0,
            max_alloc_size,
        }
    }
    pub fn allocate(
        &mut self,
        context: u64,
        ty: MemoryType,
        device: Option<u64>,
        size: usize,
        alignment: usize,
    ) -> Result<DevicePtr, SimError> {
        if size == 0 || size > self.max_alloc_size {
            return fail(ZeResult::ErrorUnsupportedSize);
        }
        if alignment != 0 && !alignment.is_power_of_two() {
            return fail(ZeResult::ErrorUnsupportedAlignment);
        }
        let layout = Layout::from_size_align(size, alignment.max(MIN_ALIGNMENT))
            .map_err(|_| SimError::Raw(ZeResult::ErrorUnsupportedSize))?;
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            return fail(match ty {
                MemoryType::Host => ZeResult::ErrorOutOfHostMemory,
                _ => ZeResult::ErrorOutOfDeviceMemory,
            });
        }
        self.next_id += 1;
        self.allocations.insert(
            ptr as usize,
            Allocation {
                size,
                layout,
                ty,
                device,
                context,
                id: self.next_id,
                ipc_opens: 0,
            },
        );
        log::trace!("sim: allocated {size} bytes of {ty:?} memory at {ptr:p}");
        Ok(DevicePtr(ptr as *mut c_void))
    }
    /// # Safety
    /// * The allocation must not be referenced by pending work
    pub unsafe fn free(&mut self, context: u64, ptr: DevicePtr) -> Result<(), SimError> {
        match self.allocations.get(&ptr.addr()) {
            Some(alloc) if alloc.context == context => (),
            Some(_) => return fail(ZeResult::ErrorInvalidArgument),
            None => return fail(ZeResult::ErrorInvalidArgument),
        }
        let alloc = self
            .allocations
            .remove(&ptr.addr())
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidArgument))?;
        unsafe { std::alloc::dealloc(ptr.as_ptr() as *mut u8, alloc.layout) };
        Ok(())
    }
    /// Finds the allocation containing `ptr`, returning its base address.
    pub fn find(&self, ptr: DevicePtr) -> Option<(usize, &Allocation)> {
        let addr = ptr.addr();
        let (base, alloc) = self.allocations.range(..=addr).next_back()?;
        (addr < base + alloc.size).then_some((*base, alloc))
    }
    /// Whether `ptr` falls inside a mapped part of a virtual reservation.
    pub fn is_mapped_virtual(&self, ptr: DevicePtr) -> bool {
        let addr = ptr.addr();
        let Some((base, res)) = self.reservations.range(..=addr).next_back() else {
            return false;
        };
        if addr >= base + res.size {
            return false;
        }
        let offset = addr - base;
        res.mappings
            .range(..=offset)
            .next_back()
            .is_some_and(|(start, m)| offset < start + m.size)
    }
    pub fn live_allocations(&self) -> usize {
        self.allocations.len()
    }

    pub fn ipc_handle(&self, ptr: DevicePtr) -> Result<IpcMemHandle, SimError> {
        let (base, alloc) = self
            .find(ptr)
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidArgument))?;
        if alloc.ty != MemoryType::Device {
            return fail(ZeResult::ErrorInvalidArgument);
        }
        let mut handle = IpcMemHandle::default();
        handle.0[0..8].copy_from_slice(IPC_MAGIC);
        handle.0[8..16].copy_from_slice(&(base as u64).to_le_bytes());
        handle.0[16..24].copy_from_slice(&alloc.id.to_le_bytes());
        Ok(handle)
    }
    pub fn open_ipc_handle(&mut self, handle: &IpcMemHandle) -> Result<DevicePtr, SimError> {
        if &handle.0[0..8] != IPC_MAGIC {
            return fail(ZeResult::ErrorInvalidArgument);
        }
        let read_u64 = |range: std::ops::Range<usize>| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&handle.0[range]);
            u64::from_le_bytes(bytes)
        };
        let base = read_u64(8..16) as usize;
        let id = read_u64(16..24);
        match self.allocations.get_mut(&base) {
            Some(alloc) if alloc.id == id => {
                alloc.ipc_opens += 1;
                Ok(DevicePtr(base as *mut c_void))
            }
            _ => fail(ZeResult::ErrorInvalidArgument),
        }
    }
    pub fn close_ipc_handle(&mut self, ptr: DevicePtr) -> Result<(), SimError> {
        match self.allocations.get_mut(&ptr.addr()) {
            Some(alloc) if alloc.ipc_opens > 0 => {
                alloc.ipc_opens -= 1;
                Ok(())
            }
            _ => fail(ZeResult::ErrorInvalidArgument),
        }
    }

    pub fn reserve(&mut self, context: u64, size: usize) -> Result<DevicePtr, SimError> {
        if size == 0 || size % SIM_PAGE_SIZE != 0 {
            return fail(ZeResult::ErrorUnsupportedSize);
        }
        let layout = Layout::from_size_align(size, SIM_PAGE_SIZE)
            .map_err(|_| SimError::Raw(ZeResult::ErrorUnsupportedSize))?;
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            return fail(ZeResult::ErrorOutOfHostMemory);
        }
        self.reservations.insert(
            ptr as usize,
            Reservation {
                size,
                layout,
                context,
                mappings: BTreeMap::new(),
                access: vec![MemoryAccess::None; size / SIM_PAGE_SIZE],
            },
        );
        Ok(DevicePtr(ptr as *mut c_void))
    }
    /// # Safety
    /// * The reservation must not be referenced by pending work
    pub unsafe fn free_reservation(
        &mut self,
        context: u64,
        ptr: DevicePtr,
        size: usize,
    ) -> Result<(), SimError> {
        match self.reservations.get(&ptr.addr()) {
            Some(res) if res.context == context && res.size == size => {
                if !res.mappings.is_empty() {
                    return fail(ZeResult::ErrorHandleObjectInUse);
                }
            }
            _ => return fail(ZeResult::ErrorInvalidArgument),
        }
        if let Some(res) = self.reservations.remove(&ptr.addr()) {
            unsafe { std::alloc::dealloc(ptr.as_ptr() as *mut u8, res.layout) };
        }
        Ok(())
    }
    pub fn map(
        &mut self,
        ptr: DevicePtr,
        size: usize,
        physical: u64,
        physical_size: usize,
        offset: usize,
        access: MemoryAccess,
    ) -> Result<(), SimError> {
        if size == 0 || size % SIM_PAGE_SIZE != 0 || offset % SIM_PAGE_SIZE != 0 {
            return fail(ZeResult::ErrorUnsupportedSize);
        }
        if offset + size > physical_size {
            return fail(ZeResult::ErrorInvalidSize);
        }
        let addr = ptr.addr();
        let (base, res) = self
            .reservations
            .range_mut(..=addr)
            .next_back()
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidArgument))?;
        let start = addr - base;
        if start + size > res.size || start % SIM_PAGE_SIZE != 0 {
            return fail(ZeResult::ErrorInvalidArgument);
        }
        let overlaps = res
            .mappings
            .iter()
            .any(|(s, m)| start < s + m.size && *s < start + size);
        if overlaps {
            return fail(ZeResult::ErrorInvalidArgument);
        }
        res.mappings.insert(start, Mapping { size, physical });
        res.access[start / SIM_PAGE_SIZE..(start + size) / SIM_PAGE_SIZE].fill(access);
        Ok(())
    }
    /// Removes the mapping at exactly `ptr`/`size`, returning the physical memory it used.
    pub fn unmap(&mut self, ptr: DevicePtr, size: usize) -> Result<u64, SimError> {
        let addr = ptr.addr();
        let (base, res) = self
            .reservations
            .range_mut(..=addr)
            .next_back()
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidArgument))?;
        let start = addr - base;
        match res.mappings.get(&start) {
            Some(m) if m.size == size => (),
            _ => return fail(ZeResult::ErrorInvalidArgument),
        }
        let mapping = res
            .mappings
            .remove(&start)
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidArgument))?;
        let pages = start / SIM_PAGE_SIZE..(start + size) / SIM_PAGE_SIZE;
        res.access[pages].fill(MemoryAccess::None);
        Ok(mapping.physical)
    }
    /// The pages of a reservation covered by `ptr`/`size`, which must be page aligned.
    fn access_pages(
        &mut self,
        context: u64,
        ptr: DevicePtr,
        size: usize,
    ) -> Result<&mut [MemoryAccess], SimError> {
        if size == 0 || size % SIM_PAGE_SIZE != 0 {
            return fail(ZeResult::ErrorUnsupportedSize);
        }
        let addr = ptr.addr();
        let (base, res) = self
            .reservations
            .range_mut(..=addr)
            .next_back()
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidArgument))?;
        let start = addr - base;
        if res.context != context || start >= res.size || start + size > res.size {
            return fail(ZeResult::ErrorInvalidArgument);
        }
        if start % SIM_PAGE_SIZE != 0 {
            return fail(ZeResult::ErrorUnsupportedAlignment);
        }
        let first = start / SIM_PAGE_SIZE;
        Ok(&mut res.access[first..first + size / SIM_PAGE_SIZE])
    }
    pub fn set_access(
        &mut self,
        context: u64,
        ptr: DevicePtr,
        size: usize,
        access: MemoryAccess,
    ) -> Result<(), SimError> {
        self.access_pages(context, ptr, size)?.fill(access);
        Ok(())
    }
    /// The attribute of the first page, and the byte length of the run of pages sharing it.
    pub fn get_access(
        &mut self,
        context: u64,
        ptr: DevicePtr,
        size: usize,
    ) -> Result<(MemoryAccess, usize), SimError> {
        let pages = self.access_pages(context, ptr, size)?;
        let first = pages[0];
        let run = pages.iter().take_while(|a| **a == first).count();
        Ok((first, run * SIM_PAGE_SIZE))
    }
}
impl Drop for MemoryRegistry {
    fn drop(&mut self) {
        if !self.allocations.is_empty() {
            log::warn!(
                "sim: {} allocations leaked at instance teardown",
                self.allocations.len()
            );
        }
        for (addr, alloc) in std::mem::take(&mut self.allocations) {
            unsafe { std::alloc::dealloc(addr as *mut u8, alloc.layout) };
        }
        for (addr, res) in std::mem::take(&mut self.reservations) {
            unsafe { std::alloc::dealloc(addr as *mut u8, res.layout) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_resolves_interior_pointers() {
        let mut reg = MemoryRegistry::new(1 << 20);
        let ptr = reg.allocate(1, MemoryType::Host, None, 100, 0).unwrap();
        let (base, alloc) = reg.find(ptr.offset(99)).unwrap();
        assert_eq!(base, ptr.addr());
        assert_eq!(alloc.size, 100);
        assert!(reg.find(ptr.offset(100 + MIN_ALIGNMENT * 1024)).is_none());
        unsafe { reg.free(1, ptr).unwrap() };
        assert_eq!(reg.live_allocations(), 0);
    }

    #[test]
    fn rejects_bad_sizes_and_alignments() {
        let mut reg = MemoryRegistry::new(1 << 20);
        assert_eq!(
            reg.allocate(1, MemoryType::Device, None, 0, 0).err(),
            Some(SimError::Raw(ZeResult::ErrorUnsupportedSize))
        );
        assert_eq!(
            reg.allocate(1, MemoryType::Device, None, 16, 3).err(),
            Some(SimError::Raw(ZeResult::ErrorUnsupportedAlignment))
        );
        assert_eq!(
            reg.allocate(1, MemoryType::Device, None, 2 << 20, 0).err(),
            Some(SimError::Raw(ZeResult::ErrorUnsupportedSize))
        );
    }

    #[test]
    fn overlapping_mappings_are_rejected() {
        let mut reg = MemoryRegistry::new(1 << 20);
        let ptr = reg.reserve(1, SIM_PAGE_SIZE * 4).unwrap();
        let rw = MemoryAccess::ReadWrite;
        reg.map(ptr, SIM_PAGE_SIZE * 2, 7, SIM_PAGE_SIZE * 2, 0, rw)
            .unwrap();
        assert!(
            reg.map(ptr.offset(SIM_PAGE_SIZE), SIM_PAGE_SIZE, 8, SIM_PAGE_SIZE, 0, rw)
                .is_err()
        );
        assert!(reg.is_mapped_virtual(ptr.offset(10)));
        assert!(!reg.is_mapped_virtual(ptr.offset(SIM_PAGE_SIZE * 3)));
        assert_eq!(reg.unmap(ptr, SIM_PAGE_SIZE * 2).unwrap(), 7);
        unsafe { reg.free_reservation(1, ptr, SIM_PAGE_SIZE * 4).unwrap() };
    }

    #[test]
    fn access_runs_follow_mappings() {
        let mut reg = MemoryRegistry::new(1 << 20);
        let ptr = reg.reserve(1, SIM_PAGE_SIZE * 4).unwrap();
        assert_eq!(
            reg.get_access(1, ptr, SIM_PAGE_SIZE * 4).unwrap(),
            (MemoryAccess::None, SIM_PAGE_SIZE * 4)
        );
        let middle = ptr.offset(SIM_PAGE_SIZE);
        reg.map(middle, SIM_PAGE_SIZE * 2, 3, SIM_PAGE_SIZE * 2, 0, MemoryAccess::ReadOnly)
            .unwrap();
        assert_eq!(
            reg.get_access(1, ptr, SIM_PAGE_SIZE * 4).unwrap(),
            (MemoryAccess::None, SIM_PAGE_SIZE)
        );
        assert_eq!(
            reg.get_access(1, middle, SIM_PAGE_SIZE * 3).unwrap(),
            (MemoryAccess::ReadOnly, SIM_PAGE_SIZE * 2)
        );
        reg.set_access(1, middle.offset(SIM_PAGE_SIZE), SIM_PAGE_SIZE, MemoryAccess::ReadWrite)
            .unwrap();
        assert_eq!(
            reg.get_access(1, middle, SIM_PAGE_SIZE * 3).unwrap(),
            (MemoryAccess::ReadOnly, SIM_PAGE_SIZE)
        );

        assert_eq!(
            reg.set_access(1, ptr.offset(1), SIM_PAGE_SIZE, MemoryAccess::None).err(),
            Some(SimError::Raw(ZeResult::ErrorUnsupportedAlignment))
        );
        assert_eq!(
            reg.set_access(2, ptr, SIM_PAGE_SIZE, MemoryAccess::None).err(),
            Some(SimError::Raw(ZeResult::ErrorInvalidArgument))
        );
        assert_eq!(
            reg.get_access(1, ptr, SIM_PAGE_SIZE * 5).err(),
            Some(SimError::Raw(ZeResult::ErrorInvalidArgument))
        );

        assert_eq!(reg.unmap(middle, SIM_PAGE_SIZE * 2).unwrap(), 3);
        assert_eq!(
            reg.get_access(1, ptr, SIM_PAGE_SIZE * 4).unwrap(),
            (MemoryAccess::None, SIM_PAGE_SIZE * 4)
        );
        unsafe { reg.free_reservation(1, ptr, SIM_PAGE_SIZE * 4).unwrap() };
    }
}
