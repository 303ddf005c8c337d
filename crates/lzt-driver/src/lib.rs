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

#[cfg(feature = "level-zero")]
pub mod level_zero;
pub mod sim;

#[cfg(test)]
mod tests;

#[cfg(feature = "level-zero")]
pub use level_zero::LevelZero;
pub use sim::Sim;

use std::ffi::c_void;

use types::*;

/// Bound shared by every handle type. Handles are plain values, copying one does not duplicate
/// the underlying driver object.
pub trait Handle:
    Copy + std::fmt::Debug + PartialEq + Eq + std::hash::Hash + Send + Sync + 'static
{
}
impl<T: Copy + std::fmt::Debug + PartialEq + Eq + std::hash::Hash + Send + Sync + 'static> Handle
    for T
{
}

/// Driver types should not have their own destructors for handles; every object is destroyed
/// through an explicit call on the instance, mirroring the underlying C API.
/// # Safety (general)
/// * All types are assumed to be safely send/sync
pub trait Driver: Sized + std::fmt::Debug + Clone + Send + Sync + 'static {
    type Instance: DriverInstance<Self>;
    type DriverHandle: Handle;
    type Device: Handle;
    type Context: Handle;
    type CommandQueue: Handle;
    type CommandList: Handle;
    type EventPool: Handle;
    type Event: Handle;
    type Fence: Handle;
    type Module: Handle;
    type Kernel: Handle;
    type Image: Handle;
    type Sampler: Handle;
    type PhysicalMem: Handle;

    type Error: Error<Self>;
}

/// A raw device-visible address, as returned by the allocation entry points. Host and shared
/// allocations may be dereferenced on the host; device allocations may not.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DevicePtr(pub *mut c_void);
// Addresses are plain integers to the driver.
unsafe impl Send for DevicePtr {}
unsafe impl Sync for DevicePtr {}
impl DevicePtr {
    pub const fn null() -> Self {
        Self(std::ptr::null_mut())
    }
    pub fn from_slice<T>(slice: &mut [T]) -> Self {
        Self(slice.as_mut_ptr() as *mut c_void)
    }
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
    pub fn addr(&self) -> usize {
        self.0 as usize
    }
    pub fn offset(&self, bytes: usize) -> Self {
        Self((self.0 as *mut u8).wrapping_add(bytes) as *mut c_void)
    }
    pub fn as_ptr(&self) -> *mut c_void {
        self.0
    }
    /// # Safety
    /// * The memory must be host accessible, at least `len` bytes long and not written
    ///   concurrently for the lifetime of the returned slice
    pub unsafe fn as_slice<'a>(&self, len: usize) -> &'a [u8] {
        unsafe { std::slice::from_raw_parts(self.0 as *const u8, len) }
    }
    /// # Safety
    /// * The memory must be host accessible, at least `len` bytes long and not accessed by
    ///   anything else for the lifetime of the returned slice
    pub unsafe fn as_mut_slice<'a>(&self, len: usize) -> &'a mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.0 as *mut u8, len) }
    }
}

/// Signal/wait events attached to an append call.
#[derive(Debug)]
pub struct AppendSync<'a, B: Driver> {
    pub signal: Option<B::Event>,
    pub wait: &'a [B::Event],
}
impl<B: Driver> Default for AppendSync<'_, B> {
    fn default() -> Self {
        Self {
            signal: None,
            wait: &[],
        }
    }
}
impl<B: Driver> Clone for AppendSync<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<B: Driver> Copy for AppendSync<'_, B> {}
impl<'a, B: Driver> AppendSync<'a, B> {
    pub fn signal(event: B::Event) -> Self {
        Self {
            signal: Some(event),
            wait: &[],
        }
    }
    pub fn new(signal: Option<B::Event>, wait: &'a [B::Event]) -> Self {
        Self { signal, wait }
    }
}

/// A single operation appended to a command list. `SignalEvent`, `WaitOnEvents` and `ResetEvent`
/// ignore the `AppendSync` passed alongside them, as the underlying API has no such parameters.
#[derive(Debug)]
pub enum ListCommand<'a, B: Driver> {
    /// # Safety
    /// * Both ranges must be valid for `size` bytes until execution completes
    MemoryCopy {
        dst: DevicePtr,
        src: DevicePtr,
        size: usize,
    },
    /// # Safety
    /// * The destination must be valid for `size` bytes until execution completes
    /// * The pattern length must be a power of two no larger than the queue group's fill limit
    MemoryFill {
        dst: DevicePtr,
        pattern: &'a [u8],
        size: usize,
    },
    /// Region `x`/`width` are in bytes, pitches are byte strides between rows and slices.
    /// # Safety
    /// * Both regions must lie within valid memory until execution completes
    MemoryCopyRegion {
        dst: DevicePtr,
        dst_region: CopyRegion,
        dst_pitch: u32,
        dst_slice_pitch: u32,
        src: DevicePtr,
        src_region: CopyRegion,
        src_pitch: u32,
        src_slice_pitch: u32,
    },
    Barrier,
    MemoryRangesBarrier {
        ranges: &'a [(DevicePtr, usize)],
    },
    /// # Safety
    /// * All kernel arguments must have been set, and any pointers they contain must be valid
    LaunchKernel {
        kernel: B::Kernel,
        group_count: GroupCount,
        cooperative: bool,
    },
    SignalEvent {
        event: B::Event,
    },
    WaitOnEvents {
        events: &'a [B::Event],
    },
    ResetEvent {
        event: B::Event,
    },
    /// # Safety
    /// * The destination must be valid for 8 bytes until execution completes
    WriteGlobalTimestamp {
        dst: DevicePtr,
    },
    MemoryPrefetch {
        ptr: DevicePtr,
        size: usize,
    },
    MemAdvise {
        device: B::Device,
        ptr: DevicePtr,
        size: usize,
        advice: MemoryAdvice,
    },
    ImageCopy {
        dst: B::Image,
        src: B::Image,
    },
    ImageCopyRegion {
        dst: B::Image,
        src: B::Image,
        dst_region: Option<ImageRegion>,
        src_region: Option<ImageRegion>,
    },
    /// # Safety
    /// * The destination must hold the whole (tightly packed) region until execution completes
    ImageCopyToMemory {
        dst: DevicePtr,
        src: B::Image,
        region: Option<ImageRegion>,
    },
    /// # Safety
    /// * The source must hold the whole (tightly packed) region until execution completes
    ImageCopyFromMemory {
        dst: B::Image,
        src: DevicePtr,
        region: Option<ImageRegion>,
    },
    /// Only valid on immediate lists. The given lists must be closed regular lists.
    ExecuteCommandLists {
        lists: &'a [B::CommandList],
    },
}

pub trait DriverInstance<B: Driver<Instance = Self>>: Send + Sync {
    /// Short backend name, used in logs.
    fn backend_name(&self) -> &'static str;

    fn drivers(&self) -> Result<Vec<B::DriverHandle>, B::Error>;
    fn driver_properties(&self, driver: B::DriverHandle) -> Result<DriverProperties, B::Error>;
    fn driver_api_version(&self, driver: B::DriverHandle) -> Result<ApiVersion, B::Error>;
    fn driver_extension_properties(
        &self,
        driver: B::DriverHandle,
    ) -> Result<Vec<ExtensionProperties>, B::Error>;

    fn devices(&self, driver: B::DriverHandle) -> Result<Vec<B::Device>, B::Error>;
    fn sub_devices(&self, device: B::Device) -> Result<Vec<B::Device>, B::Error>;
    fn device_properties(&self, device: B::Device) -> Result<DeviceProperties, B::Error>;
    fn command_queue_group_properties(
        &self,
        device: B::Device,
    ) -> Result<Vec<CommandQueueGroupProperties>, B::Error>;
    fn device_compute_properties(
        &self,
        device: B::Device,
    ) -> Result<DeviceComputeProperties, B::Error>;
    fn device_memory_properties(
        &self,
        device: B::Device,
    ) -> Result<Vec<DeviceMemoryProperties>, B::Error>;
    fn device_cache_properties(
        &self,
        device: B::Device,
    ) -> Result<Vec<DeviceCacheProperties>, B::Error>;
    fn device_can_access_peer(&self, device: B::Device, peer: B::Device)
    -> Result<bool, B::Error>;

    fn create_context(&self, driver: B::DriverHandle) -> Result<B::Context, B::Error>;
    /// # Safety
    /// * All objects created from the context must have been destroyed
    unsafe fn destroy_context(&self, context: B::Context) -> Result<(), B::Error>;

    /// # Safety
    /// * The returned memory must be freed with `mem_free` on the same context
    unsafe fn mem_alloc_host(
        &self,
        context: B::Context,
        desc: &HostMemAllocDesc,
        size: usize,
        alignment: usize,
    ) -> Result<DevicePtr, B::Error>;
    /// # Safety
    /// * The returned memory must be freed with `mem_free` on the same context
    unsafe fn mem_alloc_device(
        &self,
        context: B::Context,
        desc: &DeviceMemAllocDesc,
        size: usize,
        alignment: usize,
        device: B::Device,
    ) -> Result<DevicePtr, B::Error>;
    /// # Safety
    /// * The returned memory must be freed with `mem_free` on the same context
    unsafe fn mem_alloc_shared(
        &self,
        context: B::Context,
        device_desc: &DeviceMemAllocDesc,
        host_desc: &HostMemAllocDesc,
        size: usize,
        alignment: usize,
        device: Option<B::Device>,
    ) -> Result<DevicePtr, B::Error>;
    /// # Safety
    /// * No pending device work may reference the memory
    /// * The pointer must not be used afterwards
    unsafe fn mem_free(&self, context: B::Context, ptr: DevicePtr) -> Result<(), B::Error>;
    fn mem_alloc_properties(
        &self,
        context: B::Context,
        ptr: DevicePtr,
    ) -> Result<(MemoryAllocationProperties, Option<B::Device>), B::Error>;
    fn mem_get_ipc_handle(
        &self,
        context: B::Context,
        ptr: DevicePtr,
    ) -> Result<IpcMemHandle, B::Error>;
    /// # Safety
    /// * The handle must come from `mem_get_ipc_handle` on a live allocation
    unsafe fn mem_open_ipc_handle(
        &self,
        context: B::Context,
        device: B::Device,
        handle: IpcMemHandle,
    ) -> Result<DevicePtr, B::Error>;
    /// # Safety
    /// * The pointer must come from `mem_open_ipc_handle` and not be used afterwards
    unsafe fn mem_close_ipc_handle(
        &self,
        context: B::Context,
        ptr: DevicePtr,
    ) -> Result<(), B::Error>;

    fn virtual_mem_query_page_size(
        &self,
        context: B::Context,
        device: B::Device,
        size: usize,
    ) -> Result<usize, B::Error>;
    /// # Safety
    /// * `start` is only a hint and may be null
    unsafe fn virtual_mem_reserve(
        &self,
        context: B::Context,
        start: DevicePtr,
        size: usize,
    ) -> Result<DevicePtr, B::Error>;
    /// # Safety
    /// * All mappings in the range must have been unmapped
    unsafe fn virtual_mem_free(
        &self,
        context: B::Context,
        ptr: DevicePtr,
        size: usize,
    ) -> Result<(), B::Error>;
    fn physical_mem_create(
        &self,
        context: B::Context,
        device: B::Device,
        size: usize,
    ) -> Result<B::PhysicalMem, B::Error>;
    /// # Safety
    /// * The physical memory must not be mapped anywhere
    unsafe fn physical_mem_destroy(
        &self,
        context: B::Context,
        memory: B::PhysicalMem,
    ) -> Result<(), B::Error>;
    /// # Safety
    /// * The range must lie within a reservation and not be mapped already
    unsafe fn virtual_mem_map(
        &self,
        context: B::Context,
        ptr: DevicePtr,
        size: usize,
        memory: B::PhysicalMem,
        offset: usize,
        access: MemoryAccess,
    ) -> Result<(), B::Error>;
    /// # Safety
    /// * No pending device work may reference the range
    unsafe fn virtual_mem_unmap(
        &self,
        context: B::Context,
        ptr: DevicePtr,
        size: usize,
    ) -> Result<(), B::Error>;
    /// # Safety
    /// * No pending device work may access the range in a way the new attribute forbids
    unsafe fn virtual_mem_set_access(
        &self,
        context: B::Context,
        ptr: DevicePtr,
        size: usize,
        access: MemoryAccess,
    ) -> Result<(), B::Error>;
    /// Returns the attribute at `ptr` and how many bytes from `ptr`, at most `size`, share it.
    fn virtual_mem_get_access(
        &self,
        context: B::Context,
        ptr: DevicePtr,
        size: usize,
    ) -> Result<(MemoryAccess, usize), B::Error>;

    fn create_command_queue(
        &self,
        context: B::Context,
        device: B::Device,
        desc: &CommandQueueDesc,
    ) -> Result<B::CommandQueue, B::Error>;
    /// # Safety
    /// * All work submitted to the queue must have completed
    unsafe fn destroy_command_queue(&self, queue: B::CommandQueue) -> Result<(), B::Error>;
    /// # Safety
    /// * Every list must be closed, and all memory its commands reference must stay valid until
    ///   the submission completes
    unsafe fn execute_command_lists(
        &self,
        queue: B::CommandQueue,
        lists: &[B::CommandList],
        fence: Option<B::Fence>,
    ) -> Result<(), B::Error>;
    fn synchronize_command_queue(
        &self,
        queue: B::CommandQueue,
        timeout: u64,
    ) -> Result<SyncStatus, B::Error>;

    fn create_command_list(
        &self,
        context: B::Context,
        device: B::Device,
        desc: &CommandListDesc,
    ) -> Result<B::CommandList, B::Error>;
    fn create_immediate_command_list(
        &self,
        context: B::Context,
        device: B::Device,
        desc: &CommandQueueDesc,
    ) -> Result<B::CommandList, B::Error>;
    fn close_command_list(&self, list: B::CommandList) -> Result<(), B::Error>;
    /// # Safety
    /// * The list must not be pending execution
    unsafe fn reset_command_list(&self, list: B::CommandList) -> Result<(), B::Error>;
    /// # Safety
    /// * The list must not be pending execution
    unsafe fn destroy_command_list(&self, list: B::CommandList) -> Result<(), B::Error>;
    /// # Safety
    /// * The command must follow the corresponding safety section in `ListCommand`
    unsafe fn append(
        &self,
        list: B::CommandList,
        command: ListCommand<'_, B>,
        sync: AppendSync<'_, B>,
    ) -> Result<(), B::Error>;
    fn synchronize_command_list_host(
        &self,
        list: B::CommandList,
        timeout: u64,
    ) -> Result<SyncStatus, B::Error>;

    fn create_event_pool(
        &self,
        context: B::Context,
        desc: &EventPoolDesc,
        devices: &[B::Device],
    ) -> Result<B::EventPool, B::Error>;
    /// # Safety
    /// * All events created from the pool must have been destroyed
    unsafe fn destroy_event_pool(&self, pool: B::EventPool) -> Result<(), B::Error>;
    fn create_event(&self, pool: B::EventPool, desc: &EventDesc) -> Result<B::Event, B::Error>;
    /// # Safety
    /// * No pending device work may reference the event
    unsafe fn destroy_event(&self, event: B::Event) -> Result<(), B::Error>;
    fn event_host_signal(&self, event: B::Event) -> Result<(), B::Error>;
    fn event_host_synchronize(&self, event: B::Event, timeout: u64)
    -> Result<SyncStatus, B::Error>;
    fn event_query_status(&self, event: B::Event) -> Result<SyncStatus, B::Error>;
    fn event_host_reset(&self, event: B::Event) -> Result<(), B::Error>;
    /// The pool must have been created with `EventPoolFlags::IPC`.
    fn event_pool_get_ipc_handle(&self, pool: B::EventPool)
    -> Result<IpcEventPoolHandle, B::Error>;
    /// Events created from the returned pool share their state with the events at the same
    /// index in the exported pool.
    /// # Safety
    /// * The handle must come from `event_pool_get_ipc_handle` on a live pool
    unsafe fn event_pool_open_ipc_handle(
        &self,
        context: B::Context,
        handle: IpcEventPoolHandle,
    ) -> Result<B::EventPool, B::Error>;
    /// # Safety
    /// * The pool must come from `event_pool_open_ipc_handle` and its events must have been
    ///   destroyed
    unsafe fn event_pool_close_ipc_handle(&self, pool: B::EventPool) -> Result<(), B::Error>;

    fn create_fence(&self, queue: B::CommandQueue, desc: &FenceDesc)
    -> Result<B::Fence, B::Error>;
    /// # Safety
    /// * No pending submission may signal the fence
    unsafe fn destroy_fence(&self, fence: B::Fence) -> Result<(), B::Error>;
    fn fence_host_synchronize(&self, fence: B::Fence, timeout: u64)
    -> Result<SyncStatus, B::Error>;
    fn fence_query_status(&self, fence: B::Fence) -> Result<SyncStatus, B::Error>;
    fn fence_reset(&self, fence: B::Fence) -> Result<(), B::Error>;

    fn create_module(
        &self,
        context: B::Context,
        device: B::Device,
        desc: &ModuleDesc<'_>,
    ) -> Result<B::Module, B::Error>;
    /// # Safety
    /// * All kernels created from the module must have been destroyed
    unsafe fn destroy_module(&self, module: B::Module) -> Result<(), B::Error>;
    fn create_kernel(&self, module: B::Module, name: &str) -> Result<B::Kernel, B::Error>;
    /// # Safety
    /// * No pending device work may reference the kernel
    unsafe fn destroy_kernel(&self, kernel: B::Kernel) -> Result<(), B::Error>;
    fn kernel_set_group_size(&self, kernel: B::Kernel, size: [u32; 3]) -> Result<(), B::Error>;
    fn kernel_suggest_group_size(
        &self,
        kernel: B::Kernel,
        global_size: [u32; 3],
    ) -> Result<[u32; 3], B::Error>;
    /// # Safety
    /// * If the argument is a pointer, it must stay valid for every launch that uses it
    unsafe fn kernel_set_argument_value(
        &self,
        kernel: B::Kernel,
        index: u32,
        value: &[u8],
    ) -> Result<(), B::Error>;

    fn create_image(
        &self,
        context: B::Context,
        device: B::Device,
        desc: &ImageDesc,
    ) -> Result<B::Image, B::Error>;
    /// # Safety
    /// * No pending device work may reference the image
    unsafe fn destroy_image(&self, image: B::Image) -> Result<(), B::Error>;

    fn create_sampler(
        &self,
        context: B::Context,
        device: B::Device,
        desc: &SamplerDesc,
    ) -> Result<B::Sampler, B::Error>;
    /// # Safety
    /// * No pending device work may reference the sampler
    unsafe fn destroy_sampler(&self, sampler: B::Sampler) -> Result<(), B::Error>;
}

#[must_use]
pub trait Error<B: Driver<Error = Self>>: std::error::Error + Send + Sync + 'static {
    /// The driver result code behind this error. Errors that did not come from a driver call
    /// report `ErrorUninitialized` or `ErrorUnknown`.
    fn result(&self) -> ZeResult;
    fn is_unsupported_feature(&self) -> bool {
        self.result() == ZeResult::ErrorUnsupportedFeature
    }
    fn is_not_ready(&self) -> bool {
        self.result() == ZeResult::NotReady
    }
    fn is_device_lost(&self) -> bool {
        self.result() == ZeResult::ErrorDeviceLost
    }
    fn is_out_of_device_memory(&self) -> bool {
        self.result() == ZeResult::ErrorOutOfDeviceMemory
    }
    fn is_out_of_host_memory(&self) -> bool {
        self.result() == ZeResult::ErrorOutOfHostMemory
    }
}
