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
mod ffi;

use std::{
    ffi::{CString, c_void},
    ptr::{null, null_mut},
};

use ffi::*;
use libloading::Library;
use scopeguard::defer;
use thiserror::Error;
use types::*;

use crate::{AppendSync, DevicePtr, Driver, DriverInstance, ListCommand};

#[derive(Clone, Copy, Debug)]
pub struct LevelZero;
impl Driver for LevelZero {
    type Instance = LevelZeroInstance;
    type DriverHandle = ZeDriver;
    type Device = ZeDevice;
    type Context = ZeContext;
    type CommandQueue = ZeCommandQueue;
    type CommandList = ZeCommandList;
    type EventPool = ZeEventPool;
    type Event = ZeEvent;
    type Fence = ZeFence;
    type Module = ZeModule;
    type Kernel = ZeKernel;
    type Image = ZeImage;
    type Sampler = ZeSampler;
    type PhysicalMem = ZePhysicalMem;

    type Error = LevelZeroError;
}
impl LevelZero {
    /// Loads the system Level Zero loader and initializes it. Fails with a result of
    /// `ERROR_UNINITIALIZED` when no loader or no driver is present.
    #[tracing::instrument]
    pub fn create_instance() -> Result<LevelZeroInstance, LevelZeroError> {
        let mut last_err = None;
        for name in LOADER_NAMES {
            match unsafe { Library::new(name) } {
                Ok(lib) => {
                    let api = unsafe { ZeApi::load(lib)? };
                    check(unsafe { (api.zeInit)(0) })?;
                    let instance = LevelZeroInstance { api };
                    if instance.drivers()?.is_empty() {
                        return Err(LevelZeroError::Raw(ZeResult::ErrorUninitialized));
                    }
                    log::info!("Loaded Level Zero loader {name}");
                    return Ok(instance);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(match last_err {
            Some(e) => LevelZeroError::Load(e),
            None => LevelZeroError::Raw(ZeResult::ErrorUninitialized),
        })
    }
}

macro_rules! ze_handles {
    ($($name:ident),* $(,)?) => {
        $(
            #[repr(transparent)]
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
            pub struct $name(RawHandle);
            unsafe impl Send for $name {}
            unsafe impl Sync for $name {}
        )*
    };
}
ze_handles!(
    ZeDriver,
    ZeDevice,
    ZeContext,
    ZeCommandQueue,
    ZeCommandList,
    ZeEventPool,
    ZeEvent,
    ZeFence,
    ZeModule,
    ZeKernel,
    ZeImage,
    ZeSampler,
    ZePhysicalMem,
);

#[derive(Error, Debug)]
pub enum LevelZeroError {
    #[error("Level Zero call failed: {0}")]
    Raw(ZeResult),
    #[error("{0}")]
    Load(#[from] libloading::Error),
    #[error("Level Zero loader is missing {0}")]
    MissingSymbol(String),
    #[error("Module build failed: {0}")]
    ModuleBuild(String),
}
impl crate::Error<LevelZero> for LevelZeroError {
    fn result(&self) -> ZeResult {
        match self {
            Self::Raw(r) => *r,
            Self::Load(_) | Self::MissingSymbol(_) => ZeResult::ErrorUninitialized,
            Self::ModuleBuild(_) => ZeResult::ErrorModuleBuildFailure,
        }
    }
}

fn check(raw: ZeResultRaw) -> Result<(), LevelZeroError> {
    match ZeResult::from_raw(raw) {
        ZeResult::Success => Ok(()),
        other => Err(LevelZeroError::Raw(other)),
    }
}

fn check_sync(raw: ZeResultRaw) -> Result<SyncStatus, LevelZeroError> {
    match ZeResult::from_raw(raw) {
        ZeResult::Success => Ok(SyncStatus::Ready),
        ZeResult::NotReady => Ok(SyncStatus::NotReady),
        other => Err(LevelZeroError::Raw(other)),
    }
}

/// Runs the two-call count/fill enumeration pattern.
fn enumerate<T: Clone>(
    zero: T,
    mut f: impl FnMut(*mut u32, *mut T) -> ZeResultRaw,
) -> Result<Vec<T>, LevelZeroError> {
    let mut count = 0u32;
    check(f(&mut count, null_mut()))?;
    let mut out = vec![zero; count as usize];
    check(f(&mut count, out.as_mut_ptr()))?;
    out.truncate(count as usize);
    Ok(out)
}

fn queue_desc(desc: &CommandQueueDesc) -> ze_command_queue_desc_t {
    ze_command_queue_desc_t {
        stype: ZE_STRUCTURE_TYPE_COMMAND_QUEUE_DESC,
        pNext: null(),
        ordinal: desc.ordinal,
        index: desc.index,
        flags: desc.flags.bits(),
        mode: desc.mode.as_raw(),
        priority: desc.priority.as_raw(),
    }
}

fn image_format(texel_size: u32) -> Result<ze_image_format_t, LevelZeroError> {
    let layout = match texel_size {
        1 => ZE_IMAGE_FORMAT_LAYOUT_8,
        2 => ZE_IMAGE_FORMAT_LAYOUT_16,
        4 => ZE_IMAGE_FORMAT_LAYOUT_32,
        8 => ZE_IMAGE_FORMAT_LAYOUT_16_16_16_16,
        16 => ZE_IMAGE_FORMAT_LAYOUT_32_32_32_32,
        _ => return Err(LevelZeroError::Raw(ZeResult::ErrorUnsupportedImageFormat)),
    };
    Ok(ze_image_format_t {
        layout,
        type_: ZE_IMAGE_FORMAT_TYPE_UINT,
        x: ZE_IMAGE_FORMAT_SWIZZLE_R,
        y: ZE_IMAGE_FORMAT_SWIZZLE_G,
        z: ZE_IMAGE_FORMAT_SWIZZLE_B,
        w: ZE_IMAGE_FORMAT_SWIZZLE_A,
    })
}

fn region_ptr<T>(region: &Option<T>) -> *const c_void {
    match region {
        Some(r) => r as *const T as *const c_void,
        None => null(),
    }
}

pub struct LevelZeroInstance {
    api: ZeApi,
}
impl std::fmt::Debug for LevelZeroInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelZeroInstance").finish_non_exhaustive()
    }
}
// The loader is thread safe and function pointers are immutable after loading
unsafe impl Send for LevelZeroInstance {}
unsafe impl Sync for LevelZeroInstance {}

impl DriverInstance<LevelZero> for LevelZeroInstance {
    fn backend_name(&self) -> &'static str {
        "level-zero"
    }

    fn drivers(&self) -> Result<Vec<ZeDriver>, LevelZeroError> {
        let raw = enumerate(null_mut(), |count, out| unsafe {
            (self.api.zeDriverGet)(count, out)
        })?;
        Ok(raw.into_iter().map(ZeDriver).collect())
    }
    fn driver_properties(&self, driver: ZeDriver) -> Result<DriverProperties, LevelZeroError> {
        let mut props: ze_driver_properties_t = bytemuck::Zeroable::zeroed();
        props.stype = ZE_STRUCTURE_TYPE_DRIVER_PROPERTIES;
        check(unsafe { (self.api.zeDriverGetProperties)(driver.0, &mut props) })?;
        Ok(DriverProperties {
            uuid: props.uuid,
            driver_version: props.driverVersion,
        })
    }
    fn driver_api_version(&self, driver: ZeDriver) -> Result<ApiVersion, LevelZeroError> {
        let mut raw = 0u32;
        check(unsafe { (self.api.zeDriverGetApiVersion)(driver.0, &mut raw) })?;
        Ok(ApiVersion::from_raw(raw))
    }
    fn driver_extension_properties(
        &self,
        driver: ZeDriver,
    ) -> Result<Vec<ExtensionProperties>, LevelZeroError> {
        let raw = enumerate(bytemuck::Zeroable::zeroed(), |count, out| unsafe {
            (self.api.zeDriverGetExtensionProperties)(driver.0, count, out)
        })?;
        Ok(raw
            .iter()
            .map(|e: &ze_driver_extension_properties_t| ExtensionProperties {
                name: fixed_str(&e.name),
                version: e.version,
            })
            .collect())
    }

    fn devices(&self, driver: ZeDriver) -> Result<Vec<ZeDevice>, LevelZeroError> {
        let raw = enumerate(null_mut(), |count, out| unsafe {
            (self.api.zeDeviceGet)(driver.0, count, out)
        })?;
        Ok(raw.into_iter().map(ZeDevice).collect())
    }
    fn sub_devices(&self, device: ZeDevice) -> Result<Vec<ZeDevice>, LevelZeroError> {
        let raw = enumerate(null_mut(), |count, out| unsafe {
            (self.api.zeDeviceGetSubDevices)(device.0, count, out)
        })?;
        Ok(raw.into_iter().map(ZeDevice).collect())
    }
    fn device_properties(&self, device: ZeDevice) -> Result<DeviceProperties, LevelZeroError> {
        let mut props: ze_device_properties_t = bytemuck::Zeroable::zeroed();
        props.stype = ZE_STRUCTURE_TYPE_DEVICE_PROPERTIES;
        check(unsafe { (self.api.zeDeviceGetProperties)(device.0, &mut props) })?;
        Ok(DeviceProperties {
            ty: DeviceType::from_raw(props.type_),
            vendor_id: props.vendorId,
            device_id: props.deviceId,
            is_subdevice: props.flags & ZE_DEVICE_PROPERTY_FLAG_SUBDEVICE != 0,
            subdevice_id: props.subdeviceId,
            max_mem_alloc_size: props.maxMemAllocSize,
            max_hardware_contexts: props.maxHardwareContexts,
            max_command_queue_priority: props.maxCommandQueuePriority,
            timer_resolution: props.timerResolution,
            timestamp_valid_bits: props.timestampValidBits,
            uuid: props.uuid,
            name: fixed_str(&props.name),
        })
    }
    fn command_queue_group_properties(
        &self,
        device: ZeDevice,
    ) -> Result<Vec<CommandQueueGroupProperties>, LevelZeroError> {
        let mut zero: ze_command_queue_group_properties_t = bytemuck::Zeroable::zeroed();
        zero.stype = ZE_STRUCTURE_TYPE_COMMAND_QUEUE_GROUP_PROPERTIES;
        let raw = enumerate(zero, |count, out| unsafe {
            (self.api.zeDeviceGetCommandQueueGroupProperties)(device.0, count, out)
        })?;
        Ok(raw
            .iter()
            .map(|g| CommandQueueGroupProperties {
                flags: CommandQueueGroupFlags::from_bits_truncate(g.flags),
                max_memory_fill_pattern_size: g.maxMemoryFillPatternSize,
                num_queues: g.numQueues,
            })
            .collect())
    }

    fn device_compute_properties(
        &self,
        device: ZeDevice,
    ) -> Result<DeviceComputeProperties, LevelZeroError> {
        let mut props: ze_device_compute_properties_t = bytemuck::Zeroable::zeroed();
        props.stype = ZE_STRUCTURE_TYPE_DEVICE_COMPUTE_PROPERTIES;
        check(unsafe { (self.api.zeDeviceGetComputeProperties)(device.0, &mut props) })?;
        let sub_groups = (props.numSubGroupSizes as usize).min(ZE_SUBGROUPSIZE_COUNT);
        Ok(DeviceComputeProperties {
            max_total_group_size: props.maxTotalGroupSize,
            max_group_size: [props.maxGroupSizeX, props.maxGroupSizeY, props.maxGroupSizeZ],
            max_group_count: [props.maxGroupCountX, props.maxGroupCountY, props.maxGroupCountZ],
            max_shared_local_memory: props.maxSharedLocalMemory,
            sub_group_sizes: props.subGroupSizes[..sub_groups].to_vec(),
        })
    }
    fn device_memory_properties(
        &self,
        device: ZeDevice,
    ) -> Result<Vec<DeviceMemoryProperties>, LevelZeroError> {
        let mut zero: ze_device_memory_properties_t = bytemuck::Zeroable::zeroed();
        zero.stype = ZE_STRUCTURE_TYPE_DEVICE_MEMORY_PROPERTIES;
        let raw = enumerate(zero, |count, out| unsafe {
            (self.api.zeDeviceGetMemoryProperties)(device.0, count, out)
        })?;
        Ok(raw
            .iter()
            .map(|m| DeviceMemoryProperties {
                max_clock_rate: m.maxClockRate,
                max_bus_width: m.maxBusWidth,
                total_size: m.totalSize,
                name: fixed_str(&m.name),
            })
            .collect())
    }
    fn device_cache_properties(
        &self,
        device: ZeDevice,
    ) -> Result<Vec<DeviceCacheProperties>, LevelZeroError> {
        let mut zero: ze_device_cache_properties_t = bytemuck::Zeroable::zeroed();
        zero.stype = ZE_STRUCTURE_TYPE_DEVICE_CACHE_PROPERTIES;
        let raw = enumerate(zero, |count, out| unsafe {
            (self.api.zeDeviceGetCacheProperties)(device.0, count, out)
        })?;
        Ok(raw
            .iter()
            .map(|c| DeviceCacheProperties {
                user_control: c.flags & ZE_DEVICE_CACHE_PROPERTY_FLAG_USER_CONTROL != 0,
                cache_size: c.cacheSize,
            })
            .collect())
    }
    fn device_can_access_peer(
        &self,
        device: ZeDevice,
        peer: ZeDevice,
    ) -> Result<bool, LevelZeroError> {
        let mut value = 0u8;
        check(unsafe { (self.api.zeDeviceCanAccessPeer)(device.0, peer.0, &mut value) })?;
        Ok(value != 0)
    }

    fn create_context(&self, driver: ZeDriver) -> Result<ZeContext, LevelZeroError> {
        let desc = ze_context_desc_t {
            stype: ZE_STRUCTURE_TYPE_CONTEXT_DESC,
            pNext: null(),
            flags: 0,
        };
        let mut out = null_mut();
        check(unsafe { (self.api.zeContextCreate)(driver.0, &desc, &mut out) })?;
        Ok(ZeContext(out))
    }
    unsafe fn destroy_context(&self, context: ZeContext) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeContextDestroy)(context.0) })
    }

    unsafe fn mem_alloc_host(
        &self,
        context: ZeContext,
        desc: &HostMemAllocDesc,
        size: usize,
        alignment: usize,
    ) -> Result<DevicePtr, LevelZeroError> {
        let desc = ze_host_mem_alloc_desc_t {
            stype: ZE_STRUCTURE_TYPE_HOST_MEM_ALLOC_DESC,
            pNext: null(),
            flags: desc.flags.bits(),
        };
        let mut out = null_mut();
        check(unsafe { (self.api.zeMemAllocHost)(context.0, &desc, size, alignment, &mut out) })?;
        Ok(DevicePtr(out))
    }
    unsafe fn mem_alloc_device(
        &self,
        context: ZeContext,
        desc: &DeviceMemAllocDesc,
        size: usize,
        alignment: usize,
        device: ZeDevice,
    ) -> Result<DevicePtr, LevelZeroError> {
        let desc = ze_device_mem_alloc_desc_t {
            stype: ZE_STRUCTURE_TYPE_DEVICE_MEM_ALLOC_DESC,
            pNext: null(),
            flags: desc.flags.bits(),
            ordinal: desc.ordinal,
        };
        let mut out = null_mut();
        check(unsafe {
            (self.api.zeMemAllocDevice)(context.0, &desc, size, alignment, device.0, &mut out)
        })?;
        Ok(DevicePtr(out))
    }
    unsafe fn mem_alloc_shared(
        &self,
        context: ZeContext,
        device_desc: &DeviceMemAllocDesc,
        host_desc: &HostMemAllocDesc,
        size: usize,
        alignment: usize,
        device: Option<ZeDevice>,
    ) -> Result<DevicePtr, LevelZeroError> {
        let device_desc = ze_device_mem_alloc_desc_t {
            stype: ZE_STRUCTURE_TYPE_DEVICE_MEM_ALLOC_DESC,
            pNext: null(),
            flags: device_desc.flags.bits(),
            ordinal: device_desc.ordinal,
        };
        let host_desc = ze_host_mem_alloc_desc_t {
            stype: ZE_STRUCTURE_TYPE_HOST_MEM_ALLOC_DESC,
            pNext: null(),
            flags: host_desc.flags.bits(),
        };
        let mut out = null_mut();
        check(unsafe {
            (self.api.zeMemAllocShared)(
                context.0,
                &device_desc,
                &host_desc,
                size,
                alignment,
                device.map_or(null_mut(), |d| d.0),
                &mut out,
            )
        })?;
        Ok(DevicePtr(out))
    }
    unsafe fn mem_free(&self, context: ZeContext, ptr: DevicePtr) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeMemFree)(context.0, ptr.0) })
    }
    fn mem_alloc_properties(
        &self,
        context: ZeContext,
        ptr: DevicePtr,
    ) -> Result<(MemoryAllocationProperties, Option<ZeDevice>), LevelZeroError> {
        let mut props: ze_memory_allocation_properties_t = bytemuck::Zeroable::zeroed();
        props.stype = ZE_STRUCTURE_TYPE_MEMORY_ALLOCATION_PROPERTIES;
        let mut device = null_mut();
        check(unsafe {
            (self.api.zeMemGetAllocProperties)(context.0, ptr.0, &mut props, &mut device)
        })?;
        Ok((
            MemoryAllocationProperties {
                ty: MemoryType::from_raw(props.type_),
                id: props.id,
                page_size: props.pageSize,
            },
            (!device.is_null()).then_some(ZeDevice(device)),
        ))
    }
    fn mem_get_ipc_handle(
        &self,
        context: ZeContext,
        ptr: DevicePtr,
    ) -> Result<IpcMemHandle, LevelZeroError> {
        let mut handle = ze_ipc_mem_handle_t { data: [0; 64] };
        check(unsafe { (self.api.zeMemGetIpcHandle)(context.0, ptr.0, &mut handle) })?;
        Ok(IpcMemHandle(handle.data))
    }
    unsafe fn mem_open_ipc_handle(
        &self,
        context: ZeContext,
        device: ZeDevice,
        handle: IpcMemHandle,
    ) -> Result<DevicePtr, LevelZeroError> {
        let mut out = null_mut();
        check(unsafe {
            (self.api.zeMemOpenIpcHandle)(
                context.0,
                device.0,
                ze_ipc_mem_handle_t { data: handle.0 },
                0,
                &mut out,
            )
        })?;
        Ok(DevicePtr(out))
    }
    unsafe fn mem_close_ipc_handle(
        &self,
        context: ZeContext,
        ptr: DevicePtr,
    ) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeMemCloseIpcHandle)(context.0, ptr.0) })
    }

    fn virtual_mem_query_page_size(
        &self,
        context: ZeContext,
        device: ZeDevice,
        size: usize,
    ) -> Result<usize, LevelZeroError> {
        let mut page = 0usize;
        check(unsafe {
            (self.api.zeVirtualMemQueryPageSize)(context.0, device.0, size, &mut page)
        })?;
        Ok(page)
    }
    unsafe fn virtual_mem_reserve(
        &self,
        context: ZeContext,
        start: DevicePtr,
        size: usize,
    ) -> Result<DevicePtr, LevelZeroError> {
        let mut out = null_mut();
        check(unsafe { (self.api.zeVirtualMemReserve)(context.0, start.0, size, &mut out) })?;
        Ok(DevicePtr(out))
    }
    unsafe fn virtual_mem_free(
        &self,
        context: ZeContext,
        ptr: DevicePtr,
        size: usize,
    ) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeVirtualMemFree)(context.0, ptr.0, size) })
    }
    fn physical_mem_create(
        &self,
        context: ZeContext,
        device: ZeDevice,
        size: usize,
    ) -> Result<ZePhysicalMem, LevelZeroError> {
        let desc = ze_physical_mem_desc_t {
            stype: ZE_STRUCTURE_TYPE_PHYSICAL_MEM_DESC,
            pNext: null(),
            flags: 0,
            size,
        };
        let mut out = null_mut();
        check(unsafe { (self.api.zePhysicalMemCreate)(context.0, device.0, &desc, &mut out) })?;
        Ok(ZePhysicalMem(out))
    }
    unsafe fn physical_mem_destroy(
        &self,
        context: ZeContext,
        memory: ZePhysicalMem,
    ) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zePhysicalMemDestroy)(context.0, memory.0) })
    }
    unsafe fn virtual_mem_map(
        &self,
        context: ZeContext,
        ptr: DevicePtr,
        size: usize,
        memory: ZePhysicalMem,
        offset: usize,
        access: MemoryAccess,
    ) -> Result<(), LevelZeroError> {
        check(unsafe {
            (self.api.zeVirtualMemMap)(context.0, ptr.0, size, memory.0, offset, access.as_raw())
        })
    }
    unsafe fn virtual_mem_unmap(
        &self,
        context: ZeContext,
        ptr: DevicePtr,
        size: usize,
    ) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeVirtualMemUnmap)(context.0, ptr.0, size) })
    }
    unsafe fn virtual_mem_set_access(
        &self,
        context: ZeContext,
        ptr: DevicePtr,
        size: usize,
        access: MemoryAccess,
    ) -> Result<(), LevelZeroError> {
        check(unsafe {
            (self.api.zeVirtualMemSetAccessAttribute)(context.0, ptr.0, size, access.as_raw())
        })
    }
    fn virtual_mem_get_access(
        &self,
        context: ZeContext,
        ptr: DevicePtr,
        size: usize,
    ) -> Result<(MemoryAccess, usize), LevelZeroError> {
        let mut access = 0u32;
        let mut out_size = 0usize;
        check(unsafe {
            (self.api.zeVirtualMemGetAccessAttribute)(
                context.0,
                ptr.0,
                size,
                &mut access,
                &mut out_size,
            )
        })?;
        Ok((MemoryAccess::from_raw(access), out_size))
    }

    fn create_command_queue(
        &self,
        context: ZeContext,
        device: ZeDevice,
        desc: &CommandQueueDesc,
    ) -> Result<ZeCommandQueue, LevelZeroError> {
        let desc = queue_desc(desc);
        let mut out = null_mut();
        check(unsafe { (self.api.zeCommandQueueCreate)(context.0, device.0, &desc, &mut out) })?;
        Ok(ZeCommandQueue(out))
    }
    unsafe fn destroy_command_queue(&self, queue: ZeCommandQueue) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeCommandQueueDestroy)(queue.0) })
    }
    unsafe fn execute_command_lists(
        &self,
        queue: ZeCommandQueue,
        lists: &[ZeCommandList],
        fence: Option<ZeFence>,
    ) -> Result<(), LevelZeroError> {
        check(unsafe {
            (self.api.zeCommandQueueExecuteCommandLists)(
                queue.0,
                lists.len() as u32,
                lists.as_ptr() as *mut RawHandle,
                fence.map_or(null_mut(), |f| f.0),
            )
        })
    }
    fn synchronize_command_queue(
        &self,
        queue: ZeCommandQueue,
        timeout: u64,
    ) -> Result<SyncStatus, LevelZeroError> {
        check_sync(unsafe { (self.api.zeCommandQueueSynchronize)(queue.0, timeout) })
    }

    fn create_command_list(
        &self,
        context: ZeContext,
        device: ZeDevice,
        desc: &CommandListDesc,
    ) -> Result<ZeCommandList, LevelZeroError> {
        let desc = ze_command_list_desc_t {
            stype: ZE_STRUCTURE_TYPE_COMMAND_LIST_DESC,
            pNext: null(),
            commandQueueGroupOrdinal: desc.command_queue_group_ordinal,
            flags: desc.flags.bits(),
        };
        let mut out = null_mut();
        check(unsafe { (self.api.zeCommandListCreate)(context.0, device.0, &desc, &mut out) })?;
        Ok(ZeCommandList(out))
    }
    fn create_immediate_command_list(
        &self,
        context: ZeContext,
        device: ZeDevice,
        desc: &CommandQueueDesc,
    ) -> Result<ZeCommandList, LevelZeroError> {
        let desc = queue_desc(desc);
        let mut out = null_mut();
        check(unsafe {
            (self.api.zeCommandListCreateImmediate)(context.0, device.0, &desc, &mut out)
        })?;
        Ok(ZeCommandList(out))
    }
    fn close_command_list(&self, list: ZeCommandList) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeCommandListClose)(list.0) })
    }
    unsafe fn reset_command_list(&self, list: ZeCommandList) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeCommandListReset)(list.0) })
    }
    unsafe fn destroy_command_list(&self, list: ZeCommandList) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeCommandListDestroy)(list.0) })
    }
    unsafe fn append(
        &self,
        list: ZeCommandList,
        command: ListCommand<'_, LevelZero>,
        sync: AppendSync<'_, LevelZero>,
    ) -> Result<(), LevelZeroError> {
        let l = list.0;
        let signal = sync.signal.map_or(null_mut(), |e| e.0);
        let num_wait = sync.wait.len() as u32;
        let wait = sync.wait.as_ptr() as *mut RawHandle;
        let api = &self.api;
        let raw = unsafe {
            match command {
                ListCommand::MemoryCopy { dst, src, size } => {
                    (api.zeCommandListAppendMemoryCopy)(l, dst.0, src.0, size, signal, num_wait, wait)
                }
                ListCommand::MemoryFill { dst, pattern, size } => (api.zeCommandListAppendMemoryFill)(
                    l,
                    dst.0,
                    pattern.as_ptr() as *const c_void,
                    pattern.len(),
                    size,
                    signal,
                    num_wait,
                    wait,
                ),
                ListCommand::MemoryCopyRegion {
                    dst,
                    dst_region,
                    dst_pitch,
                    dst_slice_pitch,
                    src,
                    src_region,
                    src_pitch,
                    src_slice_pitch,
                } => (api.zeCommandListAppendMemoryCopyRegion)(
                    l,
                    dst.0,
                    &dst_region as *const CopyRegion as *const c_void,
                    dst_pitch,
                    dst_slice_pitch,
                    src.0,
                    &src_region as *const CopyRegion as *const c_void,
                    src_pitch,
                    src_slice_pitch,
                    signal,
                    num_wait,
                    wait,
                ),
                ListCommand::Barrier => (api.zeCommandListAppendBarrier)(l, signal, num_wait, wait),
                ListCommand::MemoryRangesBarrier { ranges } => {
                    let sizes: Vec<usize> = ranges.iter().map(|r| r.1).collect();
                    let ptrs: Vec<*const c_void> =
                        ranges.iter().map(|r| r.0.0 as *const c_void).collect();
                    (api.zeCommandListAppendMemoryRangesBarrier)(
                        l,
                        ranges.len() as u32,
                        sizes.as_ptr(),
                        ptrs.as_ptr(),
                        signal,
                        num_wait,
                        wait,
                    )
                }
                ListCommand::LaunchKernel {
                    kernel,
                    group_count,
                    cooperative,
                } => {
                    let f = if cooperative {
                        api.zeCommandListAppendLaunchCooperativeKernel
                    } else {
                        api.zeCommandListAppendLaunchKernel
                    };
                    f(
                        l,
                        kernel.0,
                        &group_count as *const GroupCount as *const c_void,
                        signal,
                        num_wait,
                        wait,
                    )
                }
                ListCommand::SignalEvent { event } => {
                    (api.zeCommandListAppendSignalEvent)(l, event.0)
                }
                ListCommand::WaitOnEvents { events } => (api.zeCommandListAppendWaitOnEvents)(
                    l,
                    events.len() as u32,
                    events.as_ptr() as *mut RawHandle,
                ),
                ListCommand::ResetEvent { event } => (api.zeCommandListAppendEventReset)(l, event.0),
                ListCommand::WriteGlobalTimestamp { dst } => {
                    (api.zeCommandListAppendWriteGlobalTimestamp)(
                        l,
                        dst.0 as *mut u64,
                        signal,
                        num_wait,
                        wait,
                    )
                }
                ListCommand::MemoryPrefetch { ptr, size } => {
                    (api.zeCommandListAppendMemoryPrefetch)(l, ptr.0, size)
                }
                ListCommand::MemAdvise {
                    device,
                    ptr,
                    size,
                    advice,
                } => (api.zeCommandListAppendMemAdvise)(l, device.0, ptr.0, size, advice.as_raw()),
                ListCommand::ImageCopy { dst, src } => {
                    (api.zeCommandListAppendImageCopy)(l, dst.0, src.0, signal, num_wait, wait)
                }
                ListCommand::ImageCopyRegion {
                    dst,
                    src,
                    dst_region,
                    src_region,
                } => (api.zeCommandListAppendImageCopyRegion)(
                    l,
                    dst.0,
                    src.0,
                    region_ptr(&dst_region),
                    region_ptr(&src_region),
                    signal,
                    num_wait,
                    wait,
                ),
                ListCommand::ImageCopyToMemory { dst, src, region } => {
                    (api.zeCommandListAppendImageCopyToMemory)(
                        l,
                        dst.0,
                        src.0,
                        region_ptr(&region),
                        signal,
                        num_wait,
                        wait,
                    )
                }
                ListCommand::ImageCopyFromMemory { dst, src, region } => {
                    (api.zeCommandListAppendImageCopyFromMemory)(
                        l,
                        dst.0,
                        src.0,
                        region_ptr(&region),
                        signal,
                        num_wait,
                        wait,
                    )
                }
                ListCommand::ExecuteCommandLists { lists } => {
                    let Some(f) = api.zeCommandListImmediateAppendCommandListsExp else {
                        return Err(LevelZeroError::Raw(ZeResult::ErrorUnsupportedFeature));
                    };
                    f(
                        l,
                        lists.len() as u32,
                        lists.as_ptr() as *mut RawHandle,
                        signal,
                        num_wait,
                        wait,
                    )
                }
            }
        };
        check(raw)
    }
    fn synchronize_command_list_host(
        &self,
        list: ZeCommandList,
        timeout: u64,
    ) -> Result<SyncStatus, LevelZeroError> {
        let Some(f) = self.api.zeCommandListHostSynchronize else {
            return Err(LevelZeroError::Raw(ZeResult::ErrorUnsupportedFeature));
        };
        check_sync(unsafe { f(list.0, timeout) })
    }

    fn create_event_pool(
        &self,
        context: ZeContext,
        desc: &EventPoolDesc,
        devices: &[ZeDevice],
    ) -> Result<ZeEventPool, LevelZeroError> {
        let desc = ze_event_pool_desc_t {
            stype: ZE_STRUCTURE_TYPE_EVENT_POOL_DESC,
            pNext: null(),
            flags: desc.flags.bits(),
            count: desc.count,
        };
        let mut out = null_mut();
        check(unsafe {
            (self.api.zeEventPoolCreate)(
                context.0,
                &desc,
                devices.len() as u32,
                devices.as_ptr() as *mut RawHandle,
                &mut out,
            )
        })?;
        Ok(ZeEventPool(out))
    }
    unsafe fn destroy_event_pool(&self, pool: ZeEventPool) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeEventPoolDestroy)(pool.0) })
    }
    fn create_event(&self, pool: ZeEventPool, desc: &EventDesc) -> Result<ZeEvent, LevelZeroError> {
        let desc = ze_event_desc_t {
            stype: ZE_STRUCTURE_TYPE_EVENT_DESC,
            pNext: null(),
            index: desc.index,
            signal: desc.signal.bits(),
            wait: desc.wait.bits(),
        };
        let mut out = null_mut();
        check(unsafe { (self.api.zeEventCreate)(pool.0, &desc, &mut out) })?;
        Ok(ZeEvent(out))
    }
    unsafe fn destroy_event(&self, event: ZeEvent) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeEventDestroy)(event.0) })
    }
    fn event_host_signal(&self, event: ZeEvent) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeEventHostSignal)(event.0) })
    }
    fn event_host_synchronize(
        &self,
        event: ZeEvent,
        timeout: u64,
    ) -> Result<SyncStatus, LevelZeroError> {
        check_sync(unsafe { (self.api.zeEventHostSynchronize)(event.0, timeout) })
    }
    fn event_query_status(&self, event: ZeEvent) -> Result<SyncStatus, LevelZeroError> {
        check_sync(unsafe { (self.api.zeEventQueryStatus)(event.0) })
    }
    fn event_host_reset(&self, event: ZeEvent) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeEventHostReset)(event.0) })
    }
    fn event_pool_get_ipc_handle(
        &self,
        pool: ZeEventPool,
    ) -> Result<IpcEventPoolHandle, LevelZeroError> {
        let mut handle = ze_ipc_event_pool_handle_t { data: [0; 64] };
        check(unsafe { (self.api.zeEventPoolGetIpcHandle)(pool.0, &mut handle) })?;
        Ok(IpcEventPoolHandle(handle.data))
    }
    unsafe fn event_pool_open_ipc_handle(
        &self,
        context: ZeContext,
        handle: IpcEventPoolHandle,
    ) -> Result<ZeEventPool, LevelZeroError> {
        let mut out = null_mut();
        check(unsafe {
            (self.api.zeEventPoolOpenIpcHandle)(
                context.0,
                ze_ipc_event_pool_handle_t { data: handle.0 },
                &mut out,
            )
        })?;
        Ok(ZeEventPool(out))
    }
    unsafe fn event_pool_close_ipc_handle(&self, pool: ZeEventPool) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeEventPoolCloseIpcHandle)(pool.0) })
    }

    fn create_fence(
        &self,
        queue: ZeCommandQueue,
        desc: &FenceDesc,
    ) -> Result<ZeFence, LevelZeroError> {
        let desc = ze_fence_desc_t {
            stype: ZE_STRUCTURE_TYPE_FENCE_DESC,
            pNext: null(),
            flags: desc.flags.bits(),
        };
        let mut out = null_mut();
        check(unsafe { (self.api.zeFenceCreate)(queue.0, &desc, &mut out) })?;
        Ok(ZeFence(out))
    }
    unsafe fn destroy_fence(&self, fence: ZeFence) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeFenceDestroy)(fence.0) })
    }
    fn fence_host_synchronize(
        &self,
        fence: ZeFence,
        timeout: u64,
    ) -> Result<SyncStatus, LevelZeroError> {
        check_sync(unsafe { (self.api.zeFenceHostSynchronize)(fence.0, timeout) })
    }
    fn fence_query_status(&self, fence: ZeFence) -> Result<SyncStatus, LevelZeroError> {
        check_sync(unsafe { (self.api.zeFenceQueryStatus)(fence.0) })
    }
    fn fence_reset(&self, fence: ZeFence) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeFenceReset)(fence.0) })
    }

    fn create_module(
        &self,
        context: ZeContext,
        device: ZeDevice,
        desc: &ModuleDesc<'_>,
    ) -> Result<ZeModule, LevelZeroError> {
        let flags = desc
            .build_flags
            .map(CString::new)
            .transpose()
            .map_err(|_| LevelZeroError::Raw(ZeResult::ErrorInvalidArgument))?;
        let raw_desc = ze_module_desc_t {
            stype: ZE_STRUCTURE_TYPE_MODULE_DESC,
            pNext: null(),
            format: match desc.format {
                ModuleFormat::IlSpirv => ZE_MODULE_FORMAT_IL_SPIRV,
                ModuleFormat::Native => ZE_MODULE_FORMAT_NATIVE,
            },
            inputSize: desc.input.len(),
            pInputModule: desc.input.as_ptr(),
            pBuildFlags: flags.as_ref().map_or(null(), |f| f.as_ptr()),
            pConstants: null(),
        };
        let mut out = null_mut();
        let mut build_log: RawHandle = null_mut();
        let result = unsafe {
            (self.api.zeModuleCreate)(context.0, device.0, &raw_desc, &mut out, &mut build_log)
        };
        defer! {
            if !build_log.is_null() {
                unsafe { (self.api.zeModuleBuildLogDestroy)(build_log) };
            }
        }
        if ZeResult::from_raw(result) == ZeResult::ErrorModuleBuildFailure && !build_log.is_null() {
            let mut size = 0usize;
            unsafe { (self.api.zeModuleBuildLogGetString)(build_log, &mut size, null_mut()) };
            let mut text = vec![0 as std::ffi::c_char; size];
            unsafe {
                (self.api.zeModuleBuildLogGetString)(build_log, &mut size, text.as_mut_ptr())
            };
            return Err(LevelZeroError::ModuleBuild(fixed_str(&text)));
        }
        check(result)?;
        Ok(ZeModule(out))
    }
    unsafe fn destroy_module(&self, module: ZeModule) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeModuleDestroy)(module.0) })
    }
    fn create_kernel(&self, module: ZeModule, name: &str) -> Result<ZeKernel, LevelZeroError> {
        let name =
            CString::new(name).map_err(|_| LevelZeroError::Raw(ZeResult::ErrorInvalidKernelName))?;
        let desc = ze_kernel_desc_t {
            stype: ZE_STRUCTURE_TYPE_KERNEL_DESC,
            pNext: null(),
            flags: 0,
            pKernelName: name.as_ptr(),
        };
        let mut out = null_mut();
        check(unsafe { (self.api.zeKernelCreate)(module.0, &desc, &mut out) })?;
        Ok(ZeKernel(out))
    }
    unsafe fn destroy_kernel(&self, kernel: ZeKernel) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeKernelDestroy)(kernel.0) })
    }
    fn kernel_set_group_size(&self, kernel: ZeKernel, size: [u32; 3]) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeKernelSetGroupSize)(kernel.0, size[0], size[1], size[2]) })
    }
    fn kernel_suggest_group_size(
        &self,
        kernel: ZeKernel,
        global_size: [u32; 3],
    ) -> Result<[u32; 3], LevelZeroError> {
        let mut out = [0u32; 3];
        let [x, y, z] = &mut out;
        check(unsafe {
            (self.api.zeKernelSuggestGroupSize)(
                kernel.0,
                global_size[0],
                global_size[1],
                global_size[2],
                x,
                y,
                z,
            )
        })?;
        Ok(out)
    }
    unsafe fn kernel_set_argument_value(
        &self,
        kernel: ZeKernel,
        index: u32,
        value: &[u8],
    ) -> Result<(), LevelZeroError> {
        check(unsafe {
            (self.api.zeKernelSetArgumentValue)(
                kernel.0,
                index,
                value.len(),
                value.as_ptr() as *const c_void,
            )
        })
    }

    fn create_sampler(
        &self,
        context: ZeContext,
        device: ZeDevice,
        desc: &SamplerDesc,
    ) -> Result<ZeSampler, LevelZeroError> {
        let raw_desc = ze_sampler_desc_t {
            stype: ZE_STRUCTURE_TYPE_SAMPLER_DESC,
            pNext: null(),
            addressMode: desc.address_mode.as_raw(),
            filterMode: desc.filter_mode.as_raw(),
            isNormalized: desc.normalized as u8,
        };
        let mut out = null_mut();
        check(unsafe { (self.api.zeSamplerCreate)(context.0, device.0, &raw_desc, &mut out) })?;
        Ok(ZeSampler(out))
    }
    unsafe fn destroy_sampler(&self, sampler: ZeSampler) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeSamplerDestroy)(sampler.0) })
    }

    fn create_image(
        &self,
        context: ZeContext,
        device: ZeDevice,
        desc: &ImageDesc,
    ) -> Result<ZeImage, LevelZeroError> {
        let raw_desc = ze_image_desc_t {
            stype: ZE_STRUCTURE_TYPE_IMAGE_DESC,
            pNext: null(),
            flags: 0,
            type_: match desc.ty {
                ImageType::D1 => ZE_IMAGE_TYPE_1D,
                ImageType::D2 => ZE_IMAGE_TYPE_2D,
                ImageType::D3 => ZE_IMAGE_TYPE_3D,
            },
            format: image_format(desc.texel_size)?,
            width: desc.width,
            height: desc.height,
            depth: desc.depth,
            arraylevels: 0,
            miplevels: 0,
        };
        let mut out = null_mut();
        check(unsafe { (self.api.zeImageCreate)(context.0, device.0, &raw_desc, &mut out) })?;
        Ok(ZeImage(out))
    }
    unsafe fn destroy_image(&self, image: ZeImage) -> Result<(), LevelZeroError> {
        check(unsafe { (self.api.zeImageDestroy)(image.0) })
    }
}
