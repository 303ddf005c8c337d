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
//! Raw `ze_api.h` declarations, restricted to what the harness calls.
#![allow(non_snake_case, non_camel_case_types)]

use std::ffi::{c_char, c_void};

use libloading::Library;

use super::LevelZeroError;

pub type RawHandle = *mut c_void;
pub type ZeResultRaw = u32;

#[cfg(target_os = "windows")]
pub const LOADER_NAMES: &[&str] = &["ze_loader.dll"];
#[cfg(not(target_os = "windows"))]
pub const LOADER_NAMES: &[&str] = &["libze_loader.so.1", "libze_loader.so"];

pub const ZE_STRUCTURE_TYPE_DRIVER_PROPERTIES: u32 = 0x1;
pub const ZE_STRUCTURE_TYPE_DEVICE_PROPERTIES: u32 = 0x3;
pub const ZE_STRUCTURE_TYPE_DEVICE_COMPUTE_PROPERTIES: u32 = 0x4;
pub const ZE_STRUCTURE_TYPE_COMMAND_QUEUE_GROUP_PROPERTIES: u32 = 0x6;
pub const ZE_STRUCTURE_TYPE_DEVICE_MEMORY_PROPERTIES: u32 = 0x7;
pub const ZE_STRUCTURE_TYPE_DEVICE_CACHE_PROPERTIES: u32 = 0x9;
pub const ZE_STRUCTURE_TYPE_CONTEXT_DESC: u32 = 0xd;
pub const ZE_STRUCTURE_TYPE_COMMAND_QUEUE_DESC: u32 = 0xe;
pub const ZE_STRUCTURE_TYPE_COMMAND_LIST_DESC: u32 = 0xf;
pub const ZE_STRUCTURE_TYPE_EVENT_POOL_DESC: u32 = 0x10;
pub const ZE_STRUCTURE_TYPE_EVENT_DESC: u32 = 0x11;
pub const ZE_STRUCTURE_TYPE_FENCE_DESC: u32 = 0x12;
pub const ZE_STRUCTURE_TYPE_IMAGE_DESC: u32 = 0x13;
pub const ZE_STRUCTURE_TYPE_DEVICE_MEM_ALLOC_DESC: u32 = 0x15;
pub const ZE_STRUCTURE_TYPE_HOST_MEM_ALLOC_DESC: u32 = 0x16;
pub const ZE_STRUCTURE_TYPE_MEMORY_ALLOCATION_PROPERTIES: u32 = 0x17;
pub const ZE_STRUCTURE_TYPE_MODULE_DESC: u32 = 0x1b;
pub const ZE_STRUCTURE_TYPE_KERNEL_DESC: u32 = 0x1d;
pub const ZE_STRUCTURE_TYPE_SAMPLER_DESC: u32 = 0x1f;
pub const ZE_STRUCTURE_TYPE_PHYSICAL_MEM_DESC: u32 = 0x20;

pub const ZE_DEVICE_PROPERTY_FLAG_SUBDEVICE: u32 = 1 << 1;
pub const ZE_DEVICE_CACHE_PROPERTY_FLAG_USER_CONTROL: u32 = 1 << 0;
pub const ZE_SUBGROUPSIZE_COUNT: usize = 8;

pub const ZE_MODULE_FORMAT_IL_SPIRV: u32 = 0;
pub const ZE_MODULE_FORMAT_NATIVE: u32 = 1;

pub const ZE_IMAGE_TYPE_1D: u32 = 0;
pub const ZE_IMAGE_TYPE_2D: u32 = 2;
pub const ZE_IMAGE_TYPE_3D: u32 = 4;
pub const ZE_IMAGE_FORMAT_LAYOUT_8: u32 = 0;
pub const ZE_IMAGE_FORMAT_LAYOUT_16: u32 = 1;
pub const ZE_IMAGE_FORMAT_LAYOUT_32: u32 = 2;
pub const ZE_IMAGE_FORMAT_LAYOUT_16_16_16_16: u32 = 6;
pub const ZE_IMAGE_FORMAT_LAYOUT_32_32_32_32: u32 = 8;
pub const ZE_IMAGE_FORMAT_TYPE_UINT: u32 = 0;
pub const ZE_IMAGE_FORMAT_SWIZZLE_R: u32 = 0;
pub const ZE_IMAGE_FORMAT_SWIZZLE_G: u32 = 1;
pub const ZE_IMAGE_FORMAT_SWIZZLE_B: u32 = 2;
pub const ZE_IMAGE_FORMAT_SWIZZLE_A: u32 = 3;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Zeroable)]
pub struct ze_driver_properties_t {
    pub stype: u32,
    pub pNext: *mut c_void,
    pub uuid: [u8; 16],
    pub driverVersion: u32,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Zeroable)]
pub struct ze_driver_extension_properties_t {
    pub name: [c_char; 256],
    pub version: u32,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Zeroable)]
pub struct ze_device_properties_t {
    pub stype: u32,
    pub pNext: *mut c_void,
    pub type_: u32,
    pub vendorId: u32,
    pub deviceId: u32,
    pub flags: u32,
    pub subdeviceId: u32,
    pub coreClockRate: u32,
    pub maxMemAllocSize: u64,
    pub maxHardwareContexts: u32,
    pub maxCommandQueuePriority: u32,
    pub numThreadsPerEU: u32,
    pub physicalEUSimdWidth: u32,
    pub numEUsPerSubslice: u32,
    pub numSubslicesPerSlice: u32,
    pub numSlices: u32,
    pub timerResolution: u64,
    pub timestampValidBits: u32,
    pub kernelTimestampValidBits: u32,
    pub uuid: [u8; 16],
    pub name: [c_char; 256],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Zeroable)]
pub struct ze_device_compute_properties_t {
    pub stype: u32,
    pub pNext: *mut c_void,
    pub maxTotalGroupSize: u32,
    pub maxGroupSizeX: u32,
    pub maxGroupSizeY: u32,
    pub maxGroupSizeZ: u32,
    pub maxGroupCountX: u32,
    pub maxGroupCountY: u32,
    pub maxGroupCountZ: u32,
    pub maxSharedLocalMemory: u32,
    pub numSubGroupSizes: u32,
    pub subGroupSizes: [u32; ZE_SUBGROUPSIZE_COUNT],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Zeroable)]
pub struct ze_device_memory_properties_t {
    pub stype: u32,
    pub pNext: *mut c_void,
    pub flags: u32,
    pub maxClockRate: u32,
    pub maxBusWidth: u32,
    pub totalSize: u64,
    pub name: [c_char; 256],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Zeroable)]
pub struct ze_device_cache_properties_t {
    pub stype: u32,
    pub pNext: *mut c_void,
    pub flags: u32,
    pub cacheSize: usize,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Zeroable)]
pub struct ze_command_queue_group_properties_t {
    pub stype: u32,
    pub pNext: *mut c_void,
    pub flags: u32,
    pub maxMemoryFillPatternSize: usize,
    pub numQueues: u32,
}

#[repr(C)]
pub struct ze_context_desc_t {
    pub stype: u32,
    pub pNext: *const c_void,
    pub flags: u32,
}

#[repr(C)]
pub struct ze_host_mem_alloc_desc_t {
    pub stype: u32,
    pub pNext: *const c_void,
    pub flags: u32,
}

#[repr(C)]
pub struct ze_device_mem_alloc_desc_t {
    pub stype: u32,
    pub pNext: *const c_void,
    pub flags: u32,
    pub ordinal: u32,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Zeroable)]
pub struct ze_memory_allocation_properties_t {
    pub stype: u32,
    pub pNext: *mut c_void,
    pub type_: u32,
    pub id: u64,
    pub pageSize: u64,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct ze_ipc_mem_handle_t {
    pub data: [u8; 64],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct ze_ipc_event_pool_handle_t {
    pub data: [u8; 64],
}

#[repr(C)]
pub struct ze_physical_mem_desc_t {
    pub stype: u32,
    pub pNext: *const c_void,
    pub flags: u32,
    pub size: usize,
}

#[repr(C)]
pub struct ze_command_queue_desc_t {
    pub stype: u32,
    pub pNext: *const c_void,
    pub ordinal: u32,
    pub index: u32,
    pub flags: u32,
    pub mode: u32,
    pub priority: u32,
}

#[repr(C)]
pub struct ze_command_list_desc_t {
    pub stype: u32,
    pub pNext: *const c_void,
    pub commandQueueGroupOrdinal: u32,
    pub flags: u32,
}

#[repr(C)]
pub struct ze_event_pool_desc_t {
    pub stype: u32,
    pub pNext: *const c_void,
    pub flags: u32,
    pub count: u32,
}

#[repr(C)]
pub struct ze_event_desc_t {
    pub stype: u32,
    pub pNext: *const c_void,
    pub index: u32,
    pub signal: u32,
    pub wait: u32,
}

#[repr(C)]
pub struct ze_fence_desc_t {
    pub stype: u32,
    pub pNext: *const c_void,
    pub flags: u32,
}

#[repr(C)]
pub struct ze_module_desc_t {
    pub stype: u32,
    pub pNext: *const c_void,
    pub format: u32,
    pub inputSize: usize,
    pub pInputModule: *const u8,
    pub pBuildFlags: *const c_char,
    pub pConstants: *const c_void,
}

#[repr(C)]
pub struct ze_kernel_desc_t {
    pub stype: u32,
    pub pNext: *const c_void,
    pub flags: u32,
    pub pKernelName: *const c_char,
}

#[repr(C)]
pub struct ze_image_format_t {
    pub layout: u32,
    pub type_: u32,
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub w: u32,
}

#[repr(C)]
pub struct ze_image_desc_t {
    pub stype: u32,
    pub pNext: *const c_void,
    pub flags: u32,
    pub type_: u32,
    pub format: ze_image_format_t,
    pub width: u64,
    pub height: u32,
    pub depth: u32,
    pub arraylevels: u32,
    pub miplevels: u32,
}

#[repr(C)]
pub struct ze_sampler_desc_t {
    pub stype: u32,
    pub pNext: *const c_void,
    pub addressMode: u32,
    pub filterMode: u32,
    pub isNormalized: u8,
}

/// `types::CopyRegion`, `types::ImageRegion` and `types::GroupCount` are `repr(C)` with the same
/// layout as `ze_copy_region_t`, `ze_image_region_t` and `ze_group_count_t`, so they are passed
/// through directly.
type Region = c_void;

macro_rules! ze_functions {
    (
        required { $($name:ident: fn($($arg:ty),* $(,)?);)* }
        optional { $($opt_name:ident: fn($($opt_arg:ty),* $(,)?);)* }
    ) => {
        pub struct ZeApi {
            _lib: Library,
            $(pub $name: unsafe extern "C" fn($($arg),*) -> ZeResultRaw,)*
            $(pub $opt_name: Option<unsafe extern "C" fn($($opt_arg),*) -> ZeResultRaw>,)*
        }
        impl ZeApi {
            /// # Safety
            /// * `lib` must be a Level Zero loader
            pub unsafe fn load(lib: Library) -> Result<Self, LevelZeroError> {
                $(
                    let $name = unsafe {
                        *lib.get::<unsafe extern "C" fn($($arg),*) -> ZeResultRaw>(
                            concat!(stringify!($name), "\0").as_bytes(),
                        )
                        .map_err(|_| LevelZeroError::MissingSymbol(stringify!($name).to_owned()))?
                    };
                )*
                $(
                    let $opt_name = unsafe {
                        lib.get::<unsafe extern "C" fn($($opt_arg),*) -> ZeResultRaw>(
                            concat!(stringify!($opt_name), "\0").as_bytes(),
                        )
                        .ok()
                        .map(|sym| *sym)
                    };
                )*
                Ok(Self {
                    _lib: lib,
                    $($name,)*
                    $($opt_name,)*
                })
            }
        }
    };
}

ze_functions! {
    required {
        zeInit: fn(u32);
        zeDriverGet: fn(*mut u32, *mut RawHandle);
        zeDriverGetProperties: fn(RawHandle, *mut ze_driver_properties_t);
        zeDriverGetApiVersion: fn(RawHandle, *mut u32);
        zeDriverGetExtensionProperties: fn(RawHandle, *mut u32, *mut ze_driver_extension_properties_t);
        zeDeviceGet: fn(RawHandle, *mut u32, *mut RawHandle);
        zeDeviceGetSubDevices: fn(RawHandle, *mut u32, *mut RawHandle);
        zeDeviceGetProperties: fn(RawHandle, *mut ze_device_properties_t);
        zeDeviceGetCommandQueueGroupProperties: fn(RawHandle, *mut u32, *mut ze_command_queue_group_properties_t);
        zeDeviceGetComputeProperties: fn(RawHandle, *mut ze_device_compute_properties_t);
        zeDeviceGetMemoryProperties: fn(RawHandle, *mut u32, *mut ze_device_memory_properties_t);
        zeDeviceGetCacheProperties: fn(RawHandle, *mut u32, *mut ze_device_cache_properties_t);
        zeDeviceCanAccessPeer: fn(RawHandle, RawHandle, *mut u8);
        zeContextCreate: fn(RawHandle, *const ze_context_desc_t, *mut RawHandle);
        zeContextDestroy: fn(RawHandle);
        zeMemAllocHost: fn(RawHandle, *const ze_host_mem_alloc_desc_t, usize, usize, *mut *mut c_void);
        zeMemAllocDevice: fn(RawHandle, *const ze_device_mem_alloc_desc_t, usize, usize, RawHandle, *mut *mut c_void);
        zeMemAllocShared: fn(RawHandle, *const ze_device_mem_alloc_desc_t, *const ze_host_mem_alloc_desc_t, usize, usize, RawHandle, *mut *mut c_void);
        zeMemFree: fn(RawHandle, *mut c_void);
        zeMemGetAllocProperties: fn(RawHandle, *const c_void, *mut ze_memory_allocation_properties_t, *mut RawHandle);
        zeMemGetIpcHandle: fn(RawHandle, *const c_void, *mut ze_ipc_mem_handle_t);
        zeMemOpenIpcHandle: fn(RawHandle, RawHandle, ze_ipc_mem_handle_t, u32, *mut *mut c_void);
        zeMemCloseIpcHandle: fn(RawHandle, *const c_void);
        zeVirtualMemQueryPageSize: fn(RawHandle, RawHandle, usize, *mut usize);
        zeVirtualMemReserve: fn(RawHandle, *const c_void, usize, *mut *mut c_void);
        zeVirtualMemFree: fn(RawHandle, *const c_void, usize);
        zePhysicalMemCreate: fn(RawHandle, RawHandle, *const ze_physical_mem_desc_t, *mut RawHandle);
        zePhysicalMemDestroy: fn(RawHandle, RawHandle);
        zeVirtualMemMap: fn(RawHandle, *const c_void, usize, RawHandle, usize, u32);
        zeVirtualMemUnmap: fn(RawHandle, *const c_void, usize);
        zeVirtualMemSetAccessAttribute: fn(RawHandle, *const c_void, usize, u32);
        zeVirtualMemGetAccessAttribute: fn(RawHandle, *const c_void, usize, *mut u32, *mut usize);
        zeCommandQueueCreate: fn(RawHandle, RawHandle, *const ze_command_queue_desc_t, *mut RawHandle);
        zeCommandQueueDestroy: fn(RawHandle);
        zeCommandQueueExecuteCommandLists: fn(RawHandle, u32, *mut RawHandle, RawHandle);
        zeCommandQueueSynchronize: fn(RawHandle, u64);
        zeCommandListCreate: fn(RawHandle, RawHandle, *const ze_command_list_desc_t, *mut RawHandle);
        zeCommandListCreateImmediate: fn(RawHandle, RawHandle, *const ze_command_queue_desc_t, *mut RawHandle);
        zeCommandListClose: fn(RawHandle);
        zeCommandListReset: fn(RawHandle);
        zeCommandListDestroy: fn(RawHandle);
        zeCommandListAppendMemoryCopy: fn(RawHandle, *mut c_void, *const c_void, usize, RawHandle, u32, *mut RawHandle);
        zeCommandListAppendMemoryFill: fn(RawHandle, *mut c_void, *const c_void, usize, usize, RawHandle, u32, *mut RawHandle);
        zeCommandListAppendMemoryCopyRegion: fn(RawHandle, *mut c_void, *const Region, u32, u32, *const c_void, *const Region, u32, u32, RawHandle, u32, *mut RawHandle);
        zeCommandListAppendBarrier: fn(RawHandle, RawHandle, u32, *mut RawHandle);
        zeCommandListAppendMemoryRangesBarrier: fn(RawHandle, u32, *const usize, *const *const c_void, RawHandle, u32, *mut RawHandle);
        zeCommandListAppendLaunchKernel: fn(RawHandle, RawHandle, *const Region, RawHandle, u32, *mut RawHandle);
        zeCommandListAppendLaunchCooperativeKernel: fn(RawHandle, RawHandle, *const Region, RawHandle, u32, *mut RawHandle);
        zeCommandListAppendSignalEvent: fn(RawHandle, RawHandle);
        zeCommandListAppendWaitOnEvents: fn(RawHandle, u32, *mut RawHandle);
        zeCommandListAppendEventReset: fn(RawHandle, RawHandle);
        zeCommandListAppendWriteGlobalTimestamp: fn(RawHandle, *mut u64, RawHandle, u32, *mut RawHandle);
        zeCommandListAppendMemoryPrefetch: fn(RawHandle, *const c_void, usize);
        zeCommandListAppendMemAdvise: fn(RawHandle, RawHandle, *const c_void, usize, u32);
        zeCommandListAppendImageCopy: fn(RawHandle, RawHandle, RawHandle, RawHandle, u32, *mut RawHandle);
        zeCommandListAppendImageCopyRegion: fn(RawHandle, RawHandle, RawHandle, *const Region, *const Region, RawHandle, u32, *mut RawHandle);
        zeCommandListAppendImageCopyToMemory: fn(RawHandle, *mut c_void, RawHandle, *const Region, RawHandle, u32, *mut RawHandle);
        zeCommandListAppendImageCopyFromMemory: fn(RawHandle, RawHandle, *const c_void, *const Region, RawHandle, u32, *mut RawHandle);
        zeEventPoolCreate: fn(RawHandle, *const ze_event_pool_desc_t, u32, *mut RawHandle, *mut RawHandle);
        zeEventPoolDestroy: fn(RawHandle);
        zeEventCreate: fn(RawHandle, *const ze_event_desc_t, *mut RawHandle);
        zeEventDestroy: fn(RawHandle);
        zeEventHostSignal: fn(RawHandle);
        zeEventHostSynchronize: fn(RawHandle, u64);
        zeEventQueryStatus: fn(RawHandle);
        zeEventHostReset: fn(RawHandle);
        zeEventPoolGetIpcHandle: fn(RawHandle, *mut ze_ipc_event_pool_handle_t);
        zeEventPoolOpenIpcHandle: fn(RawHandle, ze_ipc_event_pool_handle_t, *mut RawHandle);
        zeEventPoolCloseIpcHandle: fn(RawHandle);
        zeFenceCreate: fn(RawHandle, *const ze_fence_desc_t, *mut RawHandle);
        zeFenceDestroy: fn(RawHandle);
        zeFenceHostSynchronize: fn(RawHandle, u64);
        zeFenceQueryStatus: fn(RawHandle);
        zeFenceReset: fn(RawHandle);
        zeModuleCreate: fn(RawHandle, RawHandle, *const ze_module_desc_t, *mut RawHandle, *mut RawHandle);
        zeModuleDestroy: fn(RawHandle);
        zeModuleBuildLogGetString: fn(RawHandle, *mut usize, *mut c_char);
        zeModuleBuildLogDestroy: fn(RawHandle);
        zeKernelCreate: fn(RawHandle, *const ze_kernel_desc_t, *mut RawHandle);
        zeKernelDestroy: fn(RawHandle);
        zeKernelSetGroupSize: fn(RawHandle, u32, u32, u32);
        zeKernelSuggestGroupSize: fn(RawHandle, u32, u32, u32, *mut u32, *mut u32, *mut u32);
        zeKernelSetArgumentValue: fn(RawHandle, u32, usize, *const c_void);
        zeImageCreate: fn(RawHandle, RawHandle, *const ze_image_desc_t, *mut RawHandle);
        zeImageDestroy: fn(RawHandle);
        zeSamplerCreate: fn(RawHandle, RawHandle, *const ze_sampler_desc_t, *mut RawHandle);
        zeSamplerDestroy: fn(RawHandle);
    }
    optional {
        zeCommandListHostSynchronize: fn(RawHandle, u64);
        zeCommandListImmediateAppendCommandListsExp: fn(RawHandle, u32, *mut RawHandle, RawHandle, u32, *mut RawHandle);
    }
}

/// Reads a fixed-size, nul-terminated C string field.
pub fn fixed_str(chars: &[c_char]) -> String {
    let bytes: Vec<u8> = chars
        .iter()
        .map(|c| *c as u8)
        .take_while(|b| *b != 0)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}
