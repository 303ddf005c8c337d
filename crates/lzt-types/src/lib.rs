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
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Timeout value meaning "block until done".
pub const TIMEOUT_INFINITE: u64 = u64::MAX;

/// Result codes as returned by the driver. Values match `ze_result_t`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ZeResult {
    Success,
    NotReady,
    ErrorDeviceLost,
    ErrorOutOfHostMemory,
    ErrorOutOfDeviceMemory,
    ErrorModuleBuildFailure,
    ErrorModuleLinkFailure,
    ErrorInsufficientPermissions,
    ErrorNotAvailable,
    ErrorUninitialized,
    ErrorUnsupportedVersion,
    ErrorUnsupportedFeature,
    ErrorInvalidArgument,
    ErrorInvalidNullHandle,
    ErrorHandleObjectInUse,
    ErrorInvalidNullPointer,
    ErrorInvalidSize,
    ErrorUnsupportedSize,
    ErrorUnsupportedAlignment,
    ErrorInvalidSynchronizationObject,
    ErrorInvalidEnumeration,
    ErrorUnsupportedEnumeration,
    ErrorUnsupportedImageFormat,
    ErrorInvalidNativeBinary,
    ErrorInvalidKernelName,
    ErrorInvalidGroupSizeDimension,
    ErrorInvalidKernelArgumentIndex,
    ErrorInvalidKernelArgumentSize,
    ErrorInvalidCommandListType,
    ErrorOverlappingRegions,
    ErrorUnknown,
    Other(u32),
}
impl ZeResult {
    pub fn from_raw(raw: u32) -> Self {
        use ZeResult::*;
        match raw {
            0 => Success,
            1 => NotReady,
            0x7000_0001 => ErrorDeviceLost,
            0x7000_0002 => ErrorOutOfHostMemory,
            0x7000_0003 => ErrorOutOfDeviceMemory,
            0x7000_0004 => ErrorModuleBuildFailure,
            0x7000_0005 => ErrorModuleLinkFailure,
            0x7001_0000 => ErrorInsufficientPermissions,
            0x7001_0001 => ErrorNotAvailable,
            0x7800_0001 => ErrorUninitialized,
            0x7800_0002 => ErrorUnsupportedVersion,
            0x7800_0003 => ErrorUnsupportedFeature,
            0x7800_0004 => ErrorInvalidArgument,
            0x7800_0005 => ErrorInvalidNullHandle,
            0x7800_0006 => ErrorHandleObjectInUse,
            0x7800_0007 => ErrorInvalidNullPointer,
            0x7800_0008 => ErrorInvalidSize,
            0x7800_0009 => ErrorUnsupportedSize,
            0x7800_000a => ErrorUnsupportedAlignment,
            0x7800_000b => ErrorInvalidSynchronizationObject,
            0x7800_000c => ErrorInvalidEnumeration,
            0x7800_000d => ErrorUnsupportedEnumeration,
            0x7800_000e => ErrorUnsupportedImageFormat,
            0x7800_000f => ErrorInvalidNativeBinary,
            0x7800_0011 => ErrorInvalidKernelName,
            0x7800_0013 => ErrorInvalidGroupSizeDimension,
            0x7800_0015 => ErrorInvalidKernelArgumentIndex,
            0x7800_0016 => ErrorInvalidKernelArgumentSize,
            0x7800_0019 => ErrorInvalidCommandListType,
            0x7800_001a => ErrorOverlappingRegions,
            0x7fff_fffe => ErrorUnknown,
            other => Other(other),
        }
    }
    pub fn as_raw(&self) -> u32 {
        use ZeResult::*;
        match *self {
            Success => 0,
            NotReady => 1,
            ErrorDeviceLost => 0x7000_0001,
            ErrorOutOfHostMemory => 0x7000_0002,
            ErrorOutOfDeviceMemory => 0x7000_0003,
            ErrorModuleBuildFailure => 0x7000_0004,
            ErrorModuleLinkFailure => 0x7000_0005,
            ErrorInsufficientPermissions => 0x7001_0000,
            ErrorNotAvailable => 0x7001_0001,
            ErrorUninitialized => 0x7800_0001,
            ErrorUnsupportedVersion => 0x7800_0002,
            ErrorUnsupportedFeature => 0x7800_0003,
            ErrorInvalidArgument => 0x7800_0004,
            ErrorInvalidNullHandle => 0x7800_0005,
            ErrorHandleObjectInUse => 0x7800_0006,
            ErrorInvalidNullPointer => 0x7800_0007,
            ErrorInvalidSize => 0x7800_0008,
            ErrorUnsupportedSize => 0x7800_0009,
            ErrorUnsupportedAlignment => 0x7800_000a,
            ErrorInvalidSynchronizationObject => 0x7800_000b,
            ErrorInvalidEnumeration => 0x7800_000c,
            ErrorUnsupportedEnumeration => 0x7800_000d,
            ErrorUnsupportedImageFormat => 0x7800_000e,
            ErrorInvalidNativeBinary => 0x7800_000f,
            ErrorInvalidKernelName => 0x7800_0011,
            ErrorInvalidGroupSizeDimension => 0x7800_0013,
            ErrorInvalidKernelArgumentIndex => 0x7800_0015,
            ErrorInvalidKernelArgumentSize => 0x7800_0016,
            ErrorInvalidCommandListType => 0x7800_0019,
            ErrorOverlappingRegions => 0x7800_001a,
            ErrorUnknown => 0x7fff_fffe,
            Other(raw) => raw,
        }
    }
    pub fn is_success(&self) -> bool {
        *self == ZeResult::Success
    }
}
impl std::fmt::Display for ZeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?} (0x{:08x})", self.as_raw())
    }
}

/// Outcome of a host-side wait or status query. `NotReady` is a normal answer, not a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    Ready,
    NotReady,
}
impl SyncStatus {
    pub fn is_ready(&self) -> bool {
        *self == SyncStatus::Ready
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CommandQueueFlags: u32 {
        const EXPLICIT_ONLY = 1 << 0;
        const IN_ORDER = 1 << 1;
    }
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CommandListFlags: u32 {
        const RELAXED_ORDERING = 1 << 0;
        const MAXIMIZE_THROUGHPUT = 1 << 1;
        const EXPLICIT_ONLY = 1 << 2;
        const IN_ORDER = 1 << 3;
    }
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CommandQueueGroupFlags: u32 {
        const COMPUTE = 1 << 0;
        const COPY = 1 << 1;
        const COOPERATIVE_KERNELS = 1 << 2;
        const METRICS = 1 << 3;
    }
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EventPoolFlags: u32 {
        const HOST_VISIBLE = 1 << 0;
        const IPC = 1 << 1;
        const KERNEL_TIMESTAMP = 1 << 2;
    }
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EventScopeFlags: u32 {
        const SUBDEVICE = 1 << 0;
        const DEVICE = 1 << 1;
        const HOST = 1 << 2;
    }
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FenceFlags: u32 {
        const SIGNALED = 1 << 0;
    }
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DeviceMemAllocFlags: u32 {
        const BIAS_CACHED = 1 << 0;
        const BIAS_UNCACHED = 1 << 1;
        const BIAS_INITIAL_PLACEMENT = 1 << 2;
    }
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct HostMemAllocFlags: u32 {
        const BIAS_CACHED = 1 << 0;
        const BIAS_UNCACHED = 1 << 1;
        const BIAS_WRITE_COMBINED = 1 << 2;
        const BIAS_INITIAL_PLACEMENT = 1 << 3;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandQueueMode {
    #[default]
    Default,
    Synchronous,
    Asynchronous,
}
impl CommandQueueMode {
    pub fn as_raw(&self) -> u32 {
        match self {
            Self::Default => 0,
            Self::Synchronous => 1,
            Self::Asynchronous => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandQueuePriority {
    #[default]
    Normal,
    Low,
    High,
}
impl CommandQueuePriority {
    pub fn as_raw(&self) -> u32 {
        match self {
            Self::Normal => 0,
            Self::Low => 1,
            Self::High => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryType {
    #[default]
    Unknown,
    Host,
    Device,
    Shared,
}
impl MemoryType {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Host,
            2 => Self::Device,
            3 => Self::Shared,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemoryAdvice {
    SetReadMostly,
    ClearReadMostly,
    SetPreferredLocation,
    ClearPreferredLocation,
    SetNonAtomicMostly,
    ClearNonAtomicMostly,
    BiasCached,
    BiasUncached,
}
impl MemoryAdvice {
    pub fn as_raw(&self) -> u32 {
        *self as u32
    }
}

/// Access attribute for virtual memory mappings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MemoryAccess {
    None,
    #[default]
    ReadWrite,
    ReadOnly,
}
impl MemoryAccess {
    pub fn as_raw(&self) -> u32 {
        *self as u32
    }
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::ReadWrite,
            2 => Self::ReadOnly,
            _ => Self::None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SamplerAddressMode {
    #[default]
    None,
    Repeat,
    Clamp,
    ClampToBorder,
    Mirror,
}
impl SamplerAddressMode {
    pub fn as_raw(&self) -> u32 {
        *self as u32
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SamplerFilterMode {
    #[default]
    Nearest,
    Linear,
}
impl SamplerFilterMode {
    pub fn as_raw(&self) -> u32 {
        *self as u32
    }
}

/// Defaults to no addressing, nearest filtering and unnormalized coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub address_mode: SamplerAddressMode,
    pub filter_mode: SamplerFilterMode,
    pub normalized: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ModuleFormat {
    #[default]
    IlSpirv,
    Native,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    #[default]
    Gpu,
    Cpu,
    Fpga,
    Mca,
    Vpu,
}
impl DeviceType {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            2 => Self::Cpu,
            3 => Self::Fpga,
            4 => Self::Mca,
            5 => Self::Vpu,
            _ => Self::Gpu,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CommandQueueDesc {
    pub ordinal: u32,
    pub index: u32,
    pub flags: CommandQueueFlags,
    pub mode: CommandQueueMode,
    pub priority: CommandQueuePriority,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CommandListDesc {
    pub command_queue_group_ordinal: u32,
    pub flags: CommandListFlags,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct EventPoolDesc {
    pub flags: EventPoolFlags,
    pub count: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct EventDesc {
    pub index: u32,
    pub signal: EventScopeFlags,
    pub wait: EventScopeFlags,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FenceDesc {
    pub flags: FenceFlags,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DeviceMemAllocDesc {
    pub flags: DeviceMemAllocFlags,
    pub ordinal: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct HostMemAllocDesc {
    pub flags: HostMemAllocFlags,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct GroupCount {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}
impl GroupCount {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

/// A 3D box in bytes (x) and rows/slices (y, z), used by copy-region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct CopyRegion {
    pub origin_x: u32,
    pub origin_y: u32,
    pub origin_z: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

/// A 3D box in texels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct ImageRegion {
    pub origin_x: u32,
    pub origin_y: u32,
    pub origin_z: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ImageType {
    D1,
    #[default]
    D2,
    D3,
}

/// Image descriptor. Only single-channel-group unsigned layouts are described; `texel_size` is
/// the byte size of one texel (e.g. 4 for `8_8_8_8`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageDesc {
    pub ty: ImageType,
    pub texel_size: u32,
    pub width: u64,
    pub height: u32,
    pub depth: u32,
}
impl Default for ImageDesc {
    fn default() -> Self {
        Self {
            ty: ImageType::D2,
            texel_size: 4,
            width: 1,
            height: 1,
            depth: 1,
        }
    }
}
impl ImageDesc {
    pub fn byte_size(&self) -> u64 {
        self.width * self.height as u64 * self.depth as u64 * self.texel_size as u64
    }
    pub fn full_region(&self) -> ImageRegion {
        ImageRegion {
            origin_x: 0,
            origin_y: 0,
            origin_z: 0,
            width: self.width as u32,
            height: self.height,
            depth: self.depth,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverProperties {
    pub uuid: [u8; 16],
    pub driver_version: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    pub major: u16,
    pub minor: u16,
}
impl ApiVersion {
    pub fn from_raw(raw: u32) -> Self {
        Self {
            major: (raw >> 16) as u16,
            minor: (raw & 0xffff) as u16,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionProperties {
    pub name: String,
    pub version: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProperties {
    pub ty: DeviceType,
    pub vendor_id: u32,
    pub device_id: u32,
    pub is_subdevice: bool,
    pub subdevice_id: u32,
    pub max_mem_alloc_size: u64,
    pub max_hardware_contexts: u32,
    pub max_command_queue_priority: u32,
    pub timer_resolution: u64,
    pub timestamp_valid_bits: u32,
    pub uuid: [u8; 16],
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceComputeProperties {
    pub max_total_group_size: u32,
    pub max_group_size: [u32; 3],
    pub max_group_count: [u32; 3],
    pub max_shared_local_memory: u32,
    pub sub_group_sizes: Vec<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMemoryProperties {
    pub max_clock_rate: u32,
    pub max_bus_width: u32,
    pub total_size: u64,
    pub name: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceCacheProperties {
    /// The cache size can be changed by the user.
    pub user_control: bool,
    pub cache_size: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CommandQueueGroupProperties {
    pub flags: CommandQueueGroupFlags,
    pub max_memory_fill_pattern_size: usize,
    pub num_queues: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MemoryAllocationProperties {
    pub ty: MemoryType,
    pub id: u64,
    pub page_size: u64,
}

/// Opaque IPC memory handle, same size as `ze_ipc_mem_handle_t`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IpcMemHandle(pub [u8; 64]);
impl Default for IpcMemHandle {
    fn default() -> Self {
        Self([0; 64])
    }
}

/// Opaque IPC event pool handle, same size as `ze_ipc_event_pool_handle_t`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IpcEventPoolHandle(pub [u8; 64]);
impl Default for IpcEventPoolHandle {
    fn default() -> Self {
        Self([0; 64])
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModuleDesc<'a> {
    pub format: ModuleFormat,
    pub input: &'a [u8],
    pub build_flags: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_codes_round_trip_through_raw() {
        for raw in [0u32, 1, 0x7800_0003, 0x7800_0004, 0x7fff_fffe] {
            assert_eq!(ZeResult::from_raw(raw).as_raw(), raw);
        }
        assert_eq!(ZeResult::from_raw(0x1234), ZeResult::Other(0x1234));
        assert!(ZeResult::from_raw(0).is_success());
        assert_eq!(ZeResult::from_raw(1), ZeResult::NotReady);
    }

    #[test]
    fn image_desc_sizes() {
        let desc = ImageDesc {
            width: 8,
            height: 4,
            ..Default::default()
        };
        assert_eq!(desc.byte_size(), 8 * 4 * 4);
        assert_eq!(desc.full_region().width, 8);
        assert_eq!(desc.full_region().depth, 1);
    }

    #[test]
    fn memory_access_matches_raw_attributes() {
        for access in [MemoryAccess::None, MemoryAccess::ReadWrite, MemoryAccess::ReadOnly] {
            assert_eq!(MemoryAccess::from_raw(access.as_raw()), access);
        }
        assert_eq!(MemoryAccess::ReadOnly.as_raw(), 2);
    }

    #[test]
    fn api_version_is_split_in_halves() {
        let v = ApiVersion::from_raw((1 << 16) | 6);
        assert_eq!(v, ApiVersion { major: 1, minor: 6 });
    }
}
