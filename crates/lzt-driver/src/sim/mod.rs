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
//! An in-process reference driver. It models the externally observable behavior the harness
//! relies on: result codes, the command list state machine, queue modes, events, fences and
//! memory contents. Every queue and every immediate list gets one FIFO worker thread, except
//! synchronous ones which run on the submitting thread.
mod exec;
mod kernel;
mod memory;

pub use kernel::{SIM_MAX_GROUP_SIZE, SimKernelFn, SimKernelLaunch};
pub use memory::SIM_PAGE_SIZE;

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, mpsc},
    thread::JoinHandle,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex, MutexGuard};
use thiserror::Error;
use types::*;

use crate::{AppendSync, DevicePtr, Driver, DriverInstance, ListCommand};
use exec::{Batch, Op};
use kernel::{RegisteredKernel, suggest_group_size};
use memory::MemoryRegistry;

#[derive(Clone, Copy, Debug)]
pub struct Sim;
impl Driver for Sim {
    type Instance = SimInstance;
    type DriverHandle = SimDriver;
    type Device = SimDevice;
    type Context = SimContext;
    type CommandQueue = SimQueue;
    type CommandList = SimList;
    type EventPool = SimEventPool;
    type Event = SimEvent;
    type Fence = SimFence;
    type Module = SimModule;
    type Kernel = SimKernel;
    type Image = SimImage;
    type Sampler = SimSampler;
    type PhysicalMem = SimPhysicalMem;

    type Error = SimError;
}
impl Sim {
    pub fn create_instance() -> Result<SimInstance, SimError> {
        Self::create_instance_with(SimConfig::default())
    }
    #[tracing::instrument]
    pub fn create_instance_with(config: SimConfig) -> Result<SimInstance, SimError> {
        if config.devices == 0 {
            return Err(SimError::Raw(ZeResult::ErrorUninitialized));
        }
        let mut state = SimState::new(config.max_alloc_size);
        for index in 0..config.devices {
            let root = state.new_id();
            let mut sub_devices = Vec::new();
            for sub in 0..config.sub_devices {
                let id = state.new_id();
                state.devices.insert(
                    id,
                    DeviceEntry {
                        index: sub,
                        parent: Some(root),
                        sub_devices: Vec::new(),
                    },
                );
                sub_devices.push(id);
            }
            state.devices.insert(
                root,
                DeviceEntry {
                    index,
                    parent: None,
                    sub_devices,
                },
            );
            state.root_devices.push(root);
        }
        log::info!(
            "sim: created instance with {} devices ({} sub-devices each)",
            config.devices,
            config.sub_devices
        );
        Ok(SimInstance {
            shared: Arc::new(SimShared {
                state: Mutex::new(state),
                signal: Condvar::new(),
                epoch: Instant::now(),
            }),
            config,
        })
    }
}

macro_rules! sim_handles {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
            pub struct $name(u64);
        )*
    };
}
sim_handles!(
    SimDriver,
    SimDevice,
    SimContext,
    SimQueue,
    SimList,
    SimEventPool,
    SimEvent,
    SimFence,
    SimModule,
    SimKernel,
    SimImage,
    SimSampler,
    SimPhysicalMem,
);

#[derive(Clone, Debug)]
pub struct SimConfig {
    pub devices: u32,
    pub sub_devices: u32,
    pub max_alloc_size: usize,
    pub extensions: Vec<ExtensionProperties>,
}
impl Default for SimConfig {
    fn default() -> Self {
        Self {
            devices: 1,
            sub_devices: 0,
            max_alloc_size: 1 << 30,
            extensions: vec![
                ExtensionProperties {
                    name: "ZE_extension_float_atomics".to_owned(),
                    version: 0x0001_0000,
                },
                ExtensionProperties {
                    name: "ZE_experimental_module_program".to_owned(),
                    version: 0x0001_0000,
                },
            ],
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("sim driver call failed: {0}")]
    Raw(ZeResult),
    #[error("failed to spawn a sim worker thread: {0}")]
    Spawn(String),
}
impl crate::Error<Sim> for SimError {
    fn result(&self) -> ZeResult {
        match self {
            Self::Raw(r) => *r,
            Self::Spawn(_) => ZeResult::ErrorOutOfHostMemory,
        }
    }
}

fn fail<T>(result: ZeResult) -> Result<T, SimError> {
    Err(SimError::Raw(result))
}

/// Counts of objects currently alive, used to check for leaks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimLiveObjects {
    pub contexts: usize,
    pub queues: usize,
    pub lists: usize,
    pub event_pools: usize,
    pub events: usize,
    pub fences: usize,
    pub modules: usize,
    pub kernels: usize,
    pub images: usize,
    pub samplers: usize,
    pub allocations: usize,
    pub physical_memory: usize,
}

struct DeviceEntry {
    index: u32,
    parent: Option<u64>,
    sub_devices: Vec<u64>,
}
pub(crate) enum ListKind {
    Regular { closed: bool },
    Immediate,
}
pub(crate) struct ListEntry {
    context: u64,
    pub ordinal: u32,
    pub kind: ListKind,
    pub ops: Vec<Op>,
}
struct QueueEntry {
    context: u64,
    ordinal: u32,
}
pub(crate) struct Lane {
    synchronous: bool,
    pub pending: u64,
    pub failed: bool,
    sender: Option<mpsc::Sender<Batch>>,
    worker: Option<JoinHandle<()>>,
}
struct EventPoolEntry {
    desc: EventPoolDesc,
    used: Vec<bool>,
    /// Per slot state. Empty for pools opened from an IPC handle, whose events use the slots of
    /// `source`.
    signalled: Vec<bool>,
    source: Option<u64>,
    ipc_opens: u32,
}
pub(crate) struct EventEntry {
    pool: u64,
    index: u32,
}
pub(crate) struct FenceEntry {
    queue: u64,
    pub signalled: bool,
}
struct ModuleEntry {
    exposed: Option<HashSet<String>>,
}
pub(crate) struct KernelEntry {
    module: u64,
    pub name: String,
    pub func: Arc<RegisteredKernel>,
    pub group_size: [u32; 3],
    pub args: Vec<Option<Vec<u8>>>,
}
pub(crate) struct ImageEntry {
    pub desc: ImageDesc,
    pub data: Vec<u8>,
}
struct PhysicalEntry {
    context: u64,
    size: usize,
    mappings: u32,
}

pub(crate) struct SimState {
    next_id: u64,
    shutdown: bool,
    root_devices: Vec<u64>,
    devices: HashMap<u64, DeviceEntry>,
    contexts: HashSet<u64>,
    memory: MemoryRegistry,
    queues: HashMap<u64, QueueEntry>,
    pub lists: HashMap<u64, ListEntry>,
    pub lanes: HashMap<u64, Lane>,
    event_pools: HashMap<u64, EventPoolEntry>,
    pub events: HashMap<u64, EventEntry>,
    pub fences: HashMap<u64, FenceEntry>,
    modules: HashMap<u64, ModuleEntry>,
    pub kernels: HashMap<u64, KernelEntry>,
    pub images: HashMap<u64, ImageEntry>,
    samplers: HashMap<u64, SamplerDesc>,
    physical: HashMap<u64, PhysicalEntry>,
    registered: HashMap<String, Arc<RegisteredKernel>>,
}
impl SimState {
    fn new(max_alloc_size: usize) -> Self {
        Self {
            next_id: 0,
            shutdown: false,
            root_devices: Vec::new(),
            devices: HashMap::new(),
            contexts: HashSet::new(),
            memory: MemoryRegistry::new(max_alloc_size),
            queues: HashMap::new(),
            lists: HashMap::new(),
            lanes: HashMap::new(),
            event_pools: HashMap::new(),
            events: HashMap::new(),
            fences: HashMap::new(),
            modules: HashMap::new(),
            kernels: HashMap::new(),
            images: HashMap::new(),
            samplers: HashMap::new(),
            physical: HashMap::new(),
            registered: HashMap::new(),
        }
    }
    fn new_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
    pub(crate) fn queue_group(&self, ordinal: u32) -> Result<CommandQueueGroupProperties, SimError> {
        queue_groups()
            .get(ordinal as usize)
            .copied()
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidArgument))
    }
    pub(crate) fn check_device(&self, device: SimDevice) -> Result<(), SimError> {
        if self.devices.contains_key(&device.0) {
            Ok(())
        } else {
            fail(ZeResult::ErrorInvalidNullHandle)
        }
    }
    /// The pool owning the state of an event, and the event's slot in it.
    fn event_slot(&self, event: u64) -> Option<(u64, usize)> {
        let entry = self.events.get(&event)?;
        let pool = self.event_pools.get(&entry.pool)?;
        Some((pool.source.unwrap_or(entry.pool), entry.index as usize))
    }
    /// `None` once the event is destroyed.
    pub(crate) fn event_signalled(&self, event: u64) -> Option<bool> {
        let (pool, index) = self.event_slot(event)?;
        self.event_pools.get(&pool)?.signalled.get(index).copied()
    }
    pub(crate) fn set_event_signalled(&mut self, event: u64, signalled: bool) -> bool {
        let Some((pool, index)) = self.event_slot(event) else {
            return false;
        };
        match self
            .event_pools
            .get_mut(&pool)
            .and_then(|p| p.signalled.get_mut(index))
        {
            Some(slot) => {
                *slot = signalled;
                true
            }
            None => false,
        }
    }
    fn check_context(&self, context: SimContext) -> Result<(), SimError> {
        if self.contexts.contains(&context.0) {
            Ok(())
        } else {
            fail(ZeResult::ErrorInvalidNullHandle)
        }
    }
    /// Descriptors of two images that are about to be copied between.
    pub(crate) fn image_pair(&self, dst: u64, src: u64) -> Result<(ImageDesc, ImageDesc), SimError> {
        let get = |id| {
            self.images
                .get(&id)
                .map(|i: &ImageEntry| i.desc)
                .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))
        };
        let (d, s) = (get(dst)?, get(src)?);
        if d.texel_size != s.texel_size {
            return fail(ZeResult::ErrorUnsupportedImageFormat);
        }
        Ok((d, s))
    }
}

fn queue_groups() -> [CommandQueueGroupProperties; 2] {
    [
        CommandQueueGroupProperties {
            flags: CommandQueueGroupFlags::COMPUTE
                | CommandQueueGroupFlags::COPY
                | CommandQueueGroupFlags::COOPERATIVE_KERNELS,
            max_memory_fill_pattern_size: 128,
            num_queues: 4,
        },
        CommandQueueGroupProperties {
            flags: CommandQueueGroupFlags::COPY,
            max_memory_fill_pattern_size: 4,
            num_queues: 2,
        },
    ]
}

pub(crate) struct SimShared {
    pub state: Mutex<SimState>,
    pub signal: Condvar,
    pub epoch: Instant,
}
impl SimShared {
    /// Blocks until `done` holds or the timeout (in nanoseconds) runs out.
    fn wait_until(
        &self,
        state: &mut MutexGuard<'_, SimState>,
        timeout: u64,
        mut done: impl FnMut(&SimState) -> bool,
    ) -> SyncStatus {
        if done(state) {
            return SyncStatus::Ready;
        }
        if timeout == 0 {
            return SyncStatus::NotReady;
        }
        let deadline = if timeout == TIMEOUT_INFINITE {
            None
        } else {
            Instant::now().checked_add(Duration::from_nanos(timeout))
        };
        loop {
            match deadline {
                Some(deadline) => {
                    if self.signal.wait_until(state, deadline).timed_out() {
                        return if done(state) {
                            SyncStatus::Ready
                        } else {
                            SyncStatus::NotReady
                        };
                    }
                }
                None => self.signal.wait(state),
            }
            if done(state) {
                return SyncStatus::Ready;
            }
        }
    }
}

pub struct SimInstance {
    shared: Arc<SimShared>,
    config: SimConfig,
}
impl std::fmt::Debug for SimInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimInstance")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
impl SimInstance {
    fn state(&self) -> MutexGuard<'_, SimState> {
        self.shared.state.lock()
    }
    /// Registers a host callback that modules can expose as a kernel named `name`. `arg_sizes`
    /// gives the byte size of each argument, in order.
    pub fn register_kernel(
        &self,
        name: &str,
        arg_sizes: &[usize],
        func: impl Fn(&SimKernelLaunch) + Send + Sync + 'static,
    ) {
        self.state().registered.insert(
            name.to_owned(),
            Arc::new(RegisteredKernel {
                arg_sizes: arg_sizes.to_vec(),
                func: Box::new(func),
            }),
        );
    }
    /// The descriptor a live sampler was created with.
    pub fn sampler_desc(&self, sampler: SimSampler) -> Option<SamplerDesc> {
        self.state().samplers.get(&sampler.0).copied()
    }
    pub fn live_objects(&self) -> SimLiveObjects {
        let state = self.state();
        SimLiveObjects {
            contexts: state.contexts.len(),
            queues: state.queues.len(),
            lists: state.lists.len(),
            event_pools: state.event_pools.len(),
            events: state.events.len(),
            fences: state.fences.len(),
            modules: state.modules.len(),
            kernels: state.kernels.len(),
            images: state.images.len(),
            samplers: state.samplers.len(),
            allocations: state.memory.live_allocations(),
            physical_memory: state.physical.len(),
        }
    }
    fn create_lane(&self, state: &mut SimState, id: u64, mode: CommandQueueMode) -> Result<(), SimError> {
        let synchronous = mode == CommandQueueMode::Synchronous;
        let (sender, worker) = if synchronous {
            (None, None)
        } else {
            let (sender, worker) = exec::spawn_worker(self.shared.clone(), id)
                .map_err(|e| SimError::Spawn(e.to_string()))?;
            (Some(sender), Some(worker))
        };
        state.lanes.insert(
            id,
            Lane {
                synchronous,
                pending: 0,
                failed: false,
                sender,
                worker,
            },
        );
        Ok(())
    }
    fn destroy_lane(&self, state: &mut SimState, id: u64) {
        if let Some(mut lane) = state.lanes.remove(&id) {
            drop(lane.sender.take());
            if let Some(worker) = lane.worker.take() {
                if lane.pending == 0 {
                    // The worker exits as soon as it sees the closed channel
                    let _ = worker.join();
                } else {
                    log::warn!("sim: lane {id} destroyed with {} batches pending", lane.pending);
                }
            }
        }
    }
    /// Hands a batch to its lane. Synchronous lanes run it before returning.
    fn submit(&self, mut state: MutexGuard<'_, SimState>, batch: Batch) -> Result<(), SimError> {
        let lane = state
            .lanes
            .get_mut(&batch.lane)
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))?;
        if lane.failed {
            return fail(ZeResult::ErrorDeviceLost);
        }
        lane.pending += 1;
        if lane.synchronous {
            drop(state);
            let ok = exec::run_batch(&self.shared, &batch);
            exec::complete_batch(&self.shared, &batch, ok);
            return if ok { Ok(()) } else { fail(ZeResult::ErrorDeviceLost) };
        }
        let sent = lane.sender.as_ref().map(|s| s.send(batch));
        if !matches!(sent, Some(Ok(()))) {
            lane.pending -= 1;
            lane.failed = true;
            return fail(ZeResult::ErrorDeviceLost);
        }
        Ok(())
    }
    fn synchronize_lane(&self, id: u64, timeout: u64) -> Result<SyncStatus, SimError> {
        let mut state = self.state();
        if !state.lanes.contains_key(&id) {
            return fail(ZeResult::ErrorInvalidNullHandle);
        }
        let status = self.shared.wait_until(&mut state, timeout, |s| {
            s.lanes.get(&id).is_none_or(|l| l.pending == 0)
        });
        if state.lanes.get(&id).is_some_and(|l| l.failed) {
            return fail(ZeResult::ErrorDeviceLost);
        }
        Ok(status)
    }
    fn alloc_device_checked(
        &self,
        context: SimContext,
        ty: MemoryType,
        device: Option<SimDevice>,
        size: usize,
        alignment: usize,
    ) -> Result<DevicePtr, SimError> {
        let mut state = self.state();
        state.check_context(context)?;
        if let Some(device) = device {
            state.check_device(device)?;
        }
        state
            .memory
            .allocate(context.0, ty, device.map(|d| d.0), size, alignment)
    }
}
impl Drop for SimInstance {
    fn drop(&mut self) {
        let lanes: Vec<Lane> = {
            let mut state = self.state();
            state.shutdown = true;
            state.lanes.drain().map(|(_, lane)| lane).collect()
        };
        self.shared.signal.notify_all();
        for mut lane in lanes {
            drop(lane.sender.take());
            if let Some(worker) = lane.worker.take() {
                let _ = worker.join();
            }
        }
    }
}

impl DriverInstance<Sim> for SimInstance {
    fn backend_name(&self) -> &'static str {
        "sim"
    }

    fn drivers(&self) -> Result<Vec<SimDriver>, SimError> {
        Ok(vec![SimDriver(0)])
    }
    fn driver_properties(&self, driver: SimDriver) -> Result<DriverProperties, SimError> {
        if driver.0 != 0 {
            return fail(ZeResult::ErrorInvalidNullHandle);
        }
        let mut uuid = [0u8; 16];
        uuid[..8].copy_from_slice(b"lzt-sim\0");
        Ok(DriverProperties {
            uuid,
            driver_version: 1,
        })
    }
    fn driver_api_version(&self, _driver: SimDriver) -> Result<ApiVersion, SimError> {
        Ok(ApiVersion { major: 1, minor: 6 })
    }
    fn driver_extension_properties(
        &self,
        _driver: SimDriver,
    ) -> Result<Vec<ExtensionProperties>, SimError> {
        Ok(self.config.extensions.clone())
    }

    fn devices(&self, _driver: SimDriver) -> Result<Vec<SimDevice>, SimError> {
        Ok(self.state().root_devices.iter().map(|d| SimDevice(*d)).collect())
    }
    fn sub_devices(&self, device: SimDevice) -> Result<Vec<SimDevice>, SimError> {
        let state = self.state();
        let entry = state
            .devices
            .get(&device.0)
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))?;
        Ok(entry.sub_devices.iter().map(|d| SimDevice(*d)).collect())
    }
    fn device_properties(&self, device: SimDevice) -> Result<DeviceProperties, SimError> {
        let state = self.state();
        let entry = state
            .devices
            .get(&device.0)
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))?;
        let mut uuid = [0u8; 16];
        uuid[..8].copy_from_slice(&device.0.to_le_bytes());
        Ok(DeviceProperties {
            ty: DeviceType::Gpu,
            vendor_id: 0x8086,
            device_id: 0x5a5a,
            is_subdevice: entry.parent.is_some(),
            subdevice_id: if entry.parent.is_some() { entry.index } else { 0 },
            max_mem_alloc_size: self.config.max_alloc_size as u64,
            max_hardware_contexts: 64,
            max_command_queue_priority: 2,
            timer_resolution: 1,
            timestamp_valid_bits: 64,
            uuid,
            name: format!("lzt sim device {}", entry.index),
        })
    }
    fn command_queue_group_properties(
        &self,
        device: SimDevice,
    ) -> Result<Vec<CommandQueueGroupProperties>, SimError> {
        self.state().check_device(device)?;
        Ok(queue_groups().to_vec())
    }
    fn device_compute_properties(
        &self,
        device: SimDevice,
    ) -> Result<DeviceComputeProperties, SimError> {
        self.state().check_device(device)?;
        Ok(DeviceComputeProperties {
            max_total_group_size: SIM_MAX_GROUP_SIZE,
            max_group_size: [SIM_MAX_GROUP_SIZE; 3],
            max_group_count: [u32::MAX; 3],
            max_shared_local_memory: 64 * 1024,
            sub_group_sizes: vec![8, 16, 32],
        })
    }
    fn device_memory_properties(
        &self,
        device: SimDevice,
    ) -> Result<Vec<DeviceMemoryProperties>, SimError> {
        self.state().check_device(device)?;
        Ok(vec![DeviceMemoryProperties {
            max_clock_rate: 1000,
            max_bus_width: 64,
            total_size: self.config.max_alloc_size as u64,
            name: "host".to_owned(),
        }])
    }
    fn device_cache_properties(
        &self,
        device: SimDevice,
    ) -> Result<Vec<DeviceCacheProperties>, SimError> {
        self.state().check_device(device)?;
        Ok(vec![DeviceCacheProperties {
            user_control: false,
            cache_size: 1 << 20,
        }])
    }
    fn device_can_access_peer(&self, device: SimDevice, peer: SimDevice) -> Result<bool, SimError> {
        let state = self.state();
        state.check_device(device)?;
        state.check_device(peer)?;
        // All simulated memory lives in host RAM
        Ok(true)
    }

    fn create_context(&self, driver: SimDriver) -> Result<SimContext, SimError> {
        if driver.0 != 0 {
            return fail(ZeResult::ErrorInvalidNullHandle);
        }
        let mut state = self.state();
        let id = state.new_id();
        state.contexts.insert(id);
        Ok(SimContext(id))
    }
    unsafe fn destroy_context(&self, context: SimContext) -> Result<(), SimError> {
        if self.state().contexts.remove(&context.0) {
            Ok(())
        } else {
            fail(ZeResult::ErrorInvalidNullHandle)
        }
    }

    unsafe fn mem_alloc_host(
        &self,
        context: SimContext,
        _desc: &HostMemAllocDesc,
        size: usize,
        alignment: usize,
    ) -> Result<DevicePtr, SimError> {
        self.alloc_device_checked(context, MemoryType::Host, None, size, alignment)
    }
    unsafe fn mem_alloc_device(
        &self,
        context: SimContext,
        _desc: &DeviceMemAllocDesc,
        size: usize,
        alignment: usize,
        device: SimDevice,
    ) -> Result<DevicePtr, SimError> {
        self.alloc_device_checked(context, MemoryType::Device, Some(device), size, alignment)
    }
    unsafe fn mem_alloc_shared(
        &self,
        context: SimContext,
        _device_desc: &DeviceMemAllocDesc,
        _host_desc: &HostMemAllocDesc,
        size: usize,
        alignment: usize,
        device: Option<SimDevice>,
    ) -> Result<DevicePtr, SimError> {
        self.alloc_device_checked(context, MemoryType::Shared, device, size, alignment)
    }
    unsafe fn mem_free(&self, context: SimContext, ptr: DevicePtr) -> Result<(), SimError> {
        let mut state = self.state();
        state.check_context(context)?;
        unsafe { state.memory.free(context.0, ptr) }
    }
    fn mem_alloc_properties(
        &self,
        context: SimContext,
        ptr: DevicePtr,
    ) -> Result<(MemoryAllocationProperties, Option<SimDevice>), SimError> {
        let state = self.state();
        state.check_context(context)?;
        if let Some((_, alloc)) = state.memory.find(ptr) {
            return Ok((
                MemoryAllocationProperties {
                    ty: alloc.ty,
                    id: alloc.id,
                    page_size: 4096,
                },
                alloc.device.map(SimDevice),
            ));
        }
        let ty = if state.memory.is_mapped_virtual(ptr) {
            MemoryType::Device
        } else {
            MemoryType::Unknown
        };
        Ok((
            MemoryAllocationProperties {
                ty,
                id: 0,
                page_size: SIM_PAGE_SIZE as u64,
            },
            None,
        ))
    }
    fn mem_get_ipc_handle(
        &self,
        context: SimContext,
        ptr: DevicePtr,
    ) -> Result<IpcMemHandle, SimError> {
        let state = self.state();
        state.check_context(context)?;
        state.memory.ipc_handle(ptr)
    }
    unsafe fn mem_open_ipc_handle(
        &self,
        context: SimContext,
        device: SimDevice,
        handle: IpcMemHandle,
    ) -> Result<DevicePtr, SimError> {
        let mut state = self.state();
        state.check_context(context)?;
        state.check_device(device)?;
        state.memory.open_ipc_handle(&handle)
    }
    unsafe fn mem_close_ipc_handle(
        &self,
        context: SimContext,
        ptr: DevicePtr,
    ) -> Result<(), SimError> {
        let mut state = self.state();
        state.check_context(context)?;
        state.memory.close_ipc_handle(ptr)
    }

    fn virtual_mem_query_page_size(
        &self,
        context: SimContext,
        device: SimDevice,
        size: usize,
    ) -> Result<usize, SimError> {
        let state = self.state();
        state.check_context(context)?;
        state.check_device(device)?;
        if size == 0 {
            return fail(ZeResult::ErrorUnsupportedSize);
        }
        Ok(SIM_PAGE_SIZE)
    }
    unsafe fn virtual_mem_reserve(
        &self,
        context: SimContext,
        _start: DevicePtr,
        size: usize,
    ) -> Result<DevicePtr, SimError> {
        let mut state = self.state();
        state.check_context(context)?;
        state.memory.reserve(context.0, size)
    }
    unsafe fn virtual_mem_free(
        &self,
        context: SimContext,
        ptr: DevicePtr,
        size: usize,
    ) -> Result<(), SimError> {
        let mut state = self.state();
        state.check_context(context)?;
        unsafe { state.memory.free_reservation(context.0, ptr, size) }
    }
    fn physical_mem_create(
        &self,
        context: SimContext,
        device: SimDevice,
        size: usize,
    ) -> Result<SimPhysicalMem, SimError> {
        let mut state = self.state();
        state.check_context(context)?;
        state.check_device(device)?;
        if size == 0 || size % SIM_PAGE_SIZE != 0 {
            return fail(ZeResult::ErrorUnsupportedSize);
        }
        let id = state.new_id();
        state.physical.insert(
            id,
            PhysicalEntry {
                context: context.0,
                size,
                mappings: 0,
            },
        );
        Ok(SimPhysicalMem(id))
    }
    unsafe fn physical_mem_destroy(
        &self,
        context: SimContext,
        memory: SimPhysicalMem,
    ) -> Result<(), SimError> {
        let mut state = self.state();
        match state.physical.get(&memory.0) {
            Some(p) if p.context == context.0 && p.mappings == 0 => (),
            Some(p) if p.context == context.0 => return fail(ZeResult::ErrorHandleObjectInUse),
            _ => return fail(ZeResult::ErrorInvalidNullHandle),
        }
        state.physical.remove(&memory.0);
        Ok(())
    }
    unsafe fn virtual_mem_map(
        &self,
        context: SimContext,
        ptr: DevicePtr,
        size: usize,
        memory: SimPhysicalMem,
        offset: usize,
        access: MemoryAccess,
    ) -> Result<(), SimError> {
        let mut state = self.state();
        state.check_context(context)?;
        let physical_size = match state.physical.get(&memory.0) {
            Some(p) if p.context == context.0 => p.size,
            _ => return fail(ZeResult::ErrorInvalidNullHandle),
        };
        state
            .memory
            .map(ptr, size, memory.0, physical_size, offset, access)?;
        if let Some(p) = state.physical.get_mut(&memory.0) {
            p.mappings += 1;
        }
        Ok(())
    }
    unsafe fn virtual_mem_unmap(
        &self,
        context: SimContext,
        ptr: DevicePtr,
        size: usize,
    ) -> Result<(), SimError> {
        let mut state = self.state();
        state.check_context(context)?;
        let physical = state.memory.unmap(ptr, size)?;
        if let Some(p) = state.physical.get_mut(&physical) {
            p.mappings -= 1;
        }
        Ok(())
    }
    unsafe fn virtual_mem_set_access(
        &self,
        context: SimContext,
        ptr: DevicePtr,
        size: usize,
        access: MemoryAccess,
    ) -> Result<(), SimError> {
        let mut state = self.state();
        state.check_context(context)?;
        state.memory.set_access(context.0, ptr, size, access)
    }
    fn virtual_mem_get_access(
        &self,
        context: SimContext,
        ptr: DevicePtr,
        size: usize,
    ) -> Result<(MemoryAccess, usize), SimError> {
        let mut state = self.state();
        state.check_context(context)?;
        state.memory.get_access(context.0, ptr, size)
    }

    fn create_command_queue(
        &self,
        context: SimContext,
        device: SimDevice,
        desc: &CommandQueueDesc,
    ) -> Result<SimQueue, SimError> {
        let mut state = self.state();
        state.check_context(context)?;
        state.check_device(device)?;
        let group = state.queue_group(desc.ordinal)?;
        if desc.index >= group.num_queues {
            return fail(ZeResult::ErrorInvalidArgument);
        }
        let id = state.new_id();
        self.create_lane(&mut state, id, desc.mode)?;
        state.queues.insert(
            id,
            QueueEntry {
                context: context.0,
                ordinal: desc.ordinal,
            },
        );
        log::debug!("sim: created {:?} queue {id} on ordinal {}", desc.mode, desc.ordinal);
        Ok(SimQueue(id))
    }
    unsafe fn destroy_command_queue(&self, queue: SimQueue) -> Result<(), SimError> {
        let mut state = self.state();
        if state.queues.remove(&queue.0).is_none() {
            return fail(ZeResult::ErrorInvalidNullHandle);
        }
        state.fences.retain(|_, f| f.queue != queue.0);
        self.destroy_lane(&mut state, queue.0);
        Ok(())
    }
    unsafe fn execute_command_lists(
        &self,
        queue: SimQueue,
        lists: &[SimList],
        fence: Option<SimFence>,
    ) -> Result<(), SimError> {
        let mut state = self.state();
        let queue_entry = state
            .queues
            .get(&queue.0)
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))?;
        let (queue_context, queue_ordinal) = (queue_entry.context, queue_entry.ordinal);
        let mut ops = Vec::new();
        for list in lists {
            let entry = state
                .lists
                .get(&list.0)
                .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))?;
            if entry.context != queue_context || entry.ordinal != queue_ordinal {
                return fail(ZeResult::ErrorInvalidCommandListType);
            }
            match entry.kind {
                ListKind::Regular { closed: true } => ops.extend(entry.ops.iter().cloned()),
                ListKind::Regular { closed: false } => {
                    log::warn!("sim: list {} submitted without being closed", list.0);
                    return fail(ZeResult::ErrorInvalidArgument);
                }
                ListKind::Immediate => return fail(ZeResult::ErrorInvalidCommandListType),
            }
        }
        if let Some(fence) = fence {
            match state.fences.get_mut(&fence.0) {
                Some(f) if f.queue == queue.0 => f.signalled = false,
                _ => return fail(ZeResult::ErrorInvalidSynchronizationObject),
            }
        }
        self.submit(
            state,
            Batch {
                lane: queue.0,
                ops,
                fence: fence.map(|f| f.0),
            },
        )
    }
    fn synchronize_command_queue(
        &self,
        queue: SimQueue,
        timeout: u64,
    ) -> Result<SyncStatus, SimError> {
        self.synchronize_lane(queue.0, timeout)
    }

    fn create_command_list(
        &self,
        context: SimContext,
        device: SimDevice,
        desc: &CommandListDesc,
    ) -> Result<SimList, SimError> {
        let mut state = self.state();
        state.check_context(context)?;
        state.check_device(device)?;
        state.queue_group(desc.command_queue_group_ordinal)?;
        let id = state.new_id();
        state.lists.insert(
            id,
            ListEntry {
                context: context.0,
                ordinal: desc.command_queue_group_ordinal,
                kind: ListKind::Regular { closed: false },
                ops: Vec::new(),
            },
        );
        Ok(SimList(id))
    }
    fn create_immediate_command_list(
        &self,
        context: SimContext,
        device: SimDevice,
        desc: &CommandQueueDesc,
    ) -> Result<SimList, SimError> {
        let mut state = self.state();
        state.check_context(context)?;
        state.check_device(device)?;
        let group = state.queue_group(desc.ordinal)?;
        if desc.index >= group.num_queues {
            return fail(ZeResult::ErrorInvalidArgument);
        }
        let id = state.new_id();
        self.create_lane(&mut state, id, desc.mode)?;
        state.lists.insert(
            id,
            ListEntry {
                context: context.0,
                ordinal: desc.ordinal,
                kind: ListKind::Immediate,
                ops: Vec::new(),
            },
        );
        Ok(SimList(id))
    }
    fn close_command_list(&self, list: SimList) -> Result<(), SimError> {
        let mut state = self.state();
        let entry = state
            .lists
            .get_mut(&list.0)
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))?;
        if let ListKind::Regular { closed } = &mut entry.kind {
            *closed = true;
        }
        Ok(())
    }
    unsafe fn reset_command_list(&self, list: SimList) -> Result<(), SimError> {
        let mut state = self.state();
        let entry = state
            .lists
            .get_mut(&list.0)
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))?;
        if let ListKind::Regular { closed } = &mut entry.kind {
            *closed = false;
            entry.ops.clear();
        }
        Ok(())
    }
    unsafe fn destroy_command_list(&self, list: SimList) -> Result<(), SimError> {
        let mut state = self.state();
        let entry = state
            .lists
            .remove(&list.0)
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))?;
        if matches!(entry.kind, ListKind::Immediate) {
            self.destroy_lane(&mut state, list.0);
        }
        Ok(())
    }
    unsafe fn append(
        &self,
        list: SimList,
        command: ListCommand<'_, Sim>,
        sync: AppendSync<'_, Sim>,
    ) -> Result<(), SimError> {
        let mut state = self.state();
        let entry = state
            .lists
            .get(&list.0)
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))?;
        let ops = exec::lower(&state, entry, command, sync)?;
        let immediate = matches!(entry.kind, ListKind::Immediate);
        if immediate {
            return self.submit(
                state,
                Batch {
                    lane: list.0,
                    ops,
                    fence: None,
                },
            );
        }
        let Some(entry) = state.lists.get_mut(&list.0) else {
            return fail(ZeResult::ErrorInvalidNullHandle);
        };
        match entry.kind {
            ListKind::Regular { closed: true } => {
                log::warn!("sim: append to closed list {} ignored", list.0);
            }
            _ => entry.ops.extend(ops),
        }
        Ok(())
    }
    fn synchronize_command_list_host(
        &self,
        list: SimList,
        timeout: u64,
    ) -> Result<SyncStatus, SimError> {
        let immediate = match self.state().lists.get(&list.0) {
            Some(entry) => matches!(entry.kind, ListKind::Immediate),
            None => return fail(ZeResult::ErrorInvalidNullHandle),
        };
        if !immediate {
            return fail(ZeResult::ErrorInvalidArgument);
        }
        self.synchronize_lane(list.0, timeout)
    }

    fn create_event_pool(
        &self,
        context: SimContext,
        desc: &EventPoolDesc,
        devices: &[SimDevice],
    ) -> Result<SimEventPool, SimError> {
        let mut state = self.state();
        state.check_context(context)?;
        for device in devices {
            state.check_device(*device)?;
        }
        if desc.count == 0 {
            return fail(ZeResult::ErrorInvalidSize);
        }
        let id = state.new_id();
        state.event_pools.insert(
            id,
            EventPoolEntry {
                desc: *desc,
                used: vec![false; desc.count as usize],
                signalled: vec![false; desc.count as usize],
                source: None,
                ipc_opens: 0,
            },
        );
        Ok(SimEventPool(id))
    }
    unsafe fn destroy_event_pool(&self, pool: SimEventPool) -> Result<(), SimError> {
        let mut state = self.state();
        let entry = state
            .event_pools
            .get(&pool.0)
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))?;
        if entry.source.is_some() {
            return fail(ZeResult::ErrorInvalidArgument);
        }
        if entry.ipc_opens > 0 || entry.used.iter().any(|u| *u) {
            return fail(ZeResult::ErrorHandleObjectInUse);
        }
        state.event_pools.remove(&pool.0);
        Ok(())
    }
    fn create_event(&self, pool: SimEventPool, desc: &EventDesc) -> Result<SimEvent, SimError> {
        let mut state = self.state();
        let entry = state
            .event_pools
            .get_mut(&pool.0)
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))?;
        match entry.used.get_mut(desc.index as usize) {
            None => return fail(ZeResult::ErrorInvalidArgument),
            Some(true) => return fail(ZeResult::ErrorHandleObjectInUse),
            Some(slot) => *slot = true,
        }
        // Events of an opened pool see the exporter's state as is
        if let Some(flag) = entry.signalled.get_mut(desc.index as usize) {
            *flag = false;
        }
        let id = state.new_id();
        state.events.insert(
            id,
            EventEntry {
                pool: pool.0,
                index: desc.index,
            },
        );
        Ok(SimEvent(id))
    }
    unsafe fn destroy_event(&self, event: SimEvent) -> Result<(), SimError> {
        let mut state = self.state();
        let entry = state
            .events
            .remove(&event.0)
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))?;
        if let Some(slot) = state
            .event_pools
            .get_mut(&entry.pool)
            .and_then(|p| p.used.get_mut(entry.index as usize))
        {
            *slot = false;
        }
        drop(state);
        // Waiters treat destroyed events as signalled
        self.shared.signal.notify_all();
        Ok(())
    }
    fn event_host_signal(&self, event: SimEvent) -> Result<(), SimError> {
        let mut state = self.state();
        if !state.set_event_signalled(event.0, true) {
            return fail(ZeResult::ErrorInvalidNullHandle);
        }
        drop(state);
        self.shared.signal.notify_all();
        Ok(())
    }
    fn event_host_synchronize(&self, event: SimEvent, timeout: u64) -> Result<SyncStatus, SimError> {
        let mut state = self.state();
        let pool = state
            .events
            .get(&event.0)
            .map(|e| e.pool)
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))?;
        let host_visible = state
            .event_pools
            .get(&pool)
            .is_some_and(|p| p.desc.flags.contains(EventPoolFlags::HOST_VISIBLE));
        if !host_visible {
            return fail(ZeResult::ErrorInvalidArgument);
        }
        Ok(self.shared.wait_until(&mut state, timeout, |s| {
            s.event_signalled(event.0).unwrap_or(true)
        }))
    }
    fn event_query_status(&self, event: SimEvent) -> Result<SyncStatus, SimError> {
        match self.state().event_signalled(event.0) {
            Some(true) => Ok(SyncStatus::Ready),
            Some(false) => Ok(SyncStatus::NotReady),
            None => fail(ZeResult::ErrorInvalidNullHandle),
        }
    }
    fn event_host_reset(&self, event: SimEvent) -> Result<(), SimError> {
        if self.state().set_event_signalled(event.0, false) {
            Ok(())
        } else {
            fail(ZeResult::ErrorInvalidNullHandle)
        }
    }
    fn event_pool_get_ipc_handle(&self, pool: SimEventPool) -> Result<IpcEventPoolHandle, SimError> {
        let state = self.state();
        let entry = state
            .event_pools
            .get(&pool.0)
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))?;
        if entry.source.is_some() || !entry.desc.flags.contains(EventPoolFlags::IPC) {
            return fail(ZeResult::ErrorInvalidArgument);
        }
        let mut handle = IpcEventPoolHandle::default();
        handle.0[0..8].copy_from_slice(EVENT_POOL_IPC_MAGIC);
        handle.0[8..16].copy_from_slice(&pool.0.to_le_bytes());
        Ok(handle)
    }
    unsafe fn event_pool_open_ipc_handle(
        &self,
        context: SimContext,
        handle: IpcEventPoolHandle,
    ) -> Result<SimEventPool, SimError> {
        let mut state = self.state();
        state.check_context(context)?;
        if &handle.0[0..8] != EVENT_POOL_IPC_MAGIC {
            return fail(ZeResult::ErrorInvalidArgument);
        }
        let mut id_bytes = [0u8; 8];
        id_bytes.copy_from_slice(&handle.0[8..16]);
        let source = u64::from_le_bytes(id_bytes);
        let desc = match state.event_pools.get_mut(&source) {
            Some(entry) if entry.source.is_none() => {
                entry.ipc_opens += 1;
                entry.desc
            }
            _ => return fail(ZeResult::ErrorInvalidArgument),
        };
        let id = state.new_id();
        state.event_pools.insert(
            id,
            EventPoolEntry {
                desc,
                used: vec![false; desc.count as usize],
                signalled: Vec::new(),
                source: Some(source),
                ipc_opens: 0,
            },
        );
        Ok(SimEventPool(id))
    }
    unsafe fn event_pool_close_ipc_handle(&self, pool: SimEventPool) -> Result<(), SimError> {
        let mut state = self.state();
        let source = match state.event_pools.get(&pool.0) {
            Some(entry) if entry.used.iter().any(|u| *u) => {
                return fail(ZeResult::ErrorHandleObjectInUse);
            }
            Some(entry) => entry.source.ok_or(SimError::Raw(ZeResult::ErrorInvalidArgument))?,
            None => return fail(ZeResult::ErrorInvalidNullHandle),
        };
        state.event_pools.remove(&pool.0);
        if let Some(entry) = state.event_pools.get_mut(&source) {
            entry.ipc_opens -= 1;
        }
        Ok(())
    }

    fn create_fence(&self, queue: SimQueue, desc: &FenceDesc) -> Result<SimFence, SimError> {
        let mut state = self.state();
        if !state.queues.contains_key(&queue.0) {
            return fail(ZeResult::ErrorInvalidNullHandle);
        }
        let id = state.new_id();
        state.fences.insert(
            id,
            FenceEntry {
                queue: queue.0,
                signalled: desc.flags.contains(FenceFlags::SIGNALED),
            },
        );
        Ok(SimFence(id))
    }
    unsafe fn destroy_fence(&self, fence: SimFence) -> Result<(), SimError> {
        match self.state().fences.remove(&fence.0) {
            Some(_) => Ok(()),
            None => fail(ZeResult::ErrorInvalidNullHandle),
        }
    }
    fn fence_host_synchronize(&self, fence: SimFence, timeout: u64) -> Result<SyncStatus, SimError> {
        let mut state = self.state();
        if !state.fences.contains_key(&fence.0) {
            return fail(ZeResult::ErrorInvalidNullHandle);
        }
        Ok(self.shared.wait_until(&mut state, timeout, |s| {
            s.fences.get(&fence.0).is_none_or(|f| f.signalled)
        }))
    }
    fn fence_query_status(&self, fence: SimFence) -> Result<SyncStatus, SimError> {
        match self.state().fences.get(&fence.0) {
            Some(f) if f.signalled => Ok(SyncStatus::Ready),
            Some(_) => Ok(SyncStatus::NotReady),
            None => fail(ZeResult::ErrorInvalidNullHandle),
        }
    }
    fn fence_reset(&self, fence: SimFence) -> Result<(), SimError> {
        match self.state().fences.get_mut(&fence.0) {
            Some(f) => {
                f.signalled = false;
                Ok(())
            }
            None => fail(ZeResult::ErrorInvalidNullHandle),
        }
    }

    fn create_module(
        &self,
        context: SimContext,
        device: SimDevice,
        desc: &ModuleDesc<'_>,
    ) -> Result<SimModule, SimError> {
        let mut state = self.state();
        state.check_context(context)?;
        state.check_device(device)?;
        match desc.format {
            ModuleFormat::Native => return fail(ZeResult::ErrorInvalidNativeBinary),
            ModuleFormat::IlSpirv => {
                if desc.input.len() < 4 || desc.input[..4] != SPIRV_MAGIC.to_le_bytes() {
                    return fail(ZeResult::ErrorModuleBuildFailure);
                }
            }
        }
        let exposed = desc.build_flags.and_then(parse_kernel_list);
        let id = state.new_id();
        state.modules.insert(id, ModuleEntry { exposed });
        Ok(SimModule(id))
    }
    unsafe fn destroy_module(&self, module: SimModule) -> Result<(), SimError> {
        let mut state = self.state();
        if !state.modules.contains_key(&module.0) {
            return fail(ZeResult::ErrorInvalidNullHandle);
        }
        if state.kernels.values().any(|k| k.module == module.0) {
            return fail(ZeResult::ErrorHandleObjectInUse);
        }
        state.modules.remove(&module.0);
        Ok(())
    }
    fn create_kernel(&self, module: SimModule, name: &str) -> Result<SimKernel, SimError> {
        let mut state = self.state();
        let entry = state
            .modules
            .get(&module.0)
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))?;
        if entry.exposed.as_ref().is_some_and(|e| !e.contains(name)) {
            return fail(ZeResult::ErrorInvalidKernelName);
        }
        let func = state
            .registered
            .get(name)
            .cloned()
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidKernelName))?;
        let id = state.new_id();
        state.kernels.insert(
            id,
            KernelEntry {
                module: module.0,
                name: name.to_owned(),
                args: vec![None; func.arg_sizes.len()],
                func,
                group_size: [1, 1, 1],
            },
        );
        Ok(SimKernel(id))
    }
    unsafe fn destroy_kernel(&self, kernel: SimKernel) -> Result<(), SimError> {
        match self.state().kernels.remove(&kernel.0) {
            Some(_) => Ok(()),
            None => fail(ZeResult::ErrorInvalidNullHandle),
        }
    }
    fn kernel_set_group_size(&self, kernel: SimKernel, size: [u32; 3]) -> Result<(), SimError> {
        let mut state = self.state();
        let entry = state
            .kernels
            .get_mut(&kernel.0)
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))?;
        let total = size.iter().map(|s| *s as u64).product::<u64>();
        if total == 0 || total > SIM_MAX_GROUP_SIZE as u64 {
            return fail(ZeResult::ErrorInvalidGroupSizeDimension);
        }
        entry.group_size = size;
        Ok(())
    }
    fn kernel_suggest_group_size(
        &self,
        kernel: SimKernel,
        global_size: [u32; 3],
    ) -> Result<[u32; 3], SimError> {
        if !self.state().kernels.contains_key(&kernel.0) {
            return fail(ZeResult::ErrorInvalidNullHandle);
        }
        Ok(suggest_group_size(global_size))
    }
    unsafe fn kernel_set_argument_value(
        &self,
        kernel: SimKernel,
        index: u32,
        value: &[u8],
    ) -> Result<(), SimError> {
        let mut state = self.state();
        let entry = state
            .kernels
            .get_mut(&kernel.0)
            .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))?;
        let Some(&expected) = entry.func.arg_sizes.get(index as usize) else {
            return fail(ZeResult::ErrorInvalidKernelArgumentIndex);
        };
        if value.len() != expected {
            return fail(ZeResult::ErrorInvalidKernelArgumentSize);
        }
        entry.args[index as usize] = Some(value.to_vec());
        Ok(())
    }

    fn create_image(
        &self,
        context: SimContext,
        device: SimDevice,
        desc: &ImageDesc,
    ) -> Result<SimImage, SimError> {
        let mut state = self.state();
        state.check_context(context)?;
        state.check_device(device)?;
        if ![1, 2, 4, 8, 16].contains(&desc.texel_size) {
            return fail(ZeResult::ErrorUnsupportedImageFormat);
        }
        let dims_ok = match desc.ty {
            ImageType::D1 => desc.height == 1 && desc.depth == 1,
            ImageType::D2 => desc.depth == 1,
            ImageType::D3 => true,
        };
        if !dims_ok || desc.width == 0 || desc.height == 0 || desc.depth == 0 {
            return fail(ZeResult::ErrorInvalidArgument);
        }
        if desc.width > u32::MAX as u64 || desc.byte_size() > self.config.max_alloc_size as u64 {
            return fail(ZeResult::ErrorUnsupportedSize);
        }
        let id = state.new_id();
        state.images.insert(
            id,
            ImageEntry {
                desc: *desc,
                data: vec![0; desc.byte_size() as usize],
            },
        );
        Ok(SimImage(id))
    }
    unsafe fn destroy_image(&self, image: SimImage) -> Result<(), SimError> {
        match self.state().images.remove(&image.0) {
            Some(_) => Ok(()),
            None => fail(ZeResult::ErrorInvalidNullHandle),
        }
    }

    fn create_sampler(
        &self,
        context: SimContext,
        device: SimDevice,
        desc: &SamplerDesc,
    ) -> Result<SimSampler, SimError> {
        let mut state = self.state();
        state.check_context(context)?;
        state.check_device(device)?;
        let id = state.new_id();
        state.samplers.insert(id, *desc);
        Ok(SimSampler(id))
    }
    unsafe fn destroy_sampler(&self, sampler: SimSampler) -> Result<(), SimError> {
        match self.state().samplers.remove(&sampler.0) {
            Some(_) => Ok(()),
            None => fail(ZeResult::ErrorInvalidNullHandle),
        }
    }
}

const EVENT_POOL_IPC_MAGIC: &[u8; 8] = b"LZTSIMEP";

/// First word of every SPIR-V binary.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Reads `-kernels=a,b,c` from module build flags.
fn parse_kernel_list(flags: &str) -> Option<HashSet<String>> {
    flags.split_whitespace().find_map(|flag| {
        flag.strip_prefix("-kernels=").map(|list| {
            list.split(',')
                .filter(|k| !k.is_empty())
                .map(str::to_owned)
                .collect()
        })
    })
}
