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
//! Recording and execution of list commands. Commands are lowered into owned [`Op`]s when
//! appended, then run in order by a lane (a queue or an immediate list).
use std::{
    panic::AssertUnwindSafe,
    sync::{Arc, mpsc},
    thread::JoinHandle,
};

use types::{CommandQueueGroupFlags, ImageDesc, ImageRegion, ZeResult};

use super::{
    ListEntry, ListKind, SimError, SimEvent, SimShared, SimState,
    kernel::{RegisteredKernel, SimKernelLaunch},
};
use crate::{AppendSync, DevicePtr, ListCommand};

/// Byte strides of a 3D box layout.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BoxLayout {
    pub row_pitch: usize,
    pub slice_pitch: usize,
}
impl BoxLayout {
    fn offset(&self, origin: [usize; 3], y: usize, z: usize) -> usize {
        origin[0] + (origin[1] + y) * self.row_pitch + (origin[2] + z) * self.slice_pitch
    }
    fn for_image(desc: &ImageDesc) -> Self {
        let row_pitch = desc.width as usize * desc.texel_size as usize;
        Self {
            row_pitch,
            slice_pitch: row_pitch * desc.height as usize,
        }
    }
    fn packed(region: &ImageRegion, texel: usize) -> Self {
        let row_pitch = region.width as usize * texel;
        Self {
            row_pitch,
            slice_pitch: row_pitch * region.height as usize,
        }
    }
}

/// A box copy, `x` origin and extent in bytes.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BoxCopy {
    pub src_layout: BoxLayout,
    pub src_origin: [usize; 3],
    pub dst_layout: BoxLayout,
    pub dst_origin: [usize; 3],
    pub extent: [usize; 3],
}
impl BoxCopy {
    /// # Safety
    /// * Both boxes must lie within memory valid for the respective pointer
    unsafe fn run(&self, src: *const u8, dst: *mut u8) {
        for z in 0..self.extent[2] {
            for y in 0..self.extent[1] {
                let s = self.src_layout.offset(self.src_origin, y, z);
                let d = self.dst_layout.offset(self.dst_origin, y, z);
                unsafe { std::ptr::copy(src.add(s), dst.add(d), self.extent[0]) };
            }
        }
    }
}

#[derive(Clone)]
pub(crate) struct KernelDispatch {
    pub kernel: Arc<RegisteredKernel>,
    pub launch: SimKernelLaunch,
}

#[derive(Clone)]
pub(crate) enum Recorded {
    Copy {
        dst: DevicePtr,
        src: DevicePtr,
        size: usize,
    },
    Fill {
        dst: DevicePtr,
        pattern: Vec<u8>,
        size: usize,
    },
    CopyRegion {
        dst: DevicePtr,
        src: DevicePtr,
        copy: BoxCopy,
    },
    Nop,
    Signal(u64),
    Wait(Vec<u64>),
    Reset(u64),
    Timestamp(DevicePtr),
    Kernel(KernelDispatch),
    ImageToImage {
        dst: u64,
        src: u64,
        copy: BoxCopy,
    },
    ImageToMemory {
        dst: DevicePtr,
        src: u64,
        copy: BoxCopy,
    },
    ImageFromMemory {
        dst: u64,
        src: DevicePtr,
        copy: BoxCopy,
    },
}

#[derive(Clone)]
pub(crate) struct Op {
    pub cmd: Recorded,
    pub signal: Option<u64>,
    pub wait: Vec<u64>,
}
impl Op {
    fn bare(cmd: Recorded) -> Self {
        Self {
            cmd,
            signal: None,
            wait: Vec::new(),
        }
    }
}

pub(crate) struct Batch {
    pub lane: u64,
    pub ops: Vec<Op>,
    pub fence: Option<u64>,
}

fn fail<T>(result: ZeResult) -> Result<T, SimError> {
    Err(SimError::Raw(result))
}

fn check_event(state: &SimState, event: SimEvent) -> Result<u64, SimError> {
    if state.events.contains_key(&event.0) {
        Ok(event.0)
    } else {
        fail(ZeResult::ErrorInvalidNullHandle)
    }
}

/// `origin + extent <= limit`, without overflowing.
fn span_fits(origin: u32, extent: u32, limit: u64) -> bool {
    origin as u64 + extent as u64 <= limit
}

fn check_image_region(desc: &ImageDesc, region: &ImageRegion) -> Result<(), SimError> {
    let fits = span_fits(region.origin_x, region.width, desc.width)
        && span_fits(region.origin_y, region.height, desc.height as u64)
        && span_fits(region.origin_z, region.depth, desc.depth as u64);
    if fits {
        Ok(())
    } else {
        fail(ZeResult::ErrorInvalidArgument)
    }
}

fn image_origin(region: &ImageRegion, texel: usize) -> [usize; 3] {
    [
        region.origin_x as usize * texel,
        region.origin_y as usize,
        region.origin_z as usize,
    ]
}

fn image_extent(region: &ImageRegion, texel: usize) -> [usize; 3] {
    [
        region.width as usize * texel,
        region.height as usize,
        region.depth as usize,
    ]
}

/// Builds the copy between an image region and tightly packed memory. `to_memory` selects the
/// direction.
fn image_memory_copy(
    state: &SimState,
    image: u64,
    region: Option<ImageRegion>,
    to_memory: bool,
) -> Result<BoxCopy, SimError> {
    let desc = state
        .images
        .get(&image)
        .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))?
        .desc;
    let region = region.unwrap_or_else(|| desc.full_region());
    check_image_region(&desc, &region)?;
    let texel = desc.texel_size as usize;
    let image_side = (BoxLayout::for_image(&desc), image_origin(&region, texel));
    let memory_side = (BoxLayout::packed(&region, texel), [0; 3]);
    let (src, dst) = if to_memory {
        (image_side, memory_side)
    } else {
        (memory_side, image_side)
    };
    Ok(BoxCopy {
        src_layout: src.0,
        src_origin: src.1,
        dst_layout: dst.0,
        dst_origin: dst.1,
        extent: image_extent(&region, texel),
    })
}

/// Validates a command against the current state and turns it into owned ops.
pub(crate) fn lower(
    state: &SimState,
    list: &ListEntry,
    command: ListCommand<'_, super::Sim>,
    sync: AppendSync<'_, super::Sim>,
) -> Result<Vec<Op>, SimError> {
    let group = state.queue_group(list.ordinal)?;
    let signal = sync.signal.map(|e| check_event(state, e)).transpose()?;
    let wait = sync
        .wait
        .iter()
        .map(|e| check_event(state, *e))
        .collect::<Result<Vec<_>, _>>()?;
    let cmd = match command {
        ListCommand::MemoryCopy { dst, src, size } => {
            if size > 0 && (dst.is_null() || src.is_null()) {
                return fail(ZeResult::ErrorInvalidNullPointer);
            }
            if dst.addr() < src.addr() + size && src.addr() < dst.addr() + size {
                return fail(ZeResult::ErrorOverlappingRegions);
            }
            Recorded::Copy { dst, src, size }
        }
        ListCommand::MemoryFill { dst, pattern, size } => {
            if dst.is_null() {
                return fail(ZeResult::ErrorInvalidNullPointer);
            }
            if !pattern.len().is_power_of_two()
                || pattern.len() > group.max_memory_fill_pattern_size
            {
                return fail(ZeResult::ErrorInvalidSize);
            }
            Recorded::Fill {
                dst,
                pattern: pattern.to_vec(),
                size,
            }
        }
        ListCommand::MemoryCopyRegion {
            dst,
            dst_region,
            dst_pitch,
            dst_slice_pitch,
            src,
            src_region,
            src_pitch,
            src_slice_pitch,
        } => {
            if dst.is_null() || src.is_null() {
                return fail(ZeResult::ErrorInvalidNullPointer);
            }
            let same_extent = dst_region.width == src_region.width
                && dst_region.height == src_region.height
                && dst_region.depth == src_region.depth;
            if !same_extent {
                return fail(ZeResult::ErrorInvalidArgument);
            }
            if !span_fits(dst_region.origin_x, dst_region.width, dst_pitch as u64)
                || !span_fits(src_region.origin_x, src_region.width, src_pitch as u64)
            {
                return fail(ZeResult::ErrorInvalidSize);
            }
            let depth = src_region.depth.max(1);
            let copy = BoxCopy {
                src_layout: BoxLayout {
                    row_pitch: src_pitch as usize,
                    slice_pitch: src_slice_pitch as usize,
                },
                src_origin: [
                    src_region.origin_x as usize,
                    src_region.origin_y as usize,
                    src_region.origin_z as usize,
                ],
                dst_layout: BoxLayout {
                    row_pitch: dst_pitch as usize,
                    slice_pitch: dst_slice_pitch as usize,
                },
                dst_origin: [
                    dst_region.origin_x as usize,
                    dst_region.origin_y as usize,
                    dst_region.origin_z as usize,
                ],
                extent: [
                    src_region.width as usize,
                    src_region.height.max(1) as usize,
                    depth as usize,
                ],
            };
            Recorded::CopyRegion { dst, src, copy }
        }
        ListCommand::Barrier | ListCommand::MemoryRangesBarrier { .. } => Recorded::Nop,
        ListCommand::LaunchKernel {
            kernel,
            group_count,
            cooperative,
        } => {
            if !group.flags.contains(CommandQueueGroupFlags::COMPUTE) {
                return fail(ZeResult::ErrorInvalidCommandListType);
            }
            if cooperative && !group.flags.contains(CommandQueueGroupFlags::COOPERATIVE_KERNELS) {
                return fail(ZeResult::ErrorUnsupportedFeature);
            }
            let entry = state
                .kernels
                .get(&kernel.0)
                .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))?;
            let args = entry
                .args
                .iter()
                .map(|a| a.clone().ok_or(SimError::Raw(ZeResult::ErrorInvalidArgument)))
                .collect::<Result<Vec<_>, _>>()?;
            Recorded::Kernel(KernelDispatch {
                kernel: entry.func.clone(),
                launch: SimKernelLaunch {
                    name: entry.name.clone(),
                    group_count,
                    group_size: entry.group_size,
                    args,
                },
            })
        }
        ListCommand::SignalEvent { event } => {
            return Ok(vec![Op::bare(Recorded::Signal(check_event(state, event)?))]);
        }
        ListCommand::WaitOnEvents { events } => {
            let events = events
                .iter()
                .map(|e| check_event(state, *e))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(vec![Op::bare(Recorded::Wait(events))]);
        }
        ListCommand::ResetEvent { event } => {
            return Ok(vec![Op::bare(Recorded::Reset(check_event(state, event)?))]);
        }
        ListCommand::WriteGlobalTimestamp { dst } => {
            if dst.is_null() {
                return fail(ZeResult::ErrorInvalidNullPointer);
            }
            Recorded::Timestamp(dst)
        }
        ListCommand::MemoryPrefetch { ptr, .. } => {
            if ptr.is_null() {
                return fail(ZeResult::ErrorInvalidNullPointer);
            }
            Recorded::Nop
        }
        ListCommand::MemAdvise { device, ptr, .. } => {
            if ptr.is_null() {
                return fail(ZeResult::ErrorInvalidNullPointer);
            }
            state.check_device(device)?;
            Recorded::Nop
        }
        ListCommand::ImageCopy { dst, src } => {
            let (d, s) = state.image_pair(dst.0, src.0)?;
            if d.width != s.width || d.height != s.height || d.depth != s.depth {
                return fail(ZeResult::ErrorInvalidArgument);
            }
            let texel = s.texel_size as usize;
            Recorded::ImageToImage {
                dst: dst.0,
                src: src.0,
                copy: BoxCopy {
                    src_layout: BoxLayout::for_image(&s),
                    src_origin: [0; 3],
                    dst_layout: BoxLayout::for_image(&d),
                    dst_origin: [0; 3],
                    extent: image_extent(&s.full_region(), texel),
                },
            }
        }
        ListCommand::ImageCopyRegion {
            dst,
            src,
            dst_region,
            src_region,
        } => {
            let (d, s) = state.image_pair(dst.0, src.0)?;
            let dst_region = dst_region.unwrap_or_else(|| d.full_region());
            let src_region = src_region.unwrap_or_else(|| s.full_region());
            check_image_region(&d, &dst_region)?;
            check_image_region(&s, &src_region)?;
            let same_extent = dst_region.width == src_region.width
                && dst_region.height == src_region.height
                && dst_region.depth == src_region.depth;
            if !same_extent {
                return fail(ZeResult::ErrorInvalidArgument);
            }
            let texel = s.texel_size as usize;
            Recorded::ImageToImage {
                dst: dst.0,
                src: src.0,
                copy: BoxCopy {
                    src_layout: BoxLayout::for_image(&s),
                    src_origin: image_origin(&src_region, texel),
                    dst_layout: BoxLayout::for_image(&d),
                    dst_origin: image_origin(&dst_region, texel),
                    extent: image_extent(&src_region, texel),
                },
            }
        }
        ListCommand::ImageCopyToMemory { dst, src, region } => {
            if dst.is_null() {
                return fail(ZeResult::ErrorInvalidNullPointer);
            }
            Recorded::ImageToMemory {
                dst,
                src: src.0,
                copy: image_memory_copy(state, src.0, region, true)?,
            }
        }
        ListCommand::ImageCopyFromMemory { dst, src, region } => {
            if src.is_null() {
                return fail(ZeResult::ErrorInvalidNullPointer);
            }
            Recorded::ImageFromMemory {
                dst: dst.0,
                src,
                copy: image_memory_copy(state, dst.0, region, false)?,
            }
        }
        ListCommand::ExecuteCommandLists { lists } => {
            if !matches!(list.kind, ListKind::Immediate) {
                return fail(ZeResult::ErrorInvalidCommandListType);
            }
            let mut ops = vec![Op {
                cmd: Recorded::Nop,
                signal: None,
                wait,
            }];
            for l in lists {
                let entry = state
                    .lists
                    .get(&l.0)
                    .ok_or(SimError::Raw(ZeResult::ErrorInvalidNullHandle))?;
                match entry.kind {
                    ListKind::Regular { closed: true } => ops.extend(entry.ops.iter().cloned()),
                    _ => return fail(ZeResult::ErrorInvalidArgument),
                }
            }
            ops.push(Op {
                cmd: Recorded::Nop,
                signal,
                wait: Vec::new(),
            });
            return Ok(ops);
        }
    };
    Ok(vec![Op { cmd, signal, wait }])
}

fn set_event(shared: &SimShared, event: u64, signalled: bool) {
    let mut state = shared.state.lock();
    state.set_event_signalled(event, signalled);
    drop(state);
    shared.signal.notify_all();
}

fn wait_events(shared: &SimShared, events: &[u64]) {
    if events.is_empty() {
        return;
    }
    let mut state = shared.state.lock();
    // Destroyed events count as signalled
    while !state.shutdown
        && !events
            .iter()
            .all(|e| state.event_signalled(*e).unwrap_or(true))
    {
        shared.signal.wait(&mut state);
    }
}

fn run_op(shared: &SimShared, op: &Op) {
    wait_events(shared, &op.wait);
    match &op.cmd {
        Recorded::Copy { dst, src, size } => unsafe {
            std::ptr::copy(src.as_ptr() as *const u8, dst.as_ptr() as *mut u8, *size)
        },
        Recorded::Fill { dst, pattern, size } => {
            let out = unsafe { dst.as_mut_slice(*size) };
            for (i, byte) in out.iter_mut().enumerate() {
                *byte = pattern[i % pattern.len()];
            }
        }
        Recorded::CopyRegion { dst, src, copy } => unsafe {
            copy.run(src.as_ptr() as *const u8, dst.as_ptr() as *mut u8)
        },
        Recorded::Nop => (),
        Recorded::Signal(event) => set_event(shared, *event, true),
        Recorded::Reset(event) => set_event(shared, *event, false),
        Recorded::Wait(events) => wait_events(shared, events),
        Recorded::Timestamp(dst) => {
            let ns = shared.epoch.elapsed().as_nanos() as u64;
            unsafe { (dst.as_ptr() as *mut u64).write_unaligned(ns) };
        }
        Recorded::Kernel(dispatch) => (dispatch.kernel.func)(&dispatch.launch),
        Recorded::ImageToImage { dst, src, copy } => {
            let mut state = shared.state.lock();
            // Images may have been destroyed under us; that is a caller contract violation
            let Some(src_data) = state.images.get(src).map(|i| i.data.clone()) else {
                return;
            };
            if let Some(dst_image) = state.images.get_mut(dst) {
                unsafe { copy.run(src_data.as_ptr(), dst_image.data.as_mut_ptr()) };
            }
        }
        Recorded::ImageToMemory { dst, src, copy } => {
            let state = shared.state.lock();
            if let Some(image) = state.images.get(src) {
                unsafe { copy.run(image.data.as_ptr(), dst.as_ptr() as *mut u8) };
            }
        }
        Recorded::ImageFromMemory { dst, src, copy } => {
            let mut state = shared.state.lock();
            if let Some(image) = state.images.get_mut(dst) {
                unsafe { copy.run(src.as_ptr() as *const u8, image.data.as_mut_ptr()) };
            }
        }
    }
    if let Some(event) = op.signal {
        set_event(shared, event, true);
    }
}

/// Runs every op of a batch in order. Returns false if a kernel callback panicked.
pub(crate) fn run_batch(shared: &SimShared, batch: &Batch) -> bool {
    for op in &batch.ops {
        if std::panic::catch_unwind(AssertUnwindSafe(|| run_op(shared, op))).is_err() {
            log::error!("sim: op panicked on lane {}, marking device lost", batch.lane);
            return false;
        }
    }
    true
}

pub(crate) fn complete_batch(shared: &SimShared, batch: &Batch, ok: bool) {
    let mut state = shared.state.lock();
    if let Some(lane) = state.lanes.get_mut(&batch.lane) {
        lane.pending -= 1;
        lane.failed |= !ok;
    }
    if ok && let Some(fence) = batch.fence.and_then(|f| state.fences.get_mut(&f)) {
        fence.signalled = true;
    }
    drop(state);
    shared.signal.notify_all();
}

pub(crate) fn spawn_worker(
    shared: Arc<SimShared>,
    lane: u64,
) -> std::io::Result<(mpsc::Sender<Batch>, JoinHandle<()>)> {
    let (sender, receiver) = mpsc::channel::<Batch>();
    let handle = std::thread::Builder::new()
        .name(format!("lzt-sim-lane-{lane}"))
        .spawn(move || {
            while let Ok(batch) = receiver.recv() {
                let ok = run_batch(&shared, &batch);
                complete_batch(&shared, &batch, ok);
            }
            log::trace!("sim: worker for lane {lane} exiting");
        })?;
    Ok((sender, handle))
}
