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
//! Command bundles let one scenario body run against both execution models.
//!
//! A deferred bundle owns a queue and a regular list: appended commands run once the list is
//! closed and submitted. An immediate bundle owns only an immediate list, which starts
//! executing commands as they are appended. [`execute_and_sync_command_bundle`] hides the
//! difference at the end of a scenario.
use scopeguard::defer;
use std::cell::Cell;
use types::{
    CommandListFlags, CommandQueueDesc, CommandQueueFlags, CommandQueueMode,
    CommandQueuePriority, SyncStatus,
};

use crate::{Driver, DriverInstance, HarnessError, LztResult, TestContext, cmdlist, cmdqueue};

#[derive(Debug)]
pub enum CommandBundle<B: Driver> {
    Immediate {
        list: B::CommandList,
    },
    Deferred {
        queue: B::CommandQueue,
        list: B::CommandList,
    },
}
impl<B: Driver> CommandBundle<B> {
    pub fn list(&self) -> B::CommandList {
        match self {
            Self::Immediate { list } | Self::Deferred { list, .. } => *list,
        }
    }
    pub fn queue(&self) -> Option<B::CommandQueue> {
        match self {
            Self::Immediate { .. } => None,
            Self::Deferred { queue, .. } => Some(*queue),
        }
    }
    pub fn is_immediate(&self) -> bool {
        matches!(self, Self::Immediate { .. })
    }
}

/// Everything a bundle can be configured with. `None` context or device means the default one.
#[derive(Clone, Copy, Debug)]
pub struct BundleDesc<B: Driver> {
    pub context: Option<B::Context>,
    pub device: Option<B::Device>,
    pub queue_flags: CommandQueueFlags,
    pub mode: CommandQueueMode,
    pub priority: CommandQueuePriority,
    pub list_flags: CommandListFlags,
    pub ordinal: u32,
    pub index: u32,
    pub is_immediate: bool,
}
impl<B: Driver> Default for BundleDesc<B> {
    fn default() -> Self {
        Self {
            context: None,
            device: None,
            queue_flags: CommandQueueFlags::empty(),
            mode: CommandQueueMode::Default,
            priority: CommandQueuePriority::Normal,
            list_flags: CommandListFlags::empty(),
            ordinal: 0,
            index: 0,
            is_immediate: false,
        }
    }
}
impl<B: Driver> BundleDesc<B> {
    pub fn immediate(is_immediate: bool) -> Self {
        Self {
            is_immediate,
            ..Default::default()
        }
    }
}

pub fn create_command_bundle<B: Driver>(
    ctx: &TestContext<B>,
    is_immediate: bool,
) -> LztResult<B, CommandBundle<B>> {
    create_command_bundle_with(ctx, &BundleDesc::immediate(is_immediate))
}
pub fn create_command_bundle_on<B: Driver>(
    ctx: &TestContext<B>,
    device: B::Device,
    is_immediate: bool,
) -> LztResult<B, CommandBundle<B>> {
    create_command_bundle_with(
        ctx,
        &BundleDesc {
            device: Some(device),
            is_immediate,
            ..Default::default()
        },
    )
}
pub fn create_command_bundle_with_flags<B: Driver>(
    ctx: &TestContext<B>,
    device: B::Device,
    list_flags: CommandListFlags,
    is_immediate: bool,
) -> LztResult<B, CommandBundle<B>> {
    create_command_bundle_with(
        ctx,
        &BundleDesc {
            device: Some(device),
            list_flags,
            is_immediate,
            ..Default::default()
        },
    )
}
#[tracing::instrument(skip(ctx))]
pub fn create_command_bundle_with<B: Driver>(
    ctx: &TestContext<B>,
    desc: &BundleDesc<B>,
) -> LztResult<B, CommandBundle<B>> {
    if !desc.queue_flags.contains(CommandQueueFlags::EXPLICIT_ONLY) && desc.index != 0 {
        return Err(HarnessError::UnexpectedValue(format!(
            "queue index {} requires EXPLICIT_ONLY",
            desc.index
        )));
    }
    let context = desc.context.unwrap_or(ctx.default_context());
    let device = desc.device.unwrap_or(ctx.default_device());
    let queue_desc = CommandQueueDesc {
        ordinal: desc.ordinal,
        index: desc.index,
        flags: desc.queue_flags,
        mode: desc.mode,
        priority: desc.priority,
    };
    if desc.is_immediate {
        let list = cmdlist::create_immediate_command_list_with(ctx, context, device, &queue_desc)?;
        return Ok(CommandBundle::Immediate { list });
    }
    let queue = cmdqueue::create_command_queue_with(ctx, context, device, &queue_desc)?;
    let err = Cell::new(true);
    defer! {
        if err.get() {
            unsafe {
                let _ = ctx.instance().destroy_command_queue(queue);
            }
        }
    }
    let list =
        cmdlist::create_command_list_with(ctx, context, device, desc.list_flags, desc.ordinal)?;
    err.set(false);
    Ok(CommandBundle::Deferred { queue, list })
}

/// Deferred bundles submit their list to their queue, then wait on the queue. Immediate bundles
/// wait on the list. Running out of time is an error.
/// # Safety
/// * A deferred bundle's list must be closed, and the memory its commands reference must stay
///   valid until execution completes
pub unsafe fn execute_and_sync_command_bundle<B: Driver>(
    ctx: &TestContext<B>,
    bundle: &CommandBundle<B>,
    timeout: u64,
) -> LztResult<B, ()> {
    let _span = tracing::debug_span!(
        "execute_and_sync_command_bundle",
        immediate = bundle.is_immediate(),
        timeout
    )
    .entered();
    if let CommandBundle::Deferred { queue, list } = bundle {
        unsafe { cmdqueue::execute_command_lists(ctx, *queue, &[*list], None)? };
    }
    synchronize_command_bundle(ctx, bundle, timeout)
}

/// Waits for work already submitted through the bundle without submitting anything.
pub fn synchronize_command_bundle<B: Driver>(
    ctx: &TestContext<B>,
    bundle: &CommandBundle<B>,
    timeout: u64,
) -> LztResult<B, ()> {
    let status = match bundle {
        CommandBundle::Deferred { queue, .. } => cmdqueue::synchronize(ctx, *queue, timeout)?,
        CommandBundle::Immediate { list } => {
            cmdlist::synchronize_command_list_host(ctx, *list, timeout)?
        }
    };
    match status {
        SyncStatus::Ready => Ok(()),
        SyncStatus::NotReady => Err(HarnessError::NotReady("command bundle execution")),
    }
}

/// Destroys the queue of a deferred bundle, then the list. The list is destroyed even when the
/// queue fails to; the first error is returned.
/// # Safety
/// * No work submitted through the bundle may be pending
pub unsafe fn destroy_command_bundle<B: Driver>(
    ctx: &TestContext<B>,
    bundle: CommandBundle<B>,
) -> LztResult<B, ()> {
    let queue_result = match bundle {
        CommandBundle::Deferred { queue, .. } => unsafe {
            cmdqueue::destroy_command_queue(ctx, queue)
        },
        CommandBundle::Immediate { .. } => Ok(()),
    };
    let list_result = unsafe { cmdlist::destroy_command_list(ctx, bundle.list()) };
    queue_result.and(list_result)
}
