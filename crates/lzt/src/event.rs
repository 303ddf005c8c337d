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
use std::collections::HashMap;

use types::{
    EventDesc, EventPoolDesc, EventPoolFlags, EventScopeFlags, IpcEventPoolHandle, SyncStatus,
};

use crate::{Driver, DriverInstance, HarnessError, LztResult, TestContext};

/// Owns one event pool and hands out its slots.
///
/// The pool itself is created on first use with the configured size and `HOST_VISIBLE`, unless
/// one of the `init_*` methods ran first. Events must be destroyed through the pool before it
/// is dropped; dropping the pool destroys only the pool handle.
pub struct EventPool<'a, B: Driver> {
    ctx: &'a TestContext<B>,
    pool: Option<B::EventPool>,
    available: Vec<bool>,
    slots: HashMap<B::Event, u32>,
}
impl<'a, B: Driver> EventPool<'a, B> {
    pub fn new(ctx: &'a TestContext<B>) -> Self {
        Self {
            ctx,
            pool: None,
            available: Vec::new(),
            slots: HashMap::new(),
        }
    }
    pub fn handle(&self) -> Option<B::EventPool> {
        self.pool
    }
    /// Exports the pool for another process. The pool must be initialized with
    /// `EventPoolFlags::IPC`.
    pub fn get_ipc_handle(&self) -> LztResult<B, IpcEventPoolHandle> {
        let pool = self.pool.ok_or_else(|| {
            HarnessError::UnexpectedValue("event pool exported before init".to_owned())
        })?;
        self.ctx
            .instance()
            .event_pool_get_ipc_handle(pool)
            .map_err(HarnessError::<B>::Driver)
    }
    /// Initializes with the configured size and `HOST_VISIBLE`. Does nothing if already
    /// initialized.
    pub fn init(&mut self) -> LztResult<B, ()> {
        self.init_with_count(self.ctx.config().event_pool_size, EventPoolFlags::HOST_VISIBLE)
    }
    pub fn init_with_count(&mut self, count: u32, flags: EventPoolFlags) -> LztResult<B, ()> {
        self.init_with_desc(&EventPoolDesc { flags, count }, &[self.ctx.default_device()])
    }
    pub fn init_with_desc(
        &mut self,
        desc: &EventPoolDesc,
        devices: &[B::Device],
    ) -> LztResult<B, ()> {
        if self.pool.is_some() {
            return Ok(());
        }
        self.pool = Some(create_event_pool(self.ctx, desc, devices)?);
        self.available = vec![true; desc.count as usize];
        Ok(())
    }

    /// Creates an event in the first free slot.
    pub fn create_event(&mut self) -> LztResult<B, B::Event> {
        self.create_event_scoped(EventScopeFlags::empty(), EventScopeFlags::empty())
    }
    pub fn create_event_scoped(
        &mut self,
        signal: EventScopeFlags,
        wait: EventScopeFlags,
    ) -> LztResult<B, B::Event> {
        self.init()?;
        let Some(index) = self.available.iter().position(|a| *a) else {
            return Err(HarnessError::UnexpectedValue(format!(
                "all {} events of the pool are in use",
                self.available.len()
            )));
        };
        self.create_event_with_desc(&EventDesc {
            index: index as u32,
            signal,
            wait,
        })
    }
    /// Creates an event at `desc.index` without looking for a free slot. The slot is still
    /// recorded as taken.
    pub fn create_event_with_desc(&mut self, desc: &EventDesc) -> LztResult<B, B::Event> {
        self.init()?;
        let pool = self.pool.ok_or_else(|| {
            HarnessError::UnexpectedValue("event pool is not initialized".to_owned())
        })?;
        let event = self
            .ctx
            .instance()
            .create_event(pool, desc)
            .map_err(HarnessError::<B>::Driver)?;
        if let Some(slot) = self.available.get_mut(desc.index as usize) {
            *slot = false;
        }
        self.slots.insert(event, desc.index);
        Ok(event)
    }
    pub fn create_events(&mut self, count: usize) -> LztResult<B, Vec<B::Event>> {
        self.create_events_scoped(count, EventScopeFlags::empty(), EventScopeFlags::empty())
    }
    pub fn create_events_scoped(
        &mut self,
        count: usize,
        signal: EventScopeFlags,
        wait: EventScopeFlags,
    ) -> LztResult<B, Vec<B::Event>> {
        (0..count)
            .map(|_| self.create_event_scoped(signal, wait))
            .collect()
    }

    /// Frees the event's slot and destroys it.
    /// # Safety
    /// * No pending device work may reference the event
    pub unsafe fn destroy_event(&mut self, event: B::Event) -> LztResult<B, ()> {
        let Some(index) = self.slots.remove(&event) else {
            return Err(HarnessError::UnknownEvent(event));
        };
        if let Some(slot) = self.available.get_mut(index as usize) {
            *slot = true;
        }
        unsafe { self.ctx.instance().destroy_event(event) }.map_err(HarnessError::<B>::Driver)
    }
    /// Destroys every event in `events` and empties it.
    /// # Safety
    /// * No pending device work may reference the events
    pub unsafe fn destroy_events(&mut self, events: &mut Vec<B::Event>) -> LztResult<B, ()> {
        for event in events.drain(..) {
            unsafe { self.destroy_event(event)? };
        }
        Ok(())
    }
    pub fn live_events(&self) -> usize {
        self.slots.len()
    }
}
impl<B: Driver> Drop for EventPool<'_, B> {
    fn drop(&mut self) {
        let Some(pool) = self.pool else {
            return;
        };
        if !self.slots.is_empty() {
            log::warn!(
                "Destroying event pool with {} events still alive",
                self.slots.len()
            );
        }
        if let Err(e) = unsafe { self.ctx.instance().destroy_event_pool(pool) } {
            log::warn!("Failed to destroy event pool: {e}");
        }
    }
}

pub fn create_event_pool<B: Driver>(
    ctx: &TestContext<B>,
    desc: &EventPoolDesc,
    devices: &[B::Device],
) -> LztResult<B, B::EventPool> {
    ctx.instance()
        .create_event_pool(ctx.default_context(), desc, devices)
        .map_err(HarnessError::<B>::Driver)
}
/// # Safety
/// * Every event created from the pool must have been destroyed
pub unsafe fn destroy_event_pool<B: Driver>(
    ctx: &TestContext<B>,
    pool: B::EventPool,
) -> LztResult<B, ()> {
    unsafe { ctx.instance().destroy_event_pool(pool) }.map_err(HarnessError::<B>::Driver)
}
pub fn signal_event_from_host<B: Driver>(
    ctx: &TestContext<B>,
    event: B::Event,
) -> LztResult<B, ()> {
    ctx.instance()
        .event_host_signal(event)
        .map_err(HarnessError::<B>::Driver)
}
pub fn event_host_synchronize<B: Driver>(
    ctx: &TestContext<B>,
    event: B::Event,
    timeout: u64,
) -> LztResult<B, SyncStatus> {
    ctx.instance()
        .event_host_synchronize(event, timeout)
        .map_err(HarnessError::<B>::Driver)
}
pub fn event_host_reset<B: Driver>(ctx: &TestContext<B>, event: B::Event) -> LztResult<B, ()> {
    ctx.instance()
        .event_host_reset(event)
        .map_err(HarnessError::<B>::Driver)
}
pub fn query_event<B: Driver>(ctx: &TestContext<B>, event: B::Event) -> LztResult<B, SyncStatus> {
    ctx.instance()
        .event_query_status(event)
        .map_err(HarnessError::<B>::Driver)
}
/// Opens a pool exported with [`EventPool::get_ipc_handle`]. Events created in it at some index
/// share their state with the exporter's event at that index.
///
/// # Safety
/// * The handle must come from a live pool exported by a driver of the same kind
pub unsafe fn open_ipc_event_handle<B: Driver>(
    ctx: &TestContext<B>,
    handle: IpcEventPoolHandle,
) -> LztResult<B, B::EventPool> {
    let _span = tracing::debug_span!("open_ipc_event_handle").entered();
    unsafe {
        ctx.instance()
            .event_pool_open_ipc_handle(ctx.default_context(), handle)
    }
    .map_err(HarnessError::<B>::Driver)
}
/// # Safety
/// * Every event created from the opened pool must have been destroyed
pub unsafe fn close_ipc_event_handle<B: Driver>(
    ctx: &TestContext<B>,
    pool: B::EventPool,
) -> LztResult<B, ()> {
    unsafe { ctx.instance().event_pool_close_ipc_handle(pool) }.map_err(HarnessError::<B>::Driver)
}
