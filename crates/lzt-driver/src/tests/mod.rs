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
use std::sync::LazyLock;

use crate as driver;
use crate::{AppendSync, Driver, DriverInstance, Error, ListCommand, Sim};
use log::info;
use types::*;

static INSTANCE_CREATE_LOCK: LazyLock<std::sync::Mutex<()>> =
    LazyLock::new(|| std::sync::Mutex::new(()));

fn driver_comprehensive<B: Driver>(instance: B::Instance) -> Result<(), B::Error> {
    let _lock = if let Ok(lock) = INSTANCE_CREATE_LOCK.lock() {
        lock
    } else {
        return Ok(());
    };
    info!("Starting test on {}", instance.backend_name());
    let drivers = instance.drivers()?;
    let drv = drivers[0];
    let device = instance.devices(drv)?[0];
    let props = instance.device_properties(device)?;
    info!("Using device {}", props.name);
    let groups = instance.command_queue_group_properties(device)?;
    let ordinal = groups
        .iter()
        .position(|g| g.flags.contains(CommandQueueGroupFlags::COMPUTE))
        .expect("No compute queue group") as u32;
    let context = instance.create_context(drv)?;
    unsafe {
        let host = instance.mem_alloc_host(context, &HostMemAllocDesc::default(), 64, 1)?;
        let dev = instance.mem_alloc_device(
            context,
            &DeviceMemAllocDesc::default(),
            64,
            1,
            device,
        )?;
        host.as_mut_slice(64).fill(0);

        let queue = instance.create_command_queue(
            context,
            device,
            &CommandQueueDesc {
                ordinal,
                mode: CommandQueueMode::Asynchronous,
                ..Default::default()
            },
        )?;
        let list = instance.create_command_list(
            context,
            device,
            &CommandListDesc {
                command_queue_group_ordinal: ordinal,
                ..Default::default()
            },
        )?;
        instance.append(
            list,
            ListCommand::MemoryFill {
                dst: dev,
                pattern: &[0x5a],
                size: 64,
            },
            AppendSync::default(),
        )?;
        instance.append(list, ListCommand::Barrier, AppendSync::default())?;
        instance.append(
            list,
            ListCommand::MemoryCopy {
                dst: host,
                src: dev,
                size: 64,
            },
            AppendSync::default(),
        )?;
        instance.close_command_list(list)?;
        info!("Recorded commands");

        let fence = instance.create_fence(queue, &FenceDesc::default())?;
        instance.execute_command_lists(queue, &[list], Some(fence))?;
        assert!(
            instance
                .fence_host_synchronize(fence, TIMEOUT_INFINITE)?
                .is_ready()
        );
        assert!(
            instance
                .synchronize_command_queue(queue, TIMEOUT_INFINITE)?
                .is_ready()
        );
        assert!(host.as_slice(64).iter().all(|b| *b == 0x5a));
        info!("Deferred submission done");

        let pool = instance.create_event_pool(
            context,
            &EventPoolDesc {
                flags: EventPoolFlags::HOST_VISIBLE,
                count: 2,
            },
            &[device],
        )?;
        let event = instance.create_event(
            pool,
            &EventDesc {
                index: 0,
                signal: EventScopeFlags::HOST,
                wait: EventScopeFlags::HOST,
            },
        )?;
        let immediate = instance.create_immediate_command_list(
            context,
            device,
            &CommandQueueDesc {
                ordinal,
                ..Default::default()
            },
        )?;
        instance.append(
            immediate,
            ListCommand::MemoryFill {
                dst: host,
                pattern: &[1, 2],
                size: 64,
            },
            AppendSync::signal(event),
        )?;
        assert!(
            instance
                .event_host_synchronize(event, TIMEOUT_INFINITE)?
                .is_ready()
        );
        assert!(
            instance
                .synchronize_command_list_host(immediate, TIMEOUT_INFINITE)?
                .is_ready()
        );
        assert_eq!(&host.as_slice(4)[..4], &[1, 2, 1, 2]);
        info!("Immediate submission done");

        instance.destroy_command_list(immediate)?;
        instance.destroy_event(event)?;
        instance.destroy_event_pool(pool)?;
        instance.destroy_fence(fence)?;
        instance.destroy_command_list(list)?;
        instance.destroy_command_queue(queue)?;
        instance.mem_free(context, dev)?;
        instance.mem_free(context, host)?;
        instance.destroy_context(context)?;
    }
    info!("Destroyed");
    Ok(())
}

dev_utils::all_driver_tests!(driver_comprehensive);

struct SimFixture {
    instance: <Sim as Driver>::Instance,
    device: <Sim as Driver>::Device,
    context: <Sim as Driver>::Context,
}
impl SimFixture {
    fn new() -> Self {
        dev_utils::init_test_logging();
        let instance = Sim::create_instance().unwrap();
        let drv = instance.drivers().unwrap()[0];
        let device = instance.devices(drv).unwrap()[0];
        let context = instance.create_context(drv).unwrap();
        Self {
            instance,
            device,
            context,
        }
    }
    fn queue(&self, mode: CommandQueueMode) -> <Sim as Driver>::CommandQueue {
        self.instance
            .create_command_queue(
                self.context,
                self.device,
                &CommandQueueDesc {
                    mode,
                    ..Default::default()
                },
            )
            .unwrap()
    }
    fn list(&self) -> <Sim as Driver>::CommandList {
        self.instance
            .create_command_list(self.context, self.device, &CommandListDesc::default())
            .unwrap()
    }
    fn host(&self, size: usize) -> crate::DevicePtr {
        unsafe {
            self.instance
                .mem_alloc_host(self.context, &HostMemAllocDesc::default(), size, 0)
                .unwrap()
        }
    }
}

#[test]
fn sim_rejects_open_list_submission() {
    let f = SimFixture::new();
    let queue = f.queue(CommandQueueMode::Default);
    let list = f.list();
    let err = unsafe { f.instance.execute_command_lists(queue, &[list], None) }.unwrap_err();
    assert_eq!(err.result(), ZeResult::ErrorInvalidArgument);
}

#[test]
fn sim_drops_appends_to_closed_lists() {
    let f = SimFixture::new();
    let queue = f.queue(CommandQueueMode::Synchronous);
    let list = f.list();
    let buf = f.host(8);
    unsafe {
        f.instance.close_command_list(list).unwrap();
        f.instance
            .append(
                list,
                ListCommand::MemoryFill {
                    dst: buf,
                    pattern: &[9],
                    size: 8,
                },
                AppendSync::default(),
            )
            .unwrap();
        f.instance.execute_command_lists(queue, &[list], None).unwrap();
        assert_eq!(buf.as_slice(8), &[0; 8]);
    }
}

#[test]
fn sim_zero_timeout_reports_not_ready() {
    let f = SimFixture::new();
    let pool = f
        .instance
        .create_event_pool(
            f.context,
            &EventPoolDesc {
                flags: EventPoolFlags::HOST_VISIBLE,
                count: 1,
            },
            &[],
        )
        .unwrap();
    let event = f.instance.create_event(pool, &EventDesc::default()).unwrap();
    assert_eq!(
        f.instance.event_host_synchronize(event, 0).unwrap(),
        SyncStatus::NotReady
    );
    assert_eq!(
        f.instance.event_host_synchronize(event, 1_000_000).unwrap(),
        SyncStatus::NotReady
    );
    f.instance.event_host_signal(event).unwrap();
    assert!(f.instance.event_query_status(event).unwrap().is_ready());
    // The slot is taken until the event is destroyed
    assert_eq!(
        f.instance
            .create_event(pool, &EventDesc::default())
            .unwrap_err()
            .result(),
        ZeResult::ErrorHandleObjectInUse
    );
    unsafe {
        f.instance.destroy_event(event).unwrap();
        f.instance.destroy_event_pool(pool).unwrap();
    }
}

#[test]
fn sim_panicking_kernel_loses_the_device() {
    let f = SimFixture::new();
    f.instance.register_kernel("explode", &[], |_| panic!("kernel failure"));
    let module = f
        .instance
        .create_module(
            f.context,
            f.device,
            &ModuleDesc {
                format: ModuleFormat::IlSpirv,
                input: &crate::sim::SPIRV_MAGIC.to_le_bytes(),
                build_flags: None,
            },
        )
        .unwrap();
    let kernel = f.instance.create_kernel(module, "explode").unwrap();
    let queue = f.queue(CommandQueueMode::Asynchronous);
    let list = f.list();
    unsafe {
        f.instance
            .append(
                list,
                ListCommand::LaunchKernel {
                    kernel,
                    group_count: GroupCount::new(1, 1, 1),
                    cooperative: false,
                },
                AppendSync::default(),
            )
            .unwrap();
        f.instance.close_command_list(list).unwrap();
        f.instance.execute_command_lists(queue, &[list], None).unwrap();
    }
    let err = f
        .instance
        .synchronize_command_queue(queue, TIMEOUT_INFINITE)
        .unwrap_err();
    assert!(err.is_device_lost());
}

#[test]
fn sim_counts_live_objects() {
    let f = SimFixture::new();
    let before = f.instance.live_objects();
    let queue = f.queue(CommandQueueMode::Default);
    let list = f.list();
    assert_eq!(f.instance.live_objects().queues, before.queues + 1);
    assert_eq!(f.instance.live_objects().lists, before.lists + 1);
    unsafe {
        f.instance.destroy_command_list(list).unwrap();
        f.instance.destroy_command_queue(queue).unwrap();
    }
    assert_eq!(f.instance.live_objects(), before);
}
