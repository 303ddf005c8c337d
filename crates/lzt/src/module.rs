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
//! Modules and kernels ("functions" in the harness naming).
use std::path::Path;

use types::{ModuleDesc, ModuleFormat};

use crate::{Driver, DriverInstance, HarnessError, LztResult, TestContext};

pub fn create_module<B: Driver>(
    ctx: &TestContext<B>,
    device: B::Device,
    input: &[u8],
    format: ModuleFormat,
    build_flags: Option<&str>,
) -> LztResult<B, B::Module> {
    ctx.instance()
        .create_module(
            ctx.default_context(),
            device,
            &ModuleDesc {
                format,
                input,
                build_flags,
            },
        )
        .map_err(HarnessError::<B>::Driver)
}
/// Reads a SPIR-V module from disk and builds it for `device`.
pub fn create_module_from_file<B: Driver>(
    ctx: &TestContext<B>,
    device: B::Device,
    path: impl AsRef<Path>,
    build_flags: Option<&str>,
) -> LztResult<B, B::Module> {
    let path = path.as_ref();
    let binary = std::fs::read(path)?;
    log::debug!("Loaded {} bytes of SPIR-V from {}", binary.len(), path.display());
    create_module(
        ctx,
        device,
        &binary,
        ModuleFormat::IlSpirv,
        build_flags,
    )
}
/// # Safety
/// * Every kernel created from the module must have been destroyed
pub unsafe fn destroy_module<B: Driver>(
    ctx: &TestContext<B>,
    module: B::Module,
) -> LztResult<B, ()> {
    unsafe { ctx.instance().destroy_module(module) }.map_err(HarnessError::<B>::Driver)
}

pub fn create_function<B: Driver>(
    ctx: &TestContext<B>,
    module: B::Module,
    name: &str,
) -> LztResult<B, B::Kernel> {
    ctx.instance()
        .create_kernel(module, name)
        .map_err(HarnessError::<B>::Driver)
}
/// # Safety
/// * No pending device work may reference the kernel
pub unsafe fn destroy_function<B: Driver>(
    ctx: &TestContext<B>,
    kernel: B::Kernel,
) -> LztResult<B, ()> {
    unsafe { ctx.instance().destroy_kernel(kernel) }.map_err(HarnessError::<B>::Driver)
}
pub fn set_group_size<B: Driver>(
    ctx: &TestContext<B>,
    kernel: B::Kernel,
    size: [u32; 3],
) -> LztResult<B, ()> {
    ctx.instance()
        .kernel_set_group_size(kernel, size)
        .map_err(HarnessError::<B>::Driver)
}
pub fn suggest_group_size<B: Driver>(
    ctx: &TestContext<B>,
    kernel: B::Kernel,
    global_size: [u32; 3],
) -> LztResult<B, [u32; 3]> {
    let size = ctx
        .instance()
        .kernel_suggest_group_size(kernel, global_size)
        .map_err(HarnessError::<B>::Driver)?;
    if size.contains(&0) {
        return Err(HarnessError::UnexpectedValue(format!(
            "suggested group size {size:?} has an empty dimension"
        )));
    }
    Ok(size)
}
/// # Safety
/// * If the argument is a pointer, it must stay valid for every launch that uses it
pub unsafe fn set_argument_value<B: Driver>(
    ctx: &TestContext<B>,
    kernel: B::Kernel,
    index: u32,
    value: &[u8],
) -> LztResult<B, ()> {
    unsafe { ctx.instance().kernel_set_argument_value(kernel, index, value) }
        .map_err(HarnessError::<B>::Driver)
}
/// Sets argument `index` to the bytes of `value`.
/// # Safety
/// * If the argument is a pointer, it must stay valid for every launch that uses it
pub unsafe fn set_argument<B: Driver, T: bytemuck::Pod>(
    ctx: &TestContext<B>,
    kernel: B::Kernel,
    index: u32,
    value: &T,
) -> LztResult<B, ()> {
    unsafe { set_argument_value(ctx, kernel, index, bytemuck::bytes_of(value)) }
}
