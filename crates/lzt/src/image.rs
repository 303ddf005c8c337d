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
use types::{ImageDesc, ImageType};

use crate::{Driver, DriverInstance, HarnessError, LztResult, TestContext};

pub fn create_image<B: Driver>(
    ctx: &TestContext<B>,
    device: B::Device,
    desc: &ImageDesc,
) -> LztResult<B, B::Image> {
    ctx.instance()
        .create_image(ctx.default_context(), device, desc)
        .map_err(HarnessError::<B>::Driver)
}
/// A 2D image of 4 byte texels on the default device.
pub fn create_image_2d<B: Driver>(
    ctx: &TestContext<B>,
    width: u64,
    height: u32,
) -> LztResult<B, B::Image> {
    create_image(
        ctx,
        ctx.default_device(),
        &ImageDesc {
            ty: ImageType::D2,
            texel_size: 4,
            width,
            height,
            depth: 1,
        },
    )
}
/// # Safety
/// * No pending device work may reference the image
pub unsafe fn destroy_image<B: Driver>(ctx: &TestContext<B>, image: B::Image) -> LztResult<B, ()> {
    unsafe { ctx.instance().destroy_image(image) }.map_err(HarnessError::<B>::Driver)
}
