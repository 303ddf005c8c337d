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
use types::{SamplerAddressMode, SamplerDesc, SamplerFilterMode, ZeResult};

use super::sim_context;
use crate::{Driver, DriverInstance, LztResult, TestContext, driver::Error as _, sampler};

fn sampler_for_every_mode<B: Driver>(instance: B::Instance) -> LztResult<B, ()> {
    let ctx = TestContext::new(instance)?;
    for address_mode in [
        SamplerAddressMode::None,
        SamplerAddressMode::Repeat,
        SamplerAddressMode::Clamp,
        SamplerAddressMode::ClampToBorder,
        SamplerAddressMode::Mirror,
    ] {
        for filter_mode in [SamplerFilterMode::Nearest, SamplerFilterMode::Linear] {
            for normalized in [true, false] {
                let sampler =
                    sampler::create_sampler_with(&ctx, address_mode, filter_mode, normalized)?;
                unsafe { sampler::destroy_sampler(&ctx, sampler)? };
            }
        }
    }
    ctx.destroy()
}
dev_utils::all_driver_tests!(sampler_for_every_mode);

#[test]
fn sampler_keeps_its_descriptor() {
    let ctx = sim_context();
    let default = sampler::create_sampler(&ctx).unwrap();
    let clamped =
        sampler::create_sampler_with(&ctx, SamplerAddressMode::Clamp, SamplerFilterMode::Linear, false)
            .unwrap();
    assert_eq!(ctx.instance().live_objects().samplers, 2);
    assert_eq!(
        ctx.instance().sampler_desc(default),
        Some(SamplerDesc {
            normalized: true,
            ..Default::default()
        })
    );
    assert_eq!(
        ctx.instance().sampler_desc(clamped),
        Some(SamplerDesc {
            address_mode: SamplerAddressMode::Clamp,
            filter_mode: SamplerFilterMode::Linear,
            normalized: false,
        })
    );
    unsafe {
        sampler::destroy_sampler(&ctx, default).unwrap();
        sampler::destroy_sampler(&ctx, clamped).unwrap();
        let err = sampler::destroy_sampler(&ctx, clamped).unwrap_err();
        assert_eq!(err.result(), Some(ZeResult::ErrorInvalidNullHandle));
    }
    assert_eq!(ctx.instance().live_objects().samplers, 0);

    let other = ctx.instance().create_context(ctx.default_driver()).unwrap();
    unsafe { ctx.instance().destroy_context(other).unwrap() };
    let err = ctx
        .instance()
        .create_sampler(other, ctx.default_device(), &SamplerDesc::default())
        .unwrap_err();
    assert_eq!(err.result(), ZeResult::ErrorInvalidNullHandle);
    ctx.destroy().unwrap();
}
