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
use types::{SamplerAddressMode, SamplerDesc, SamplerFilterMode};

use crate::{Driver, DriverInstance, HarnessError, LztResult, TestContext};

/// A sampler with no address mode, nearest filtering and normalized coordinates.
pub fn create_sampler<B: Driver>(ctx: &TestContext<B>) -> LztResult<B, B::Sampler> {
    create_sampler_with(ctx, SamplerAddressMode::None, SamplerFilterMode::Nearest, true)
}
#[tracing::instrument(skip(ctx))]
pub fn create_sampler_with<B: Driver>(
    ctx: &TestContext<B>,
    address_mode: SamplerAddressMode,
    filter_mode: SamplerFilterMode,
    normalized: bool,
) -> LztResult<B, B::Sampler> {
    ctx.instance()
        .create_sampler(
            ctx.default_context(),
            ctx.default_device(),
            &SamplerDesc {
                address_mode,
                filter_mode,
                normalized,
            },
        )
        .map_err(HarnessError::<B>::Driver)
}
/// # Safety
/// * No pending device work may reference the sampler
pub unsafe fn destroy_sampler<B: Driver>(
    ctx: &TestContext<B>,
    sampler: B::Sampler,
) -> LztResult<B, ()> {
    unsafe { ctx.instance().destroy_sampler(sampler) }.map_err(HarnessError::<B>::Driver)
}
