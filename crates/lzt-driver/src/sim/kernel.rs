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
use std::ffi::c_void;

use types::GroupCount;

use crate::DevicePtr;

/// Host callback standing in for a compiled kernel.
pub type SimKernelFn = dyn Fn(&SimKernelLaunch) + Send + Sync;

/// Largest work group the simulated devices accept.
pub const SIM_MAX_GROUP_SIZE: u32 = 256;

pub(crate) struct RegisteredKernel {
    pub arg_sizes: Vec<usize>,
    pub func: Box<SimKernelFn>,
}

/// Everything a kernel callback sees when it runs. Arguments are snapshotted when the launch is
/// appended, so changing them afterwards does not affect recorded launches.
#[derive(Clone, Debug)]
pub struct SimKernelLaunch {
    pub name: String,
    pub group_count: GroupCount,
    pub group_size: [u32; 3],
    pub args: Vec<Vec<u8>>,
}
impl SimKernelLaunch {
    /// Total number of work items along each dimension.
    pub fn global_size(&self) -> [u64; 3] {
        [
            self.group_count.x as u64 * self.group_size[0] as u64,
            self.group_count.y as u64 * self.group_size[1] as u64,
            self.group_count.z as u64 * self.group_size[2] as u64,
        ]
    }
    pub fn try_arg<T: bytemuck::Pod>(&self, index: usize) -> Option<T> {
        let bytes = self.args.get(index)?;
        (bytes.len() == size_of::<T>()).then(|| bytemuck::pod_read_unaligned(bytes))
    }
    /// # Panics
    /// * If the argument does not exist or has a different size than `T`
    pub fn arg<T: bytemuck::Pod>(&self, index: usize) -> T {
        match self.try_arg(index) {
            Some(v) => v,
            None => panic!("kernel {} has no argument {index} of the requested size", self.name),
        }
    }
    /// Reads a pointer-sized argument as a device address.
    pub fn arg_ptr(&self, index: usize) -> DevicePtr {
        DevicePtr(self.arg::<usize>(index) as *mut c_void)
    }
}

/// Picks the largest group size dividing each global dimension while keeping the product
/// within [`SIM_MAX_GROUP_SIZE`].
pub(crate) fn suggest_group_size(global: [u32; 3]) -> [u32; 3] {
    let mut out = [1u32; 3];
    let mut budget = SIM_MAX_GROUP_SIZE;
    for (dim, &size) in global.iter().enumerate() {
        let size = size.max(1);
        let best = (1..=budget.min(size))
            .rev()
            .find(|d| size % d == 0)
            .unwrap_or(1);
        out[dim] = best;
        budget /= best;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggested_group_sizes_divide_global() {
        assert_eq!(suggest_group_size([1024, 1, 1]), [256, 1, 1]);
        assert_eq!(suggest_group_size([100, 1, 1]), [100, 1, 1]);
        assert_eq!(suggest_group_size([16, 32, 1]), [16, 16, 1]);
        assert_eq!(suggest_group_size([7, 0, 1]), [7, 1, 1]);
    }

    #[test]
    fn arguments_are_read_by_size() {
        let launch = SimKernelLaunch {
            name: "k".to_owned(),
            group_count: GroupCount::new(1, 1, 1),
            group_size: [4, 1, 1],
            args: vec![7u32.to_ne_bytes().to_vec(), 0x1000usize.to_ne_bytes().to_vec()],
        };
        assert_eq!(launch.arg::<u32>(0), 7);
        assert_eq!(launch.try_arg::<u64>(0), None);
        assert_eq!(launch.arg_ptr(1).addr(), 0x1000);
        assert_eq!(launch.global_size(), [4, 1, 1]);
    }
}
