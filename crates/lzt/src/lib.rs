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
//! Harness for Level Zero conformance scenarios.
//!
//! Every helper takes a [`TestContext`], which owns the driver instance together with the
//! default driver, device and context a scenario runs against. Helpers are thin: each forwards
//! to one or two driver entry points and turns a failing result code into a [`HarnessError`].
//! The centerpiece is [`bundle::CommandBundle`], which runs the same recorded commands either
//! through a queue and an explicitly submitted list, or through a self-executing immediate list.

pub mod bundle;
pub mod cmdlist;
pub mod cmdqueue;
pub mod config;
mod context;
pub mod device;
pub mod driver_info;
pub mod event;
pub mod fence;
pub mod image;
pub mod memory;
pub mod module;
pub mod sampler;
#[cfg(unix)]
pub mod net;

#[cfg(test)]
mod tests;

use thiserror::Error;

pub use config::HarnessConfig;
pub use context::TestContext;
pub use driver;
pub use driver::{AppendSync, DevicePtr, Driver, DriverInstance};
pub use types;
pub use types::{SyncStatus, TIMEOUT_INFINITE, ZeResult};

#[derive(Error, Debug)]
pub enum HarnessError<B: Driver> {
    #[error("Driver error: {0}")]
    Driver(B::Error),
    #[error("{0} did not complete before the timeout")]
    NotReady(&'static str),
    #[error("Unexpected value: {0}")]
    UnexpectedValue(String),
    #[error("Event {0:?} was not created through this pool")]
    UnknownEvent(B::Event),
    #[error("Data pattern mismatch at byte {offset}: expected {expected:#04x}, found {found:#04x}")]
    PatternMismatch {
        offset: usize,
        expected: u8,
        found: u8,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}
impl<B: Driver> HarnessError<B> {
    /// The driver result code behind this error, if it came from the driver.
    pub fn result(&self) -> Option<ZeResult> {
        use driver::Error as _;
        match self {
            Self::Driver(e) => Some(e.result()),
            _ => None,
        }
    }
    pub fn is_unsupported_feature(&self) -> bool {
        self.result() == Some(ZeResult::ErrorUnsupportedFeature)
    }
    pub fn is_device_lost(&self) -> bool {
        self.result() == Some(ZeResult::ErrorDeviceLost)
    }
}

pub type LztResult<B, T> = Result<T, HarnessError<B>>;
