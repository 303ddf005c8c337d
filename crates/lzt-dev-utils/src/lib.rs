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
pub use log;
pub use paste;
use std::fmt::Write;
use tracing_subscriber::{
    layer::{Context, SubscriberExt},
    util::SubscriberInitExt,
};

pub struct EnterSpanPrinter;

impl<S> tracing_subscriber::Layer<S> for EnterSpanPrinter
where
    S: tracing::Subscriber,
    S: for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_enter(&self, id: &tracing::Id, ctx: Context<'_, S>) {
        if let Some(span_ref) = ctx.span(id) {
            let name = span_ref.name();

            let mut fields = String::new();
            if let Some(ext) = span_ref
                .extensions()
                .get::<tracing_subscriber::fmt::FormattedFields<
                    tracing_subscriber::fmt::format::DefaultFields,
                >>()
            {
                write!(fields, "{ext}").ok();
            }

            println!("\t{name} [{fields}]");
        }
    }
}
pub fn setup_trace_printer() {
    let _ = tracing_subscriber::registry()
        .with(EnterSpanPrinter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
pub fn setup_trace_printer_if_env() {
    if let Ok(a) = std::env::var("LZT_LOG_FULL_TRACE")
        && &a != "0"
    {
        setup_trace_printer();
    }
}
/// Logging setup every scenario runs first. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .is_test(true)
        .try_init();
    setup_trace_printer_if_env();
}
/// Whether `LZT_SKIP_BACKEND_<name>` asks for the backend to be skipped.
pub fn backend_skipped(name: &str) -> bool {
    std::env::var(format!("LZT_SKIP_BACKEND_{name}"))
        .is_ok_and(|a| &a != "0" && &a != "false" && !a.is_empty())
}

/// Expands to one `#[test]` running `$test_name::<driver::$driver>(instance)`. Backends whose
/// instance cannot be created on this machine are skipped, as are scenarios failing with
/// `ERROR_UNSUPPORTED_FEATURE`. The calling crate must have the driver crate in scope as
/// `driver`.
#[macro_export]
macro_rules! all_driver_tests_inner {
    ($func_name:ident, $backend_name:literal, $instance_create:block, $test_name:ident, $driver: ident) => {
        #[test]
        pub fn $func_name() {
            #[allow(unused_imports)]
            use driver::Error as _;
            if $crate::backend_skipped($backend_name) {
                return;
            }
            $crate::init_test_logging();
            $crate::log::info!("{} test", $backend_name);
            let instance = match $instance_create {
                Ok(instance) => instance,
                Err(e) if e.result() == types::ZeResult::ErrorUninitialized => {
                    $crate::log::warn!("{} backend unavailable, skipping: {e}", $backend_name);
                    return;
                }
                Err(e) => panic!("Failed to create {} instance: {e}", $backend_name),
            };
            $crate::log::info!("Created {} instance", $backend_name);
            if let Err(e) = $test_name::<driver::$driver>(instance) {
                if e.is_unsupported_feature() {
                    $crate::log::warn!("{} unsupported on {}: {e}", stringify!($test_name), $backend_name);
                    return;
                }
                panic!("{} failed on {}: {e}", stringify!($test_name), $backend_name);
            }
        }
    };
}
#[macro_export]
macro_rules! all_driver_tests {
    ($test_name:ident) => {
        $crate::paste::paste! {
            $crate::all_driver_tests_inner!([<$test_name _sim>], "SIM", {
                driver::Sim::create_instance()
            }, $test_name, Sim);

            #[cfg(feature = "level-zero")]
            $crate::all_driver_tests_inner!([<$test_name _level_zero>], "LEVEL_ZERO", {
                driver::LevelZero::create_instance()
            }, $test_name, LevelZero);
        }
    };
}
