//! Signal dispositions and masks, coordinated process-wide (spec.md §4.7).

mod handler_configuration;
mod signal_number_set;

#[cfg(feature = "test-support")]
pub mod test_support;

pub use handler_configuration::{Disposition, HandlerConfiguration, SignalApi, SystemSignalApi};
pub use signal_number_set::SignalNumberSet;

#[cfg(feature = "test-support")]
pub use handler_configuration::simulate_raise;
