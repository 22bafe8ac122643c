pub mod correlator;
pub mod rate;

pub use correlator::{IndexCorrelator, IndexNameMap, IF_DESCR_ROOT};
pub use rate::{CounterWidth, RateEngine, Throughput};
