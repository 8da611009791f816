//! Metric events and the statistic traits the slots read and write through.
use crate::{utils::AsAny, Result};
use enum_map::Enum;
use lazy_static::lazy_static;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// What a slot records about a call. Pass and Block add up to the calls which entered the chain.
#[derive(Debug, Clone, Copy, PartialEq, Enum)]
pub enum MetricEvent {
    /// admitted by every rule check
    Pass,
    /// refused by a rule check
    Block,
    /// exited, counted once per entry
    Complete,
    /// traced business error, read by the circuit breakers
    Error,
    /// round trip in milliseconds, summed at exit
    Rt,
}

pub trait ReadStat: Send + Sync + fmt::Debug {
    fn qps(&self, _event: MetricEvent) -> f64 {
        0f64
    }
    fn qps_previous(&self, _event: MetricEvent) -> f64 {
        0f64
    }
    fn sum(&self, _event: MetricEvent) -> u64 {
        0u64
    }
    fn min_rt(&self) -> f64 {
        0f64
    }
    fn avg_rt(&self) -> f64 {
        0f64
    }
}

pub trait WriteStat: Send + Sync + fmt::Debug {
    fn add_count(&self, _event: MetricEvent, _count: u64) {}
}

pub trait ConcurrencyStat: Send + Sync + fmt::Debug {
    fn current_concurrency(&self) -> u32;
    fn increase_concurrency(&self);
    fn decrease_concurrency(&self);
}

/// Reads zero and drops every write. Stands in for the metric of a flow rule which has none.
#[derive(Debug)]
pub struct NopStat {}
impl ReadStat for NopStat {}
impl WriteStat for NopStat {}

lazy_static! {
    static ref NOP_STAT: Arc<NopStat> = Arc::new(NopStat {});
}

pub fn nop_stat() -> Arc<NopStat> {
    NOP_STAT.clone()
}

/// StatNode holds the real-time statistics of a resource, of an origin, or of a call tree position.
pub trait StatNode: ReadStat + WriteStat + ConcurrencyStat + Any + AsAny {
    /// A read-only view of the given window over the node's resource-wide buckets.
    /// Fails with a [`WindowError`] when the window cannot be assembled from those buckets.
    fn generate_read_stat(&self, sample_count: u32, interval_ms: u32) -> Result<Arc<dyn ReadStat>>;
}

/// The geometry of a sliding window: `sample_count` buckets of equal length spanning `interval_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    pub sample_count: u32,
    pub interval_ms: u32,
}

impl fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} buckets over {}ms", self.sample_count, self.interval_ms)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WindowError {
    #[error("illegal sliding window: {0}")]
    Illegal(WindowSpec),
    #[error("illegal resource-wide sliding window: {0}")]
    IllegalResourceWide(WindowSpec),
    #[error("a window of {view} cannot be read from the resource-wide window of {resource_wide}")]
    NotReadable {
        view: WindowSpec,
        resource_wide: WindowSpec,
    },
}

impl WindowSpec {
    pub fn new(sample_count: u32, interval_ms: u32) -> Self {
        WindowSpec {
            sample_count,
            interval_ms,
        }
    }

    fn is_legal(&self) -> bool {
        self.interval_ms > 0 && self.sample_count > 0 && self.interval_ms % self.sample_count == 0
    }

    pub fn validate(&self) -> std::result::Result<(), WindowError> {
        if self.is_legal() {
            Ok(())
        } else {
            Err(WindowError::Illegal(*self))
        }
    }

    /// Only meaningful for a legal window.
    pub fn bucket_len_ms(&self) -> u32 {
        self.interval_ms / self.sample_count
    }

    /// Checks that this window can be read from the buckets of `resource_wide`:
    /// its interval divides the resource-wide interval and each of its buckets
    /// is made of whole resource-wide buckets.
    pub fn check_readable_from(
        &self,
        resource_wide: &WindowSpec,
    ) -> std::result::Result<(), WindowError> {
        self.validate()?;
        if !resource_wide.is_legal() {
            return Err(WindowError::IllegalResourceWide(*resource_wide));
        }
        if resource_wide.interval_ms % self.interval_ms != 0
            || self.bucket_len_ms() % resource_wide.bucket_len_ms() != 0
        {
            return Err(WindowError::NotReadable {
                view: *self,
                resource_wide: *resource_wide,
            });
        }
        Ok(())
    }
}

// expose the mocks to the unit tests of other modules
#[cfg(test)]
pub(crate) use test::*;

#[cfg(test)]
mod test {
    use super::*;
    use mockall::*;

    mock! {
        #[derive(Debug)]
        pub(crate) StatNode {}
        impl ReadStat for StatNode {
            fn qps(&self, _event: MetricEvent) -> f64;
            fn qps_previous(&self, _event: MetricEvent) -> f64;
            fn sum(&self, _event: MetricEvent) -> u64;
            fn min_rt(&self) -> f64;
            fn avg_rt(&self) -> f64;
        }
        impl WriteStat for StatNode {
            fn add_count(&self, _event: MetricEvent, _count: u64);
        }
        impl ConcurrencyStat for StatNode {
            fn current_concurrency(&self) -> u32;
            fn increase_concurrency(&self) ;
            fn decrease_concurrency(&self) ;
        }
        impl StatNode for StatNode {
            fn generate_read_stat(
                &self,
                sample_count: u32,
                interval_ms: u32,
            ) -> Result<Arc<dyn ReadStat>> ;
        }
    }

    #[test]
    fn readable_windows() {
        let resource_wide = WindowSpec::new(20, 10000);
        WindowSpec::new(1, 1000).check_readable_from(&resource_wide).unwrap();
        WindowSpec::new(2, 1000).check_readable_from(&resource_wide).unwrap();
        WindowSpec::new(5, 10000).check_readable_from(&resource_wide).unwrap();
        assert_eq!(WindowSpec::new(4, 2000).bucket_len_ms(), 500);
    }

    #[test]
    fn unreadable_windows() {
        let view = |sc, interval| WindowSpec::new(sc, interval);
        let cases = [
            ((view(3, 1000), view(20, 10000)), WindowError::Illegal(view(3, 1000))),
            ((view(0, 1000), view(20, 10000)), WindowError::Illegal(view(0, 1000))),
            (
                (view(2, 1000), view(21, 10000)),
                WindowError::IllegalResourceWide(view(21, 10000)),
            ),
            (
                (view(2, 1000), view(0, 10000)),
                WindowError::IllegalResourceWide(view(0, 10000)),
            ),
            // 8s does not divide 10s
            (
                (view(2, 8000), view(20, 10000)),
                WindowError::NotReadable {
                    view: view(2, 8000),
                    resource_wide: view(20, 10000),
                },
            ),
            // 500ms buckets over 1s buckets
            (
                (view(2, 1000), view(10, 10000)),
                WindowError::NotReadable {
                    view: view(2, 1000),
                    resource_wide: view(10, 10000),
                },
            ),
        ];
        for ((window, resource_wide), err) in cases.iter() {
            assert_eq!(window.check_readable_from(resource_wide).unwrap_err(), *err);
        }
    }

    #[test]
    fn error_messages() {
        let err = WindowError::NotReadable {
            view: WindowSpec::new(2, 8000),
            resource_wide: WindowSpec::new(20, 10000),
        };
        assert_eq!(
            err.to_string(),
            "a window of 2 buckets over 8000ms cannot be read from the resource-wide window of 20 buckets over 10000ms"
        );
    }
}
