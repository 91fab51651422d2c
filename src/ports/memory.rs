/// Live system memory signal gating batch admission. Implementations must
/// return a fresh reading on every call; the scheduler decides per item,
/// never from a cached value.
#[cfg_attr(test, mockall::automock)]
pub trait MemoryProbe: Send + Sync {
    /// Current memory utilization in percent, 0.0 to 100.0.
    fn utilization_percent(&self) -> f32;
}
