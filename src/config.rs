use crate::error::{BalanceError, Result};

/// Sizing parameters for a balancer and its worker pool.
///
/// Every queue is bounded, so backpressure is a property of the
/// configuration rather than an emergent memory-growth bug: a full intake
/// suspends producers, a full worker inbox suspends the dispatcher.
#[derive(Debug, Clone)]
pub struct BalancerConfig {
    /// Number of pool workers. Fixed for the lifetime of the balancer.
    pub workers: usize,
    /// Capacity of each worker's private inbound queue.
    pub inbox_capacity: usize,
    /// Capacity of the shared intake queue producers submit into.
    pub intake_capacity: usize,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            inbox_capacity: 8,
            intake_capacity: 128,
        }
    }
}

impl BalancerConfig {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }

    pub fn with_inbox_capacity(mut self, capacity: usize) -> Self {
        self.inbox_capacity = capacity;
        self
    }

    pub fn with_intake_capacity(mut self, capacity: usize) -> Self {
        self.intake_capacity = capacity;
        self
    }

    /// Rejects sizes that cannot produce a functioning pool.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(BalanceError::NoWorkers);
        }
        if self.inbox_capacity == 0 || self.intake_capacity == 0 {
            return Err(BalanceError::ZeroCapacity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balancer_config_default() {
        let cfg = BalancerConfig::default();
        assert_eq!(cfg.workers, 10);
        assert_eq!(cfg.inbox_capacity, 8);
        assert_eq!(cfg.intake_capacity, 128);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn balancer_config_new_keeps_other_defaults() {
        let cfg = BalancerConfig::new(3);
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.inbox_capacity, 8);
        assert_eq!(cfg.intake_capacity, 128);
    }

    #[test]
    fn balancer_config_builders() {
        let cfg = BalancerConfig::new(2)
            .with_inbox_capacity(1)
            .with_intake_capacity(4);
        assert_eq!(cfg.workers, 2);
        assert_eq!(cfg.inbox_capacity, 1);
        assert_eq!(cfg.intake_capacity, 4);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let cfg = BalancerConfig::new(0);
        assert_eq!(cfg.validate(), Err(BalanceError::NoWorkers));
    }

    #[test]
    fn validate_rejects_zero_capacities() {
        let cfg = BalancerConfig::new(1).with_inbox_capacity(0);
        assert_eq!(cfg.validate(), Err(BalanceError::ZeroCapacity));

        let cfg = BalancerConfig::new(1).with_intake_capacity(0);
        assert_eq!(cfg.validate(), Err(BalanceError::ZeroCapacity));
    }
}
