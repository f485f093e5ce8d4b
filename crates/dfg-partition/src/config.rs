use crate::error::PartitionError;

/// Problem parameters of one partitioning run.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PartitionParams {
    /// Maximum number of vertices per partition.
    pub capacity: usize,
    /// Maximum number of read and of write transactions per partition.
    pub transaction_limit: usize,
    /// Objective weight of one group transaction.
    pub memory_weight: usize,
}

impl PartitionParams {
    /// Parameters with memory weight `1`.
    pub fn new(capacity: usize, transaction_limit: usize) -> Self {
        Self { capacity, transaction_limit, memory_weight: 1 }
    }

    /// Replace the memory weight.
    pub fn with_memory_weight(self, memory_weight: usize) -> Self {
        Self { memory_weight, ..self }
    }

    /// Check that every parameter is positive.
    ///
    /// # Errors
    ///
    /// Returns [PartitionError::InvalidParameter] naming the first zero parameter.
    pub fn validate(&self) -> Result<(), PartitionError> {
        for (name, value) in
            [("capacity", self.capacity), ("transaction_limit", self.transaction_limit), ("memory_weight", self.memory_weight)]
        {
            if value == 0 {
                return Err(PartitionError::InvalidParameter { name, value });
            }
        }
        Ok(())
    }
}

/// Limits of the search over partition counts.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SearchConfig {
    /// Number of partition counts tried before giving up.
    pub max_iterations: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { max_iterations: 100 }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn validate() {
        assert!(PartitionParams::new(4, 2).validate().is_ok());
        let err = PartitionParams::new(4, 2).with_memory_weight(0).validate().unwrap_err();
        assert!(matches!(err, PartitionError::InvalidParameter { name: "memory_weight", value: 0 }));
        let err = PartitionParams::new(0, 0).validate().unwrap_err();
        assert!(matches!(err, PartitionError::InvalidParameter { name: "capacity", .. }));
    }

    #[test]
    fn default_search() {
        assert_eq!(SearchConfig::default().max_iterations, 100);
    }
}
