use crate::SelectError;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// A storage resource being considered for selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: String,
    /// Average operations per second over the sampling window, `None` when
    /// the monitoring backend returned no datapoints.
    pub throughput_metric: Option<f64>,
    pub total_capacity: u64,
    pub consumed_capacity: Option<u64>,
}

impl Candidate {
    pub fn new(
        id: impl Into<String>,
        throughput_metric: Option<f64>,
        total_capacity: u64,
        consumed_capacity: Option<u64>,
    ) -> Self {
        Self {
            id: id.into(),
            throughput_metric,
            total_capacity,
            consumed_capacity,
        }
    }

    pub fn is_eligible(&self) -> bool {
        self.total_capacity > 0
    }

    /// Throughput with missing or unusable values folded to zero.
    pub fn throughput(&self) -> f64 {
        match self.throughput_metric {
            Some(v) if v.is_finite() && v >= 0.0 => v,
            _ => 0.0,
        }
    }

    /// Consumed over total capacity, as a percentage. Zero when the total is
    /// zero.
    pub fn capacity_used_ratio(&self) -> f64 {
        if self.total_capacity == 0 {
            return 0.0;
        }
        let consumed = self.consumed_capacity.unwrap_or(0) as f64;
        consumed / self.total_capacity as f64 * 100.0
    }

    pub(crate) fn has_degraded_metrics(&self) -> bool {
        !matches!(self.throughput_metric, Some(v) if v.is_finite() && v >= 0.0)
            || self.consumed_capacity.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub normalized_throughput: f64,
    pub normalized_capacity: f64,
    pub score: f64,
}

impl ScoredCandidate {
    pub fn id(&self) -> &str {
        &self.candidate.id
    }
}

/// Relative importance of throughput and capacity in the combined score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    throughput: f64,
    capacity: f64,
}

impl Weights {
    pub fn new(throughput: f64, capacity: f64) -> Result<Self, SelectError> {
        let valid = |w: f64| w.is_finite() && w >= 0.0;
        if !valid(throughput)
            || !valid(capacity)
            || ((throughput + capacity) - 1.0).abs() > WEIGHT_SUM_TOLERANCE
        {
            return Err(SelectError::InvalidWeights {
                throughput,
                capacity,
            });
        }
        Ok(Self {
            throughput,
            capacity,
        })
    }

    pub fn throughput(&self) -> f64 {
        self.throughput
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            throughput: 0.5,
            capacity: 0.5,
        }
    }
}
