//! Per-action linear weights and eligibility traces

/// Linear action-value store: one weight row and one trace row per action,
/// each `feature_count` long.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearQ {
    weights: Vec<Vec<f64>>,
    traces: Vec<Vec<f64>>,
}

impl LinearQ {
    /// All-zero weights and traces of shape `action_count × feature_count`.
    pub fn zeros(action_count: usize, feature_count: usize) -> Self {
        Self {
            weights: vec![vec![0.0; feature_count]; action_count],
            traces: vec![vec![0.0; feature_count]; action_count],
        }
    }

    /// Adopt existing weights (already shape-checked) with fresh zero traces.
    pub(crate) fn from_weights(weights: Vec<Vec<f64>>) -> Self {
        let traces = weights.iter().map(|row| vec![0.0; row.len()]).collect();
        Self { weights, traces }
    }

    pub fn action_count(&self) -> usize {
        self.weights.len()
    }

    pub fn feature_count(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    pub fn weights(&self) -> &[Vec<f64>] {
        &self.weights
    }

    pub fn traces(&self) -> &[Vec<f64>] {
        &self.traces
    }

    /// `dot(weights[action], features)`.
    ///
    /// # Panics
    /// Panics if `action` is out of range or `features` has the wrong length.
    pub fn value(&self, action: usize, features: &[f64]) -> f64 {
        let row = self.row(action);
        assert_eq!(
            row.len(),
            features.len(),
            "feature vector length does not match weight columns"
        );
        row.iter().zip(features).map(|(w, f)| w * f).sum()
    }

    /// Q-values for every action, in action order.
    pub fn values(&self, features: &[f64]) -> Vec<f64> {
        (0..self.action_count())
            .map(|a| self.value(a, features))
            .collect()
    }

    /// `traces[action] = decay * traces[action] + features`
    pub fn accumulate_trace(&mut self, action: usize, decay: f64, features: &[f64]) {
        self.check_action(action);
        let trace = &mut self.traces[action];
        assert_eq!(
            trace.len(),
            features.len(),
            "feature vector length does not match trace columns"
        );
        for (e, f) in trace.iter_mut().zip(features) {
            *e = decay * *e + f;
        }
    }

    /// `weights[action] += step * traces[action]`
    pub fn apply_trace(&mut self, action: usize, step: f64) {
        self.check_action(action);
        let (weights, trace) = (&mut self.weights[action], &self.traces[action]);
        for (w, e) in weights.iter_mut().zip(trace) {
            *w += step * e;
        }
    }

    /// Zero every trace of every action.
    pub fn reset_traces(&mut self) {
        for row in &mut self.traces {
            row.fill(0.0);
        }
    }

    fn row(&self, action: usize) -> &[f64] {
        self.check_action(action);
        &self.weights[action]
    }

    fn check_action(&self, action: usize) {
        assert!(
            action < self.weights.len(),
            "action index {action} out of range (action_count = {})",
            self.weights.len()
        );
    }
}
