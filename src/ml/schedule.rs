// ============================================================
// Layer 5 — Noam Learning-Rate Schedule
// ============================================================
//   lr(step) = factor · d_model^-0.5 · min(step^-0.5, step · warmup^-1.5)
//
// Linear warm-up for `warmup` steps, then inverse square-root
// decay. Steps are counted from 1.
//
// Reference: Vaswani et al. (2017) Attention Is All You Need §5.3

pub struct NoamSchedule {
    d_model: usize,
    factor:  f64,
    warmup:  usize,
    step:    usize,
}

impl NoamSchedule {
    pub fn new(d_model: usize, factor: f64, warmup: usize) -> Self {
        Self { d_model, factor, warmup: warmup.max(1), step: 0 }
    }

    /// Advance one optimiser step and return its learning rate.
    pub fn step(&mut self) -> f64 {
        self.step += 1;
        self.rate(self.step)
    }

    pub fn rate(&self, step: usize) -> f64 {
        let step = step.max(1) as f64;
        self.factor
            * (self.d_model as f64).powf(-0.5)
            * step.powf(-0.5).min(step * (self.warmup as f64).powf(-1.5))
    }

    pub fn current_step(&self) -> usize {
        self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peaks_at_warmup() {
        let s    = NoamSchedule::new(512, 1.0, 2000);
        let peak = s.rate(2000);
        assert!(s.rate(1999) < peak);
        assert!(s.rate(2001) < peak);
        assert!((peak - 512f64.powf(-0.5) * 2000f64.powf(-0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_step_counts_from_one() {
        let mut s = NoamSchedule::new(16, 2.0, 4);
        let first = s.step();
        assert_eq!(s.current_step(), 1);
        assert!((first - 2.0 * 0.25 * 4f64.powf(-1.5)).abs() < 1e-12);
    }
}
