use crate::configuration::RdtpConfiguration;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// How a successfully received datagram is treated by the protocol.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Verdict {
    Intact,
    Corrupted,
    Lost,
}

impl Verdict {
    /// Classifies a draw `r` in `[1, 100]`. The loss check runs last and
    /// overrides corruption.
    pub fn classify(r: u32, corruption_probability: f64, loss_probability: f64) -> Self {
        let r = r as f64;
        let mut verdict = if r <= corruption_probability * 100.0 {
            Verdict::Corrupted
        } else {
            Verdict::Intact
        };
        if r <= loss_probability * 100.0 {
            verdict = Verdict::Lost;
        }
        verdict
    }
}

/// Simulates corruption and loss on top of real receives.
#[derive(Debug)]
pub struct FaultInjector<R = StdRng> {
    corruption_probability: f64,
    loss_probability: f64,
    rng: R,
}

impl FaultInjector<StdRng> {
    pub fn from_config(config: &RdtpConfiguration) -> Self {
        let rng = match config.fault_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config.corruption_probability, config.loss_probability, rng)
    }
}

impl<R: RngCore> FaultInjector<R> {
    pub fn with_rng(corruption_probability: f64, loss_probability: f64, rng: R) -> Self {
        Self {
            corruption_probability,
            loss_probability,
            rng,
        }
    }

    pub fn inspect(&mut self) -> Verdict {
        let r = self.rng.gen_range(1..=100);
        Verdict::classify(r, self.corruption_probability, self.loss_probability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 0.0, 0.0, Verdict::Intact)]
    #[case(100, 0.0, 0.0, Verdict::Intact)]
    #[case(30, 0.3, 0.0, Verdict::Corrupted)]
    #[case(31, 0.3, 0.0, Verdict::Intact)]
    #[case(20, 0.0, 0.2, Verdict::Lost)]
    #[case(21, 0.0, 0.2, Verdict::Intact)]
    #[case::loss_overrides_corruption(10, 0.5, 0.2, Verdict::Lost)]
    #[case::corruption_above_loss(40, 0.5, 0.2, Verdict::Corrupted)]
    #[case(100, 1.0, 1.0, Verdict::Lost)]
    #[case(100, 1.0, 0.0, Verdict::Corrupted)]
    fn test_classify(
        #[case] r: u32,
        #[case] corruption: f64,
        #[case] loss: f64,
        #[case] expected: Verdict,
    ) {
        assert_eq!(Verdict::classify(r, corruption, loss), expected);
    }

    #[test]
    fn same_seed_gives_same_verdicts() {
        let config = RdtpConfiguration {
            corruption_probability: 0.4,
            loss_probability: 0.3,
            fault_seed: Some(42),
            ..Default::default()
        };
        let mut a = FaultInjector::from_config(&config);
        let mut b = FaultInjector::from_config(&config);
        let a: Vec<_> = (0..200).map(|_| a.inspect()).collect();
        let b: Vec<_> = (0..200).map(|_| b.inspect()).collect();
        assert_eq!(a, b);
        assert!(a.contains(&Verdict::Lost));
        assert!(a.contains(&Verdict::Corrupted));
        assert!(a.contains(&Verdict::Intact));
    }

    #[test]
    fn rates_follow_probabilities() {
        let mut faults = FaultInjector::with_rng(0.5, 0.2, StdRng::seed_from_u64(7));
        let draws = 10_000;
        let verdicts: Vec<_> = (0..draws).map(|_| faults.inspect()).collect();
        let lost = verdicts.iter().filter(|v| **v == Verdict::Lost).count() as f64 / draws as f64;
        let corrupted =
            verdicts.iter().filter(|v| **v == Verdict::Corrupted).count() as f64 / draws as f64;
        assert!((lost - 0.2).abs() < 0.03, "loss rate {}", lost);
        assert!((corrupted - 0.3).abs() < 0.03, "corruption rate {}", corrupted);
    }

    #[test]
    fn transparent_injector_never_interferes() {
        let mut faults = FaultInjector::from_config(&RdtpConfiguration::default());
        assert!((0..1000).all(|_| faults.inspect() == Verdict::Intact));
    }
}
