//! Competing-rates scheduler deciding when the next coevolutionary event
//! fires and which of the three it is.
use crate::tree::EventKind;
use anyhow::ensure;
use rand::Rng;
use rand_distr::Exp;

/// The per-event rates of the coevolutionary model, before scaling by the
/// overall clock-rate multiplier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoevolutionRates {
    pub duplication: f64,
    pub host_switch: f64,
    pub loss: f64,
}

/// The three effective (clock-scaled) event rates competing within one host
/// branch. Validated at construction: every rate finite and non-negative.
///
/// A zero total is the degenerate pure-cospeciation regime: the waiting time
/// is infinite and no event ever fires.
#[derive(Clone, Copy, Debug)]
pub struct EventRates {
    duplication: f64,
    host_switch: f64,
    loss: f64,
    total: f64,
    waiting: Option<Exp<f64>>,
}

impl EventRates {
    pub fn new(rates: &CoevolutionRates, clock_rate: f64) -> anyhow::Result<Self> {
        ensure!(
            clock_rate.is_finite() && clock_rate > 0.,
            "clock rate must be finite and positive, got {}",
            clock_rate
        );
        for (name, rate) in [
            ("duplication", rates.duplication),
            ("host-switch", rates.host_switch),
            ("loss", rates.loss),
        ] {
            ensure!(
                rate.is_finite() && rate >= 0.,
                "{} rate must be finite and non-negative, got {}",
                name,
                rate
            );
        }
        let duplication = clock_rate * rates.duplication;
        let host_switch = clock_rate * rates.host_switch;
        let loss = clock_rate * rates.loss;
        let total = duplication + host_switch + loss;
        let waiting = if total > 0. {
            Some(Exp::new(total).expect("total rate is finite and positive"))
        } else {
            None
        };
        Ok(EventRates { duplication, host_switch, loss, total, waiting })
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    /// Height decrement until the next coevolutionary event, exponentially
    /// distributed with the total rate. Infinite when no event can fire.
    pub fn waiting_time<R: Rng>(&self, rng: &mut R) -> f64 {
        match self.waiting {
            Some(waiting) => rng.sample(waiting),
            None => f64::INFINITY,
        }
    }

    /// Which event fires, given that one does. Cumulative normalized
    /// probabilities against a uniform draw kept strictly in (0, 1].
    pub fn select_event<R: Rng>(&self, rng: &mut R) -> EventKind {
        assert!(self.total > 0., "event selection with a zero total rate");
        let p_duplication = self.duplication / self.total;
        let p_host_switch = p_duplication + self.host_switch / self.total;
        // a draw of exactly zero would always select a duplication
        let u = 1. - rng.gen::<f64>();
        if u <= p_duplication {
            EventKind::Duplication
        } else if u <= p_host_switch {
            EventKind::HostSwitch
        } else {
            EventKind::Loss
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rates(duplication: f64, host_switch: f64, loss: f64) -> CoevolutionRates {
        CoevolutionRates { duplication, host_switch, loss }
    }

    #[test]
    fn test_select_event_duplication_only() {
        let rates = EventRates::new(&rates(1., 0., 0.), 1.).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(26);
        for _ in 0..100 {
            assert_eq!(rates.select_event(&mut rng), EventKind::Duplication);
        }
    }

    #[test]
    fn test_select_event_host_switch_only() {
        let rates = EventRates::new(&rates(0., 1., 0.), 1.).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(26);
        for _ in 0..100 {
            assert_eq!(rates.select_event(&mut rng), EventKind::HostSwitch);
        }
    }

    #[test]
    fn test_select_event_loss_only() {
        let rates = EventRates::new(&rates(0., 0., 1.), 1.).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(26);
        for _ in 0..100 {
            assert_eq!(rates.select_event(&mut rng), EventKind::Loss);
        }
    }

    #[test]
    fn test_select_event_dominant_rate_wins() {
        let rates = EventRates::new(&rates(10000., 0.001, 0.001), 1.).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(26);
        assert_eq!(rates.select_event(&mut rng), EventKind::Duplication);
    }

    #[test]
    fn test_waiting_time_zero_total_is_infinite() {
        let rates = EventRates::new(&rates(0., 0., 0.), 1.).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(26);
        assert_eq!(rates.total(), 0.);
        assert!(rates.waiting_time(&mut rng).is_infinite());
    }

    #[test]
    fn test_waiting_time_is_positive_and_finite() {
        let rates = EventRates::new(&rates(0.3, 0.2, 0.1), 2.).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(26);
        for _ in 0..100 {
            let t = rates.waiting_time(&mut rng);
            assert!(t.is_finite());
            assert!(t > 0.);
        }
    }

    #[test]
    fn test_clock_rate_scales_total() {
        let rates = EventRates::new(&rates(0.2, 0.2, 0.1), 2.).unwrap();
        assert!((rates.total() - 1.).abs() < f64::EPSILON);
    }

    #[test]
    fn test_negative_rate_is_a_configuration_error() {
        assert!(EventRates::new(&rates(-1., 0., 0.), 1.).is_err());
        assert!(EventRates::new(&rates(0., -0.1, 0.), 1.).is_err());
    }

    #[test]
    fn test_non_finite_rate_is_a_configuration_error() {
        assert!(EventRates::new(&rates(f64::NAN, 0., 0.), 1.).is_err());
        assert!(EventRates::new(&rates(0., f64::INFINITY, 0.), 1.).is_err());
    }

    #[test]
    fn test_bad_clock_rate_is_a_configuration_error() {
        assert!(EventRates::new(&rates(1., 1., 1.), 0.).is_err());
        assert!(EventRates::new(&rates(1., 1., 1.), -1.).is_err());
        assert!(EventRates::new(&rates(1., 1., 1.), f64::NAN).is_err());
    }
}
