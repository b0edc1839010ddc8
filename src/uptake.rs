use crate::error::SimError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Binary antibiotic uptake signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Uptake {
    Off,
    On,
}

impl Uptake {
    /// Factor multiplying the antibiotic term of the density equations.
    pub fn factor(self) -> f64 {
        match self {
            Uptake::Off => 0.0,
            Uptake::On => 1.0,
        }
    }
}

impl From<bool> for Uptake {
    fn from(on: bool) -> Self {
        if on { Uptake::On } else { Uptake::Off }
    }
}

/// Treatment policy identifier, as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Classic,
    Adaptive,
    User,
}

impl FromStr for PolicyKind {
    type Err = SimError;

    fn from_str(kind: &str) -> Result<Self, Self::Err> {
        match kind {
            "classic" => Ok(PolicyKind::Classic),
            "adaptive" => Ok(PolicyKind::Adaptive),
            "user" => Ok(PolicyKind::User),
            _ => Err(SimError::InvalidPolicy {
                kind: kind.to_string(),
            }),
        }
    }
}

/// Rule deciding when the antibiotic is administered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreatmentPolicy {
    /// Fixed treatment window `[delay, delay + duration]` (days).
    Classic { delay: f64, duration: f64 },
    /// Treat whenever the total bacterial density reaches `threshold`.
    Adaptive { threshold: f64 },
    /// Externally toggled administration.
    User { administering: bool },
}

impl TreatmentPolicy {
    /// Evaluate the uptake signal.
    ///
    /// `total_density` is the summed density of every live strain or genus
    /// and `time` the simulated time in days, both taken from the previous
    /// snapshot.
    pub fn uptake(&self, total_density: f64, time: f64) -> Uptake {
        match *self {
            TreatmentPolicy::Classic { delay, duration } => {
                Uptake::from(delay <= time && time <= delay + duration)
            }
            TreatmentPolicy::Adaptive { threshold } => Uptake::from(total_density >= threshold),
            TreatmentPolicy::User { administering } => Uptake::from(administering),
        }
    }

    /// Flip the administration flag of a user policy.
    pub fn set_administering(&mut self, on: bool) -> Result<(), SimError> {
        match self {
            TreatmentPolicy::User { administering } => {
                *administering = on;
                Ok(())
            }
            _ => Err(SimError::NotUserControlled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn classic_window_is_inclusive() {
        let policy = TreatmentPolicy::Classic {
            delay: 3.5,
            duration: 7.0,
        };
        assert_eq!(policy.uptake(0.0, 3.0), Uptake::Off);
        assert_eq!(policy.uptake(0.0, 3.5), Uptake::On);
        assert_eq!(policy.uptake(0.0, 5.0), Uptake::On);
        assert_eq!(policy.uptake(0.0, 10.5), Uptake::On);
        assert_eq!(policy.uptake(0.0, 11.0), Uptake::Off);
    }

    #[test]
    fn adaptive_toggles_around_threshold() {
        let policy = TreatmentPolicy::Adaptive { threshold: 1e6 };
        assert_eq!(policy.uptake(999_999.0, 0.0), Uptake::Off);
        assert_eq!(policy.uptake(1e6, 0.0), Uptake::On);
        assert_eq!(policy.uptake(5e5, 1.0), Uptake::Off);
    }

    #[test]
    fn user_follows_flag() {
        let mut policy = TreatmentPolicy::User {
            administering: false,
        };
        assert_eq!(policy.uptake(1e9, 100.0), Uptake::Off);
        policy.set_administering(true).unwrap();
        assert_eq!(policy.uptake(0.0, 0.0), Uptake::On);
    }

    #[test]
    fn only_user_policy_can_be_toggled() {
        let mut policy = TreatmentPolicy::Adaptive { threshold: 1.0 };
        assert_eq!(
            policy.set_administering(true),
            Err(SimError::NotUserControlled)
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert_eq!("adaptive".parse(), Ok(PolicyKind::Adaptive));
        assert_eq!(
            "Classic".parse::<PolicyKind>(),
            Err(SimError::InvalidPolicy {
                kind: "Classic".to_string()
            })
        );
    }

    #[test]
    fn uptake_factor() {
        assert_eq!(Uptake::On.factor(), 1.0);
        assert_eq!(Uptake::Off.factor(), 0.0);
    }

    proptest! {
        #[test]
        fn evaluation_is_repeatable(
            delay in 0.0f64..20.0,
            duration in 0.0f64..20.0,
            threshold in 1.0f64..1e8,
            density in 0.0f64..1e8,
            time in 0.0f64..40.0,
        ) {
            for policy in [
                TreatmentPolicy::Classic { delay, duration },
                TreatmentPolicy::Adaptive { threshold },
                TreatmentPolicy::User { administering: true },
            ] {
                prop_assert_eq!(policy.uptake(density, time), policy.uptake(density, time));
            }
        }
    }
}
