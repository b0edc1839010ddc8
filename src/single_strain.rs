//! Scenario 1: one sensitive and one resistant strain against the host
//! immune system.
//!
//! Model from Gjini & Brito (2016), "Integrating Antimicrobial Therapy with
//! Host Immunity to Fight Drug-Resistant Infections: Classical vs. Adaptive
//! Treatment", PLOS Comput. Biol. 12(4), e1004857. Every update is a forward
//! Euler step `new = old + rate * time_step`.

use crate::uptake::{TreatmentPolicy, Uptake};
use serde::{Deserialize, Serialize};

/// Densities below this are considered extinct.
pub const EXTINCTION_DENSITY: f64 = 1.0;
/// Value an extinct density takes before the next evaluation.
pub const DENSITY_FLOOR: f64 = 1e-4;

/// Growth and antibiotic susceptibility of one strain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrainParams {
    pub initial_density: f64,
    pub growth_rate: f64,
    pub antibiotic_inhibition: f64,
}

/// Immune response parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImmuneParams {
    pub initial_naive_density: f64,
    /// Maximum proliferation rate of immune cells (σ).
    pub proliferation_rate: f64,
    /// Bacterial density at which the response grows at half its maximum rate (k).
    pub half_max_growth: f64,
    /// Maximum decay rate of effector cells (h).
    pub effector_decay: f64,
    /// Fraction of decaying effectors that become memory cells (f).
    pub memory_conversion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleStrainParams {
    pub sensitive: StrainParams,
    pub resistant: StrainParams,
    /// Rate at which lymphocytes kill bacteria (d).
    pub lymphocyte_inhibition: f64,
    pub immune: ImmuneParams,
    /// Mean antibiotic concentration while administered (mg/l).
    pub antibiotic_concentration: f64,
    /// Total bacterial density that kills the host.
    pub host_death_density: f64,
    pub policy: TreatmentPolicy,
    /// Simulated days per tick.
    pub time_step: f64,
}

/// Scenario 1 state at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleStrainState {
    pub time: f64,
    pub sensitive: f64,
    pub resistant: f64,
    pub naive: f64,
    pub effector: f64,
    pub memory: f64,
}

/// Killing pressure acting on every strain during one tick.
#[derive(Debug, Clone, Copy)]
pub struct KillPressure {
    pub lymphocyte_inhibition: f64,
    pub total_immune: f64,
    pub uptake: Uptake,
    pub concentration: f64,
}

/// Forward Euler update, clamped to non-negative values.
pub fn euler(old: f64, rate: f64, time_step: f64) -> f64 {
    (old + rate * time_step).max(0.0)
}

/// Replace an extinct density by [`DENSITY_FLOOR`].
pub fn floor_density(density: f64) -> f64 {
    if density < EXTINCTION_DENSITY {
        DENSITY_FLOOR
    } else {
        density
    }
}

/// `rB - dBI - δBηA`, for an already floored density `B`.
pub fn bacteria_rate(density: f64, strain: &StrainParams, kill: &KillPressure) -> f64 {
    strain.growth_rate * density
        - kill.lymphocyte_inhibition * density * kill.total_immune
        - strain.antibiotic_inhibition * density * kill.uptake.factor() * kill.concentration
}

/// Saturating immune stimulus `B/(k+B)`.
pub fn stimulus(total_bacteria: f64, half_max_growth: f64) -> f64 {
    total_bacteria / (half_max_growth + total_bacteria)
}

/// `-σN * B/(k+B)`
pub fn naive_rate(naive: f64, immune: &ImmuneParams, stimulus: f64) -> f64 {
    -immune.proliferation_rate * naive * stimulus
}

/// `(2σN + σE) * B/(k+B) - hE * (1 - B/(k+B))`
pub fn effector_rate(naive: f64, effector: f64, immune: &ImmuneParams, stimulus: f64) -> f64 {
    let sigma = immune.proliferation_rate;
    (2.0 * sigma * naive + sigma * effector) * stimulus
        - immune.effector_decay * effector * (1.0 - stimulus)
}

/// `fEh * (1 - B/(k+B))`
pub fn memory_rate(effector: f64, immune: &ImmuneParams, stimulus: f64) -> f64 {
    immune.memory_conversion * effector * immune.effector_decay * (1.0 - stimulus)
}

impl SingleStrainState {
    pub fn initial(params: &SingleStrainParams) -> Self {
        Self {
            time: 0.0,
            sensitive: params.sensitive.initial_density,
            resistant: params.resistant.initial_density,
            naive: params.immune.initial_naive_density,
            effector: 0.0,
            memory: 0.0,
        }
    }

    pub fn total_bacteria(&self) -> f64 {
        self.sensitive + self.resistant
    }

    pub fn total_immune(&self) -> f64 {
        self.naive + self.effector + self.memory
    }

    /// Compute the next state.
    ///
    /// All five equations read exclusively from `self`, so the result does
    /// not depend on evaluation order.
    pub fn advance(&self, params: &SingleStrainParams, uptake: Uptake) -> Self {
        let dt = params.time_step;
        let immune = &params.immune;

        let kill = KillPressure {
            lymphocyte_inhibition: params.lymphocyte_inhibition,
            total_immune: self.total_immune(),
            uptake,
            concentration: params.antibiotic_concentration,
        };
        let stimulus = stimulus(self.total_bacteria(), immune.half_max_growth);

        let sensitive = floor_density(self.sensitive);
        let resistant = floor_density(self.resistant);

        Self {
            time: self.time + dt,
            sensitive: euler(
                sensitive,
                bacteria_rate(sensitive, &params.sensitive, &kill),
                dt,
            ),
            resistant: euler(
                resistant,
                bacteria_rate(resistant, &params.resistant, &kill),
                dt,
            ),
            naive: euler(self.naive, naive_rate(self.naive, immune, stimulus), dt),
            effector: euler(
                self.effector,
                effector_rate(self.naive, self.effector, immune, stimulus),
                dt,
            ),
            memory: euler(
                self.memory,
                memory_rate(self.effector, immune, stimulus),
                dt,
            ),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    pub(crate) fn default_params(policy: TreatmentPolicy) -> SingleStrainParams {
        SingleStrainParams {
            sensitive: StrainParams {
                initial_density: 10.0,
                growth_rate: 3.3,
                antibiotic_inhibition: 1.0,
            },
            resistant: StrainParams {
                initial_density: 2.0,
                growth_rate: 1.1,
                antibiotic_inhibition: 0.1,
            },
            lymphocyte_inhibition: 1e-5,
            immune: ImmuneParams {
                initial_naive_density: 200.0,
                proliferation_rate: 2.0,
                half_max_growth: 1e5,
                effector_decay: 0.35,
                memory_conversion: 0.1,
            },
            antibiotic_concentration: 6.0,
            host_death_density: 1e14,
            policy,
            time_step: 1.0 / 1440.0,
        }
    }

    #[test]
    fn treatment_shrinks_sensitive_strain() {
        let params = default_params(TreatmentPolicy::User {
            administering: true,
        });
        let state = SingleStrainState::initial(&params);
        let next = state.advance(&params, Uptake::On);

        assert!(next.sensitive < 10.0);
        // 33 - 0.02 - 60 per day, over one minute
        assert_relative_eq!(next.sensitive, 10.0 - 27.02 / 1440.0, max_relative = 1e-12);
        assert_relative_eq!(next.time, 1.0 / 1440.0);
    }

    #[test]
    fn untreated_strains_grow() {
        let params = default_params(TreatmentPolicy::User {
            administering: false,
        });
        let state = SingleStrainState::initial(&params);
        let next = state.advance(&params, Uptake::Off);
        assert!(next.sensitive > state.sensitive);
        assert!(next.resistant > state.resistant);
    }

    #[test]
    fn extinct_density_is_floored() {
        assert_eq!(floor_density(0.999), DENSITY_FLOOR);
        assert_eq!(floor_density(0.0), DENSITY_FLOOR);
        assert_eq!(floor_density(1.0), 1.0);

        let params = default_params(TreatmentPolicy::User {
            administering: false,
        });
        let state = SingleStrainState {
            sensitive: 0.5,
            ..SingleStrainState::initial(&params)
        };
        let next = state.advance(&params, Uptake::Off);
        assert!(next.sensitive < EXTINCTION_DENSITY);
        assert!(next.sensitive > DENSITY_FLOOR);
    }

    #[test]
    fn immune_compartments_follow_stimulus() {
        let params = default_params(TreatmentPolicy::User {
            administering: false,
        });
        let state = SingleStrainState {
            sensitive: 1e5,
            resistant: 0.0,
            effector: 10.0,
            ..SingleStrainState::initial(&params)
        };
        let s = stimulus(state.total_bacteria(), params.immune.half_max_growth);
        assert_relative_eq!(s, 0.5);

        let next = state.advance(&params, Uptake::Off);
        let dt = params.time_step;
        assert_relative_eq!(next.naive, 200.0 - 2.0 * 200.0 * 0.5 * dt);
        assert_relative_eq!(
            next.effector,
            10.0 + ((2.0 * 2.0 * 200.0 + 2.0 * 10.0) * 0.5 - 0.35 * 10.0 * 0.5) * dt
        );
        assert_relative_eq!(next.memory, 0.1 * 10.0 * 0.35 * 0.5 * dt);
    }

    #[test]
    fn update_reads_previous_snapshot_only() {
        let params = default_params(TreatmentPolicy::User {
            administering: false,
        });
        let state = SingleStrainState {
            effector: 50.0,
            memory: 5.0,
            ..SingleStrainState::initial(&params)
        };
        let next = state.advance(&params, Uptake::Off);
        let s = stimulus(state.total_bacteria(), params.immune.half_max_growth);
        // memory uses the previous effector density, not the freshly updated one
        assert_relative_eq!(
            next.memory,
            euler(5.0, memory_rate(50.0, &params.immune, s), params.time_step)
        );
    }

    proptest! {
        #[test]
        fn densities_never_negative(
            growth_rate in 0.0f64..8.0,
            inhibition in 0.0f64..1.0,
            concentration in 0.0f64..128.0,
            lymphocyte_inhibition in 1e-5f64..1e-2,
            sensitive in 0.0f64..1e7,
            naive in 0.0f64..1e6,
        ) {
            let mut params = default_params(TreatmentPolicy::User { administering: true });
            params.sensitive.growth_rate = growth_rate;
            params.sensitive.antibiotic_inhibition = inhibition;
            params.antibiotic_concentration = concentration;
            params.lymphocyte_inhibition = lymphocyte_inhibition;
            let mut state = SingleStrainState {
                sensitive,
                naive,
                ..SingleStrainState::initial(&params)
            };
            for _ in 0..200 {
                state = state.advance(&params, Uptake::On);
                prop_assert!(state.sensitive >= 0.0);
                prop_assert!(state.resistant >= 0.0);
                prop_assert!(state.naive >= 0.0);
                prop_assert!(state.effector >= 0.0);
                prop_assert!(state.memory >= 0.0);
            }
        }
    }
}
