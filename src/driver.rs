use crate::chemostat::{ChemostatParams, ChemostatState, EXTINCTION_FREQUENCY};
use crate::error::SimError;
use crate::model::{Outcome, Snapshot};
use crate::sequence::StepDriver;
use crate::single_strain::{EXTINCTION_DENSITY, SingleStrainParams, SingleStrainState};
use crate::uptake::Uptake;
use serde::{Deserialize, Serialize};

/// Scenario 1 driver.
///
/// Values are emitted as sensitive, resistant, naive, effector, memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleStrainDriver {
    params: SingleStrainParams,
    state: SingleStrainState,
    tick: u64,
    uptake: Uptake,
}

impl SingleStrainDriver {
    pub fn new(params: SingleStrainParams) -> Self {
        let state = SingleStrainState::initial(&params);
        let uptake = params.policy.uptake(state.total_bacteria(), state.time);
        Self {
            params,
            state,
            tick: 0,
            uptake,
        }
    }

    /// Set the administration flag read by the next step.
    pub fn set_administering(&mut self, on: bool) -> Result<(), SimError> {
        self.params.policy.set_administering(on)
    }

    /// Host death takes precedence over extinction.
    pub fn outcome(&self) -> Outcome {
        let state = &self.state;
        if state.total_bacteria() >= self.params.host_death_density {
            Outcome::HostDied
        } else if state.sensitive < EXTINCTION_DENSITY && state.resistant < EXTINCTION_DENSITY {
            Outcome::BacteriaExtinct
        } else {
            Outcome::StillRunning
        }
    }
}

impl StepDriver for SingleStrainDriver {
    fn value_labels(&self) -> Vec<String> {
        ["sensitive", "resistant", "naive", "effector", "memory"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn antibiotic_labels(&self) -> Vec<String> {
        vec!["antibiotic".to_string()]
    }

    fn snapshot(&self) -> Snapshot {
        let state = &self.state;
        Snapshot {
            tick: self.tick,
            time: state.time,
            values: vec![
                state.sensitive,
                state.resistant,
                state.naive,
                state.effector,
                state.memory,
            ],
            antibiotics: vec![self.uptake.factor() * self.params.antibiotic_concentration],
            outcome: self.outcome(),
        }
    }

    fn step(&mut self) {
        let uptake = self
            .params
            .policy
            .uptake(self.state.total_bacteria(), self.state.time);
        self.state = self.state.advance(&self.params, uptake);
        self.uptake = uptake;
        self.tick += 1;
    }

    fn reset(&self) -> Self {
        Self::new(self.params.clone())
    }
}

/// Scenario 2 driver.
///
/// Values are the relative frequencies of the genera, in configuration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChemostatDriver {
    params: ChemostatParams,
    state: ChemostatState,
    frequencies: Vec<f64>,
    tick: u64,
    uptakes: Vec<Uptake>,
}

impl ChemostatDriver {
    pub fn new(params: ChemostatParams) -> Self {
        let state = ChemostatState::initial(&params);
        let uptakes = evaluate_uptakes(&params, &state);
        let mut driver = Self {
            params,
            state,
            frequencies: Vec::new(),
            tick: 0,
            uptakes,
        };
        driver.mark_deaths();
        driver
    }

    /// Set the administration flag of one antibiotic.
    pub fn set_administering(&mut self, antibiotic: &str, on: bool) -> Result<(), SimError> {
        let antibiotic = self
            .params
            .antibiotics
            .iter_mut()
            .find(|candidate| candidate.name == antibiotic)
            .ok_or_else(|| SimError::UnknownAntibiotic {
                name: antibiotic.to_string(),
            })?;
        antibiotic.policy.set_administering(on)
    }

    /// Set the administration flag of every user-controlled antibiotic.
    pub fn set_administering_all(&mut self, on: bool) -> Result<(), SimError> {
        let mut n_toggled = 0;
        for antibiotic in &mut self.params.antibiotics {
            if antibiotic.policy.set_administering(on).is_ok() {
                n_toggled += 1;
            }
        }
        if n_toggled == 0 {
            return Err(SimError::NotUserControlled);
        }
        Ok(())
    }

    pub fn outcome(&self) -> Outcome {
        if self.state.live_frequency(&self.frequencies) <= EXTINCTION_FREQUENCY {
            Outcome::AllBacteriaExtinct
        } else {
            Outcome::StillRunning
        }
    }

    fn mark_deaths(&mut self) {
        let (frequencies, died) = self.state.mark_deaths();
        for idx in died {
            log::debug!(
                "{} died at tick {} (t = {:.4} days)",
                self.params.genera[idx].name,
                self.tick,
                self.state.time
            );
        }
        self.frequencies = frequencies;
    }
}

fn evaluate_uptakes(params: &ChemostatParams, state: &ChemostatState) -> Vec<Uptake> {
    let total_density = state.live_density();
    params
        .antibiotics
        .iter()
        .map(|antibiotic| antibiotic.policy.uptake(total_density, state.time))
        .collect()
}

impl StepDriver for ChemostatDriver {
    fn value_labels(&self) -> Vec<String> {
        self.params
            .genera
            .iter()
            .map(|genus| genus.name.clone())
            .collect()
    }

    fn antibiotic_labels(&self) -> Vec<String> {
        self.params
            .antibiotics
            .iter()
            .map(|antibiotic| antibiotic.name.clone())
            .collect()
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick,
            time: self.state.time,
            values: self.frequencies.clone(),
            antibiotics: self
                .params
                .antibiotics
                .iter()
                .zip(&self.uptakes)
                .map(|(antibiotic, uptake)| uptake.factor() * antibiotic.concentration)
                .collect(),
            outcome: self.outcome(),
        }
    }

    fn step(&mut self) {
        let uptakes = evaluate_uptakes(&self.params, &self.state);
        self.state = self.state.advance(&self.params, &uptakes);
        self.uptakes = uptakes;
        self.tick += 1;
        self.mark_deaths();
    }

    fn reset(&self) -> Self {
        Self::new(self.params.clone())
    }
}

/// Driver of either scenario, selected by the configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Driver {
    SingleStrain(SingleStrainDriver),
    Chemostat(ChemostatDriver),
}

impl Driver {
    /// Set the administration flag of user-controlled treatments.
    ///
    /// With `antibiotic == None` every user-controlled antibiotic is toggled.
    pub fn set_administering(&mut self, antibiotic: Option<&str>, on: bool) -> Result<(), SimError> {
        match (self, antibiotic) {
            (Driver::SingleStrain(driver), None) => driver.set_administering(on),
            (Driver::SingleStrain(driver), Some(name)) => {
                if driver.antibiotic_labels().iter().any(|label| label == name) {
                    driver.set_administering(on)
                } else {
                    Err(SimError::UnknownAntibiotic {
                        name: name.to_string(),
                    })
                }
            }
            (Driver::Chemostat(driver), Some(name)) => driver.set_administering(name, on),
            (Driver::Chemostat(driver), None) => driver.set_administering_all(on),
        }
    }
}

impl StepDriver for Driver {
    fn value_labels(&self) -> Vec<String> {
        match self {
            Driver::SingleStrain(driver) => driver.value_labels(),
            Driver::Chemostat(driver) => driver.value_labels(),
        }
    }

    fn antibiotic_labels(&self) -> Vec<String> {
        match self {
            Driver::SingleStrain(driver) => driver.antibiotic_labels(),
            Driver::Chemostat(driver) => driver.antibiotic_labels(),
        }
    }

    fn snapshot(&self) -> Snapshot {
        match self {
            Driver::SingleStrain(driver) => driver.snapshot(),
            Driver::Chemostat(driver) => driver.snapshot(),
        }
    }

    fn step(&mut self) {
        match self {
            Driver::SingleStrain(driver) => driver.step(),
            Driver::Chemostat(driver) => driver.step(),
        }
    }

    fn reset(&self) -> Self {
        match self {
            Driver::SingleStrain(driver) => Driver::SingleStrain(driver.reset()),
            Driver::Chemostat(driver) => Driver::Chemostat(driver.reset()),
        }
    }
}
