use crate::single_strain::{euler, floor_density};
use crate::uptake::{TreatmentPolicy, Uptake};
use serde::{Deserialize, Serialize};

/// Nutrient concentration of the inflowing medium.
pub const INFLOW_CONCENTRATION: f64 = 100.0;
/// Added to the live density sum in the relative-frequency denominator.
pub const FREQUENCY_OFFSET: f64 = 1.0;
/// Relative frequency at or below which a genus is considered dead.
pub const DEATH_FREQUENCY: f64 = 1e-4;
/// Density and frequency a dead genus is pinned to.
pub const DEAD_SENTINEL: f64 = 1e-10;
/// Summed live frequency at or below which the whole community is extinct.
pub const EXTINCTION_FREQUENCY: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenusParams {
    pub name: String,
    /// Growth rate (ψ).
    pub growth_rate: f64,
    /// Reference density the genus is in equilibrium at without antibiotics.
    pub stable_density: f64,
    /// Nutrients consumed per duplication (ε), see [`nutrients_per_duplication`].
    pub nutrients_per_duplication: f64,
    /// Inhibition coefficient per antibiotic, aligned with [`ChemostatParams::antibiotics`].
    pub inhibition: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntibioticParams {
    pub name: String,
    pub concentration: f64,
    pub policy: TreatmentPolicy,
}

/// Genera on their own Monod nutrient reservoirs, washed out at `ω` and
/// inhibited by every administered antibiotic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChemostatParams {
    pub genera: Vec<GenusParams>,
    pub antibiotics: Vec<AntibioticParams>,
    /// Flow rate of the medium (ω).
    pub flow_rate: f64,
    /// Half-saturation nutrient concentration (Q).
    pub half_saturation: f64,
    pub time_step: f64,
}

/// State of one genus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenusState {
    pub density: f64,
    pub nutrient: f64,
    pub dead: bool,
}

/// Scenario 2 state at one tick; `genera` is aligned with [`ChemostatParams::genera`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChemostatState {
    pub time: f64,
    pub genera: Vec<GenusState>,
}

/// ε such that `stable_density` is a fixed point when nutrients sit at
/// [`equilibrium_nutrient`]: `(N₀(ψ-ω) - Qω) / (B(ψ-ω))`.
pub fn nutrients_per_duplication(
    growth_rate: f64,
    flow_rate: f64,
    half_saturation: f64,
    stable_density: f64,
) -> f64 {
    let net_growth = growth_rate - flow_rate;
    (INFLOW_CONCENTRATION * net_growth - half_saturation * flow_rate)
        / (stable_density * net_growth)
}

/// Nutrient level at which growth exactly balances wash-out: `Qω/(ψ-ω)`.
pub fn equilibrium_nutrient(growth_rate: f64, flow_rate: f64, half_saturation: f64) -> f64 {
    half_saturation * flow_rate / (growth_rate - flow_rate)
}

/// Monod saturation `C/(Q+C)`.
pub fn saturation(nutrient: f64, half_saturation: f64) -> f64 {
    nutrient / (half_saturation + nutrient)
}

/// `ωN₀ - εψB * C/(Q+C) - ωC`
pub fn nutrient_rate(
    nutrient: f64,
    density: f64,
    genus: &GenusParams,
    flow_rate: f64,
    half_saturation: f64,
) -> f64 {
    flow_rate * INFLOW_CONCENTRATION
        - genus.nutrients_per_duplication
            * genus.growth_rate
            * density
            * saturation(nutrient, half_saturation)
        - flow_rate * nutrient
}

/// `Σₐ δₐ ηₐ Aₐ` over every antibiotic acting on the genus.
pub fn combined_inhibition(inhibition: &[f64], uptakes: &[Uptake], concentrations: &[f64]) -> f64 {
    inhibition
        .iter()
        .zip(uptakes)
        .zip(concentrations)
        .map(|((&delta, uptake), &concentration)| delta * uptake.factor() * concentration)
        .sum()
}

/// `ψB * C/(Q+C) - ωB - (Σₐ δₐηₐAₐ)B`, for an already floored density `B`.
///
/// The lymphocyte term of the general model is identically zero here.
pub fn density_rate(
    density: f64,
    nutrient: f64,
    growth_rate: f64,
    flow_rate: f64,
    half_saturation: f64,
    inhibition: f64,
) -> f64 {
    growth_rate * density * saturation(nutrient, half_saturation)
        - flow_rate * density
        - density * inhibition
}

impl ChemostatState {
    /// Every genus at its reference density and equilibrium nutrient level.
    pub fn initial(params: &ChemostatParams) -> Self {
        let genera = params
            .genera
            .iter()
            .map(|genus| GenusState {
                density: genus.stable_density,
                nutrient: equilibrium_nutrient(
                    genus.growth_rate,
                    params.flow_rate,
                    params.half_saturation,
                ),
                dead: false,
            })
            .collect();
        Self { time: 0.0, genera }
    }

    /// Summed density of live genera.
    pub fn live_density(&self) -> f64 {
        self.genera
            .iter()
            .filter(|genus| !genus.dead)
            .map(|genus| genus.density)
            .sum()
    }

    /// Compute the next state given the uptake of every antibiotic.
    ///
    /// Dead genera are carried over untouched. For live genera the nutrient
    /// level is updated first and the density update reads the new level.
    pub fn advance(&self, params: &ChemostatParams, uptakes: &[Uptake]) -> Self {
        let dt = params.time_step;
        let concentrations: Vec<f64> = params
            .antibiotics
            .iter()
            .map(|antibiotic| antibiotic.concentration)
            .collect();

        let genera = params
            .genera
            .iter()
            .zip(&self.genera)
            .map(|(genus, state)| {
                if state.dead {
                    return state.clone();
                }

                let nutrient = euler(
                    state.nutrient,
                    nutrient_rate(
                        state.nutrient,
                        state.density,
                        genus,
                        params.flow_rate,
                        params.half_saturation,
                    ),
                    dt,
                );

                let inhibition = combined_inhibition(&genus.inhibition, uptakes, &concentrations);
                let density = floor_density(state.density);
                let density = euler(
                    density,
                    density_rate(
                        density,
                        nutrient,
                        genus.growth_rate,
                        params.flow_rate,
                        params.half_saturation,
                        inhibition,
                    ),
                    dt,
                );

                GenusState {
                    density,
                    nutrient,
                    dead: false,
                }
            })
            .collect();

        Self {
            time: self.time + dt,
            genera,
        }
    }

    /// Relative frequency of every genus, `B / (1 + Σ live B)`.
    ///
    /// Dead genera read [`DEAD_SENTINEL`].
    pub fn frequencies(&self) -> Vec<f64> {
        let total = FREQUENCY_OFFSET + self.live_density();
        self.genera
            .iter()
            .map(|genus| {
                if genus.dead {
                    DEAD_SENTINEL
                } else {
                    genus.density / total
                }
            })
            .collect()
    }

    /// Mark every live genus whose frequency is at or below
    /// [`DEATH_FREQUENCY`] as dead and pin it to [`DEAD_SENTINEL`].
    ///
    /// Returns the frequencies after marking and the indices that died now.
    pub fn mark_deaths(&mut self) -> (Vec<f64>, Vec<usize>) {
        let mut frequencies = self.frequencies();
        let mut died = Vec::new();
        for (idx, (genus, frequency)) in self
            .genera
            .iter_mut()
            .zip(frequencies.iter_mut())
            .enumerate()
        {
            if !genus.dead && *frequency <= DEATH_FREQUENCY {
                genus.dead = true;
                genus.density = DEAD_SENTINEL;
                *frequency = DEAD_SENTINEL;
                died.push(idx);
            }
        }
        (frequencies, died)
    }

    /// Summed frequency of genera still alive.
    pub fn live_frequency(&self, frequencies: &[f64]) -> f64 {
        self.genera
            .iter()
            .zip(frequencies)
            .filter(|(genus, _)| !genus.dead)
            .map(|(_, &frequency)| frequency)
            .sum()
    }
}
