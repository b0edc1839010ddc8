use crate::chemostat::{
    AntibioticParams, ChemostatParams, GenusParams, INFLOW_CONCENTRATION, equilibrium_nutrient,
    nutrients_per_duplication,
};
use crate::driver::{ChemostatDriver, Driver, SingleStrainDriver};
use crate::enterotype::{ANTIBIOTIC_CLASSES, DEFAULT_CONCENTRATION, DEFAULT_GROWTH_RATE, Enterotype};
use crate::error::SimError;
use crate::single_strain::{ImmuneParams, SingleStrainParams, StrainParams};
use crate::uptake::{PolicyKind, TreatmentPolicy};
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    fmt::Debug,
    fs,
    ops::{Bound, RangeBounds},
    path::Path,
};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub output: OutputConfig,
}

/// Model parameters, selected by the `scenario` key.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(tag = "scenario", rename_all = "snake_case")]
pub enum ModelConfig {
    SingleStrain(SingleStrainConfig),
    Chemostat(ChemostatConfig),
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Number of steps between recorded snapshots.
    pub steps_per_save: usize,
    /// Number of recorded snapshots per file.
    pub saves_per_file: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SingleStrainConfig {
    #[serde(default = "default_sensitive")]
    pub sensitive: StrainConfig,
    #[serde(default = "default_resistant")]
    pub resistant: StrainConfig,
    #[serde(default = "default_lymphocyte_inhibition")]
    pub lymphocyte_inhibition: f64,
    #[serde(default)]
    pub immune: ImmuneConfig,
    #[serde(default = "default_concentration")]
    pub antibiotic_concentration: f64,
    #[serde(default = "default_host_death_density")]
    pub host_death_density: f64,
    pub treatment: TreatmentConfig,
    #[serde(default = "default_time_step")]
    pub time_step: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct StrainConfig {
    pub initial_density: f64,
    pub growth_rate: f64,
    pub antibiotic_inhibition: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImmuneConfig {
    pub initial_naive_density: f64,
    pub proliferation_rate: f64,
    pub half_max_growth: f64,
    pub effector_decay: f64,
    pub memory_conversion: f64,
}

impl Default for ImmuneConfig {
    fn default() -> Self {
        Self {
            initial_naive_density: 200.0,
            proliferation_rate: 2.0,
            half_max_growth: 1e5,
            effector_decay: 0.35,
            memory_conversion: 0.1,
        }
    }
}

/// Treatment policy and the parameters of every kind.
///
/// Only the parameters of the selected `kind` are used.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TreatmentConfig {
    /// One of `classic`, `adaptive` or `user`.
    pub kind: String,
    #[serde(default = "default_delay")]
    pub delay: f64,
    #[serde(default = "default_duration")]
    pub duration: f64,
    #[serde(default = "default_symptom_threshold")]
    pub symptom_threshold: f64,
    #[serde(default)]
    pub administering: bool,
}

impl TreatmentConfig {
    /// Manual treatment that starts off.
    pub fn user() -> Self {
        Self {
            kind: "user".to_string(),
            delay: default_delay(),
            duration: default_duration(),
            symptom_threshold: default_symptom_threshold(),
            administering: false,
        }
    }

    pub fn to_policy(&self) -> Result<TreatmentPolicy, SimError> {
        let policy = match self.kind.parse::<PolicyKind>()? {
            PolicyKind::Classic => TreatmentPolicy::Classic {
                delay: self.delay,
                duration: self.duration,
            },
            PolicyKind::Adaptive => TreatmentPolicy::Adaptive {
                threshold: self.symptom_threshold,
            },
            PolicyKind::User => TreatmentPolicy::User {
                administering: self.administering,
            },
        };
        Ok(policy)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.delay, 0.0..).context("invalid treatment delay")?;
        check_num(self.duration, 0.0..).context("invalid treatment duration")?;
        check_num(self.symptom_threshold, 0.0..).context("invalid symptom threshold")?;
        Ok(())
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ChemostatConfig {
    /// Preset community, used when `genera` is empty.
    #[serde(default)]
    pub enterotype: Option<Enterotype>,
    #[serde(default)]
    pub genera: Vec<GenusConfig>,
    #[serde(default = "default_antibiotics")]
    pub antibiotics: Vec<AntibioticConfig>,
    #[serde(default = "default_flow_rate")]
    pub flow_rate: f64,
    #[serde(default = "default_half_saturation")]
    pub half_saturation: f64,
    /// Seed of the generator drawing unspecified inhibition coefficients.
    #[serde(default = "default_inhibition_seed")]
    pub inhibition_seed: u64,
    #[serde(default = "default_time_step")]
    pub time_step: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct GenusConfig {
    pub name: String,
    pub stable_density: f64,
    #[serde(default = "default_growth_rate")]
    pub growth_rate: f64,
    /// Inhibition coefficient keyed by antibiotic name.
    #[serde(default)]
    pub inhibition: BTreeMap<String, f64>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct AntibioticConfig {
    pub name: String,
    #[serde(default = "default_concentration")]
    pub concentration: f64,
    #[serde(default = "TreatmentConfig::user")]
    pub treatment: TreatmentConfig,
}

fn default_sensitive() -> StrainConfig {
    StrainConfig {
        initial_density: 10.0,
        growth_rate: 3.3,
        antibiotic_inhibition: 1.0,
    }
}

fn default_resistant() -> StrainConfig {
    StrainConfig {
        initial_density: 2.0,
        growth_rate: 1.1,
        antibiotic_inhibition: 0.1,
    }
}

fn default_lymphocyte_inhibition() -> f64 {
    1e-5
}

fn default_concentration() -> f64 {
    DEFAULT_CONCENTRATION
}

fn default_host_death_density() -> f64 {
    1e14
}

fn default_time_step() -> f64 {
    1.0 / 1440.0
}

fn default_delay() -> f64 {
    3.5
}

fn default_duration() -> f64 {
    7.0
}

fn default_symptom_threshold() -> f64 {
    1e6
}

fn default_growth_rate() -> f64 {
    DEFAULT_GROWTH_RATE
}

fn default_antibiotics() -> Vec<AntibioticConfig> {
    ANTIBIOTIC_CLASSES
        .iter()
        .map(|&name| AntibioticConfig {
            name: name.to_string(),
            concentration: DEFAULT_CONCENTRATION,
            treatment: TreatmentConfig::user(),
        })
        .collect()
}

fn default_flow_rate() -> f64 {
    0.01
}

fn default_half_saturation() -> f64 {
    5.0
}

fn default_inhibition_seed() -> u64 {
    100
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents = fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Build the driver described by the model parameters.
    ///
    /// # Errors
    /// Fails with [`SimError::InvalidPolicy`] if a treatment kind is unknown.
    pub fn build_driver(&self) -> Result<Driver> {
        let driver = match &self.model {
            ModelConfig::SingleStrain(model) => {
                Driver::SingleStrain(SingleStrainDriver::new(model.to_params()?))
            }
            ModelConfig::Chemostat(model) => {
                Driver::Chemostat(ChemostatDriver::new(model.to_params()?))
            }
        };
        Ok(driver)
    }

    fn validate(&self) -> Result<()> {
        match &self.model {
            ModelConfig::SingleStrain(model) => {
                model.validate().context("invalid single strain model")?
            }
            ModelConfig::Chemostat(model) => model.validate().context("invalid chemostat model")?,
        }

        check_num(self.output.steps_per_save, 1..1_000_000)
            .context("invalid number of steps per save")?;
        check_num(self.output.saves_per_file, 1..1_000_000)
            .context("invalid number of saves per file")?;

        Ok(())
    }
}

impl SingleStrainConfig {
    fn to_params(&self) -> Result<SingleStrainParams> {
        let strain = |cfg: &StrainConfig| StrainParams {
            initial_density: cfg.initial_density,
            growth_rate: cfg.growth_rate,
            antibiotic_inhibition: cfg.antibiotic_inhibition,
        };
        Ok(SingleStrainParams {
            sensitive: strain(&self.sensitive),
            resistant: strain(&self.resistant),
            lymphocyte_inhibition: self.lymphocyte_inhibition,
            immune: ImmuneParams {
                initial_naive_density: self.immune.initial_naive_density,
                proliferation_rate: self.immune.proliferation_rate,
                half_max_growth: self.immune.half_max_growth,
                effector_decay: self.immune.effector_decay,
                memory_conversion: self.immune.memory_conversion,
            },
            antibiotic_concentration: self.antibiotic_concentration,
            host_death_density: self.host_death_density,
            policy: self.treatment.to_policy()?,
            time_step: self.time_step,
        })
    }

    fn validate(&self) -> Result<()> {
        for (label, strain) in [("sensitive", &self.sensitive), ("resistant", &self.resistant)] {
            check_num(strain.initial_density, 0.0..)
                .with_context(|| format!("invalid {label} initial density"))?;
            check_num(strain.growth_rate, 0.0..)
                .with_context(|| format!("invalid {label} growth rate"))?;
            check_num(strain.antibiotic_inhibition, 0.0..)
                .with_context(|| format!("invalid {label} antibiotic inhibition"))?;
        }

        check_num(self.lymphocyte_inhibition, 0.0..).context("invalid lymphocyte inhibition")?;

        let immune = &self.immune;
        check_num(immune.initial_naive_density, 0.0..)
            .context("invalid initial naive density")?;
        check_num(immune.proliferation_rate, 0.0..).context("invalid proliferation rate")?;
        check_num(immune.half_max_growth, positive()).context("invalid half max growth")?;
        check_num(immune.effector_decay, 0.0..).context("invalid effector decay")?;
        check_num(immune.memory_conversion, 0.0..=1.0).context("invalid memory conversion")?;

        check_num(self.antibiotic_concentration, 0.0..)
            .context("invalid antibiotic concentration")?;
        check_num(self.host_death_density, positive()).context("invalid host death density")?;
        self.treatment.validate().context("invalid treatment")?;
        check_num(self.time_step, time_step_range()).context("invalid time step")?;

        Ok(())
    }
}

impl ChemostatConfig {
    /// Genera to simulate, from the explicit list or the enterotype preset.
    pub fn genera(&self) -> Vec<GenusConfig> {
        match self.enterotype {
            Some(enterotype) if self.genera.is_empty() => enterotype
                .genera()
                .iter()
                .map(|&(name, stable_density)| GenusConfig {
                    name: name.to_string(),
                    stable_density,
                    growth_rate: DEFAULT_GROWTH_RATE,
                    inhibition: BTreeMap::new(),
                })
                .collect(),
            _ => self.genera.clone(),
        }
    }

    /// Convert into model parameters.
    ///
    /// One coefficient is drawn per genus and antibiotic, in that order,
    /// whether or not the configuration overrides it.
    fn to_params(&self) -> Result<ChemostatParams> {
        let mut rng = ChaCha12Rng::seed_from_u64(self.inhibition_seed);
        let inhibition_dist = Uniform::new(0.0, 1.0)?;

        let genera = self
            .genera()
            .into_iter()
            .map(|genus| {
                let inhibition = self
                    .antibiotics
                    .iter()
                    .map(|antibiotic| {
                        let drawn = inhibition_dist.sample(&mut rng);
                        genus
                            .inhibition
                            .get(&antibiotic.name)
                            .copied()
                            .unwrap_or(drawn)
                    })
                    .collect();
                GenusParams {
                    nutrients_per_duplication: nutrients_per_duplication(
                        genus.growth_rate,
                        self.flow_rate,
                        self.half_saturation,
                        genus.stable_density,
                    ),
                    name: genus.name,
                    growth_rate: genus.growth_rate,
                    stable_density: genus.stable_density,
                    inhibition,
                }
            })
            .collect();

        let antibiotics = self
            .antibiotics
            .iter()
            .map(|antibiotic| -> Result<AntibioticParams, SimError> {
                Ok(AntibioticParams {
                    name: antibiotic.name.clone(),
                    concentration: antibiotic.concentration,
                    policy: antibiotic.treatment.to_policy()?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ChemostatParams {
            genera,
            antibiotics,
            flow_rate: self.flow_rate,
            half_saturation: self.half_saturation,
            time_step: self.time_step,
        })
    }

    fn validate(&self) -> Result<()> {
        match (self.enterotype, self.genera.is_empty()) {
            (Some(_), false) => bail!("enterotype and genera are mutually exclusive"),
            (None, true) => bail!("either an enterotype or a list of genera is required"),
            _ => {}
        }

        check_num(self.flow_rate, positive()).context("invalid flow rate")?;
        check_num(self.half_saturation, positive()).context("invalid half saturation")?;
        check_num(self.time_step, time_step_range()).context("invalid time step")?;

        let mut antibiotic_names = HashSet::new();
        for antibiotic in &self.antibiotics {
            if !antibiotic_names.insert(antibiotic.name.as_str()) {
                bail!("antibiotic {:?} is defined twice", antibiotic.name);
            }
            check_num(antibiotic.concentration, 0.0..)
                .with_context(|| format!("invalid concentration of {:?}", antibiotic.name))?;
            antibiotic
                .treatment
                .validate()
                .with_context(|| format!("invalid treatment of {:?}", antibiotic.name))?;
        }

        let mut genus_names = HashSet::new();
        for genus in &self.genera {
            if !genus_names.insert(genus.name.as_str()) {
                bail!("genus {:?} is defined twice", genus.name);
            }
            check_num(genus.stable_density, positive())
                .with_context(|| format!("invalid stable density of {:?}", genus.name))?;
            check_num(genus.growth_rate, (Bound::Excluded(self.flow_rate), Bound::Unbounded))
                .with_context(|| format!("invalid growth rate of {:?}", genus.name))?;
            self.check_nutrient_limited(genus.growth_rate)
                .with_context(|| format!("invalid growth rate of {:?}", genus.name))?;
            for (antibiotic, &inhibition) in &genus.inhibition {
                if !antibiotic_names.contains(antibiotic.as_str()) {
                    bail!("genus {:?} names unknown antibiotic {antibiotic:?}", genus.name);
                }
                check_num(inhibition, 0.0..).with_context(|| {
                    format!("invalid inhibition of {:?} by {antibiotic:?}", genus.name)
                })?;
            }
        }

        if self.enterotype.is_some() {
            check_num(DEFAULT_GROWTH_RATE, (Bound::Excluded(self.flow_rate), Bound::Unbounded))
                .context("invalid flow rate for enterotype growth rate")?;
            self.check_nutrient_limited(DEFAULT_GROWTH_RATE)
                .context("invalid flow rate for enterotype growth rate")?;
        }

        Ok(())
    }

    /// The equilibrium nutrient must stay below the inflow, so that each
    /// duplication consumes a positive amount of nutrient.
    fn check_nutrient_limited(&self, growth_rate: f64) -> Result<()> {
        let nutrient = equilibrium_nutrient(growth_rate, self.flow_rate, self.half_saturation);
        check_num(nutrient, ..INFLOW_CONCENTRATION).context("equilibrium nutrient above inflow")
    }
}

fn positive() -> (Bound<f64>, Bound<f64>) {
    (Bound::Excluded(0.0), Bound::Unbounded)
}

fn time_step_range() -> (Bound<f64>, Bound<f64>) {
    (Bound::Excluded(0.0), Bound::Included(1.0))
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::StepDriver;
    use approx::assert_relative_eq;

    const SINGLE_STRAIN: &str = r#"
[model]
scenario = "single_strain"

[model.treatment]
kind = "classic"

[output]
steps_per_save = 60
saves_per_file = 24
"#;

    const CHEMOSTAT: &str = r#"
[model]
scenario = "chemostat"
enterotype = "gut_2"

[output]
steps_per_save = 60
saves_per_file = 24
"#;

    fn chemostat(cfg: &Config) -> &ChemostatConfig {
        match &cfg.model {
            ModelConfig::Chemostat(model) => model,
            ModelConfig::SingleStrain(_) => panic!("expected chemostat model"),
        }
    }

    #[test]
    fn single_strain_defaults() {
        let cfg = Config::from_toml(SINGLE_STRAIN).unwrap();
        let ModelConfig::SingleStrain(model) = &cfg.model else {
            panic!("expected single strain model");
        };
        assert_eq!(model.sensitive, default_sensitive());
        assert_eq!(model.immune, ImmuneConfig::default());
        assert_relative_eq!(model.time_step, 1.0 / 1440.0);
        assert_eq!(
            model.treatment.to_policy(),
            Ok(TreatmentPolicy::Classic {
                delay: 3.5,
                duration: 7.0
            })
        );
    }

    #[test]
    fn unknown_policy_fails_at_build() {
        let cfg = Config::from_toml(&SINGLE_STRAIN.replace("classic", "weekly")).unwrap();
        let err = cfg.build_driver().unwrap_err();
        assert_eq!(
            err.downcast_ref::<SimError>(),
            Some(&SimError::InvalidPolicy {
                kind: "weekly".to_string()
            })
        );
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let contents = SINGLE_STRAIN.replace(
            "scenario = \"single_strain\"",
            "scenario = \"single_strain\"\ntime_step = 0.0",
        );
        assert!(Config::from_toml(&contents).is_err());

        let contents = SINGLE_STRAIN.replace("steps_per_save = 60", "steps_per_save = 0");
        assert!(Config::from_toml(&contents).is_err());
    }

    #[test]
    fn enterotype_preset_builds_default_antibiotics() {
        let cfg = Config::from_toml(CHEMOSTAT).unwrap();
        let driver = cfg.build_driver().unwrap();

        assert_eq!(driver.value_labels()[0], "prevotella");
        assert_eq!(driver.value_labels().len(), 10);
        assert_eq!(driver.antibiotic_labels(), ANTIBIOTIC_CLASSES.map(String::from));

        let snapshot = driver.snapshot();
        assert!(snapshot.antibiotics.iter().all(|&value| value == 0.0));
    }

    #[test]
    fn drawn_inhibitions_are_seeded() {
        let cfg = Config::from_toml(CHEMOSTAT).unwrap();
        let a = chemostat(&cfg).to_params().unwrap();
        let b = chemostat(&cfg).to_params().unwrap();
        assert_eq!(a, b);
        for genus in &a.genera {
            assert_eq!(genus.inhibition.len(), 8);
            assert!(
                genus
                    .inhibition
                    .iter()
                    .all(|&inhibition| (0.0..1.0).contains(&inhibition))
            );
        }

        let reseeded = Config::from_toml(&CHEMOSTAT.replace(
            "enterotype = \"gut_2\"",
            "enterotype = \"gut_2\"\ninhibition_seed = 7",
        ))
        .unwrap();
        assert_ne!(chemostat(&reseeded).to_params().unwrap(), a);
    }

    #[test]
    fn explicit_genera_and_inhibitions() {
        let contents = r#"
[model]
scenario = "chemostat"

[[model.genera]]
name = "bacteroides"
stable_density = 1e6
inhibition = { penicillins = 0.25 }

[[model.genera]]
name = "roseburia"
stable_density = 5e5

[[model.antibiotics]]
name = "penicillins"
concentration = 12.0

[model.antibiotics.treatment]
kind = "adaptive"
symptom_threshold = 1e7

[output]
steps_per_save = 1
saves_per_file = 1
"#;
        let cfg = Config::from_toml(contents).unwrap();
        let params = chemostat(&cfg).to_params().unwrap();

        assert_eq!(params.genera[0].inhibition, vec![0.25]);
        assert!((0.0..1.0).contains(&params.genera[1].inhibition[0]));
        assert_eq!(params.antibiotics[0].concentration, 12.0);
        assert_eq!(
            params.antibiotics[0].policy,
            TreatmentPolicy::Adaptive { threshold: 1e7 }
        );
    }

    #[test]
    fn inconsistent_chemostat_is_rejected() {
        let both = CHEMOSTAT.replace(
            "[output]",
            "[[model.genera]]\nname = \"a\"\nstable_density = 1.0\n\n[output]",
        );
        assert!(Config::from_toml(&both).is_err());

        let neither = CHEMOSTAT.replace("enterotype = \"gut_2\"", "");
        assert!(Config::from_toml(&neither).is_err());

        let unknown = CHEMOSTAT.replace("enterotype = \"gut_2\"", "").replace(
            "[output]",
            "[[model.genera]]\nname = \"a\"\nstable_density = 1.0\ninhibition = { amoxil = 0.5 }\n\n[output]",
        );
        assert!(Config::from_toml(&unknown).is_err());

        let slow = CHEMOSTAT.replace("enterotype = \"gut_2\"", "").replace(
            "[output]",
            "[[model.genera]]\nname = \"a\"\nstable_density = 1.0\ngrowth_rate = 0.001\n\n[output]",
        );
        assert!(Config::from_toml(&slow).is_err());

        let flooded = CHEMOSTAT.replace(
            "enterotype = \"gut_2\"",
            "enterotype = \"gut_2\"\nflow_rate = 3.2",
        );
        assert!(Config::from_toml(&flooded).is_err());

        let saturated = CHEMOSTAT
            .replace("enterotype = \"gut_2\"", "half_saturation = 1e5")
            .replace(
                "[output]",
                "[[model.genera]]\nname = \"a\"\nstable_density = 1.0\ngrowth_rate = 3.3\n\n[output]",
            );
        assert!(Config::from_toml(&saturated).is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = Config::from_toml(CHEMOSTAT).unwrap();
        let dumped = toml::to_string_pretty(&cfg).unwrap();
        assert_eq!(Config::from_toml(&dumped).unwrap(), cfg);
    }
}
