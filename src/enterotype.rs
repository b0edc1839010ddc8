//! Reference communities for the chemostat scenario.
//!
//! Genus densities are derived from Arumugam et al. (2011), "Enterotypes of
//! the human gut microbiome", Nature 473, 174–180, and listed in the order
//! the frequencies are emitted.

use serde::{Deserialize, Serialize};

/// Growth rate every preset genus starts with.
pub const DEFAULT_GROWTH_RATE: f64 = 3.3;
/// Concentration every default antibiotic class starts with (mg/l).
pub const DEFAULT_CONCENTRATION: f64 = 6.0;

/// Antibiotic classes available when none are configured.
pub const ANTIBIOTIC_CLASSES: [&str; 8] = [
    "lincosamides",
    "macrolides",
    "penicillins",
    "quinolones",
    "streptogramins",
    "sulfonamides",
    "tetracyclines",
    "trimethoprims",
];

const GUT_1: [(&str, f64); 10] = [
    ("bacteroides", 5_793_111.0),
    ("faecalibacterium", 1_166_914.0),
    ("roseburia", 832_900.0),
    ("bifidobacterium", 623_495.0),
    ("lachnospiraceae", 464_077.0),
    ("parabacteroides", 322_975.0),
    ("alistipes", 221_911.0),
    ("anaerostipes", 208_595.0),
    ("acidaminococcus", 208_271.0),
    ("collinsella", 157_744.0),
];

const GUT_2: [(&str, f64); 10] = [
    ("prevotella", 5_141_001.0),
    ("bacteroides", 1_591_226.0),
    ("faecalibacterium", 771_497.0),
    ("lachnospiraceae", 706_805.0),
    ("roseburia", 461_321.0),
    ("collinsella", 381_627.0),
    ("bifidobacterium", 255_327.0),
    ("alistipes", 246_779.0),
    ("streptococcus", 231_394.0),
    ("coprococcus", 213_016.0),
];

const GUT_3: [(&str, f64); 10] = [
    ("bacteroides", 2_585_052.0),
    ("bifidobacterium", 1_571_051.0),
    ("faecalibacterium", 1_449_116.0),
    ("lachnospiraceae", 913_032.0),
    ("alistipes", 909_552.0),
    ("akkermansia", 588_316.0),
    ("ruminococcus", 553_816.0),
    ("collinsella", 506_545.0),
    ("blautia", 455_794.0),
    ("roseburia", 467_722.0),
];

/// Gut enterotype preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Enterotype {
    #[serde(rename = "gut_1")]
    Gut1,
    #[serde(rename = "gut_2")]
    Gut2,
    #[serde(rename = "gut_3")]
    Gut3,
}

impl Enterotype {
    /// Genus names and reference densities.
    pub fn genera(self) -> &'static [(&'static str, f64)] {
        match self {
            Enterotype::Gut1 => &GUT_1,
            Enterotype::Gut2 => &GUT_2,
            Enterotype::Gut3 => &GUT_3,
        }
    }
}
