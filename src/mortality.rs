//! Age-banded case fatality and age sampling.
//!
//! Mortality fractions by age band, lower bound inclusive:
//! https://www.worldometers.info/coronavirus/coronavirus-age-sex-demographics/

use rand::Rng;

use crate::rng::SimRng;

/// (lower age bound, case-fatality fraction), highest band first.
const MORTALITY_BY_AGE: [(u32, f64); 9] = [
    (80, 0.148),
    (70, 0.08),
    (60, 0.036),
    (50, 0.013),
    (40, 0.004),
    (30, 0.002),
    (20, 0.002),
    (10, 0.002),
    (0, 0.0),
];

/// Rough average of the banded values, used when no age is known.
pub const FLAT_MORTALITY: f64 = 0.03;

/// Weighted age distribution for population setup.
struct AgeBand {
    min_age: u32,
    max_age: u32,
    chance: f64,
}

const AGE_BANDS: [AgeBand; 5] = [
    AgeBand {
        min_age: 80,
        max_age: 90,
        chance: 0.08,
    },
    AgeBand {
        min_age: 60,
        max_age: 79,
        chance: 0.2,
    },
    AgeBand {
        min_age: 40,
        max_age: 59,
        chance: 0.25,
    },
    AgeBand {
        min_age: 20,
        max_age: 39,
        chance: 0.3,
    },
    AgeBand {
        min_age: 0,
        max_age: 19,
        chance: 0.17,
    },
];

/// Case-fatality fraction for the highest band at or below the age, or the
/// flat default when the age is unset.
pub fn mortality_for(age: Option<u32>) -> f64 {
    let Some(age) = age else {
        return FLAT_MORTALITY;
    };
    for (band, mortality) in MORTALITY_BY_AGE {
        if age >= band {
            return mortality;
        }
    }
    FLAT_MORTALITY
}

/// Draws an age band with probability proportional to its weight, then a
/// uniform integer age inside the band.
pub fn sample_age(rng: &mut SimRng) -> u32 {
    let total: f64 = AGE_BANDS.iter().map(|band| band.chance).sum();
    let mut remainder = rng.gen::<f64>() * total;
    for band in &AGE_BANDS {
        if remainder < band.chance {
            return rng.gen_range(band.min_age..=band.max_age);
        }
        remainder -= band.chance;
    }
    // Floating point edge: the draw landed exactly on the total.
    let last = &AGE_BANDS[AGE_BANDS.len() - 1];
    rng.gen_range(last.min_age..=last.max_age)
}
