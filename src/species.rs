/// Species registry for the seabird results pipeline.
///
/// Defines the species whose breeding population is estimated, with the
/// method used for each. This is the single source of truth for species
/// codes; the population aggregator selects its branches from here rather
/// than hardcoding code lists. Species absent from the registry still count
/// toward roosting/rafting/hauled-out means.

// ---------------------------------------------------------------------------
// Species metadata
// ---------------------------------------------------------------------------

/// How a species' breeding population is estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreedingMethod {
    /// Individuals counted on the peak survey day before the season cutoff.
    PeakCount,
    /// Third-highest weekly mean nest count, doubled to breeding birds.
    NestCount,
}

/// Metadata for a single monitored species.
pub struct Species {
    /// Four-letter survey code, lowercase.
    pub code: &'static str,
    pub common_name: &'static str,
    pub method: BreedingMethod,
}

/// Month-day cutoff for peak counts. Compared as text against the
/// `%m-%-d` form of the survey date.
pub const PEAK_COUNT_CUTOFF_M_D: &str = "06-15";

/// Nest counts are multiplied by this to give breeding individuals.
pub const BIRDS_PER_NEST: f64 = 2.0;

/// Rank of the weekly mean nest count taken as the season estimate.
pub const NEST_COUNT_RANK: usize = 3;

pub static SPECIES_REGISTRY: &[Species] = &[
    Species {
        code: "pigu",
        common_name: "Pigeon Guillemot",
        method: BreedingMethod::PeakCount,
    },
    Species {
        code: "brac",
        common_name: "Brandt's Cormorant",
        method: BreedingMethod::NestCount,
    },
    Species {
        code: "peco",
        common_name: "Pelagic Cormorant",
        method: BreedingMethod::NestCount,
    },
    Species {
        code: "wegu",
        common_name: "Western Gull",
        method: BreedingMethod::NestCount,
    },
    Species {
        code: "bloy",
        common_name: "Black Oystercatcher",
        method: BreedingMethod::NestCount,
    },
    Species {
        code: "dcco",
        common_name: "Double-crested Cormorant",
        method: BreedingMethod::NestCount,
    },
];

/// Codes of all species estimated with `method`, in registry order.
pub fn species_with_method(method: BreedingMethod) -> Vec<&'static str> {
    SPECIES_REGISTRY
        .iter()
        .filter(|s| s.method == method)
        .map(|s| s.code)
        .collect()
}

/// Looks up a species by code. Returns `None` if not registered.
pub fn find_species(code: &str) -> Option<&'static Species> {
    SPECIES_REGISTRY.iter().find(|s| s.code == code)
}

/// Breeding method for a species code, if it has one.
pub fn breeding_method(code: &str) -> Option<BreedingMethod> {
    find_species(code).map(|s| s.method)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
