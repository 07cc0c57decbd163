/// Region registry for the case alert service.
///
/// The jurisdictions the upstream `states_current` report covers: the 50
/// states, the District of Columbia and five territories. Used to sanity-check
/// the configured monitoring list; an unknown code is not rejected (upstream
/// coverage may change) but is worth a warning, since it will surface as a
/// lookup failure every cycle.

/// Metadata for a single reporting jurisdiction.
pub struct Region {
    /// Two-letter postal code, as used in the upstream `state` column.
    pub code: &'static str,
    pub name: &'static str,
    /// `false` for DC and the territories.
    pub is_state: bool,
}

const fn state(code: &'static str, name: &'static str) -> Region {
    Region { code, name, is_state: true }
}

const fn other(code: &'static str, name: &'static str) -> Region {
    Region { code, name, is_state: false }
}

pub static REGION_REGISTRY: &[Region] = &[
    state("AK", "Alaska"),
    state("AL", "Alabama"),
    state("AR", "Arkansas"),
    other("AS", "American Samoa"),
    state("AZ", "Arizona"),
    state("CA", "California"),
    state("CO", "Colorado"),
    state("CT", "Connecticut"),
    other("DC", "District of Columbia"),
    state("DE", "Delaware"),
    state("FL", "Florida"),
    state("GA", "Georgia"),
    other("GU", "Guam"),
    state("HI", "Hawaii"),
    state("IA", "Iowa"),
    state("ID", "Idaho"),
    state("IL", "Illinois"),
    state("IN", "Indiana"),
    state("KS", "Kansas"),
    state("KY", "Kentucky"),
    state("LA", "Louisiana"),
    state("MA", "Massachusetts"),
    state("MD", "Maryland"),
    state("ME", "Maine"),
    state("MI", "Michigan"),
    state("MN", "Minnesota"),
    state("MO", "Missouri"),
    other("MP", "Northern Mariana Islands"),
    state("MS", "Mississippi"),
    state("MT", "Montana"),
    state("NC", "North Carolina"),
    state("ND", "North Dakota"),
    state("NE", "Nebraska"),
    state("NH", "New Hampshire"),
    state("NJ", "New Jersey"),
    state("NM", "New Mexico"),
    state("NV", "Nevada"),
    state("NY", "New York"),
    state("OH", "Ohio"),
    state("OK", "Oklahoma"),
    state("OR", "Oregon"),
    state("PA", "Pennsylvania"),
    other("PR", "Puerto Rico"),
    state("RI", "Rhode Island"),
    state("SC", "South Carolina"),
    state("SD", "South Dakota"),
    state("TN", "Tennessee"),
    state("TX", "Texas"),
    state("UT", "Utah"),
    state("VA", "Virginia"),
    other("VI", "U.S. Virgin Islands"),
    state("VT", "Vermont"),
    state("WA", "Washington"),
    state("WI", "Wisconsin"),
    state("WV", "West Virginia"),
    state("WY", "Wyoming"),
];

/// Returns every registered region code.
pub fn all_region_codes() -> Vec<&'static str> {
    REGION_REGISTRY.iter().map(|r| r.code).collect()
}

/// Looks up a region by exact code. Returns `None` if not found.
pub fn find_region(code: &str) -> Option<&'static Region> {
    REGION_REGISTRY.iter().find(|r| r.code == code)
}

/// The subset of `codes` that is not in the registry.
pub fn unknown_codes<'a>(codes: &'a [String]) -> Vec<&'a str> {
    codes
        .iter()
        .map(String::as_str)
        .filter(|code| find_region(code).is_none())
        .collect()
}
