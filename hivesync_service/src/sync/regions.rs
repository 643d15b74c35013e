/// Region registry for the African climate network.
///
/// The five regions are static: they are upserted into the store by
/// `sync_regions` rather than read from Hive, and the data generator uses
/// the same entries for coordinates, countries and climate baselines. All
/// other modules should reference regions from here rather than hardcoding
/// codes.
///
/// CSV exports and the warehouse name regions by their short form
/// ("East"); the store holds the long form ("East Africa") and the code
/// ("EAST"). Lookups accept any of the three.

// ---------------------------------------------------------------------------
// Region metadata
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
pub struct RegionInfo {
    /// Unique code stored in `regions.code`.
    pub code: &'static str,
    /// Display name stored in `regions.name`.
    pub name: &'static str,
    /// Name used in CSV exports and the Hive table.
    pub short_name: &'static str,
    pub description: &'static str,
    /// ISO 3166 alpha-2 codes of countries placed in this region.
    pub countries: &'static [&'static str],
    /// Latitude bounds (south, north), degrees.
    pub latitude_range: (f64, f64),
    /// Longitude bounds (west, east), degrees.
    pub longitude_range: (f64, f64),
    /// Typical mean temperature, °C.
    pub base_temp_c: f64,
    /// Typical daily precipitation scale, mm.
    pub precipitation_base_mm: f64,
}

pub static REGION_REGISTRY: &[RegionInfo] = &[
    RegionInfo {
        code: "EAST",
        name: "East Africa",
        short_name: "East",
        description: "Eastern African region",
        countries: &["KE", "TZ", "UG", "ET", "SO", "RW", "BI", "DJ", "ER"],
        latitude_range: (-10.0, 15.0),
        longitude_range: (30.0, 51.0),
        base_temp_c: 24.0,
        precipitation_base_mm: 100.0,
    },
    RegionInfo {
        code: "WEST",
        name: "West Africa",
        short_name: "West",
        description: "Western African region",
        countries: &["NG", "GH", "SN", "CI", "ML", "BF", "NE", "GN", "BJ", "TG"],
        latitude_range: (5.0, 20.0),
        longitude_range: (-17.0, 15.0),
        base_temp_c: 27.0,
        precipitation_base_mm: 30.0,
    },
    RegionInfo {
        code: "NORTH",
        name: "North Africa",
        short_name: "North",
        description: "Northern African region",
        countries: &["EG", "MA", "DZ", "TN", "LY", "SD", "MR"],
        latitude_range: (15.0, 37.0),
        longitude_range: (-17.0, 35.0),
        base_temp_c: 22.0,
        precipitation_base_mm: 30.0,
    },
    RegionInfo {
        code: "SOUTH",
        name: "South Africa",
        short_name: "South",
        description: "Southern African region",
        countries: &["ZA", "NA", "BW", "ZW", "MZ", "ZM", "AO", "MW", "LS", "SZ"],
        latitude_range: (-35.0, -10.0),
        longitude_range: (10.0, 40.0),
        base_temp_c: 18.0,
        precipitation_base_mm: 30.0,
    },
    RegionInfo {
        code: "CENTRAL",
        name: "Central Africa",
        short_name: "Central",
        description: "Central African region",
        countries: &["CD", "GA", "CM", "CF", "CG", "TD", "GQ", "ST"],
        latitude_range: (-5.0, 10.0),
        longitude_range: (8.0, 30.0),
        base_temp_c: 28.0,
        precipitation_base_mm: 100.0,
    },
];

/// Case-insensitive lookup by code, display name or short name.
pub fn find_region(name_or_code: &str) -> Option<&'static RegionInfo> {
    let wanted = name_or_code.trim();
    REGION_REGISTRY.iter().find(|r| {
        r.code.eq_ignore_ascii_case(wanted)
            || r.name.eq_ignore_ascii_case(wanted)
            || r.short_name.eq_ignore_ascii_case(wanted)
    })
}

/// Code for a region the registry does not know: the upper-cased name,
/// cut to ten characters.
pub fn fallback_code(name: &str) -> String {
    name.trim().to_uppercase().chars().take(10).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_registry_has_the_five_regions() {
        let codes: Vec<&str> = REGION_REGISTRY.iter().map(|r| r.code).collect();
        assert_eq!(codes, vec!["EAST", "WEST", "NORTH", "SOUTH", "CENTRAL"]);
    }

    #[test]
    fn test_no_duplicate_codes_names_or_countries() {
        let codes: HashSet<&str> = REGION_REGISTRY.iter().map(|r| r.code).collect();
        let names: HashSet<&str> = REGION_REGISTRY.iter().map(|r| r.name).collect();
        assert_eq!(codes.len(), REGION_REGISTRY.len());
        assert_eq!(names.len(), REGION_REGISTRY.len());

        let mut seen = HashSet::new();
        for region in REGION_REGISTRY {
            for country in region.countries {
                assert!(seen.insert(*country), "country {} listed twice", country);
            }
        }
    }

    #[test]
    fn test_coordinate_ranges_are_ordered() {
        for region in REGION_REGISTRY {
            assert!(region.latitude_range.0 < region.latitude_range.1, "{}", region.code);
            assert!(region.longitude_range.0 < region.longitude_range.1, "{}", region.code);
        }
    }

    #[test]
    fn test_find_region_accepts_every_spelling() {
        assert_eq!(find_region("EAST").map(|r| r.code), Some("EAST"));
        assert_eq!(find_region("east africa").map(|r| r.code), Some("EAST"));
        assert_eq!(find_region("Central").map(|r| r.code), Some("CENTRAL"));
        assert!(find_region("Atlantis").is_none());
    }

    #[test]
    fn test_fallback_code_truncates() {
        assert_eq!(fallback_code("Indian Ocean Islands"), "INDIAN OCE");
        assert_eq!(fallback_code("Sahel"), "SAHEL");
    }
}
