//! Configuration recommendations per scenario category.
//!
//! Each category maps to a fixed, ordered list of Hive settings. Deriving
//! recommendations for a benchmark get-or-creates one [`Configuration`] per
//! setting and attaches a new [`Recommendation`] for each. Deriving twice
//! for the same benchmark attaches a second set; configurations stay unique.

use chrono::Utc;

use crate::model::{
    ConfigCategory, Configuration, ImpactLevel, Priority, Recommendation, ScenarioCategory, StoreError,
};
use crate::store::Store;

pub const EXPECTED_IMPROVEMENT: &str = "Significant performance improvement expected";

/// One recommended `key=value` setting and why it helps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingAdvice {
    pub key: &'static str,
    pub value: &'static str,
    pub reason: &'static str,
}

const fn advice(key: &'static str, value: &'static str, reason: &'static str) -> SettingAdvice {
    SettingAdvice { key, value, reason }
}

static JOINS: &[SettingAdvice] = &[
    advice("hive.auto.convert.join", "true", "Enables automatic conversion to map-side joins"),
    advice("hive.optimize.bucketmapjoin", "true", "Crucial for optimized joins if tables are bucketed"),
    advice("hive.exec.parallel", "true", "Allows parallel execution of dependent stages"),
];

static AGGREGATION: &[SettingAdvice] = &[
    advice("hive.map.aggr", "true", "Performs partial aggregation in the map phase"),
    advice(
        "hive.groupby.skewindata",
        "true",
        "Handles data skew in GROUP BY by breaking into two phases",
    ),
    advice("tez.grouping.max-size", "1000000000", "Controls maximum size of grouped output in Tez"),
];

static COMPLEX_TYPES: &[SettingAdvice] = &[
    advice("hive.optimize.json.serde", "true", "Ensures the most efficient JSON SerDe is used"),
    advice("hive.optimize.index.filter", "true", "Attempts to filter data before deserializing"),
    advice("hive.cbo.enable", "true", "Cost-Based Optimizer helps estimate cost of complex operations"),
];

static IO: &[SettingAdvice] = &[
    advice(
        "hive.exec.orc.split.strategy",
        "HYBRID",
        "Hybrid strategy to combine row-group and stripe-level filtering",
    ),
    advice("hive.exec.scratchdir", "/tmp/hive_scratch", "Ensures scratch directories are on fast local storage"),
    advice(
        "tez.runtime.compress.intermediate",
        "true",
        "Compresses intermediate data written by mappers/reducers",
    ),
];

static PARTITIONING: &[SettingAdvice] = &[
    advice("hive.mapred.mode", "strict", "Prevents queries that try to scan all partitions"),
    advice("hive.optimize.ppd", "true", "Enables partition pruning and predicate pushdown"),
    advice("metastore.client.socket.timeout", "1800", "Increases timeout for Metastore interaction"),
];

pub fn advice_for(category: ScenarioCategory) -> &'static [SettingAdvice] {
    match category {
        ScenarioCategory::Joins => JOINS,
        ScenarioCategory::Aggregation => AGGREGATION,
        ScenarioCategory::ComplexTypes => COMPLEX_TYPES,
        ScenarioCategory::Io => IO,
        ScenarioCategory::Partitioning => PARTITIONING,
    }
}

/// Configuration row to create when the setting is seen for the first time.
fn configuration_seed(item: &SettingAdvice, category: ScenarioCategory) -> Configuration {
    Configuration {
        id: 0,
        name: item.key.to_string(),
        description: item.reason.to_string(),
        setting_key: item.key.to_string(),
        setting_value: item.value.to_string(),
        category: ConfigCategory::for_scenario(category),
        impact_level: ImpactLevel::High,
    }
}

/// Attach this category's recommendations to `benchmark_id`.
pub fn derive_recommendations(
    store: &mut dyn Store,
    benchmark_id: i64,
    category: ScenarioCategory,
) -> Result<Vec<Recommendation>, StoreError> {
    let mut created = Vec::with_capacity(advice_for(category).len());
    for item in advice_for(category) {
        let (configuration, _) = store.get_or_create_configuration(&configuration_seed(item, category))?;
        created.push(store.insert_recommendation(&Recommendation {
            id: 0,
            benchmark_id,
            configuration_id: configuration.id,
            priority: Priority::High,
            reason: item.reason.to_string(),
            expected_improvement: EXPECTED_IMPROVEMENT.to_string(),
            is_applied: false,
            created_at: Utc::now(),
        })?);
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_three_settings_per_category() {
        for category in ScenarioCategory::ALL {
            assert_eq!(advice_for(*category).len(), 3, "{}", category);
        }
    }

    #[test]
    fn test_settings_are_unique_across_table() {
        let mut seen = HashSet::new();
        for category in ScenarioCategory::ALL {
            for item in advice_for(*category) {
                assert!(seen.insert((item.key, item.value)), "{}={} listed twice", item.key, item.value);
            }
        }
        assert_eq!(seen.len(), 15);
    }

    #[test]
    fn test_order_is_fixed() {
        let keys: Vec<&str> = advice_for(ScenarioCategory::Io).iter().map(|a| a.key).collect();
        assert_eq!(
            keys,
            vec!["hive.exec.orc.split.strategy", "hive.exec.scratchdir", "tez.runtime.compress.intermediate"]
        );
        assert_eq!(advice_for(ScenarioCategory::Partitioning)[2].value, "1800");
    }

    #[test]
    fn test_seed_category_and_impact() {
        let seed = configuration_seed(&JOINS[0], ScenarioCategory::Joins);
        assert_eq!(seed.category, ConfigCategory::Other);
        assert_eq!(seed.impact_level, ImpactLevel::High);
        assert_eq!(seed.name, "hive.auto.convert.join");
        assert_eq!(seed.description, JOINS[0].reason);

        let seed = configuration_seed(&IO[1], ScenarioCategory::Io);
        assert_eq!(seed.category, ConfigCategory::Io);
    }
}
