//! This module stores the canonical column names used across the pipeline, from the normalized
//! long-format source tables through to the final country/year/sex dataset. Note that the
//! per-source schema mappings in `source` must rename upstream columns to these names!

pub const GEO: &str = "geo";
pub const TIME: &str = "time";
pub const SEX: &str = "sex";
pub const VALUE: &str = "value";

pub const FREQUENCY: &str = "frequency";
pub const AGE: &str = "age";
pub const BIRTH_COUNTRY: &str = "birth_country";
pub const HEALTH_INDICATOR: &str = "health_indicator";

pub const GDP_PER_CAPITA: &str = "gdp_per_capita";
pub const HEALTHY_LIFE_EXPECTANCY: &str = "healthy_life_expectancy";

pub const ALCOHOL_CONSUMPTION_INDEX: &str = "alcohol_consumption_index";
pub const ABSTINENCE_RATE: &str = "abstinence_rate";
pub const HEALTH_PER_GDP_RATIO: &str = "health_per_gdp_ratio";

/// Pivoted alcohol-frequency columns are named `alcohol_<slug>_pct`, with the slug derived from
/// the upstream category label by `pipeline::frequency_column_name`.
pub const ALCOHOL_PCT_PREFIX: &str = "alcohol_";
pub const ALCOHOL_PCT_SUFFIX: &str = "_pct";

/// Returns true for the percentage columns that are rounded to one decimal for presentation.
pub fn is_percentage_column(name: &str) -> bool {
    name == ABSTINENCE_RATE
        || (name.starts_with(ALCOHOL_PCT_PREFIX)
            && name.ends_with(ALCOHOL_PCT_SUFFIX)
            && name != ALCOHOL_CONSUMPTION_INDEX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_columns_are_detected() {
        assert!(is_percentage_column("alcohol_every_day_pct"));
        assert!(is_percentage_column(ABSTINENCE_RATE));
        assert!(!is_percentage_column(ALCOHOL_CONSUMPTION_INDEX));
        assert!(!is_percentage_column(GDP_PER_CAPITA));
        assert!(!is_percentage_column(GEO));
    }
}
