//! FAIR metadata for the generated dataset.
//!
//! The document is rebuilt from the live run state on every execution: source URLs come from
//! the configuration, the column inventory from the final table (including dynamically
//! discovered frequency columns), and the generation date from the clock. Nothing in it is
//! hand-maintained.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use chrono::Utc;
use polars::prelude::DataFrame;
use serde::Serialize;

use crate::config::Config;
use crate::error::EurolensError;
use crate::COL;

#[derive(Serialize, Debug, PartialEq)]
pub struct DatasetMetadata {
    pub title: String,
    pub description: String,
    pub sources: BTreeMap<String, String>,
    pub columns: BTreeMap<String, String>,
    pub license: String,
    pub keywords: Vec<String>,
    pub exclusions: BTreeMap<String, String>,
    pub missing_values: String,
    pub provenance: Provenance,
    pub date_generated: String,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct Provenance {
    pub data_retrieval: String,
    pub processing: Vec<String>,
    pub limitations: Vec<String>,
}

fn column_description(name: &str) -> String {
    match name {
        COL::GEO => "Country ISO-style code (Eurostat geo dimension)".to_string(),
        COL::TIME => "Year of observation".to_string(),
        COL::SEX => "Sex (Males, Females or Total)".to_string(),
        COL::GDP_PER_CAPITA => {
            "Real GDP per capita in Purchasing Power Standard (PPS)".to_string()
        }
        COL::HEALTHY_LIFE_EXPECTANCY => {
            "Healthy life years in absolute value at birth".to_string()
        }
        COL::ALCOHOL_CONSUMPTION_INDEX => {
            "Weighted consumption index: 1.0 x daily + 0.75 x weekly + 0.5 x monthly percentages"
                .to_string()
        }
        COL::ABSTINENCE_RATE => {
            "Share of population never drinking alcohol (verbatim copy of the 'Never' category)"
                .to_string()
        }
        COL::HEALTH_PER_GDP_RATIO => {
            "Healthy life years divided by GDP per capita; null when GDP is missing or zero"
                .to_string()
        }
        pct if COL::is_percentage_column(pct) => {
            let slug = pct
                .trim_start_matches(COL::ALCOHOL_PCT_PREFIX)
                .trim_end_matches(COL::ALCOHOL_PCT_SUFFIX)
                .replace('_', " ");
            format!(
                "Share of the total native-born population reporting drinking frequency '{slug}' (percent)"
            )
        }
        other => format!("Undocumented column '{other}'"),
    }
}

/// Builds the metadata document for one run from the configuration and the final table.
pub fn build(config: &Config, df: &DataFrame) -> DatasetMetadata {
    let sources = BTreeMap::from([
        (
            "alcohol".to_string(),
            config.dataset_url(&config.alcohol_dataset),
        ),
        ("gdp".to_string(), config.dataset_url(&config.gdp_dataset)),
        (
            "health".to_string(),
            config.dataset_url(&config.health_dataset),
        ),
    ]);

    let columns: BTreeMap<String, String> = df
        .get_column_names()
        .iter()
        .map(|name| (name.to_string(), column_description(name)))
        .collect();

    let exclusions = BTreeMap::from([
        (
            "alcohol".to_string(),
            format!(
                "excluded geographies: {}",
                config.alcohol_excluded_geos.join(", ")
            ),
        ),
        (
            "health".to_string(),
            format!(
                "excluded geographies: {}",
                config.health_excluded_geos.join(", ")
            ),
        ),
    ]);

    DatasetMetadata {
        title: format!(
            "Europe - alcohol consumption frequencies, GDP per capita and healthy life years ({})",
            config.years.join(" & ")
        ),
        description: format!(
            "Cross-referenced Eurostat data: for each European country, the alcohol consumption \
             frequencies of the {} population born in the reporting country, real GDP per capita \
             (PPS) and healthy life years at birth, for the years {}. One row per country, year \
             and sex.",
            config.alcohol_age_group.to_lowercase(),
            config.years.join(" and ")
        ),
        sources,
        columns,
        license: "CC BY 4.0 (Eurostat - https://creativecommons.org/licenses/by/4.0/)".to_string(),
        keywords: vec![
            "Eurostat".to_string(),
            "Alcohol consumption".to_string(),
            "Healthy life years".to_string(),
            "GDP per capita".to_string(),
            "FAIR data".to_string(),
            "Public health".to_string(),
        ],
        exclusions,
        missing_values: "null (never 0 when a value is absent)".to_string(),
        provenance: Provenance {
            data_retrieval: format!(
                "Downloaded from the Eurostat dissemination API ({}) as JSON-stat 2.0",
                config.base_url
            ),
            processing: vec![
                format!("Filtering to the years {}", config.years.join(" and ")),
                format!(
                    "Selecting the '{}' age class, born in '{}'",
                    config.alcohol_age_group, config.alcohol_birth_country
                ),
                "Pivoting all discovered frequency categories into separate columns".to_string(),
                "Left-joining GDP on country + year and healthy life years on country + year + sex"
                    .to_string(),
                "Averaging duplicate (geo, time, sex) rows and rounding percentages to one decimal"
                    .to_string(),
            ],
            limitations: vec![
                "GDP and healthy-life-years values missing for some countries and years are kept \
                 as nulls"
                    .to_string(),
                "Aggregated EU rows are kept for reference and should not be mixed with \
                 country-level analytics"
                    .to_string(),
            ],
        },
        date_generated: Utc::now().format("%Y-%m-%d").to_string(),
    }
}

/// Serializes the metadata document as pretty-printed JSON.
pub fn write<P: AsRef<Path>>(metadata: &DatasetMetadata, path: P) -> Result<(), EurolensError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, metadata)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use polars::prelude::*;

    use super::*;

    fn final_table() -> DataFrame {
        DataFrame::new(vec![
            Series::new(COL::GEO, ["DE"]),
            Series::new(COL::TIME, ["2019"]),
            Series::new(COL::SEX, ["Total"]),
            Series::new("alcohol_every_day_pct", [5.0]),
            Series::new(COL::GDP_PER_CAPITA, [40000.0]),
            Series::new(COL::HEALTHY_LIFE_EXPECTANCY, [70.0]),
            Series::new(COL::ALCOHOL_CONSUMPTION_INDEX, [19.5]),
            Series::new(COL::ABSTINENCE_RATE, [20.0]),
            Series::new(COL::HEALTH_PER_GDP_RATIO, [0.00175]),
        ])
        .unwrap()
    }

    #[test]
    fn every_output_column_is_described() {
        let metadata = build(&Config::default(), &final_table());
        for name in final_table().get_column_names() {
            let description = metadata.columns.get(name).unwrap();
            assert!(
                !description.starts_with("Undocumented"),
                "column '{name}' lacks a description"
            );
        }
    }

    #[test]
    fn dynamic_frequency_columns_get_generated_descriptions() {
        let metadata = build(&Config::default(), &final_table());
        let description = metadata.columns.get("alcohol_every_day_pct").unwrap();
        assert!(description.contains("every day"));
    }

    #[test]
    fn sources_and_exclusions_come_from_config() {
        let config = Config::default();
        let metadata = build(&config, &final_table());
        assert!(metadata.sources.get("gdp").unwrap().contains("tipsna40"));
        assert!(metadata.exclusions.get("alcohol").unwrap().contains("TR"));
        assert!(metadata.exclusions.get("health").unwrap().contains("CH"));
    }

    #[test]
    fn generation_date_is_an_iso_date() {
        let metadata = build(&Config::default(), &final_table());
        assert_eq!(metadata.date_generated.len(), 10);
        assert_eq!(metadata.date_generated.matches('-').count(), 2);
    }

    #[test]
    fn metadata_serializes_to_json() {
        let metadata = build(&Config::default(), &final_table());
        let json = serde_json::to_string_pretty(&metadata).unwrap();
        assert!(json.contains("\"missing_values\""));
        assert!(json.contains("hlth_ehis_al1b"));
    }
}
