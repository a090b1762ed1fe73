use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the Eurostat dissemination API.
    pub base_url: String,
    pub alcohol_dataset: String,
    pub gdp_dataset: String,
    pub health_dataset: String,
    /// Years kept by the filter step, as they appear in the `time` dimension.
    pub years: Vec<String>,
    /// Geographies dropped from the alcohol series (known data-quality issues). Both the geo
    /// code and the English label are listed so the filter holds whichever form upstream emits.
    pub alcohol_excluded_geos: Vec<String>,
    /// Geographies dropped from the health series.
    pub health_excluded_geos: Vec<String>,
    /// Sub-population selectors. Each selects exactly one category of its dimension and is a
    /// required equality filter, matched case-insensitively on the label.
    pub alcohol_age_group: String,
    pub alcohol_birth_country: String,
    pub health_indicator: String,
    pub fetch_timeout_secs: u64,
    pub output: OutputConfig,
    pub report: ReportConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub data_dir: PathBuf,
    pub csv_file: String,
    pub metadata_file: String,
    pub charts_dir: PathBuf,
    pub report_file: String,
    pub chart_width: u32,
    pub chart_height: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub title: String,
    /// Directory holding `<family>-Regular.ttf`, `<family>-Bold.ttf`, `<family>-Italic.ttf` and
    /// `<family>-BoldItalic.ttf`.
    pub font_dir: PathBuf,
    pub font_family: String,
}

impl Config {
    /// URL of the JSON-stat endpoint for a dataset code.
    pub fn dataset_url(&self, dataset: &str) -> String {
        format!("{}/{dataset}?format=JSON&lang=EN", self.base_url)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: "https://ec.europa.eu/eurostat/api/dissemination/statistics/1.0/data".into(),
            alcohol_dataset: "hlth_ehis_al1b".into(),
            gdp_dataset: "tipsna40".into(),
            health_dataset: "hlth_hlye".into(),
            years: vec!["2014".into(), "2019".into()],
            alcohol_excluded_geos: vec!["TR".into(), "Türkiye".into()],
            health_excluded_geos: vec!["CH".into(), "Switzerland".into()],
            alcohol_age_group: "Total".into(),
            alcohol_birth_country: "Reporting country".into(),
            health_indicator: "Healthy life years in absolute value at birth".into(),
            fetch_timeout_secs: 30,
            output: OutputConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            data_dir: "data".into(),
            csv_file: "europe_alcohol_health.csv".into(),
            metadata_file: "europe_alcohol_health_metadata.json".into(),
            charts_dir: "graphs".into(),
            report_file: "europe_alcohol_health_report.pdf".into(),
            chart_width: 1280,
            chart_height: 960,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            title: "Europe: alcohol consumption, GDP per capita and healthy life years".into(),
            font_dir: "assets/fonts".into(),
            font_family: "Roboto".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_url_includes_format() {
        let config = Config::default();
        assert_eq!(
            config.dataset_url(&config.alcohol_dataset),
            "https://ec.europa.eu/eurostat/api/dissemination/statistics/1.0/data/hlth_ehis_al1b?format=JSON&lang=EN"
        );
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }
}
