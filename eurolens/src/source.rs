//! Source definitions and retrieval.
//!
//! Each Eurostat source is described declaratively: its dataset code comes from the
//! configuration and its schema mapping lives here. Retrieval is one bounded-timeout GET per
//! source; the three fetches run concurrently since there is no ordering dependency between
//! them. A failed fetch is fatal and names the source — there is no partial-success mode.

use std::time::Duration;

use log::info;
use polars::prelude::DataFrame;
use strum_macros::Display;
use tokio::try_join;

use crate::config::Config;
use crate::error::EurolensError;
use crate::jsonstat::Dataset;
use crate::schema::{ColumnMapping, SourceSchema};
use crate::COL;

/// Dimensions whose category codes (rather than labels) populate the long frame. geo is the
/// primary key of the final dataset and is keyed by its ISO-style code.
const CODE_VALUED_DIMS: &[&str] = &["geo"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SourceId {
    Alcohol,
    Gdp,
    Health,
}

pub const ALCOHOL_SCHEMA: SourceSchema = SourceSchema {
    source_id: "alcohol",
    columns: &[
        ColumnMapping {
            canonical: COL::FREQUENCY,
            candidates: &[
                "Frequency of alcohol consumption",
                "Frequency",
                "Alcohol consumption",
                "frequenc",
                "cons_alc",
            ],
        },
        ColumnMapping {
            canonical: COL::SEX,
            candidates: &["Sex", "sex"],
        },
        ColumnMapping {
            canonical: COL::AGE,
            candidates: &["Age class", "Age", "age"],
        },
        ColumnMapping {
            canonical: COL::BIRTH_COUNTRY,
            candidates: &["Country/region of birth", "Country of birth", "c_birth"],
        },
        ColumnMapping {
            canonical: COL::GEO,
            candidates: &["Geopolitical entity (reporting)", "geo"],
        },
        ColumnMapping {
            canonical: COL::TIME,
            candidates: &["Time", "Time period", "time"],
        },
        ColumnMapping {
            canonical: COL::VALUE,
            candidates: &["value"],
        },
    ],
};

pub const GDP_SCHEMA: SourceSchema = SourceSchema {
    source_id: "gdp",
    columns: &[
        ColumnMapping {
            canonical: COL::GEO,
            candidates: &["Geopolitical entity (reporting)", "geo"],
        },
        ColumnMapping {
            canonical: COL::TIME,
            candidates: &["Time", "Time period", "time"],
        },
        ColumnMapping {
            canonical: COL::VALUE,
            candidates: &["value"],
        },
    ],
};

pub const HEALTH_SCHEMA: SourceSchema = SourceSchema {
    source_id: "health",
    columns: &[
        ColumnMapping {
            canonical: COL::SEX,
            candidates: &["Sex", "sex"],
        },
        ColumnMapping {
            canonical: COL::HEALTH_INDICATOR,
            candidates: &["Health indicator", "indic_he", "hlth_indic"],
        },
        ColumnMapping {
            canonical: COL::GEO,
            candidates: &["Geopolitical entity (reporting)", "geo"],
        },
        ColumnMapping {
            canonical: COL::TIME,
            candidates: &["Time", "Time period", "time"],
        },
        ColumnMapping {
            canonical: COL::VALUE,
            candidates: &["value"],
        },
    ],
};

impl SourceId {
    pub fn schema(&self) -> &'static SourceSchema {
        match self {
            SourceId::Alcohol => &ALCOHOL_SCHEMA,
            SourceId::Gdp => &GDP_SCHEMA,
            SourceId::Health => &HEALTH_SCHEMA,
        }
    }

    pub fn dataset_code<'a>(&self, config: &'a Config) -> &'a str {
        match self {
            SourceId::Alcohol => &config.alcohol_dataset,
            SourceId::Gdp => &config.gdp_dataset,
            SourceId::Health => &config.health_dataset,
        }
    }
}

/// The three normalized long-format source tables the pipeline consumes. Constructing this by
/// hand (e.g. from canned JSON-stat fixtures) is the seam that lets tests run without network
/// access.
#[derive(Debug)]
pub struct SourceTables {
    pub alcohol: DataFrame,
    pub gdp: DataFrame,
    pub health: DataFrame,
}

/// Decodes a JSON-stat body and normalizes its columns to the canonical vocabulary.
pub fn decode_source(id: SourceId, body: &str) -> Result<DataFrame, EurolensError> {
    let dataset = Dataset::from_json_str(body)?;
    let long = dataset.to_long_frame(CODE_VALUED_DIMS)?;
    id.schema().normalize(&long)
}

async fn fetch_source(
    client: &reqwest::Client,
    config: &Config,
    id: SourceId,
) -> Result<DataFrame, EurolensError> {
    let url = config.dataset_url(id.dataset_code(config));
    info!("Fetching source '{id}' from {url}");

    let fetch_error = |reason: String| EurolensError::Fetch {
        source_id: id.to_string(),
        url: url.clone(),
        reason,
    };

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;
    if !response.status().is_success() {
        return Err(fetch_error(format!(
            "unexpected status {}",
            response.status()
        )));
    }
    let body = response
        .text()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;

    let df = decode_source(id, &body)?;
    info!("Source '{id}' decoded with shape {:?}", df.shape());
    Ok(df)
}

/// Retrieves and normalizes all three sources concurrently.
pub async fn fetch_source_tables(config: &Config) -> Result<SourceTables, EurolensError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.fetch_timeout_secs))
        .build()
        .map_err(anyhow::Error::from)?;

    let (alcohol, gdp, health) = try_join!(
        fetch_source(&client, config, SourceId::Alcohol),
        fetch_source(&client, config, SourceId::Gdp),
        fetch_source(&client, config, SourceId::Health),
    )?;
    Ok(SourceTables {
        alcohol,
        gdp,
        health,
    })
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn gdp_body() -> String {
        json!({
            "id": ["geo", "time"],
            "size": [1, 2],
            "dimension": {
                "geo": {
                    "label": "Geopolitical entity (reporting)",
                    "category": {"index": {"DE": 0}, "label": {"DE": "Germany"}}
                },
                "time": {
                    "label": "Time",
                    "category": {"index": {"2014": 0, "2019": 1}}
                }
            },
            "value": {"0": 35000.0, "1": 40000.0}
        })
        .to_string()
    }

    fn single_source_config(server: &MockServer) -> Config {
        Config {
            base_url: server.url("/data"),
            ..Config::default()
        }
    }

    #[test]
    fn decode_source_normalizes_columns() {
        let df = decode_source(SourceId::Gdp, &gdp_body()).unwrap();
        assert_eq!(df.get_column_names(), &[COL::GEO, COL::TIME, COL::VALUE]);
        assert_eq!(df.shape(), (2, 3));
    }

    #[tokio::test]
    async fn fetch_source_tables_hits_all_three_endpoints() {
        let server = MockServer::start();
        let config = single_source_config(&server);

        let alcohol_body = json!({
            "id": ["frequenc", "sex", "age", "c_birth", "geo", "time"],
            "size": [1, 1, 1, 1, 1, 1],
            "dimension": {
                "frequenc": {"label": "Frequency", "category": {"index": {"DAY": 0}, "label": {"DAY": "Every day"}}},
                "sex": {"label": "Sex", "category": {"index": {"T": 0}, "label": {"T": "Total"}}},
                "age": {"label": "Age class", "category": {"index": {"TOTAL": 0}, "label": {"TOTAL": "Total"}}},
                "c_birth": {"label": "Country/region of birth", "category": {"index": {"NAT": 0}, "label": {"NAT": "Reporting country"}}},
                "geo": {"label": "Geopolitical entity (reporting)", "category": {"index": {"DE": 0}, "label": {"DE": "Germany"}}},
                "time": {"label": "Time", "category": {"index": {"2019": 0}, "label": {"2019": "2019"}}}
            },
            "value": {"0": 5.0}
        })
        .to_string();
        let health_body = json!({
            "id": ["sex", "indic_he", "geo", "time"],
            "size": [1, 1, 1, 1],
            "dimension": {
                "sex": {"label": "Sex", "category": {"index": {"T": 0}, "label": {"T": "Total"}}},
                "indic_he": {"label": "Health indicator", "category": {"index": {"HLY_0": 0}, "label": {"HLY_0": "Healthy life years in absolute value at birth"}}},
                "geo": {"label": "Geopolitical entity (reporting)", "category": {"index": {"DE": 0}, "label": {"DE": "Germany"}}},
                "time": {"label": "Time", "category": {"index": {"2019": 0}, "label": {"2019": "2019"}}}
            },
            "value": {"0": 70.0}
        })
        .to_string();

        let alcohol_mock = server.mock(|when, then| {
            when.method(GET).path("/data/hlth_ehis_al1b");
            then.status(200).body(alcohol_body.clone());
        });
        let gdp_mock = server.mock(|when, then| {
            when.method(GET).path("/data/tipsna40");
            then.status(200).body(gdp_body());
        });
        let health_mock = server.mock(|when, then| {
            when.method(GET).path("/data/hlth_hlye");
            then.status(200).body(health_body.clone());
        });

        let tables = fetch_source_tables(&config).await.unwrap();
        alcohol_mock.assert();
        gdp_mock.assert();
        health_mock.assert();

        assert_eq!(
            tables.alcohol.get_column_names(),
            &[
                COL::FREQUENCY,
                COL::SEX,
                COL::AGE,
                COL::BIRTH_COUNTRY,
                COL::GEO,
                COL::TIME,
                COL::VALUE
            ]
        );
        assert_eq!(tables.gdp.shape(), (2, 3));
        assert_eq!(tables.health.shape(), (1, 5));
    }

    #[tokio::test]
    async fn non_200_response_is_a_fatal_fetch_error() {
        let server = MockServer::start();
        let config = single_source_config(&server);

        server.mock(|when, then| {
            when.method(GET);
            then.status(500);
        });

        let err = fetch_source_tables(&config).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Failed to fetch source"));
        assert!(message.contains("500"));
    }

    #[tokio::test]
    async fn slow_responses_time_out_as_fatal_fetch_errors() {
        let server = MockServer::start();
        let config = Config {
            fetch_timeout_secs: 1,
            ..single_source_config(&server)
        };

        server.mock(|when, then| {
            when.method(GET);
            then.status(200)
                .body(gdp_body())
                .delay(std::time::Duration::from_millis(1500));
        });

        let err = fetch_source_tables(&config).await.unwrap_err();
        assert!(matches!(err, EurolensError::Fetch { .. }));
    }

    #[tokio::test]
    async fn schema_mismatch_in_response_is_fatal_and_names_the_column() {
        let server = MockServer::start();
        let config = single_source_config(&server);

        // A valid JSON-stat body, but with an unrecognizable geo dimension name everywhere.
        let body = json!({
            "id": ["region", "time"],
            "size": [1, 1],
            "dimension": {
                "region": {"label": "Some new region label", "category": {"index": {"DE": 0}}},
                "time": {"label": "Time", "category": {"index": {"2019": 0}}}
            },
            "value": {"0": 1.0}
        })
        .to_string();
        server.mock(|when, then| {
            when.method(GET);
            then.status(200).body(body.clone());
        });

        // Whichever source fails first, the error must be a schema mismatch naming a column.
        let err = fetch_source_tables(&config).await.unwrap_err();
        assert!(matches!(err, EurolensError::SchemaMismatch { .. }));
        assert!(err.to_string().contains("missing required column"));
    }
}
