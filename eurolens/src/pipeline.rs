//! The join-and-derive pipeline: filter, pivot, join, derive, deduplicate.
//!
//! Every step is a pure `DataFrame -> DataFrame` transform over the normalized source tables,
//! so the whole pipeline runs against canned fixtures without network access.

use std::collections::BTreeSet;

use log::{debug, warn};
use polars::prelude::*;

use crate::config::Config;
use crate::error::EurolensError;
use crate::source::SourceTables;
use crate::COL;

/// Upstream labels of the frequency categories feeding the consumption index. These must be
/// present after filtering; their absence means the wrong sub-population was selected or the
/// dataset changed shape, and the run aborts naming the missing category.
pub const FREQ_DAILY: &str = "Every day";
pub const FREQ_WEEKLY: &str = "Every week";
pub const FREQ_MONTHLY: &str = "Every month";
/// The abstinence category. Missing "Never" data degrades `abstinence_rate` to null rather
/// than aborting the run.
pub const FREQ_NEVER: &str = "Never";

const REQUIRED_FREQUENCIES: &[&str] = &[FREQ_DAILY, FREQ_WEEKLY, FREQ_MONTHLY];

/// Fixed weighting of the consumption index: 1.0 x daily + 0.75 x weekly + 0.5 x monthly.
pub const DAILY_WEIGHT: f64 = 1.0;
pub const WEEKLY_WEIGHT: f64 = 0.75;
pub const MONTHLY_WEIGHT: f64 = 0.5;

/// Runs the full pipeline over already-normalized source tables.
pub fn run(tables: SourceTables, config: &Config) -> Result<DataFrame, EurolensError> {
    let alcohol = filter_alcohol(tables.alcohol, config)?;
    debug!("alcohol observations after filtering: {}", alcohol.height());
    let pivoted = pivot_frequencies(alcohol)?;
    let gdp = filter_gdp(tables.gdp, config)?;
    let health = filter_health(tables.health, config)?;
    let joined = join_tables(pivoted, gdp, health)?;
    let derived = derive_indicators(joined)?;
    dedupe_and_round(derived)
}

/// Case-insensitive equality on a label column, via an escaped anchored regex.
fn filter_label_exact(column: &str, value: &str) -> Expr {
    let regex = format!("(?i)^{}$", regex::escape(value));
    col(column).str().contains(lit(regex), false)
}

fn in_years(config: &Config) -> Expr {
    let years = Series::new("years", config.years.clone());
    col(COL::TIME).is_in(lit(years))
}

fn not_excluded_geo(excluded: &[String]) -> Expr {
    let excluded = Series::new("excluded", excluded.to_vec());
    col(COL::GEO).is_in(lit(excluded)).not()
}

/// Restricts the alcohol table to the configured sub-population (total population, born in the
/// reporting country), target years and non-excluded geographies. Null cells are dropped so
/// that pivoted cells stay null when the category was never observed.
pub fn filter_alcohol(df: DataFrame, config: &Config) -> Result<DataFrame, EurolensError> {
    Ok(df
        .lazy()
        .filter(filter_label_exact(COL::AGE, &config.alcohol_age_group))
        .filter(filter_label_exact(
            COL::BIRTH_COUNTRY,
            &config.alcohol_birth_country,
        ))
        .filter(in_years(config))
        .filter(not_excluded_geo(&config.alcohol_excluded_geos))
        .filter(col(COL::VALUE).is_not_null())
        .select([
            col(COL::GEO),
            col(COL::TIME),
            col(COL::SEX),
            col(COL::FREQUENCY),
            col(COL::VALUE),
        ])
        .collect()?)
}

pub fn filter_gdp(df: DataFrame, config: &Config) -> Result<DataFrame, EurolensError> {
    Ok(df
        .lazy()
        .filter(in_years(config))
        .filter(col(COL::VALUE).is_not_null())
        .select([
            col(COL::GEO),
            col(COL::TIME),
            col(COL::VALUE).alias(COL::GDP_PER_CAPITA),
        ])
        .collect()?)
}

pub fn filter_health(df: DataFrame, config: &Config) -> Result<DataFrame, EurolensError> {
    Ok(df
        .lazy()
        .filter(filter_label_exact(
            COL::HEALTH_INDICATOR,
            &config.health_indicator,
        ))
        .filter(in_years(config))
        .filter(not_excluded_geo(&config.health_excluded_geos))
        .filter(col(COL::VALUE).is_not_null())
        .select([
            col(COL::GEO),
            col(COL::TIME),
            col(COL::SEX),
            col(COL::VALUE).alias(COL::HEALTHY_LIFE_EXPECTANCY),
        ])
        .collect()?)
}

/// Column name for a frequency category label: lower-cased, separators collapsed to
/// underscores, punctuation dropped. "Every day" becomes `alcohol_every_day_pct`.
pub fn frequency_column_name(label: &str) -> String {
    let slug: String = label
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' | '-' | '/' => Some('_'),
            '(' | ')' | '.' | ',' | '\'' => None,
            other => Some(other),
        })
        .collect();
    format!("{}{slug}{}", COL::ALCOHOL_PCT_PREFIX, COL::ALCOHOL_PCT_SUFFIX)
}

/// Reshapes the filtered alcohol observations into one row per (geo, time, sex) with one
/// percentage column per frequency category discovered in the data.
pub fn pivot_frequencies(df: DataFrame) -> Result<DataFrame, EurolensError> {
    // Duplicate cells should not occur with correct upstream filtering; averaging them is the
    // conservative fallback, surfaced as a warning.
    let collapsed = df
        .clone()
        .lazy()
        .group_by_stable([
            col(COL::GEO),
            col(COL::TIME),
            col(COL::SEX),
            col(COL::FREQUENCY),
        ])
        .agg([col(COL::VALUE).mean()])
        .collect()?;
    if collapsed.height() < df.height() {
        warn!(
            "averaged {} duplicate alcohol observations sharing (geo, time, sex, frequency)",
            df.height() - collapsed.height()
        );
    }

    // BTreeSet rather than HashSet so the column order is deterministic across runs.
    let categories: BTreeSet<String> = collapsed
        .column(COL::FREQUENCY)?
        .str()?
        .into_iter()
        .flatten()
        .map(String::from)
        .collect();
    for required in REQUIRED_FREQUENCIES {
        if !categories.contains(*required) {
            return Err(EurolensError::MissingCategory {
                category: required.to_string(),
            });
        }
    }
    if !categories.contains(FREQ_NEVER) {
        warn!("frequency category '{FREQ_NEVER}' is absent; abstinence_rate will be null");
    }
    debug!("discovered frequency categories: {categories:?}");

    let mut pivoted = collapsed
        .clone()
        .lazy()
        .select([col(COL::GEO), col(COL::TIME), col(COL::SEX)])
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()?;
    for category in &categories {
        let column_name = frequency_column_name(category);
        let values = collapsed
            .clone()
            .lazy()
            .filter(col(COL::FREQUENCY).eq(lit(category.as_str())))
            .select([
                col(COL::GEO),
                col(COL::TIME),
                col(COL::SEX),
                col(COL::VALUE).alias(&column_name),
            ])
            .collect()?;
        pivoted = pivoted.join(
            &values,
            vec![COL::GEO, COL::TIME, COL::SEX],
            vec![COL::GEO, COL::TIME, COL::SEX],
            JoinArgs::new(JoinType::Left),
        )?;
    }
    if !categories.contains(FREQ_NEVER) {
        pivoted.with_column(Series::full_null(
            &frequency_column_name(FREQ_NEVER),
            pivoted.height(),
            &DataType::Float64,
        ))?;
    }
    Ok(pivoted)
}

/// Left-joins the pivoted alcohol table with GDP on (geo, time) and with health on
/// (geo, time, sex). Unmatched rows keep nulls so that absent data stays distinguishable from
/// a true zero. Both joins are many-to-one by construction; growth means duplicate right-hand
/// keys upstream and is surfaced as a warning (the dedupe step restores key uniqueness).
pub fn join_tables(
    pivoted: DataFrame,
    gdp: DataFrame,
    health: DataFrame,
) -> Result<DataFrame, EurolensError> {
    let rows_before = pivoted.height();
    let with_gdp = pivoted.join(
        &gdp,
        vec![COL::GEO, COL::TIME],
        vec![COL::GEO, COL::TIME],
        JoinArgs::new(JoinType::Left),
    )?;
    if with_gdp.height() > rows_before {
        warn!(
            "GDP join fanned out from {rows_before} to {} rows; duplicate (geo, time) keys in the GDP table",
            with_gdp.height()
        );
    }

    let rows_before = with_gdp.height();
    let with_health = with_gdp.join(
        &health,
        vec![COL::GEO, COL::TIME, COL::SEX],
        vec![COL::GEO, COL::TIME, COL::SEX],
        JoinArgs::new(JoinType::Left),
    )?;
    if with_health.height() > rows_before {
        warn!(
            "health join fanned out from {rows_before} to {} rows; duplicate (geo, time, sex) keys in the health table",
            with_health.height()
        );
    }
    Ok(with_health)
}

/// Computes the three derived indicators. Missing index components count as zero; the
/// health-per-GDP ratio is null whenever GDP is null or zero.
pub fn derive_indicators(df: DataFrame) -> Result<DataFrame, EurolensError> {
    let daily = frequency_column_name(FREQ_DAILY);
    let weekly = frequency_column_name(FREQ_WEEKLY);
    let monthly = frequency_column_name(FREQ_MONTHLY);
    let never = frequency_column_name(FREQ_NEVER);

    Ok(df
        .lazy()
        .with_columns([
            (col(&daily).fill_null(lit(0.0)) * lit(DAILY_WEIGHT)
                + col(&weekly).fill_null(lit(0.0)) * lit(WEEKLY_WEIGHT)
                + col(&monthly).fill_null(lit(0.0)) * lit(MONTHLY_WEIGHT))
            .alias(COL::ALCOHOL_CONSUMPTION_INDEX),
            col(&never).alias(COL::ABSTINENCE_RATE),
            when(
                col(COL::GDP_PER_CAPITA)
                    .is_null()
                    .or(col(COL::GDP_PER_CAPITA).eq(lit(0.0))),
            )
            .then(lit(NULL))
            .otherwise(col(COL::HEALTHY_LIFE_EXPECTANCY) / col(COL::GDP_PER_CAPITA))
            .alias(COL::HEALTH_PER_GDP_RATIO),
        ])
        .collect()?)
}

/// Restores (geo, time, sex) uniqueness by averaging numeric columns of duplicate keys, rounds
/// the percentage columns to one decimal, and sorts so identical snapshots produce identical
/// output rows.
pub fn dedupe_and_round(df: DataFrame) -> Result<DataFrame, EurolensError> {
    let key_columns = [COL::GEO, COL::TIME, COL::SEX];
    let value_columns: Vec<String> = df
        .get_column_names()
        .iter()
        .filter(|name| !key_columns.contains(name))
        .map(|name| name.to_string())
        .collect();

    let aggregations: Vec<Expr> = value_columns.iter().map(|name| col(name).mean()).collect();
    let deduped = df
        .clone()
        .lazy()
        .group_by_stable([col(COL::GEO), col(COL::TIME), col(COL::SEX)])
        .agg(aggregations)
        .collect()?;
    if deduped.height() < df.height() {
        warn!(
            "averaged {} duplicate (geo, time, sex) rows; this should not occur with correct upstream filtering",
            df.height() - deduped.height()
        );
    }

    let rounding: Vec<Expr> = deduped
        .get_column_names()
        .iter()
        .filter(|name| COL::is_percentage_column(name))
        .map(|name| col(name).round(1))
        .collect();
    Ok(deduped
        .lazy()
        .with_columns(rounding)
        .collect()?
        .sort(
            vec![COL::GEO, COL::TIME, COL::SEX],
            SortMultipleOptions::default(),
        )?)
}
