//! Static chart rendering for the final dataset.
//!
//! Each chart is a named PNG; `render_all` returns the list of rendered files with their
//! titles so the PDF report can embed them one per page. Charts with no usable data points
//! are skipped with a warning rather than rendered empty.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use itertools::izip;
use log::warn;
use plotters::prelude::*;
use polars::prelude::{AnyValue, DataFrame};

use crate::config::Config;
use crate::error::EurolensError;
use crate::COL;

pub const GDP_VS_INDEX: ChartSpec = ChartSpec {
    name: "gdp_vs_alcohol_index",
    title: "Alcohol consumption index vs GDP per capita",
};
pub const INDEX_VS_HEALTH: ChartSpec = ChartSpec {
    name: "alcohol_index_vs_healthy_life_years",
    title: "Healthy life years vs alcohol consumption index",
};
pub const TOP_ABSTINENCE: ChartSpec = ChartSpec {
    name: "top_abstinence",
    title: "Highest abstinence rates",
};
pub const INDEX_CHANGE: ChartSpec = ChartSpec {
    name: "alcohol_index_change",
    title: "Change in alcohol consumption index between survey years",
};
pub const INDEX_HEATMAP: ChartSpec = ChartSpec {
    name: "alcohol_index_heatmap",
    title: "Alcohol consumption index by country and year",
};

#[derive(Debug, Clone, Copy)]
pub struct ChartSpec {
    pub name: &'static str,
    pub title: &'static str,
}

impl ChartSpec {
    fn file_name(&self) -> String {
        format!("{}.png", self.name)
    }
}

#[derive(Debug, Clone)]
pub struct RenderedChart {
    pub title: String,
    pub path: PathBuf,
}

/// One row of the final table, decoded for plotting.
#[derive(Debug, Clone)]
struct ChartRow {
    geo: String,
    time: String,
    sex: String,
    gdp: Option<f64>,
    index: Option<f64>,
    health: Option<f64>,
    abstinence: Option<f64>,
}

const SEX_PALETTE: [RGBColor; 4] = [BLUE, RED, GREEN, MAGENTA];

fn any_value_to_label(value: &AnyValue) -> String {
    match value {
        AnyValue::String(s) => (*s).to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => other.to_string(),
    }
}

/// Decodes the columns needed for plotting. The time column is stringified so the same code
/// serves the in-memory pipeline output (strings) and a re-read CSV (integers).
fn chart_rows(df: &DataFrame) -> Result<Vec<ChartRow>, EurolensError> {
    let time = df.column(COL::TIME)?.rechunk();
    let mut rows = Vec::with_capacity(df.height());
    for (geo, time, sex, gdp, index, health, abstinence) in izip!(
        df.column(COL::GEO)?.str()?,
        time.iter(),
        df.column(COL::SEX)?.str()?,
        df.column(COL::GDP_PER_CAPITA)?.f64()?,
        df.column(COL::ALCOHOL_CONSUMPTION_INDEX)?.f64()?,
        df.column(COL::HEALTHY_LIFE_EXPECTANCY)?.f64()?,
        df.column(COL::ABSTINENCE_RATE)?.f64()?,
    ) {
        rows.push(ChartRow {
            geo: geo.unwrap_or_default().to_string(),
            time: any_value_to_label(&time),
            sex: sex.unwrap_or_default().to_string(),
            gdp,
            index,
            health,
            abstinence,
        });
    }
    Ok(rows)
}

/// Renders every chart into `out_dir` and returns the ones that had data.
pub fn render_all(
    df: &DataFrame,
    out_dir: &Path,
    config: &Config,
) -> Result<Vec<RenderedChart>, EurolensError> {
    std::fs::create_dir_all(out_dir)?;
    let rows = chart_rows(df)?;
    let size = (config.output.chart_width, config.output.chart_height);

    let mut rendered = Vec::new();
    let mut push_if = |written: bool, spec: &ChartSpec, path: PathBuf| {
        if written {
            rendered.push(RenderedChart {
                title: spec.title.to_string(),
                path,
            });
        }
    };

    let path = out_dir.join(GDP_VS_INDEX.file_name());
    let written = scatter_chart(
        &rows,
        |r| r.gdp,
        |r| r.index,
        "GDP per capita (PPS)",
        "Alcohol consumption index",
        &path,
        GDP_VS_INDEX.title,
        size,
    )?;
    push_if(written, &GDP_VS_INDEX, path);

    let path = out_dir.join(INDEX_VS_HEALTH.file_name());
    let written = scatter_chart(
        &rows,
        |r| r.index,
        |r| r.health,
        "Alcohol consumption index",
        "Healthy life years",
        &path,
        INDEX_VS_HEALTH.title,
        size,
    )?;
    push_if(written, &INDEX_VS_HEALTH, path);

    let path = out_dir.join(TOP_ABSTINENCE.file_name());
    let written = top_abstinence_chart(&rows, &path, TOP_ABSTINENCE.title, size)?;
    push_if(written, &TOP_ABSTINENCE, path);

    let path = out_dir.join(INDEX_CHANGE.file_name());
    let written = index_change_chart(&rows, &config.years, &path, INDEX_CHANGE.title, size)?;
    push_if(written, &INDEX_CHANGE, path);

    let path = out_dir.join(INDEX_HEATMAP.file_name());
    let written = index_heatmap_chart(&rows, &path, INDEX_HEATMAP.title, size)?;
    push_if(written, &INDEX_HEATMAP, path);

    Ok(rendered)
}

#[allow(clippy::too_many_arguments)]
fn scatter_chart(
    rows: &[ChartRow],
    x_of: impl Fn(&ChartRow) -> Option<f64>,
    y_of: impl Fn(&ChartRow) -> Option<f64>,
    x_desc: &str,
    y_desc: &str,
    path: &Path,
    title: &str,
    size: (u32, u32),
) -> Result<bool> {
    let points: Vec<(f64, f64, &str, &str)> = rows
        .iter()
        .filter_map(|r| Some((x_of(r)?, y_of(r)?, r.geo.as_str(), r.sex.as_str())))
        .collect();
    if points.is_empty() {
        warn!("no data points for chart '{title}', skipping");
        return Ok(false);
    }

    let x_max = points.iter().map(|p| p.0).fold(f64::MIN, f64::max) * 1.05;
    let y_max = points.iter().map(|p| p.1).fold(f64::MIN, f64::max) * 1.05;

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(12)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..x_max.max(1.0), 0f64..y_max.max(1.0))?;
    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .draw()?;

    let sexes: BTreeSet<&str> = points.iter().map(|p| p.3).collect();
    for (i, sex) in sexes.iter().enumerate() {
        let color = SEX_PALETTE[i % SEX_PALETTE.len()];
        chart
            .draw_series(
                points
                    .iter()
                    .filter(|p| p.3 == *sex)
                    .map(|(x, y, _, _)| Circle::new((*x, *y), 5, color.filled())),
            )?
            .label(*sex)
            .legend(move |(x, y)| Circle::new((x, y), 5, color.filled()));
    }
    // Annotate each point with its country code, the way the source charts do.
    chart.draw_series(
        points
            .iter()
            .map(|(x, y, geo, _)| Text::new((*geo).to_string(), (*x, *y), ("sans-serif", 12))),
    )?;
    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .draw()?;
    root.present()
        .with_context(|| format!("Failed to write chart to {}", path.display()))?;
    Ok(true)
}

fn top_abstinence_chart(
    rows: &[ChartRow],
    path: &Path,
    title: &str,
    size: (u32, u32),
) -> Result<bool> {
    let mut sums: BTreeMap<(String, String), (f64, usize)> = BTreeMap::new();
    for row in rows {
        if let Some(rate) = row.abstinence {
            let entry = sums
                .entry((row.geo.clone(), row.sex.clone()))
                .or_insert((0.0, 0));
            entry.0 += rate;
            entry.1 += 1;
        }
    }
    let mut entries: Vec<(String, f64)> = sums
        .into_iter()
        .map(|((geo, sex), (sum, count))| (format!("{geo} ({sex})"), sum / count as f64))
        .collect();
    if entries.is_empty() {
        warn!("no abstinence data for chart '{title}', skipping");
        return Ok(false);
    }
    entries.sort_by(|a, b| b.1.total_cmp(&a.1));
    entries.truncate(10);
    // Highest bar on top.
    entries.reverse();

    let x_max = entries.iter().map(|e| e.1).fold(f64::MIN, f64::max) * 1.1;
    let labels: Vec<String> = entries.iter().map(|e| e.0.clone()).collect();

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(12)
        .x_label_area_size(50)
        .y_label_area_size(160)
        .build_cartesian_2d(0f64..x_max.max(1.0), 0..entries.len() as i32)?;
    chart
        .configure_mesh()
        .x_desc("Abstinence rate (%)")
        .y_labels(entries.len())
        .y_label_formatter(&|idx| {
            labels
                .get(*idx as usize)
                .cloned()
                .unwrap_or_default()
        })
        .draw()?;
    chart.draw_series(entries.iter().enumerate().map(|(i, (_, rate))| {
        Rectangle::new([(0.0, i as i32), (*rate, i as i32 + 1)], BLUE.mix(0.6).filled())
    }))?;
    root.present()
        .with_context(|| format!("Failed to write chart to {}", path.display()))?;
    Ok(true)
}

fn index_change_chart(
    rows: &[ChartRow],
    years: &[String],
    path: &Path,
    title: &str,
    size: (u32, u32),
) -> Result<bool> {
    if years.len() < 2 {
        warn!("chart '{title}' needs at least two target years, skipping");
        return Ok(false);
    }
    let (first, last) = (&years[0], &years[years.len() - 1]);

    let mut spans: BTreeMap<(String, String), (Option<f64>, Option<f64>)> = BTreeMap::new();
    for row in rows {
        let entry = spans
            .entry((row.geo.clone(), row.sex.clone()))
            .or_insert((None, None));
        if row.time == *first {
            entry.0 = row.index;
        } else if row.time == *last {
            entry.1 = row.index;
        }
    }
    let mut deltas: Vec<(String, f64)> = spans
        .into_iter()
        .filter_map(|((geo, sex), (start, end))| {
            Some((format!("{geo} ({sex})"), end? - start?))
        })
        .collect();
    if deltas.is_empty() {
        warn!("no country has data for both {first} and {last}, skipping chart '{title}'");
        return Ok(false);
    }
    deltas.sort_by(|a, b| a.1.total_cmp(&b.1));

    let min = deltas.iter().map(|d| d.1).fold(f64::MAX, f64::min).min(0.0);
    let max = deltas.iter().map(|d| d.1).fold(f64::MIN, f64::max).max(0.0);
    let pad = ((max - min) * 0.05).max(0.5);
    let labels: Vec<String> = deltas.iter().map(|d| d.0.clone()).collect();

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(12)
        .x_label_area_size(50)
        .y_label_area_size(160)
        .build_cartesian_2d(min - pad..max + pad, 0..deltas.len() as i32)?;
    chart
        .configure_mesh()
        .x_desc(&format!("Index change ({last} - {first})"))
        .y_labels(deltas.len())
        .y_label_formatter(&|idx| {
            labels
                .get(*idx as usize)
                .cloned()
                .unwrap_or_default()
        })
        .draw()?;
    chart.draw_series(deltas.iter().enumerate().map(|(i, (_, delta))| {
        let color = if *delta > 0.0 { GREEN } else { RED };
        Rectangle::new([(0.0, i as i32), (*delta, i as i32 + 1)], color.mix(0.7).filled())
    }))?;
    root.present()
        .with_context(|| format!("Failed to write chart to {}", path.display()))?;
    Ok(true)
}

fn index_heatmap_chart(
    rows: &[ChartRow],
    path: &Path,
    title: &str,
    size: (u32, u32),
) -> Result<bool> {
    let mut sums: BTreeMap<(String, String), (f64, usize)> = BTreeMap::new();
    for row in rows {
        if let Some(index) = row.index {
            let entry = sums
                .entry((row.geo.clone(), row.time.clone()))
                .or_insert((0.0, 0));
            entry.0 += index;
            entry.1 += 1;
        }
    }
    if sums.is_empty() {
        warn!("no index data for chart '{title}', skipping");
        return Ok(false);
    }
    let cells: BTreeMap<(String, String), f64> = sums
        .into_iter()
        .map(|(key, (sum, count))| (key, sum / count as f64))
        .collect();
    let geos: Vec<String> = cells
        .keys()
        .map(|(geo, _)| geo.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let times: Vec<String> = cells
        .keys()
        .map(|(_, time)| time.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let low = cells.values().copied().fold(f64::MAX, f64::min);
    let high = cells.values().copied().fold(f64::MIN, f64::max);

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(12)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(0..times.len() as i32, 0..geos.len() as i32)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Year")
        .x_labels(times.len())
        .x_label_formatter(&|idx| times.get(*idx as usize).cloned().unwrap_or_default())
        .y_labels(geos.len())
        .y_label_formatter(&|idx| geos.get(*idx as usize).cloned().unwrap_or_default())
        .draw()?;
    chart.draw_series(cells.iter().map(|((geo, time), value)| {
        let x = times.iter().position(|t| t == time).unwrap_or(0) as i32;
        let y = geos.iter().position(|g| g == geo).unwrap_or(0) as i32;
        let t = if high > low {
            (value - low) / (high - low)
        } else {
            0.5
        };
        Rectangle::new([(x, y), (x + 1, y + 1)], heat_color(t).filled())
    }))?;
    root.present()
        .with_context(|| format!("Failed to write chart to {}", path.display()))?;
    Ok(true)
}

/// Cold-to-warm ramp for heatmap cells.
fn heat_color(t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    RGBColor(
        (255.0 * t) as u8,
        (96.0 * (1.0 - (2.0 * t - 1.0).abs())) as u8,
        (255.0 * (1.0 - t)) as u8,
    )
}
