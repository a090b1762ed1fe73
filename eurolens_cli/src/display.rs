use comfy_table::{presets::NOTHING, *};
use itertools::izip;

use eurolens::COL;
use polars::frame::DataFrame;
use polars::prelude::AnyValue;

fn format_value(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn format_label(value: &AnyValue) -> String {
    match value {
        AnyValue::String(s) => (*s).to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => other.to_string(),
    }
}

pub fn display_summary(df: DataFrame, max_results: Option<usize>) -> anyhow::Result<()> {
    let total_rows = df.height();
    let df_to_show = match max_results {
        Some(max) => df.head(Some(max)),
        None => df,
    };
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Geo").add_attribute(Attribute::Bold),
            Cell::new("Year").add_attribute(Attribute::Bold),
            Cell::new("Sex").add_attribute(Attribute::Bold),
            Cell::new("GDP per capita").add_attribute(Attribute::Bold),
            Cell::new("Healthy life years").add_attribute(Attribute::Bold),
            Cell::new("Alcohol index").add_attribute(Attribute::Bold),
            Cell::new("Abstinence").add_attribute(Attribute::Bold),
            Cell::new("Health per GDP").add_attribute(Attribute::Bold),
        ])
        .set_style(comfy_table::TableComponent::BottomBorder, '─')
        .set_style(comfy_table::TableComponent::MiddleHeaderIntersections, '─')
        .set_style(comfy_table::TableComponent::HeaderLines, '─')
        .set_style(comfy_table::TableComponent::BottomBorderIntersections, '─')
        .set_style(comfy_table::TableComponent::TopBorder, '─')
        .set_style(comfy_table::TableComponent::TopBorderIntersections, '─');

    let time = df_to_show.column(COL::TIME)?.rechunk();
    for (geo, time, sex, gdp, health, index, abstinence, ratio) in izip!(
        df_to_show.column(COL::GEO)?.str()?,
        time.iter(),
        df_to_show.column(COL::SEX)?.str()?,
        df_to_show.column(COL::GDP_PER_CAPITA)?.f64()?,
        df_to_show.column(COL::HEALTHY_LIFE_EXPECTANCY)?.f64()?,
        df_to_show.column(COL::ALCOHOL_CONSUMPTION_INDEX)?.f64()?,
        df_to_show.column(COL::ABSTINENCE_RATE)?.f64()?,
        df_to_show.column(COL::HEALTH_PER_GDP_RATIO)?.f64()?,
    ) {
        table.add_row(vec![
            geo.unwrap_or_default().to_string(),
            format_label(&time),
            sex.unwrap_or_default().to_string(),
            format_value(gdp),
            format_value(health),
            format_value(index),
            format_value(abstinence),
            format_value(ratio),
        ]);
    }
    println!("\n{}", table);
    if let Some(max) = max_results {
        if total_rows > max {
            println!(
                "{} more row(s) not shown. Use --full to show all rows.",
                total_rows - max
            );
        }
    }
    Ok(())
}
