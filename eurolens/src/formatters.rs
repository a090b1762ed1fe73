use anyhow::{anyhow, Result};
use enum_dispatch::enum_dispatch;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::Cursor;
use std::io::Write;

/// Utility function to convert from polars `AnyValue` to `serde_json::Value`.
/// Covers the types the final table can hold; nulls map to JSON null, never 0.
fn any_value_to_json(value: &AnyValue) -> Result<Value> {
    match value {
        AnyValue::Null => Ok(Value::Null),
        AnyValue::Boolean(b) => Ok(Value::Bool(*b)),
        AnyValue::String(s) => Ok(Value::String((*s).to_string())),
        AnyValue::Int32(n) => Ok(json!(*n)),
        AnyValue::Int64(n) => Ok(json!(*n)),
        AnyValue::UInt32(n) => Ok(json!(*n)),
        AnyValue::UInt64(n) => Ok(json!(*n)),
        AnyValue::Float32(n) => Ok(json!(*n)),
        AnyValue::Float64(n) => Ok(json!(*n)),
        _ => Err(anyhow!("Failed to convert type")),
    }
}

/// Trait to define different output generators. Defines two functions, `format` which
/// generates a serialized string of the `DataFrame` and `save` which writes the generated
/// output to a writer.
#[enum_dispatch]
pub trait OutputGenerator {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()>;
    fn format(&self, df: &mut DataFrame) -> Result<String> {
        let mut data: Vec<u8> = vec![];
        let mut buff = Cursor::new(&mut data);
        self.save(&mut buff, df)?;
        Ok(String::from_utf8(data)?)
    }
}

/// Enum of OutputFormatters, one for each potential output type.
#[enum_dispatch(OutputGenerator)]
#[derive(Serialize, Deserialize, Debug)]
pub enum OutputFormatter {
    Csv(CsvFormatter),
    Json(JsonRecordsFormatter),
}

/// Format the results as a CSV file. Missing values serialize as empty fields.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct CsvFormatter;

impl OutputGenerator for CsvFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()> {
        CsvWriter::new(writer).finish(df)?;
        Ok(())
    }
}

/// Format the results as a JSON array with one object per row. Missing values serialize as
/// JSON null.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct JsonRecordsFormatter;

impl OutputGenerator for JsonRecordsFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()> {
        let mut records: Vec<Value> = Vec::with_capacity(df.height());
        for idx in 0..df.height() {
            let mut record = serde_json::Map::new();
            for column in df.get_columns() {
                let value = any_value_to_json(&column.get(idx)?)?;
                record.insert(column.name().to_string(), value);
            }
            records.push(Value::Object(record));
        }
        serde_json::to_writer_pretty(writer, &records)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::COL;

    fn table_with_missing_gdp() -> DataFrame {
        DataFrame::new(vec![
            Series::new(COL::GEO, ["DE", "FR"]),
            Series::new(COL::TIME, ["2019", "2019"]),
            Series::new(COL::GDP_PER_CAPITA, [Some(40000.0), None]),
        ])
        .unwrap()
    }

    #[test]
    fn csv_serializes_nulls_as_empty_fields() {
        let mut df = table_with_missing_gdp();
        let output = CsvFormatter.format(&mut df).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "geo,time,gdp_per_capita");
        assert_eq!(lines[1], "DE,2019,40000.0");
        assert_eq!(lines[2], "FR,2019,");
    }

    #[test]
    fn json_serializes_nulls_as_null() {
        let mut df = table_with_missing_gdp();
        let output = JsonRecordsFormatter.format(&mut df).unwrap();
        let records: Vec<Value> = serde_json::from_str(&output).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["gdp_per_capita"], Value::Null);
        assert_eq!(records[0]["gdp_per_capita"], json!(40000.0));
    }
}
