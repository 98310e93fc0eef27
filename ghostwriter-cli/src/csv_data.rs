use anyhow::{bail, Context, Error};
use minijinja::Value;

/// Cells that count as missing, besides the empty cell.
const MISSING_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>",
    "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// How CSV rows are exposed to the template.
#[derive(Debug, Clone, Copy)]
pub struct CsvOptions<'a> {
    /// The context key holding the list of rows.
    pub rows_name: &'a str,
    /// The replacement for missing cells, or `None` to keep them as none.
    pub fill: Option<&'a str>,
}

/// Reads CSV text into a map with a single key holding one map per row.
///
/// The first line is the header.  Numeric and boolean cells are converted,
/// everything else stays a string.
pub fn read_rows(contents: &str, options: CsvOptions<'_>) -> Result<Value, Error> {
    if options.rows_name.is_empty() {
        bail!("the csv rows name must not be empty");
    }

    let mut reader = csv::ReaderBuilder::new().from_reader(contents.as_bytes());
    let headers = reader
        .headers()
        .context("unable to read csv header")?
        .clone();

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("invalid csv record {}", idx + 1))?;
        let row: Value = headers
            .iter()
            .zip(record.iter())
            .map(|(name, cell)| (name.to_string(), cell_value(cell, options.fill)))
            .collect();
        rows.push(row);
    }
    tracing::debug!(rows = rows.len(), key = options.rows_name, "csv rows read");

    Ok(Value::from_iter([(options.rows_name.to_string(), Value::from(rows))]))
}

fn cell_value(cell: &str, fill: Option<&str>) -> Value {
    if cell.is_empty() || MISSING_MARKERS.contains(&cell) {
        return match fill {
            Some(fill) => Value::from(fill),
            None => Value::from(()),
        };
    }
    if let Ok(int) = cell.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = cell.parse::<f64>() {
        if float.is_finite() {
            return Value::from(float);
        }
    }
    match cell {
        "True" | "true" | "TRUE" => Value::from(true),
        "False" | "false" | "FALSE" => Value::from(false),
        _ => Value::from(cell),
    }
}
