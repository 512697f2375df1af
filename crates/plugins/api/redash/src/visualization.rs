//! Default visualization options.
//!
//! When a caller creates a visualization without explicit options, sensible
//! ones are derived from the column names. Names that look like percentages
//! or durations get matching number formats. This is best effort only.

use serde_json::{json, Map, Value};

pub const VISUALIZATION_TYPES: &[&str] = &["TABLE", "CHART", "COUNTER"];
pub const SERIES_TYPES: &[&str] = &["column", "line", "area", "pie", "scatter"];

/// What a column name suggests about its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Percentage,
    Duration,
    Plain,
}

const PERCENT_HINTS: &[&str] = &["percent", "percentage", "pct", "rate", "ratio", "share"];
const DURATION_HINTS: &[&str] = &[
    "duration", "latency", "elapsed", "runtime", "ms", "sec", "secs", "seconds",
];

/// Classify a column by the words in its name (split on non-alphanumerics).
pub fn classify(column: &str) -> ColumnKind {
    let name = column.to_ascii_lowercase();
    let has_word = |hints: &[&str]| {
        name.split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| hints.contains(&word))
    };

    if name.contains('%') || has_word(PERCENT_HINTS) {
        ColumnKind::Percentage
    } else if has_word(DURATION_HINTS) {
        ColumnKind::Duration
    } else {
        ColumnKind::Plain
    }
}

/// Columns a visualization is about.
#[derive(Debug, Clone, Default)]
pub struct ColumnHints {
    pub x_column: Option<String>,
    pub y_columns: Vec<String>,
    /// Every result column, when known
    pub all_columns: Vec<String>,
}

/// Build default options for a visualization of `viz_type`.
pub fn default_options(viz_type: &str, series_type: &str, hints: &ColumnHints) -> Value {
    match viz_type {
        "CHART" => chart_options(series_type, hints),
        "COUNTER" => counter_options(hints),
        _ => table_options(hints),
    }
}

fn table_options(hints: &ColumnHints) -> Value {
    let columns: Vec<Value> = hints
        .all_columns
        .iter()
        .enumerate()
        .map(|(order, name)| {
            let mut column = json!({
                "name": name,
                "title": name,
                "visible": true,
                "order": order,
                "alignContent": "left",
                "allowSearch": false,
            });
            match classify(name) {
                ColumnKind::Percentage => {
                    column["displayAs"] = json!("number");
                    column["numberFormat"] = json!("0.00%");
                    column["alignContent"] = json!("right");
                }
                ColumnKind::Duration => {
                    column["displayAs"] = json!("number");
                    column["numberFormat"] = json!("0,0.00");
                    column["alignContent"] = json!("right");
                }
                ColumnKind::Plain => {
                    column["displayAs"] = json!("string");
                }
            }
            column
        })
        .collect();

    json!({"itemsPerPage": 25, "columns": columns})
}

fn chart_options(series_type: &str, hints: &ColumnHints) -> Value {
    let mut mapping = Map::new();
    if let Some(x) = &hints.x_column {
        mapping.insert(x.clone(), json!("x"));
    }
    for y in &hints.y_columns {
        mapping.insert(y.clone(), json!("y"));
    }

    let all_percent = !hints.y_columns.is_empty()
        && hints
            .y_columns
            .iter()
            .all(|y| classify(y) == ColumnKind::Percentage);
    let y_axis = if all_percent {
        json!([{"type": "linear", "tickFormat": "0%"}])
    } else {
        json!([{"type": "linear"}])
    };

    json!({
        "globalSeriesType": series_type,
        "columnMapping": mapping,
        "legend": {"enabled": true},
        "xAxis": {"type": "-", "labels": {"enabled": true}},
        "yAxis": y_axis,
        "seriesOptions": {},
        "numberFormat": "0,0[.]00",
        "percentFormat": "0[.]00%",
        "showDataLabels": series_type == "pie",
    })
}

fn counter_options(hints: &ColumnHints) -> Value {
    let column = hints
        .y_columns
        .first()
        .or(hints.all_columns.first())
        .cloned()
        .unwrap_or_default();

    let (decimals, suffix) = match classify(&column) {
        ColumnKind::Percentage => (2, "%"),
        ColumnKind::Duration => (2, "s"),
        ColumnKind::Plain => (0, ""),
    };

    json!({
        "counterColName": column,
        "rowNumber": 1,
        "targetRowNumber": 1,
        "stringDecimal": decimals,
        "stringDecChar": ".",
        "stringThouSep": ",",
        "stringSuffix": suffix,
        "formatTargetValue": false,
    })
}
