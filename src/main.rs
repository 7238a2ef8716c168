use std::fs;
use std::path::Path;

use tabletalk::cli::{Cli, OutputFormat};
use tabletalk::sql::executor::execute_query;
use tabletalk::sql::QueryResult;
use tabletalk::storage::{RawRow, TableStore};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse_args();

    let table_name = cli.table.clone().unwrap_or_else(|| {
        cli.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("data")
            .to_string()
    });

    let rows = read_rows(&cli.path)?;
    let mut store = TableStore::new();
    store.load(&table_name, &rows)?;

    match &cli.query {
        Some(query) => {
            let result = execute_query(&store, query)?;
            match cli.format {
                OutputFormat::Table => print_table(&result),
                OutputFormat::Csv => print_csv(&result),
                OutputFormat::Json => print_json(&result),
            }
        }
        None => print_schema(&store, &table_name),
    }

    Ok(())
}

fn read_rows(path: &Path) -> Result<Vec<RawRow>, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&text)?;
    let entries = parsed
        .as_array()
        .ok_or("expected a JSON array of row objects")?;

    let mut rows = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match entry.as_object() {
            Some(object) => rows.push(object.clone()),
            None => eprintln!("Warning: skipping non-object entry at index {}", index),
        }
    }
    Ok(rows)
}

fn print_schema(store: &TableStore, table: &str) {
    println!("Table: {} ({} rows)", table, store.row_count(table));
    for column in store.schema(table) {
        println!("  {}  {}", column.name, column.data_type);
    }
}

fn print_table(result: &QueryResult) {
    if result.row_count() == 0 {
        println!("(0 rows)");
        return;
    }

    let columns = result.column_names();

    // Column widths from header and values.
    let widths: Vec<usize> = columns
        .iter()
        .map(|name| {
            let value_width = result
                .rows
                .iter()
                .map(|row| row.get(name).map(|v| v.to_string().len()).unwrap_or(0))
                .max()
                .unwrap_or(0);
            name.len().max(value_width)
        })
        .collect();

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(name, &width)| format!("{:width$}", name))
        .collect();
    println!("{}", header.join(" | "));

    let separator: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", separator.join("-+-"));

    for row in &result.rows {
        let values: Vec<String> = columns
            .iter()
            .zip(&widths)
            .map(|(name, &width)| {
                let text = row.get(name).map(|v| v.to_string()).unwrap_or_default();
                format!("{:width$}", text)
            })
            .collect();
        println!("{}", values.join(" | "));
    }

    println!("({} rows)", result.row_count());
}

fn print_csv(result: &QueryResult) {
    let columns = result.column_names();
    let header: Vec<String> = columns.iter().map(|name| csv_field(name)).collect();
    println!("{}", header.join(","));

    for row in &result.rows {
        let fields: Vec<String> = columns
            .iter()
            .map(|name| {
                row.get(name)
                    .map(|v| csv_field(&v.to_string()))
                    .unwrap_or_default()
            })
            .collect();
        println!("{}", fields.join(","));
    }
}

fn csv_field(text: &str) -> String {
    if text.contains(',') || text.contains('"') || text.contains('\n') {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

fn print_json(result: &QueryResult) {
    let rows: Vec<serde_json::Value> = result
        .rows
        .iter()
        .map(|row| {
            let mut object = serde_json::Map::new();
            for (name, value) in row.iter() {
                object.insert(name.to_string(), value.to_json());
            }
            serde_json::Value::Object(object)
        })
        .collect();
    println!("{}", serde_json::Value::Array(rows));
}
