#![allow(dead_code)]

use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Sales sample: six rows over three categories.
pub fn sales_df() -> DataFrame {
    df!(
        "Unnamed: 0" => &[0i64, 1, 2, 3, 4, 5],
        "Category" => &["Books", "Games", "Books", "Music", "Games", "Books"],
        "Region" => &["North", "South", "South", "North", "North", "North"],
        "Amount" => &[12.5, 30.0, 7.5, 3.0, 20.0, 10.0],
        "Qty" => &[1i64, 3, 1, 2, 2, 4],
        "Date" => &[
            "2023-01-05",
            "2023-01-09",
            "2023-02-01",
            "2023-02-14",
            "2023-03-03",
            "2023-03-30"
        ]
    )
    .unwrap()
}

pub fn write_csv(dir: &Path, name: &str, df: &mut DataFrame) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();
    path
}

/// Temp directory holding `sales.csv` and `inventory.csv`.
pub fn data_dir() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    write_csv(dir.path(), "sales.csv", &mut sales_df());
    let mut inventory = df!(
        "Item" => &["pen", "ink", "pad"],
        "Stock" => &[40i64, 12, 7]
    )
    .unwrap();
    write_csv(dir.path(), "inventory.csv", &mut inventory);
    std::fs::write(dir.path().join("notes.txt"), "not a dataset").unwrap();
    dir
}

pub fn strings(df: &DataFrame, name: &str) -> Vec<String> {
    df.column(name)
        .unwrap()
        .cast(&DataType::String)
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect()
}

pub fn floats(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    df.column(name)
        .unwrap()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .collect()
}

pub fn names(df: &DataFrame) -> Vec<String> {
    df.schema().iter_names().map(|s| s.to_string()).collect()
}
