//! Tab-delimited trait tables.
//!
//! ```text
//! #OTU_IDs    K00001  K00002
//! A           1       0
//! B           NA      3
//! ```
//!
//! The first line is always the header. Cells reading `NA`, `NaN`, `?` or
//! nothing are missing values.

use crate::libs::error::{Result, TraitError};
use indexmap::IndexMap;
use itertools::Itertools;
use std::collections::HashSet;
use std::io::{BufRead, Write};

/// One row of a trait table. `None` marks an unknown value, which is not the same as 0.
pub type TraitVector = Vec<Option<f64>>;

const MISSING: [&str; 5] = ["", "NA", "NaN", "nan", "?"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraitTable {
    /// Id column name followed by trait names
    header: Vec<String>,
    rows: IndexMap<String, TraitVector>,
}

impl TraitTable {
    /// An empty table; `header` includes the id column.
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: IndexMap::new(),
        }
    }

    /// An empty table sharing this table's header.
    pub fn empty_like(&self) -> Self {
        Self::new(self.header.clone())
    }

    pub fn from_file(infile: &str) -> anyhow::Result<Self> {
        let reader = intspan::reader(infile);
        let mut text = String::new();
        for line in reader.lines() {
            text.push_str(&line?);
            text.push('\n');
        }
        Ok(Self::parse(&text)?)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().enumerate();

        let header: Vec<String> = match lines.next() {
            Some((_, line)) => line.split('\t').map(|s| s.trim().to_string()).collect(),
            None => {
                return Err(TraitError::Table {
                    line: 1,
                    message: "missing header".to_string(),
                })
            }
        };
        if header.len() < 2 {
            return Err(TraitError::Table {
                line: 1,
                message: "header needs an id column and at least one trait".to_string(),
            });
        }

        let mut table = Self::new(header);
        for (idx, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let line_no = idx + 1;
            let mut fields = line.split('\t');
            let id = fields.next().unwrap_or_default().trim().to_string();
            let values = fields
                .map(|f| parse_value(f).ok_or_else(|| f.to_string()))
                .collect::<std::result::Result<TraitVector, String>>()
                .map_err(|bad| TraitError::Table {
                    line: line_no,
                    message: format!("invalid value '{}'", bad),
                })?;

            if table.rows.contains_key(&id) {
                return Err(TraitError::Table {
                    line: line_no,
                    message: format!("duplicated id '{}'", id),
                });
            }
            table.insert(id, values).map_err(|e| TraitError::Table {
                line: line_no,
                message: e.to_string(),
            })?;
        }

        Ok(table)
    }

    /// Insert or replace a row; its length must match the header.
    pub fn insert(&mut self, id: impl Into<String>, values: TraitVector) -> Result<()> {
        if values.len() != self.arity() {
            return Err(TraitError::ArityMismatch(values.len(), self.arity()));
        }
        self.rows.insert(id.into(), values);
        Ok(())
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn trait_names(&self) -> &[String] {
        &self.header[1..]
    }

    /// Number of trait columns
    pub fn arity(&self) -> usize {
        self.header.len().saturating_sub(1)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TraitVector> {
        self.rows.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rows.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.rows.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TraitVector)> {
        self.rows.iter()
    }

    /// Values of one trait across all rows, in row order
    pub fn column(&self, name: &str) -> Option<TraitVector> {
        let idx = self.trait_names().iter().position(|n| n == name)?;
        Some(self.rows.values().map(|v| v[idx]).collect())
    }

    /// Rows whose id is in `ids`, in this table's order.
    pub fn filter_ids(&self, ids: &HashSet<String>) -> Self {
        let mut table = self.empty_like();
        table.rows = self
            .rows
            .iter()
            .filter(|(id, _)| ids.contains(*id))
            .map(|(id, v)| (id.clone(), v.clone()))
            .collect();
        table
    }

    /// A one-row table holding `id` only.
    pub fn single_row(&self, id: &str) -> Option<Self> {
        let values = self.rows.get(id)?;
        let mut table = self.empty_like();
        table.rows.insert(id.to_string(), values.clone());
        Some(table)
    }

    pub fn to_tsv(&self) -> String {
        let mut s = self.header.join("\t");
        s.push('\n');
        for (id, values) in &self.rows {
            s.push_str(&format!(
                "{}\t{}\n",
                id,
                values.iter().map(|v| format_value(*v)).join("\t")
            ));
        }
        s
    }

    pub fn write(&self, outfile: &str) -> anyhow::Result<()> {
        let mut writer = intspan::writer(outfile);
        writer.write_all(self.to_tsv().as_ref())?;
        Ok(())
    }
}

fn parse_value(field: &str) -> Option<Option<f64>> {
    let field = field.trim();
    if MISSING.contains(&field) {
        return Some(None);
    }
    field.parse::<f64>().ok().map(Some)
}

pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}", v),
        None => "NA".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "#OTU_IDs\tK1\tK2\nA\t1\t0\nB\tNA\t3\n\nC\t2.5\t\n";

    #[test]
    fn test_parse_table() {
        let table = TraitTable::parse(TABLE).unwrap();
        assert_eq!(table.header(), &["#OTU_IDs", "K1", "K2"]);
        assert_eq!(table.arity(), 2);
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("A"), Some(&vec![Some(1.0), Some(0.0)]));
        assert_eq!(table.get("B"), Some(&vec![None, Some(3.0)]));
        assert_eq!(table.get("C"), Some(&vec![Some(2.5), None]));
        assert_eq!(table.ids().collect::<Vec<_>>(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_parse_errors() {
        let res = TraitTable::parse("id\tK1\tK2\nA\t1\n");
        assert!(matches!(res, Err(TraitError::Table { line: 2, .. })));

        let res = TraitTable::parse("id\tK1\nA\tone\n");
        assert!(matches!(res, Err(TraitError::Table { line: 2, .. })));

        let res = TraitTable::parse("id\tK1\nA\t1\nA\t2\n");
        assert!(matches!(res, Err(TraitError::Table { line: 3, .. })));

        assert!(TraitTable::parse("").is_err());
    }

    #[test]
    fn test_column() {
        let table = TraitTable::parse(TABLE).unwrap();
        assert_eq!(table.column("K2"), Some(vec![Some(0.0), Some(3.0), None]));
        assert_eq!(table.column("#OTU_IDs"), None);
        assert_eq!(table.column("K9"), None);
    }

    #[test]
    fn test_filter_and_single_row() {
        let table = TraitTable::parse(TABLE).unwrap();
        let keep: HashSet<String> = ["C", "A", "Z"].iter().map(|s| s.to_string()).collect();

        let filtered = table.filter_ids(&keep);
        assert_eq!(filtered.ids().collect::<Vec<_>>(), vec!["A", "C"]);
        assert_eq!(filtered.header(), table.header());

        let single = table.single_row("B").unwrap();
        assert_eq!(single.len(), 1);
        assert!(table.single_row("Z").is_none());
    }

    #[test]
    fn test_insert_arity() {
        let mut table = TraitTable::new(vec!["id".into(), "K1".into()]);
        assert!(table.insert("A", vec![Some(1.0)]).is_ok());
        assert_eq!(
            table.insert("B", vec![Some(1.0), None]),
            Err(TraitError::ArityMismatch(2, 1))
        );
    }

    #[test]
    fn test_to_tsv() {
        let table = TraitTable::parse(TABLE).unwrap();
        assert_eq!(
            table.to_tsv(),
            "#OTU_IDs\tK1\tK2\nA\t1\t0\nB\tNA\t3\nC\t2.5\tNA\n"
        );
    }
}
