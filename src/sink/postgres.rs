/// PostgreSQL result tables
///
/// Each publish drops and recreates the table from its static schema and
/// inserts every row, all inside one transaction: the website sees either
/// the previous table or the complete new one.

use crate::error::SinkError;
use crate::schema::{CellValue, Column, ColumnType, TableData};
use crate::sink::ResultSink;
use postgres::types::ToSql;
use postgres::{Client, NoTls};

pub struct PostgresSink {
    client: Client,
}

impl PostgresSink {
    pub fn connect(database_url: &str) -> Result<Self, SinkError> {
        let client = Client::connect(database_url, NoTls)?;
        Ok(PostgresSink { client })
    }
}

impl ResultSink for PostgresSink {
    fn replace_table(&mut self, table: &TableData) -> Result<usize, SinkError> {
        table.validate()?;

        let mut tx = self.client.transaction()?;
        tx.batch_execute(&format!(
            "DROP TABLE IF EXISTS {};\n{};",
            quote_ident(&table.name),
            create_table_sql(table)
        ))?;

        if !table.rows.is_empty() {
            let statement = tx.prepare(&insert_sql(table))?;
            for row in &table.rows {
                let params: Vec<Box<dyn ToSql + Sync>> = row
                    .iter()
                    .zip(table.columns)
                    .map(|(cell, column)| cell_param(cell, column))
                    .collect();
                let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();
                tx.execute(&statement, &refs)?;
            }
        }

        tx.commit()?;
        Ok(table.rows.len())
    }
}

// ---------------------------------------------------------------------------
// SQL generation
// ---------------------------------------------------------------------------

/// Table names are mixed-case ("Disturb_Results"), so every identifier is
/// quoted.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn create_table_sql(table: &TableData) -> String {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            let null = if c.nullable { "" } else { " NOT NULL" };
            format!("{} {}{}", quote_ident(c.name), c.kind.sql_type(), null)
        })
        .collect();
    format!("CREATE TABLE {} ({})", quote_ident(&table.name), columns.join(", "))
}

pub fn insert_sql(table: &TableData) -> String {
    let names: Vec<String> = table.columns.iter().map(|c| quote_ident(c.name)).collect();
    let placeholders: Vec<String> = (1..=table.columns.len()).map(|i| format!("${}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(&table.name),
        names.join(", "),
        placeholders.join(", ")
    )
}

/// Typed parameter for a validated cell. Nulls are typed by their column so
/// the prepared statement accepts them.
fn cell_param(cell: &CellValue, column: &Column) -> Box<dyn ToSql + Sync> {
    match column.kind {
        ColumnType::Text => Box::new(match cell {
            CellValue::Text(s) => Some(s.clone()),
            _ => None,
        }),
        ColumnType::Integer => Box::new(match cell {
            CellValue::Integer(i) => Some(*i),
            _ => None,
        }),
        ColumnType::Double => Box::new(match cell {
            CellValue::Double(d) => Some(*d),
            _ => None,
        }),
    }
}
