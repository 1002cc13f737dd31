use std::fmt;

/// Column-aligned text table used for command output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &self.rows {
            for (i, value) in row.iter().enumerate() {
                let len = value.chars().count();
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(len),
                    None => widths.push(len),
                }
            }
        }
        widths
    }
}

fn write_line(f: &mut fmt::Formatter<'_>, cells: &[String], widths: &[usize]) -> fmt::Result {
    let line: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(i, width)| {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            format!("{:width$}", cell, width = width)
        })
        .collect();
    writeln!(f, "{}", line.join(" | ").trim_end())
}

impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() {
            return Ok(());
        }

        let widths = self.widths();
        write_line(f, &self.columns, &widths)?;

        let separator = widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-");
        writeln!(f, "{}", separator)?;

        for row in &self.rows {
            write_line(f, row, &widths)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_aligned() {
        let mut table = ResultTable::new(["Fact", "Value"]);
        table.push_row(["role", "webserver"]);
        table.push_row(["environment", "prod"]);

        let expected = "\
Fact        | Value
------------+----------
role        | webserver
environment | prod
";
        assert_eq!(table.to_string(), expected);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_header_only() {
        let table = ResultTable::new(["Errors"]);
        assert!(table.is_empty());
        assert_eq!(table.to_string(), "Errors\n------\n");
    }

    #[test]
    fn test_no_columns_renders_nothing() {
        let table = ResultTable::new(Vec::<String>::new());
        assert_eq!(table.to_string(), "");
    }
}
