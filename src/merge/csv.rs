// src/merge/csv.rs

use anyhow::{Context, Result};
use std::{
    ffi::OsString,
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::info;

use super::StatementTable;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

impl StatementTable {
    /// `Item,<period>,...` then one record per line item. Missing cells are
    /// empty fields.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = ::csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)
            .context("writing CSV header")?;
        for row in &self.rows {
            let mut record = Vec::with_capacity(self.columns.len());
            record.push(row.label.clone());
            record.extend(
                row.cells
                    .iter()
                    .map(|c| c.as_ref().map(ToString::to_string).unwrap_or_default()),
            );
            wtr.write_record(&record)
                .with_context(|| format!("writing CSV row {:?}", row.label))?;
        }
        wtr.flush().context("flushing CSV")?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).context("CSV output is not UTF-8")
    }

    /// Write to `path`, creating parent directories. With `bom` the file
    /// starts with a UTF-8 byte order mark so spreadsheet tools pick the
    /// right encoding. `path` only appears once the whole table is on disk.
    pub fn save_csv(&self, path: &Path, bom: bool) -> Result<()> {
        write_atomically(path, |out| {
            if bom {
                out.write_all(UTF8_BOM)?;
            }
            self.write_csv(out)
        })?;
        info!(
            path = %path.display(),
            rows = self.rows.len(),
            columns = self.columns.len(),
            "saved statement CSV"
        );
        Ok(())
    }
}

/// Sibling of `path` the content is staged in before the rename.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write to `<path>.tmp`, then rename over `path`. On any failure the
/// staging file is removed and `path` is left untouched.
fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let tmp = tmp_path(path);
    let staged = (|| -> Result<()> {
        let file =
            File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        let mut out = BufWriter::new(file);
        write(&mut out)?;
        out.flush()
            .with_context(|| format!("flushing {}", tmp.display()))?;
        Ok(())
    })();
    if let Err(e) = staged {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("renaming {} -> {}", tmp.display(), path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::CellValue;
    use crate::merge::StatementRow;
    use tempfile::tempdir;

    fn table() -> StatementTable {
        StatementTable {
            columns: vec!["Item".into(), "Mar '24".into(), "Mar '23".into()],
            rows: vec![
                StatementRow {
                    label: "EQUITIES AND LIABILITIES".into(),
                    cells: vec![None, None],
                },
                StatementRow {
                    label: "Reserves, Surplus".into(),
                    cells: vec![Some(CellValue::Number(1234.5)), None],
                },
                StatementRow {
                    label: "Contingent".into(),
                    cells: vec![Some(CellValue::Text("N/A".into())), Some(CellValue::Number(-2.0))],
                },
            ],
        }
    }

    #[test]
    fn renders_nulls_as_empty_fields() {
        let csv = table().to_csv_string().unwrap();
        assert_eq!(
            csv,
            "Item,Mar '24,Mar '23\n\
             EQUITIES AND LIABILITIES,,\n\
             \"Reserves, Surplus\",1234.5,\n\
             Contingent,N/A,-2\n"
        );
    }

    #[test]
    fn saved_file_has_bom_and_parents() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("RELIANCE").join("out.csv");
        table().save_csv(&path, true)?;
        let bytes = fs::read(&path)?;
        assert!(bytes.starts_with(UTF8_BOM));
        assert!(String::from_utf8(bytes[3..].to_vec())?.starts_with("Item,"));

        table().save_csv(&path, false)?;
        assert!(fs::read(&path)?.starts_with(b"Item,"));
        assert!(!tmp_path(&path).exists());
        Ok(())
    }

    #[test]
    fn failed_write_leaves_no_output() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("TCS").join("TCS_balance_VI_merged_financials.csv");
        let err = write_atomically(&path, |out| {
            out.write_all(b"Item,Mar '24\nSales,")?;
            out.flush()?;
            anyhow::bail!("connection dropped mid-table")
        })
        .unwrap_err();
        assert!(err.to_string().contains("mid-table"));
        assert!(!path.exists());
        assert!(!tmp_path(&path).exists());
        Ok(())
    }

    #[test]
    fn failed_rewrite_keeps_previous_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out.csv");
        table().save_csv(&path, false)?;
        let before = fs::read(&path)?;
        assert!(write_atomically(&path, |_| anyhow::bail!("boom")).is_err());
        assert_eq!(fs::read(&path)?, before);
        Ok(())
    }

    #[test]
    fn staging_file_sits_next_to_output() {
        assert_eq!(
            tmp_path(Path::new("out/RI/RI_balance_VI_merged_financials.csv")),
            Path::new("out/RI/RI_balance_VI_merged_financials.csv.tmp")
        );
    }
}
