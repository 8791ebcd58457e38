use std::path::{Path, PathBuf};

use super::block::KeywordBlock;
use crate::engine::error::ModelError;

/// Reads `(energy, value)` pairs from a headerless CSV stream.
///
/// Fields are trimmed and lines starting with `#` are skipped.
pub fn read_csv_pairs(path: &Path) -> Result<Vec<(f64, f64)>, ModelError> {
    let display = path.to_string_lossy().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| ModelError::Csv {
            path: display.clone(),
            source: e,
        })?;

    reader
        .deserialize::<(f64, f64)>()
        .map(|record| {
            record.map_err(|e| ModelError::Csv {
                path: display.clone(),
                source: e,
            })
        })
        .collect()
}

/// Resolves the companion table of a block: exactly one of the inline `table`
/// or the `table-file` stream must be present.
pub fn companion_table(
    block: &KeywordBlock,
    inline: Option<Vec<(f64, f64)>>,
    file: Option<PathBuf>,
) -> Result<(Vec<f64>, Vec<f64>), ModelError> {
    let pairs = match (inline, file) {
        (Some(_), Some(_)) => {
            return Err(ModelError::input(
                block.path(),
                "'table' and 'table-file' are mutually exclusive",
            ));
        }
        (Some(pairs), None) => pairs,
        (None, Some(file)) => read_csv_pairs(&block.resolve(&file))?,
        (None, None) => {
            return Err(ModelError::MissingKeyword {
                block: block.path().to_string(),
                keyword: "table",
            });
        }
    };
    if pairs.len() < 2 {
        return Err(ModelError::input(
            block.path(),
            format!("a table needs at least two rows, got {}", pairs.len()),
        ));
    }
    Ok(pairs.into_iter().unzip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::block::block_from_str;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn reads_commented_trimmed_csv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# energy, number").unwrap();
        writeln!(file, " 0.0 , 1.0").unwrap();
        writeln!(file, "10.0,  4.5").unwrap();
        let pairs = read_csv_pairs(file.path()).unwrap();
        assert_eq!(pairs, vec![(0.0, 1.0), (10.0, 4.5)]);
    }

    #[test]
    fn malformed_csv_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1.0,abc").unwrap();
        let err = read_csv_pairs(file.path()).unwrap_err();
        assert!(matches!(err, ModelError::Csv { .. }));
    }

    #[test]
    fn inline_table_is_split_into_columns() {
        let block = block_from_str("core", "");
        let (x, y) =
            companion_table(&block, Some(vec![(1.0, 2.0), (3.0, 4.0)]), None).unwrap();
        assert_eq!(x, vec![1.0, 3.0]);
        assert_eq!(y, vec![2.0, 4.0]);
    }

    #[test]
    fn both_sources_are_rejected() {
        let block = block_from_str("core", "");
        let result = companion_table(
            &block,
            Some(vec![(1.0, 2.0), (3.0, 4.0)]),
            Some(PathBuf::from("x.csv")),
        );
        assert!(matches!(result, Err(ModelError::Input { .. })));
    }

    #[test]
    fn missing_table_is_reported() {
        let block = block_from_str("core", "");
        let result = companion_table(&block, None, None);
        assert!(matches!(result, Err(ModelError::MissingKeyword { keyword: "table", .. })));
    }
}
