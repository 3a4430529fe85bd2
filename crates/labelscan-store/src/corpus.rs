//! Load labelled corpora from CSV or Parquet.
//!
//! Both formats need a `text` and a `label` column; any other columns are
//! ignored. Parquet label columns may be strings or integers.

use std::path::Path;

use arrow::array::{Array, Int32Array, Int64Array, LargeStringArray, StringArray};
use arrow::record_batch::RecordBatch;
use labelscan_core::{Corpus, Sample};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::info;

use crate::StoreError;

const TEXT_COLUMN: &str = "text";
const LABEL_COLUMN: &str = "label";

/// Load a corpus, dispatching on the file extension (`csv`, `parquet`, `pq`).
pub fn load_corpus(path: &Path) -> Result<Corpus, StoreError> {
    if !path.exists() {
        return Err(StoreError::CorpusNotFound(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let samples = match ext.as_str() {
        "csv" => read_csv_samples(path)?,
        "parquet" | "pq" => read_parquet_samples(path)?,
        other => {
            return Err(StoreError::InvalidCorpus(format!(
                "unsupported corpus extension: .{other}"
            )));
        }
    };

    let corpus = Corpus::new(samples)?;
    info!(
        path = %path.display(),
        samples = corpus.len(),
        labels = corpus.label_counts().len(),
        "loaded corpus"
    );
    Ok(corpus)
}

// ── CSV ──

fn read_csv_samples(path: &Path) -> Result<Vec<Sample>, StoreError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let text_idx = column_position(headers.iter(), TEXT_COLUMN)?;
    let label_idx = column_position(headers.iter(), LABEL_COLUMN)?;

    let mut samples = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let text = record.get(text_idx).unwrap_or("");
        let label = record.get(label_idx).unwrap_or("").trim();
        if text.trim().is_empty() || label.is_empty() {
            return Err(StoreError::InvalidCorpus(format!(
                "CSV row {row}: empty text or label"
            )));
        }
        samples.push(Sample::new(text, label));
    }
    Ok(samples)
}

fn column_position<'a>(
    mut headers: impl Iterator<Item = &'a str>,
    name: &str,
) -> Result<usize, StoreError> {
    headers
        .position(|h| h.trim() == name)
        .ok_or_else(|| StoreError::InvalidCorpus(format!("missing '{name}' column")))
}

// ── Parquet ──

/// Read every record batch of a Parquet file.
fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
    let file = std::fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}

fn read_parquet_samples(path: &Path) -> Result<Vec<Sample>, StoreError> {
    let batches = read_parquet(path)?;
    let mut samples = Vec::new();
    let mut offset = 0;

    for batch in &batches {
        let text_col = batch
            .column_by_name(TEXT_COLUMN)
            .ok_or_else(|| StoreError::InvalidCorpus(format!("missing '{TEXT_COLUMN}' column")))?;
        let label_col = batch
            .column_by_name(LABEL_COLUMN)
            .ok_or_else(|| StoreError::InvalidCorpus(format!("missing '{LABEL_COLUMN}' column")))?;

        for row in 0..batch.num_rows() {
            let text = get_string(text_col.as_ref(), row);
            let label = get_string(label_col.as_ref(), row);
            match (text, label) {
                (Some(text), Some(label)) if !text.trim().is_empty() && !label.trim().is_empty() => {
                    samples.push(Sample::new(text, label.trim()));
                }
                _ => {
                    return Err(StoreError::InvalidCorpus(format!(
                        "Parquet row {}: null or empty text or label",
                        offset + row
                    )));
                }
            }
        }
        offset += batch.num_rows();
    }
    Ok(samples)
}

/// Cell as a string: Utf8, LargeUtf8, or an integer rendered in decimal.
fn get_string(col: &dyn Array, row: usize) -> Option<String> {
    if col.is_null(row) {
        return None;
    }
    let any = col.as_any();
    if let Some(arr) = any.downcast_ref::<StringArray>() {
        return Some(arr.value(row).to_string());
    }
    if let Some(arr) = any.downcast_ref::<LargeStringArray>() {
        return Some(arr.value(row).to_string());
    }
    if let Some(arr) = any.downcast_ref::<Int64Array>() {
        return Some(arr.value(row).to_string());
    }
    if let Some(arr) = any.downcast_ref::<Int32Array>() {
        return Some(arr.value(row).to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::datatypes::{DataType, Field, Schema};
    use parquet::arrow::ArrowWriter;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn write_parquet(dir: &TempDir, name: &str, batch: RecordBatch) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        path
    }

    #[test]
    fn loads_csv_with_extra_columns() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "corpus.csv",
            "id,text,label\n1,\"contains milk, wheat\",unsafe\n2,no allergens present,safe\n",
        );
        let corpus = load_corpus(&path).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.samples()[0], Sample::new("contains milk, wheat", "unsafe"));
        assert_eq!(corpus.labels(), vec!["unsafe", "safe"]);
    }

    #[test]
    fn csv_missing_label_column() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "corpus.csv", "text,category\nmilk,unsafe\n");
        let err = load_corpus(&path).unwrap_err();
        assert!(matches!(err, StoreError::InvalidCorpus(msg) if msg.contains("label")));
    }

    #[test]
    fn csv_header_only_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "corpus.csv", "text,label\n");
        assert!(matches!(
            load_corpus(&path),
            Err(StoreError::InvalidCorpus(_))
        ));
    }

    #[test]
    fn csv_blank_text_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "corpus.csv", "text,label\nmilk,unsafe\n  ,safe\n");
        assert!(matches!(
            load_corpus(&path),
            Err(StoreError::InvalidCorpus(msg)) if msg.contains("row 1")
        ));
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            load_corpus(Path::new("/nonexistent/corpus.csv")),
            Err(StoreError::CorpusNotFound(_))
        ));
    }

    #[test]
    fn unsupported_extension() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "corpus.xlsx", "");
        assert!(matches!(
            load_corpus(&path),
            Err(StoreError::InvalidCorpus(msg)) if msg.contains(".xlsx")
        ));
    }

    #[test]
    fn loads_parquet_with_integer_labels() {
        let tmp = TempDir::new().unwrap();
        let schema = Schema::new(vec![
            Field::new("text", DataType::Utf8, true),
            Field::new("label", DataType::Int64, true),
        ]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec!["contains milk", "plain rice"])),
                Arc::new(Int64Array::from(vec![1, 0])),
            ],
        )
        .unwrap();
        let path = write_parquet(&tmp, "corpus.parquet", batch);

        let corpus = load_corpus(&path).unwrap();
        assert_eq!(corpus.labels(), vec!["1", "0"]);
        assert_eq!(corpus.texts(), vec!["contains milk", "plain rice"]);
    }

    #[test]
    fn parquet_null_text_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let schema = Schema::new(vec![
            Field::new("text", DataType::Utf8, true),
            Field::new("label", DataType::Utf8, true),
        ]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec![Some("milk"), None])),
                Arc::new(StringArray::from(vec!["unsafe", "safe"])),
            ],
        )
        .unwrap();
        let path = write_parquet(&tmp, "corpus.parquet", batch);
        assert!(matches!(
            load_corpus(&path),
            Err(StoreError::InvalidCorpus(msg)) if msg.contains("row 1")
        ));
    }

    #[test]
    fn parquet_missing_text_column() {
        let tmp = TempDir::new().unwrap();
        let schema = Schema::new(vec![Field::new("label", DataType::Utf8, true)]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(StringArray::from(vec!["unsafe"]))],
        )
        .unwrap();
        let path = write_parquet(&tmp, "corpus.pq", batch);
        assert!(matches!(
            load_corpus(&path),
            Err(StoreError::InvalidCorpus(msg)) if msg.contains("text")
        ));
    }
}
