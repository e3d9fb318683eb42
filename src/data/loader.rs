use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, ArrayRef, Float32Array, Float64Array, Int32Array, Int64Array, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use regex::Regex;

use super::model::{Column, Table};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a numeric table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row with column names; non-numeric columns are skipped
/// * `.npy`     – 2-D NumPy array, columns named `col1..colK`
/// * `.parquet` – numeric primitive columns
pub fn load_file(path: &Path) -> Result<Table> {
    load_file_with_names(path, None)
}

/// Like [`load_file`], but renames the loaded columns when `names` is given.
pub fn load_file_with_names(path: &Path, names: Option<&[String]>) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let (columns, data) = match ext.as_str() {
        "csv" => load_csv(path)?,
        "npy" => load_npy(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    let mut table = Table::from_float_columns(columns, data)
        .with_context(|| format!("building table from {}", path.display()))?;
    if let Some(names) = names {
        table = table
            .renamed(names)
            .with_context(|| format!("renaming the columns of {}", path.display()))?;
    }
    log::info!("Loaded {} from {}", table, path.display());
    Ok(table)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one sample per row.
/// Columns where any non-empty cell fails to parse as a number are dropped;
/// empty cells become NaN.
fn load_csv(path: &Path) -> Result<(Vec<String>, Vec<Vec<f64>>)> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut data: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    let mut numeric = vec![true; headers.len()];

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        for (col_idx, cell) in record.iter().enumerate().take(headers.len()) {
            let cell = cell.trim();
            if cell.is_empty() {
                data[col_idx].push(f64::NAN);
                continue;
            }
            match cell.parse::<f64>() {
                Ok(v) => data[col_idx].push(v),
                Err(_) => {
                    numeric[col_idx] = false;
                    data[col_idx].push(f64::NAN);
                }
            }
        }
    }

    let mut names = Vec::new();
    let mut columns = Vec::new();
    for ((name, col), keep) in headers.into_iter().zip(data).zip(numeric) {
        if keep {
            names.push(name);
            columns.push(col);
        } else {
            log::warn!("Skipping non-numeric CSV column '{name}'");
        }
    }
    Ok((names, columns))
}

// ---------------------------------------------------------------------------
// NPY loader
// ---------------------------------------------------------------------------

const NPY_MAGIC: &[u8] = b"\x93NUMPY";

/// Element types we know how to decode (always little-endian).
#[derive(Debug, Clone, Copy, PartialEq)]
enum NpyDtype {
    F8,
    F4,
    I8,
    I4,
}

impl NpyDtype {
    fn parse(descr: &str) -> Result<Self> {
        match descr {
            "<f8" => Ok(NpyDtype::F8),
            "<f4" => Ok(NpyDtype::F4),
            "<i8" => Ok(NpyDtype::I8),
            "<i4" => Ok(NpyDtype::I4),
            other => bail!("Unsupported .npy dtype '{other}'"),
        }
    }

    fn size(self) -> usize {
        match self {
            NpyDtype::F8 | NpyDtype::I8 => 8,
            NpyDtype::F4 | NpyDtype::I4 => 4,
        }
    }

    fn decode(self, b: &[u8]) -> f64 {
        match self {
            NpyDtype::F8 => f64::from_le_bytes(b[..8].try_into().unwrap_or([0; 8])),
            NpyDtype::F4 => f32::from_le_bytes(b[..4].try_into().unwrap_or([0; 4])) as f64,
            NpyDtype::I8 => i64::from_le_bytes(b[..8].try_into().unwrap_or([0; 8])) as f64,
            NpyDtype::I4 => i32::from_le_bytes(b[..4].try_into().unwrap_or([0; 4])) as f64,
        }
    }
}

/// Parsed `.npy` header dictionary.
#[derive(Debug, PartialEq)]
struct NpyHeader {
    dtype: NpyDtype,
    fortran_order: bool,
    rows: usize,
    cols: usize,
}

fn parse_npy_header(header: &str) -> Result<NpyHeader> {
    let descr_re = Regex::new(r"'descr'\s*:\s*'([^']+)'")?;
    let order_re = Regex::new(r"'fortran_order'\s*:\s*(True|False)")?;
    let shape_re = Regex::new(r"'shape'\s*:\s*\(([^)]*)\)")?;

    let descr = descr_re
        .captures(header)
        .and_then(|c| c.get(1))
        .context(".npy header has no 'descr'")?
        .as_str();
    let fortran_order = order_re
        .captures(header)
        .and_then(|c| c.get(1))
        .is_some_and(|m| m.as_str() == "True");
    let shape_txt = shape_re
        .captures(header)
        .and_then(|c| c.get(1))
        .context(".npy header has no 'shape'")?
        .as_str();

    let dims: Vec<usize> = shape_txt
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().with_context(|| format!("bad .npy dimension '{s}'")))
        .collect::<Result<_>>()?;

    let (rows, cols) = match dims.as_slice() {
        [n] => (*n, 1),
        [n, k] => (*n, *k),
        other => bail!(".npy array must be 1-D or 2-D, got shape {other:?}"),
    };

    Ok(NpyHeader {
        dtype: NpyDtype::parse(descr)?,
        fortran_order,
        rows,
        cols,
    })
}

fn parse_npy(bytes: &[u8]) -> Result<(Vec<String>, Vec<Vec<f64>>)> {
    if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
        bail!("not a .npy file (bad magic)");
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                bail!("truncated .npy header");
            }
            (u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize, 12)
        }
        v => bail!("unsupported .npy format version {v}"),
    };
    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        bail!("truncated .npy header");
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start]).context(".npy header is not UTF-8")?;
    let h = parse_npy_header(header)?;

    let size = h.dtype.size();
    let payload = &bytes[data_start..];
    if h.rows == 0 || h.cols == 0 {
        bail!(".npy array is empty (shape {} x {})", h.rows, h.cols);
    }
    let expected = h
        .rows
        .checked_mul(h.cols)
        .and_then(|e| e.checked_mul(size))
        .with_context(|| format!(".npy shape {} x {} is too large", h.rows, h.cols))?;
    if payload.len() < expected {
        bail!(".npy payload has {} bytes, expected {expected}", payload.len());
    }

    let mut columns = vec![Vec::with_capacity(h.rows); h.cols];
    for (c, column) in columns.iter_mut().enumerate() {
        for r in 0..h.rows {
            let flat = if h.fortran_order { c * h.rows + r } else { r * h.cols + c };
            column.push(h.dtype.decode(&payload[flat * size..(flat + 1) * size]));
        }
    }
    let names = (1..=h.cols).map(|i| format!("col{i}")).collect();
    Ok((names, columns))
}

fn load_npy(path: &Path) -> Result<(Vec<String>, Vec<Vec<f64>>)> {
    let bytes = std::fs::read(path).context("reading .npy file")?;
    parse_npy(&bytes)
}

// ---------------------------------------------------------------------------
// Parquet loader / writer
// ---------------------------------------------------------------------------

/// Load every numeric primitive column of a Parquet file.
fn load_parquet(path: &Path) -> Result<(Vec<String>, Vec<Vec<f64>>)> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;

    let schema = builder.schema().clone();
    let keep: Vec<(usize, String)> = schema
        .fields()
        .iter()
        .enumerate()
        .filter_map(|(i, f)| {
            if is_numeric(f.data_type()) {
                Some((i, f.name().clone()))
            } else {
                log::warn!("Skipping non-numeric parquet column '{}' ({:?})", f.name(), f.data_type());
                None
            }
        })
        .collect();

    let reader = builder.build().context("building parquet reader")?;
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); keep.len()];

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (slot, (col_idx, name)) in keep.iter().enumerate() {
            extend_f64(&mut columns[slot], batch.column(*col_idx))
                .with_context(|| format!("reading column '{name}'"))?;
        }
    }

    Ok((keep.into_iter().map(|(_, n)| n).collect(), columns))
}

fn is_numeric(dt: &DataType) -> bool {
    matches!(
        dt,
        DataType::Float64 | DataType::Float32 | DataType::Int64 | DataType::Int32 | DataType::UInt64
    )
}

/// Append one Arrow column's values, nulls becoming NaN.
fn extend_f64(out: &mut Vec<f64>, col: &ArrayRef) -> Result<()> {
    macro_rules! push_all {
        ($ty:ty) => {{
            let arr = col
                .as_any()
                .downcast_ref::<$ty>()
                .context(concat!("expected ", stringify!($ty)))?;
            out.extend(arr.iter().map(|v| v.map_or(f64::NAN, |x| x as f64)));
        }};
    }
    match col.data_type() {
        DataType::Float64 => push_all!(Float64Array),
        DataType::Float32 => push_all!(Float32Array),
        DataType::Int64 => push_all!(Int64Array),
        DataType::Int32 => push_all!(Int32Array),
        DataType::UInt64 => push_all!(UInt64Array),
        other => bail!("unsupported column type {other:?}"),
    }
    Ok(())
}

/// Write a table to Parquet. Index columns are stored as UInt64.
pub fn save_parquet(table: &Table, path: &Path) -> Result<()> {
    let mut fields = Vec::with_capacity(table.n_columns());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.n_columns());

    for (i, name) in table.column_names().iter().enumerate() {
        match table.column_at(i) {
            Column::Float(v) => {
                fields.push(Field::new(name, DataType::Float64, false));
                arrays.push(Arc::new(Float64Array::from(v.clone())));
            }
            Column::Index(v) => {
                fields.push(Field::new(name, DataType::UInt64, false));
                arrays.push(Arc::new(UInt64Array::from(
                    v.iter().map(|&x| x as u64).collect::<Vec<_>>(),
                )));
            }
        }
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;

    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;

    log::info!("Wrote {} to {}", table, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn npy_bytes(header: &str, payload: &[u8]) -> Vec<u8> {
        let mut out = NPY_MAGIC.to_vec();
        out.extend_from_slice(&[1, 0]);
        out.extend_from_slice(&(header.len() as u16).to_le_bytes());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn npy_c_order_f8() {
        let payload: Vec<u8> = [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let bytes = npy_bytes(
            "{'descr': '<f8', 'fortran_order': False, 'shape': (3, 2), }\n",
            &payload,
        );
        let (names, cols) = parse_npy(&bytes).unwrap();
        assert_eq!(names, vec!["col1", "col2"]);
        assert_eq!(cols[0], vec![1.0, 3.0, 5.0]);
        assert_eq!(cols[1], vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn npy_fortran_order_i4() {
        let payload: Vec<u8> = [1i32, 2, 3, 4].iter().flat_map(|v| v.to_le_bytes()).collect();
        let bytes = npy_bytes(
            "{'descr': '<i4', 'fortran_order': True, 'shape': (2, 2), }\n",
            &payload,
        );
        let (_, cols) = parse_npy(&bytes).unwrap();
        assert_eq!(cols[0], vec![1.0, 2.0]);
        assert_eq!(cols[1], vec![3.0, 4.0]);
    }

    #[test]
    fn npy_rejects_big_endian() {
        let bytes = npy_bytes("{'descr': '>f8', 'fortran_order': False, 'shape': (1, 1), }\n", &[0; 8]);
        assert!(parse_npy(&bytes).is_err());
    }

    #[test]
    fn npy_rejects_oversized_and_empty_shapes() {
        let huge = npy_bytes(
            "{'descr': '<f8', 'fortran_order': False, 'shape': (4611686018427387904, 8), }\n",
            &[0; 64],
        );
        let err = parse_npy(&huge).unwrap_err();
        assert!(err.to_string().contains("too large"));

        let short = npy_bytes("{'descr': '<f8', 'fortran_order': False, 'shape': (1000, 3), }\n", &[0; 64]);
        assert!(parse_npy(&short).unwrap_err().to_string().contains("payload"));

        let wide_empty = npy_bytes(
            "{'descr': '<f8', 'fortran_order': False, 'shape': (0, 4611686018427387904), }\n",
            &[],
        );
        assert!(parse_npy(&wide_empty).is_err());
    }

    #[test]
    fn csv_skips_text_columns() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "x,name,vx").unwrap();
        writeln!(file, "1.0,alpha,0.5").unwrap();
        writeln!(file, "2.0,beta,").unwrap();
        file.flush().unwrap();

        let table = load_file(file.path()).unwrap();
        assert_eq!(table.column_names(), &["x".to_string(), "vx".to_string()][..]);
        assert_eq!(table.n_rows(), 2);
        assert!(table.column("vx").unwrap().value(1).is_nan());
    }

    #[test]
    fn rename_must_match_width() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "a,b\n1,2").unwrap();
        file.flush().unwrap();
        let names = vec!["only".to_string()];
        assert!(load_file_with_names(file.path(), Some(&names)).is_err());
    }

    #[test]
    fn parquet_round_trip_keeps_index_columns() {
        let table = Table::new(
            vec!["x".into(), "input order".into()],
            vec![Column::Float(vec![0.5, 1.5]), Column::Index(vec![0, 1])],
        )
        .unwrap();
        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        save_parquet(&table, file.path()).unwrap();

        let back = load_file(file.path()).unwrap();
        assert_eq!(back.n_rows(), 2);
        assert_eq!(back.column("input order").unwrap().value(1), 1.0);
        assert_eq!(back.column("x").unwrap().value(0), 0.5);
    }

    #[test]
    fn unknown_extension_fails() {
        assert!(load_file(Path::new("data.fits")).is_err());
    }
}
