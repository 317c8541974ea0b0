//! CSV intake for catalog uploads
//!
//! Turns an uploaded byte buffer into [`RawImportRow`]s. Only the
//! allow-listed columns are read; every other column is dropped here so no
//! later stage can observe it.

use super::types::RawImportRow;

/// Columns a supplier may provide, matched after trim + ASCII lowercase
pub const ALLOWED_COLUMNS: [&str; 6] = [
    "barcode",
    "supplier_sku",
    "supply_price",
    "stock_qty",
    "distribution_type",
    "description",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Size limits checked before and during parsing
#[derive(Debug, Clone, Copy)]
pub struct CsvLimits {
    pub max_rows: usize,
    pub max_file_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CsvInputError {
    #[error("CSV could not be parsed: {0}")]
    Parse(String),

    #[error("CSV contains no data rows")]
    Empty,

    #[error("CSV is {size} bytes, the limit is {limit} bytes")]
    TooManyBytes { size: usize, limit: usize },

    #[error("CSV has more than {limit} data rows")]
    TooManyRows { limit: usize },
}

/// One data record and where it sits in the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    /// Line the record starts on, counting the line after the header as 1.
    /// Blank lines are skipped but still counted.
    pub row_number: i32,
    pub raw: RawImportRow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Barcode,
    SupplierSku,
    SupplyPrice,
    StockQty,
    DistributionType,
    Description,
}

impl Column {
    fn from_header(header: &str) -> Option<Self> {
        match header.trim().to_ascii_lowercase().as_str() {
            "barcode" => Some(Column::Barcode),
            "supplier_sku" => Some(Column::SupplierSku),
            "supply_price" => Some(Column::SupplyPrice),
            "stock_qty" => Some(Column::StockQty),
            "distribution_type" => Some(Column::DistributionType),
            "description" => Some(Column::Description),
            _ => None,
        }
    }

    fn slot<'a>(&self, row: &'a mut RawImportRow) -> &'a mut Option<String> {
        match self {
            Column::Barcode => &mut row.barcode,
            Column::SupplierSku => &mut row.supplier_sku,
            Column::SupplyPrice => &mut row.supply_price,
            Column::StockQty => &mut row.stock_qty,
            Column::DistributionType => &mut row.distribution_type,
            Column::Description => &mut row.description,
        }
    }
}

/// Line a record starts on, given the reader position just before it.
/// The reader steps over blank lines without moving that position.
fn start_line(text: &str, byte: u64, line: u64) -> u64 {
    let skipped = text
        .as_bytes()
        .get(byte as usize..)
        .unwrap_or(&[])
        .iter()
        .take_while(|b| matches!(b, b'\n' | b'\r'))
        .filter(|b| **b == b'\n')
        .count();
    line + skipped as u64
}

/// Parses an uploaded catalog file into allow-listed rows in file order
///
/// Ragged rows are accepted: missing trailing cells stay `None`. When a
/// header appears twice, the first column wins.
pub fn parse_catalog_csv(
    bytes: &[u8],
    limits: &CsvLimits,
) -> Result<Vec<ParsedRow>, CsvInputError> {
    if bytes.len() > limits.max_file_bytes {
        return Err(CsvInputError::TooManyBytes {
            size: bytes.len(),
            limit: limits.max_file_bytes,
        });
    }

    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let text = std::str::from_utf8(bytes)
        .map_err(|e| CsvInputError::Parse(format!("file is not valid UTF-8: {}", e)))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| CsvInputError::Parse(e.to_string()))?
        .clone();

    let mut columns: Vec<Option<Column>> = Vec::with_capacity(headers.len());
    for header in headers.iter() {
        let column = Column::from_header(header).filter(|c| !columns.contains(&Some(*c)));
        columns.push(column);
    }

    let ignored = columns.iter().filter(|c| c.is_none()).count();
    if ignored > 0 {
        tracing::debug!(ignored, "Dropping columns outside the allow-list");
    }

    let header_line = start_line(text, 0, 1);
    let mut rows: Vec<ParsedRow> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| CsvInputError::Parse(e.to_string()))?;

        if rows.len() == limits.max_rows {
            return Err(CsvInputError::TooManyRows {
                limit: limits.max_rows,
            });
        }

        // lone CR terminators never advance the line count
        let previous = rows.last().map_or(0, |r| r.row_number);
        let row_number = match record.position() {
            Some(position) => {
                let line = start_line(text, position.byte(), position.line());
                i32::try_from(line.saturating_sub(header_line))
                    .map_err(|_| CsvInputError::Parse(format!("line {} is out of range", line)))?
                    .max(previous + 1)
            },
            None => previous + 1,
        };

        let mut raw = RawImportRow::default();
        for (column, value) in columns.iter().zip(record.iter()) {
            if let Some(column) = column {
                *column.slot(&mut raw) = Some(value.to_string());
            }
        }
        rows.push(ParsedRow { row_number, raw });
    }

    if rows.is_empty() {
        return Err(CsvInputError::Empty);
    }

    Ok(rows)
}
