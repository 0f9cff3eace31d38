//! Rust Excel Binary Workbook (`.xlsb`) reader
//!
//! This crate reads the MS-XLSB binary container format: a ZIP archive of
//! length-prefixed binary records. It exposes worksheets, cells, shared
//! strings and reconstructs formula text from the binary token stream.
//!
//! # Examples
//! ```no_run
//! use xlsb_reader::{open_workbook, Reader, Xlsb, Data};
//!
//! let mut workbook: Xlsb<_> = open_workbook("file.xlsb").unwrap();
//! if let Ok(range) = workbook.worksheet_range("Sheet1") {
//!     let total_cells = range.get_size().0 * range.get_size().1;
//!     let non_empty_cells = range.used_cells().count();
//!     println!("Found {total_cells} cells, including {non_empty_cells} non empty cells");
//! }
//! ```

#![deny(missing_docs)]

macro_rules! from_err {
    ($from:ty, $to:ty, $variant:ident) => {
        impl From<$from> for $to {
            fn from(e: $from) -> $to {
                <$to>::$variant(e)
            }
        }
    };
}

pub mod cfb;
pub mod datatype;
pub mod de;
pub mod formats;
pub mod functions;
pub mod utils;
pub mod vba;
pub mod xlsb;

use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use std::slice;
use std::str::FromStr;

pub use datatype::{Data, DataRef, DataType, ExcelDateTime, ExcelDateTimeType};
pub use de::{DeError, RangeDeserializer, RangeDeserializerBuilder, ToCellDeserializer};
pub use formats::CellFormat;
pub use vba::{Reference, VbaError, VbaProject};
pub use xlsb::{Xlsb, XlsbError};

/// An enum to represent all different Excel errors that can appear as a
/// value in a worksheet cell.
///
/// See MS-XLSB 2.5.97.7 `BErr` and the BIFF error-code table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellErrorType {
    /// Division by 0 error
    Div0,
    /// Unavailable value error
    NA,
    /// Invalid name error
    Name,
    /// Null value error
    Null,
    /// Number error
    Num,
    /// Invalid cell reference error
    Ref,
    /// Value error
    Value,
    /// Getting data (external data still loading)
    GettingData,
}

impl FromStr for CellErrorType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "#DIV/0!" => Ok(CellErrorType::Div0),
            "#N/A" => Ok(CellErrorType::NA),
            "#NAME?" => Ok(CellErrorType::Name),
            "#NULL!" => Ok(CellErrorType::Null),
            "#NUM!" => Ok(CellErrorType::Num),
            "#REF!" => Ok(CellErrorType::Ref),
            "#VALUE!" => Ok(CellErrorType::Value),
            "#GETTING_DATA" => Ok(CellErrorType::GettingData),
            _ => Err(format!("{s} is not a known excel error")),
        }
    }
}

impl fmt::Display for CellErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CellErrorType::Div0 => "#DIV/0!",
            CellErrorType::NA => "#N/A",
            CellErrorType::Name => "#NAME?",
            CellErrorType::Null => "#NULL!",
            CellErrorType::Num => "#NUM!",
            CellErrorType::Ref => "#REF!",
            CellErrorType::Value => "#VALUE!",
            CellErrorType::GettingData => "#GETTING_DATA",
        })
    }
}

/// A trait shared by the cell-value types a `Range` can hold (`Data`, owned,
/// and `DataRef`, borrowing shared strings from the workbook).
pub trait CellType: Clone + Default + PartialEq + fmt::Debug {}

impl CellType for Data {}
impl CellType for DataRef<'_> {}

/// A row/column position, how a sheet is classified and whether it should be
/// shown to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    /// Sheet name
    pub name: String,
    /// Sheet type
    pub typ: SheetType,
    /// Sheet visibility
    pub visible: SheetVisible,
}

/// The kind of part a sheet's binary data originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetType {
    /// A regular worksheet
    WorkSheet,
    /// A chartsheet
    ChartSheet,
    /// A dialogsheet (also used for macrosheets)
    DialogSheet,
}

/// Visibility of a sheet, as stored in its bundle entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetVisible {
    /// Visible
    Visible,
    /// Hidden, but can be unhidden through the UI
    Hidden,
    /// Hidden, and cannot be unhidden through the UI without a macro
    VeryHidden,
}

/// Which row of a sheet should be treated as the header row when building a
/// `Range` from the sparse cell stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderRow {
    /// The header is the row of the first non-empty cell (the default).
    FirstNonEmptyRow,
    /// The header is a specific, possibly empty, row index.
    Row(u32),
}

impl Default for HeaderRow {
    fn default() -> Self {
        HeaderRow::FirstNonEmptyRow
    }
}

/// Top-left/bottom-right bounds of a worksheet's used range, as advertised
/// by its dimension record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimensions {
    /// Top-left cell position (row, column)
    pub start: (u32, u32),
    /// Bottom-right cell position (row, column)
    pub end: (u32, u32),
}

impl Dimensions {
    /// Number of cells spanned by this range (rows * columns), saturating at 0
    /// if the range is inverted (an empty sheet).
    pub fn len(&self) -> u64 {
        if self.end.0 < self.start.0 || self.end.1 < self.start.1 {
            0
        } else {
            (self.end.0 - self.start.0 + 1) as u64 * (self.end.1 - self.start.1 + 1) as u64
        }
    }

    /// Whether this range spans no cells at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Workbook-level metadata gathered while reading the workbook part: the
/// sheet bundle and the defined-name table.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// Sheets, in bundle order
    pub sheets: Vec<Sheet>,
    /// Defined names: `(name, stringified formula)`
    pub names: Vec<(String, String)>,
}

/// A cell position paired with its decoded value.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell<T> {
    /// Position for the cell (row, column), 0-based
    pub pos: (u32, u32),
    /// Value for the cell
    pub val: T,
}

impl<T> Cell<T> {
    /// Creates a new `Cell`
    pub fn new(position: (u32, u32), value: T) -> Cell<T> {
        Cell {
            pos: position,
            val: value,
        }
    }

    /// Gets `Cell` position
    pub fn get_position(&self) -> (u32, u32) {
        self.pos
    }

    /// Gets `Cell` value
    pub fn get_value(&self) -> &T {
        &self.val
    }
}

/// A dense, possibly sparsely-populated rectangular selection of cells,
/// built from the coordinate-list of non-empty cells a worksheet iterator
/// yields.
#[derive(Debug, Default, Clone)]
pub struct Range<T> {
    start: (u32, u32),
    end: (u32, u32),
    inner: Vec<T>,
}

impl<T: CellType> Range<T> {
    /// Creates a new `Range` of empty cells
    pub fn new(start: (u32, u32), end: (u32, u32)) -> Range<T> {
        Range {
            start,
            end,
            inner: vec![T::default(); ((end.0 - start.0 + 1) * (end.1 - start.1 + 1)) as usize],
        }
    }

    /// Creates a `Range` from a coordinate-list (COO) sparse vector of
    /// `Cell`s, sorted by row. This is the natural shape cells are produced
    /// in by a worksheet iterator.
    pub fn from_sparse(cells: Vec<Cell<T>>) -> Range<T> {
        if cells.is_empty() {
            Range {
                start: (0, 0),
                end: (0, 0),
                inner: Vec::new(),
            }
        } else {
            let row_start = cells.first().unwrap().pos.0;
            let row_end = cells.last().unwrap().pos.0;
            let mut col_start = u32::MAX;
            let mut col_end = 0;
            for c in cells.iter().map(|c| c.pos.1) {
                col_start = col_start.min(c);
                col_end = col_end.max(c);
            }
            let width = (col_end - col_start + 1) as usize;
            let height = (row_end - row_start + 1) as usize;
            let mut v = vec![T::default(); height * width];
            for c in cells {
                let idx = (c.pos.0 - row_start) as usize * width + (c.pos.1 - col_start) as usize;
                v[idx] = c.val;
            }
            Range {
                start: (row_start, col_start),
                end: (row_end, col_end),
                inner: v,
            }
        }
    }

    /// Get top-left cell position (row, column), or `None` if the range is empty.
    pub fn start(&self) -> Option<(u32, u32)> {
        if self.is_empty() {
            None
        } else {
            Some(self.start)
        }
    }

    /// Get bottom-right cell position (row, column), or `None` if the range is empty.
    pub fn end(&self) -> Option<(u32, u32)> {
        if self.is_empty() {
            None
        } else {
            Some(self.end)
        }
    }

    /// Get column width
    pub fn width(&self) -> usize {
        if self.inner.is_empty() {
            0
        } else {
            (self.end.1 - self.start.1 + 1) as usize
        }
    }

    /// Get row height
    pub fn height(&self) -> usize {
        if self.inner.is_empty() {
            0
        } else {
            (self.end.0 - self.start.0 + 1) as usize
        }
    }

    /// Get size, `(height, width)`
    pub fn get_size(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    /// Is range empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Get cell value.
    ///
    /// Panics if indexes are out of range bounds
    pub fn get_value(&self, pos: (u32, u32)) -> &T {
        assert!(pos.0 >= self.start.0 && pos.0 <= self.end.0);
        assert!(pos.1 >= self.start.1 && pos.1 <= self.end.1);
        let idx =
            (pos.0 - self.start.0) as usize * self.width() + (pos.1 - self.start.1) as usize;
        &self.inner[idx]
    }

    /// Get an iterator over inner rows
    pub fn rows(&self) -> Rows<'_, T> {
        if self.inner.is_empty() {
            Rows { inner: None }
        } else {
            let width = self.width();
            Rows {
                inner: Some(self.inner.chunks(width)),
            }
        }
    }

    /// Get an iterator over used (non-default) cells only. This can be much
    /// faster than iterating rows since a `Range` may be internally sparse.
    pub fn used_cells(&self) -> UsedCells<'_, T> {
        UsedCells {
            width: self.width(),
            inner: self.inner.iter().enumerate(),
        }
    }
}

/// An iterator to filter out empty cells in a `Range`
#[derive(Debug)]
pub struct UsedCells<'a, T> {
    width: usize,
    inner: std::iter::Enumerate<slice::Iter<'a, T>>,
}

impl<'a, T: CellType> Iterator for UsedCells<'a, T> {
    type Item = (usize, usize, &'a T);
    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .by_ref()
            .find(|&(_, v)| v != &T::default())
            .map(|(i, v)| (i / self.width, i % self.width, v))
    }
}

/// An iterator to read `Range` struct row by row
#[derive(Debug)]
pub struct Rows<'a, T> {
    inner: Option<slice::Chunks<'a, T>>,
}

impl<'a, T> Iterator for Rows<'a, T> {
    type Item = &'a [T];
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.as_mut().and_then(|c| c.next())
    }
}

/// A trait to share reader behaviour across different file formats.
///
/// Only a single format (`.xlsb`) is implemented; the trait still exists as
/// the seam consumer code is written against, so additional readers can be
/// added without touching call sites.
pub trait Reader<RS>: Sized
where
    RS: Read + Seek,
{
    /// Error specific to this reader
    type Error: std::error::Error;

    /// Creates a new instance based on the actual file
    fn new(reader: RS) -> Result<Self, Self::Error>;

    /// Set the header row to use when building a `Range` from this reader.
    fn with_header_row(&mut self, header_row: HeaderRow) -> &mut Self;

    /// Gets the VBA project, if any
    fn vba_project(&mut self) -> Option<Result<Cow<'_, VbaProject>, Self::Error>>;

    /// Workbook-level metadata: sheets and defined names
    fn metadata(&self) -> &Metadata;

    /// Read the given worksheet, consuming cells into an owned `Range<Data>`
    fn worksheet_range(&mut self, name: &str) -> Result<Range<Data>, Self::Error>;

    /// Read every cell in the given worksheet that carries a formula,
    /// rendering its token stream to text.
    fn worksheet_formula(&mut self, name: &str) -> Result<Range<String>, Self::Error>;

    /// Read every worksheet into a `(name, Range<Data>)` pair. Worksheets
    /// that fail to parse are silently skipped.
    fn worksheets(&mut self) -> Vec<(String, Range<Data>)>;
}

/// A trait for readers that can yield a `Range` borrowing from the reader
/// itself (e.g. shared strings), avoiding a clone per string cell.
pub trait ReaderRef<RS>: Reader<RS>
where
    RS: Read + Seek,
{
    /// Read the given worksheet into a `Range<DataRef>` borrowing from `self`.
    fn worksheet_range_ref<'a>(
        &'a mut self,
        name: &str,
    ) -> Result<Range<DataRef<'a>>, Self::Error>;
}

/// Opens a workbook at the given path and tries to read its contents.
pub fn open_workbook<R, P>(path: P) -> Result<R, R::Error>
where
    R: Reader<BufReader<File>>,
    R::Error: From<std::io::Error>,
    P: AsRef<Path>,
{
    let file = File::open(path)?;
    R::new(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error() {
        assert_eq!(CellErrorType::from_str("#DIV/0!").unwrap(), CellErrorType::Div0);
        assert_eq!(CellErrorType::from_str("#N/A").unwrap(), CellErrorType::NA);
        assert_eq!(CellErrorType::from_str("#NAME?").unwrap(), CellErrorType::Name);
        assert_eq!(CellErrorType::from_str("#NULL!").unwrap(), CellErrorType::Null);
        assert_eq!(CellErrorType::from_str("#NUM!").unwrap(), CellErrorType::Num);
        assert_eq!(CellErrorType::from_str("#REF!").unwrap(), CellErrorType::Ref);
        assert_eq!(CellErrorType::from_str("#VALUE!").unwrap(), CellErrorType::Value);
    }

    #[test]
    fn dimensions_len() {
        let d = Dimensions {
            start: (0, 0),
            end: (4, 2),
        };
        assert_eq!(d.len(), 15);
        assert!(!d.is_empty());
    }

    #[test]
    fn range_from_sparse() {
        let cells = vec![
            Cell::new((1, 200), Data::Float(1.)),
            Cell::new((55, 2), Data::String("a".to_string())),
        ];
        let range = Range::from_sparse(cells);
        assert_eq!(range.get_size(), (55, 199));
    }
}
