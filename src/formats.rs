//! Number-format classification: which cell values should be rendered as
//! dates, durations or plain numbers.
//!
//! A `CellFormat` is attached to a cell from its style record (`BrtFmt` /
//! `BrtCellMeta` in xlsb) and consulted only when a numeric value is
//! decoded, to pick the right `DataRef` variant.

use crate::datatype::{DataRef, ExcelDateTime, ExcelDateTimeType};

/// What a numeric cell value represents, inferred from its number format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellFormat {
    /// Not a date or duration; render as a plain number.
    #[default]
    Other,
    /// A calendar date and/or time of day.
    DateTime,
    /// An elapsed time, e.g. `[h]:mm:ss`.
    TimeDelta,
}

/// Classifies a builtin number-format id (MS-OI29500 §2.1.19 `ST_NumFmtId`
/// numbers below 164, which are reserved and never spelled out in the
/// styles part).
pub fn builtin_format_by_code(id: u16) -> CellFormat {
    match id {
        14..=22 | 27..=36 | 50..=58 => CellFormat::DateTime,
        45..=47 => CellFormat::TimeDelta,
        _ => CellFormat::Other,
    }
}

/// Classifies a custom (user-supplied) number-format string.
pub fn detect_custom_number_format(format: &str) -> CellFormat {
    if !is_custom_date_format(format) {
        return CellFormat::Other;
    }
    let lower = format.to_ascii_lowercase();
    let is_elapsed = ["[h", "[m", "[s"].iter().any(|tok| lower.contains(tok));
    if is_elapsed {
        CellFormat::TimeDelta
    } else {
        CellFormat::DateTime
    }
}

/// Renders a decoded numeric cell value as the borrowed `DataRef` variant
/// its format calls for: a plain float, an Excel date/time, or left as-is
/// when no date/duration format applies.
pub fn format_excel_f64_ref(value: f64, format: Option<&CellFormat>, is_1904: bool) -> DataRef<'static> {
    match format {
        Some(CellFormat::DateTime) => {
            DataRef::DateTime(ExcelDateTime::new(value, ExcelDateTimeType::DateTime, is_1904))
        }
        Some(CellFormat::TimeDelta) => {
            DataRef::DateTime(ExcelDateTime::new(value, ExcelDateTimeType::TimeDelta, is_1904))
        }
        _ => DataRef::Float(value),
    }
}

/// Check excel number format is datetime
pub fn is_custom_date_format(format: &str) -> bool {
    let mut escaped = false;
    let mut is_quote = false;
    let mut brackets = 0u8;
    let mut prev = ' ';
    let mut hms = false;
    let mut ap = false;
    for s in format.chars() {
        match (s, escaped, is_quote, ap, brackets) {
            (_, true, ..) => escaped = false, // if escaped, ignore
            ('_' | '\\', ..) => escaped = true,
            ('"', _, true, _, _) => is_quote = false,
            (_, _, true, _, _) => (),
            ('"', _, _, _, _) => is_quote = true,
            (';', ..) => return false, // first format only
            ('[', ..) => brackets += 1,
            (']', .., 1) if hms => return true, // if closing
            (']', ..) => brackets = brackets.saturating_sub(1),
            ('a' | 'A', _, _, false, 0) => ap = true,
            ('p' | 'm' | '/' | 'P' | 'M', _, _, true, 0) => return true,
            ('d' | 'm' | 'h' | 'y' | 's' | 'D' | 'M' | 'H' | 'Y' | 'S', _, _, false, 0) => {
                return true
            }
            _ => {
                if hms && s.eq_ignore_ascii_case(&prev) {
                    // ok ...
                } else {
                    hms = prev == '[' && matches!(s, 'm' | 'h' | 's' | 'M' | 'H' | 'S');
                }
            }
        }
        prev = s;
    }
    false
}

pub fn is_builtin_date_format_id(id: &[u8]) -> bool {
    match id {
    // mm-dd-yy
    b"14" |
    &[14, 0] |
    // d-mmm-yy
    b"15" |
    &[15, 0] |
    // d-mmm
    b"16" |
    &[16, 0] |
    // mmm-yy
    b"17" |
    &[17, 0] |
    // h:mm AM/PM
    b"18" |
    &[18, 0] |
    // h:mm:ss AM/PM
    b"19" |
    &[19, 0] |
    // h:mm
    b"20" |
    &[20, 0] |
    // h:mm:ss
    b"21" |
    &[21, 0] |
    // m/d/yy h:mm
    b"22" |
    &[22, 0] |
    // mm:ss
    b"45" |
    &[45, 0] |
    // [h]:mm:ss
    b"46" |
    &[46, 0] |
    // mmss.0
    b"47" |
    &[47, 0]  => true,
    _ => false
    }
}

#[test]
fn test_builtin_format_by_code() {
    assert_eq!(builtin_format_by_code(14), CellFormat::DateTime);
    assert_eq!(builtin_format_by_code(46), CellFormat::TimeDelta);
    assert_eq!(builtin_format_by_code(0), CellFormat::Other);
    assert_eq!(builtin_format_by_code(9), CellFormat::Other);
}

#[test]
fn test_detect_custom_number_format() {
    assert_eq!(detect_custom_number_format("DD/MM/YY"), CellFormat::DateTime);
    assert_eq!(detect_custom_number_format("[h]:mm:ss"), CellFormat::TimeDelta);
    assert_eq!(detect_custom_number_format("0.00"), CellFormat::Other);
}

/// Ported from openpyxl, MIT License
/// https://foss.heptapod.net/openpyxl/openpyxl/-/blob/a5e197c530aaa49814fd1d993dd776edcec35105/openpyxl/styles/tests/test_number_style.py
#[test]
fn test_is_date_format() {
    assert_eq!(is_custom_date_format("DD/MM/YY"), true);
    assert_eq!(is_custom_date_format("H:MM:SS;@"), true);
    assert_eq!(is_custom_date_format("#,##0\\ [$\\u20bd-46D]"), false);
    assert_eq!(is_custom_date_format("m\"M\"d\"D\";@"), true);
    assert_eq!(is_custom_date_format("[h]:mm:ss"), true);
    assert_eq!(
        is_custom_date_format("\"Y: \"0.00\"m\";\"Y: \"-0.00\"m\";\"Y: <num>m\";@"),
        false
    );
    assert_eq!(is_custom_date_format("#,##0\\ [$''u20bd-46D]"), false);
    assert_eq!(
        is_custom_date_format("\"$\"#,##0_);[Red](\"$\"#,##0)"),
        false
    );
    assert_eq!(
        is_custom_date_format("[$-404]e\"\\xfc\"m\"\\xfc\"d\"\\xfc\""),
        true
    );
    assert_eq!(is_custom_date_format("0_ ;[Red]\\-0\\ "), false);
    assert_eq!(is_custom_date_format("\\Y000000"), false);
    assert_eq!(is_custom_date_format("#,##0.0####\" YMD\""), false);
    assert_eq!(is_custom_date_format("[h]"), true);
    assert_eq!(is_custom_date_format("[ss]"), true);
    assert_eq!(is_custom_date_format("[s].000"), true);
    assert_eq!(is_custom_date_format("[m]"), true);
    assert_eq!(is_custom_date_format("[mm]"), true);
    assert_eq!(
        is_custom_date_format("[Blue]\\+[h]:mm;[Red]\\-[h]:mm;[Green][h]:mm"),
        true
    );
    assert_eq!(is_custom_date_format("[>=100][Magenta][s].00"), true);
    assert_eq!(is_custom_date_format("[h]:mm;[=0]\\-"), true);
    assert_eq!(is_custom_date_format("[>=100][Magenta].00"), false);
    assert_eq!(is_custom_date_format("[>=100][Magenta]General"), false);
    assert_eq!(is_custom_date_format("ha/p\\\\m"), true);
    assert_eq!(
        is_custom_date_format("#,##0.00\\ _M\"H\"_);[Red]#,##0.00\\ _M\"S\"_)"),
        false
    );
}
