//! Whole-crate tests against the public surface: the A1 column-name
//! bijection (P2) and the cell error-code round-trip.

use rstest::rstest;
use xlsb_reader::utils::push_column;
use xlsb_reader::CellErrorType;

#[rstest]
#[case(0, "A")]
#[case(25, "Z")]
#[case(26, "AA")]
#[case(701, "ZZ")]
#[case(702, "AAA")]
#[case(16383, "XFD")]
fn column_name_bijection(#[case] col: u32, #[case] expected: &str) {
    let mut s = String::new();
    push_column(col, &mut s);
    assert_eq!(s, expected);
}

#[test]
fn column_names_are_strictly_increasing() {
    let mut prev = String::new();
    for col in 0..16384u32 {
        let mut s = String::new();
        push_column(col, &mut s);
        assert!(s > prev, "{s:?} should sort after {prev:?}");
        prev = s;
    }
}

#[rstest]
#[case(CellErrorType::Div0, "#DIV/0!")]
#[case(CellErrorType::NA, "#N/A")]
#[case(CellErrorType::Name, "#NAME?")]
#[case(CellErrorType::Null, "#NULL!")]
#[case(CellErrorType::Num, "#NUM!")]
#[case(CellErrorType::Ref, "#REF!")]
#[case(CellErrorType::Value, "#VALUE!")]
fn error_type_round_trips_through_display_and_from_str(
    #[case] err: CellErrorType,
    #[case] text: &str,
) {
    assert_eq!(err.to_string(), text);
    assert_eq!(text.parse::<CellErrorType>().unwrap(), err);
}

#[test]
fn unknown_error_text_fails_to_parse() {
    assert!("#NOT_A_REAL_ERROR!".parse::<CellErrorType>().is_err());
}
