#[path = "../support/template_fixture.rs"]
mod template_fixture;

use mcp_xlsx_report::common::errors::AppError;
use mcp_xlsx_report::xlsx::cell_address::CellAddress;
use mcp_xlsx_report::xlsx::cell_writer::{CellValue, CellWriter};
use mcp_xlsx_report::xlsx::shared_strings::SharedStringTable;
use mcp_xlsx_report::xlsx::worksheet::Worksheet;
use template_fixture::{lab_sheet, shared_strings_xml, worksheet_xml, LAB_STRINGS};

fn lab() -> (Worksheet, SharedStringTable) {
    let sheet = Worksheet::parse(lab_sheet().as_bytes()).expect("sheet");
    let strings: Vec<String> = LAB_STRINGS.iter().map(|s| s.to_string()).collect();
    let sst = SharedStringTable::load(shared_strings_xml(&strings).as_bytes()).expect("sst");
    (sheet, sst)
}

fn addr(a1: &str) -> CellAddress {
    CellAddress::parse(a1).expect("address")
}

#[test]
fn find_label_matches_trimmed_upper_cased_text() {
    let (sheet, sst) = lab();
    assert_eq!(sheet.find_label("cliente:", Some(&sst)), Some(addr("B4")));
    assert_eq!(sheet.find_label("  observaciones ", Some(&sst)), Some(addr("B20")));
    assert_eq!(sheet.find_label("FIRMA", Some(&sst)), None);
    // Without the table shared-string cells carry no readable text.
    assert_eq!(sheet.find_label("CLIENTE:", None), None);
}

#[test]
fn cell_text_resolves_shared_and_inline_strings() {
    let (mut sheet, sst) = lab();
    assert_eq!(sheet.cell_text(&addr("A2"), Some(&sst)).as_deref(), Some("INFORME DE ENSAYO"));
    CellWriter::set_value(&mut sheet, None, &addr("C4"), &CellValue::InlineText("ACME".into()))
        .expect("write");
    assert_eq!(sheet.cell_text(&addr("C4"), Some(&sst)).as_deref(), Some("ACME"));
}

#[test]
fn find_or_create_keeps_rows_and_cells_ordered() {
    let (mut sheet, _) = lab();
    sheet.find_or_create_cell(&addr("C3")).expect("C3");
    sheet.find_or_create_cell(&addr("A4")).expect("A4");
    sheet.find_or_create_cell(&addr("Z30")).expect("Z30");
    sheet.validate().expect("still ordered");

    let rows = sheet.row_numbers().expect("rows");
    assert!(rows.windows(2).all(|w| w[0] < w[1]));
    assert!(rows.contains(&3) && rows.contains(&30));

    let row4: Vec<&str> = sheet
        .row(4)
        .expect("row 4")
        .children_named("c")
        .filter_map(|c| c.attr("r"))
        .collect();
    assert_eq!(row4, vec!["A4", "B4", "C4"]);
}

#[test]
fn existing_cell_is_reused() {
    let (mut sheet, _) = lab();
    let before = sheet.row(4).expect("row").children_named("c").count();
    let cell = sheet.find_or_create_cell(&addr("C4")).expect("C4");
    assert_eq!(cell.attr("s"), Some("2"));
    assert_eq!(sheet.row(4).expect("row").children_named("c").count(), before);
}

#[test]
fn dimension_only_grows() {
    let (mut sheet, _) = lab();
    assert_eq!(sheet.dimension(), Some("A1:D22"));
    assert!(!sheet.extend_dimension(10).expect("smaller"));
    assert!(sheet.extend_dimension(26).expect("grow"));
    assert_eq!(sheet.dimension(), Some("A1:D26"));
    assert_eq!(sheet.max_row().expect("max"), 22);
}

#[test]
fn text_cells_lists_labels() {
    let (sheet, sst) = lab();
    let labels = sheet.text_cells(Some(&sst));
    assert!(labels.contains(&("B4".to_string(), "CLIENTE:".to_string())));
    assert!(labels.contains(&("A22".to_string(), "NOTA:".to_string())));
}

#[test]
fn validate_rejects_misplaced_cells_and_unordered_rows() {
    let misplaced = worksheet_xml("A1:A2", r#"<row r="1"><c r="A2"/></row>"#, &[]);
    let sheet = Worksheet::parse(misplaced.as_bytes()).expect("parse");
    assert!(matches!(sheet.validate(), Err(AppError::MalformedTemplate(_))));

    let unordered = worksheet_xml("A1:A2", r#"<row r="2"/><row r="1"/>"#, &[]);
    let sheet = Worksheet::parse(unordered.as_bytes()).expect("parse");
    assert!(matches!(sheet.validate(), Err(AppError::MalformedTemplate(_))));
}

#[test]
fn parse_requires_sheet_data() {
    let err = Worksheet::parse(br#"<worksheet xmlns="x"><dimension ref="A1"/></worksheet>"#)
        .expect_err("no sheetData");
    assert!(matches!(err, AppError::MalformedTemplate(_)));
}

#[test]
fn rows_and_cells_without_references_follow_document_order() {
    let rows = concat!(
        r#"<row r="3"><c r="B3" s="1"><v>1</v></c><c s="2"><v>2</v></c></row>"#,
        r#"<row><c><v>3</v></c><c r="D4"><v>4</v></c><c s="5"/></row>"#,
    );
    let mut sheet = Worksheet::parse(worksheet_xml("B3:E4", rows, &[]).as_bytes()).expect("sheet");

    assert_eq!(sheet.row_numbers().expect("rows"), vec![3, 4]);
    assert_eq!(sheet.cell_text(&addr("C3"), None).as_deref(), Some("2"));
    assert_eq!(sheet.cell_text(&addr("A4"), None).as_deref(), Some("3"));
    assert_eq!(sheet.cell(&addr("E4")).expect("E4").attr("s"), Some("5"));
    sheet.validate().expect("valid");

    // The implicit C3 is found, not duplicated.
    CellWriter::set_value(&mut sheet, None, &addr("C3"), &CellValue::Number("9".into())).expect("write");
    let row = sheet.row(3).expect("row 3");
    assert_eq!(row.children_named("c").count(), 2);
    assert_eq!(sheet.cell(&addr("C3")).expect("C3").attr("s"), Some("2"));
}
