#[path = "../support/template_fixture.rs"]
mod template_fixture;

use mcp_xlsx_report::common::errors::AppError;
use mcp_xlsx_report::xlsx::cell_address::CellAddress;
use mcp_xlsx_report::xlsx::drawing::{AnchorPoint, Drawing};
use mcp_xlsx_report::xlsx::engine::ReportEngine;
use mcp_xlsx_report::xlsx::layout::{
    AnchorSelector, FieldSlot, ItemBlock, ItemColumn, RowAnchor, ShapeGroup, ShapeValue,
    TemplateLayout,
};
use mcp_xlsx_report::xlsx::merge_regions::MergeRegions;
use mcp_xlsx_report::xlsx::payload::ReportPayload;
use mcp_xlsx_report::xlsx::shared_strings::SharedStringTable;
use mcp_xlsx_report::xlsx::sheet_ref::SheetRef;
use mcp_xlsx_report::xlsx::worksheet::Worksheet;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use template_fixture::{lab_template, raw_entry, read_entry, worksheet_xml, TemplateFixture};

const SHEET: &str = "xl/worksheets/sheet1.xml";
const STRINGS: &str = "xl/sharedStrings.xml";
const DRAWING: &str = "xl/drawings/drawing1.xml";

fn lab_layout() -> TemplateLayout {
    TemplateLayout {
        name: "lab".to_string(),
        template: "lab.xlsx".to_string(),
        sheet: SheetRef::default(),
        item_block: Some(ItemBlock {
            first_row: 12,
            capacity: 8,
            source_row: None,
            drawing_pivot_row: None,
            first_row_label: None,
            min_items: 0,
            columns: vec![
                ItemColumn::sequence("A"),
                ItemColumn::field("B", "codigo"),
                ItemColumn::field("C", "descripcion").inline(),
                ItemColumn::field("D", "resistencia").number(),
            ],
        }),
        header: vec![FieldSlot::beside("cliente", "CLIENTE:", 1, 0)],
        footer: vec![FieldSlot::at("observaciones", "B21")],
        shapes: vec![
            ShapeGroup::new(
                "Revisado:",
                &[("Revisado:", "revisado_por"), ("Fecha:", "revisado_fecha")],
            ),
            ShapeGroup::new(
                "Aprobado:",
                &[("Aprobado:", "aprobado_por"), ("Fecha:", "aprobado_fecha")],
            ),
        ],
        clear_cells: Vec::new(),
        shape_values: Vec::new(),
        remove_anchors: Vec::new(),
    }
}

fn items(count: usize) -> Vec<Map<String, Value>> {
    (1..=count)
        .map(|i| {
            let item = json!({
                "codigo": format!("LEM-{i:03}"),
                "descripcion": format!("Probeta {i}"),
                "resistencia": 200 + i
            });
            match item {
                Value::Object(map) => map,
                _ => unreachable!(),
            }
        })
        .collect()
}

fn payload(count: usize) -> ReportPayload {
    let mut payload: ReportPayload = serde_json::from_value(json!({
        "header": { "cliente": "Constructora Andina" },
        "footer": {
            "observaciones": "Sin observaciones",
            "revisado_por": "J. Rojas",
            "revisado_fecha": "01/02/2024",
            "aprobado_por": "M. Salas",
            "aprobado_fecha": "03/02/2024"
        }
    }))
    .expect("payload");
    payload.items = items(count);
    payload
}

fn output_sheet(bytes: &[u8]) -> (Worksheet, SharedStringTable) {
    let sheet = Worksheet::parse(read_entry(bytes, SHEET).as_bytes()).expect("sheet");
    let sst = SharedStringTable::load(read_entry(bytes, STRINGS).as_bytes()).expect("sst");
    (sheet, sst)
}

fn text(sheet: &Worksheet, sst: &SharedStringTable, a1: &str) -> Option<String> {
    sheet.cell_text(&CellAddress::parse(a1).expect("address"), Some(sst))
}

#[test]
fn twelve_items_in_an_eight_row_block_shift_the_footer_by_four() {
    let template = lab_template().build();
    let report = ReportEngine::generate(template, &lab_layout(), &payload(12)).expect("generate");
    assert_eq!(report.items, 12);
    assert_eq!(report.extra_rows, 4);

    let (sheet, sst) = output_sheet(&report.bytes);
    sheet.validate().expect("valid sheet");

    let rows = sheet.row_numbers().expect("rows");
    let expected: Vec<u32> = vec![2, 4, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26];
    assert_eq!(rows, expected);

    // Footer label moved from row 20 to 24, footer value from B21 to B25.
    assert_eq!(text(&sheet, &sst, "B24").as_deref(), Some("OBSERVACIONES"));
    assert_eq!(text(&sheet, &sst, "B25").as_deref(), Some("Sin observaciones"));
    assert_eq!(text(&sheet, &sst, "A26").as_deref(), Some("NOTA:"));

    // Items 9..12 land on rows created from the last authored item row.
    for (i, row) in (9..=12).zip(20..=23) {
        assert_eq!(text(&sheet, &sst, &format!("A{row}")), Some(i.to_string()));
        assert_eq!(text(&sheet, &sst, &format!("B{row}")), Some(format!("LEM-{i:03}")));
        assert_eq!(text(&sheet, &sst, &format!("C{row}")), Some(format!("Probeta {i}")));
        assert_eq!(text(&sheet, &sst, &format!("D{row}")), Some((200 + i).to_string()));
        let row_el = sheet.row(row).expect("new row");
        assert_eq!(row_el.attr("ht"), Some("15"));
        let styles: Vec<_> = row_el.children_named("c").filter_map(|c| c.attr("s")).collect();
        assert_eq!(styles, vec!["3", "4", "4", "5"]);
    }

    let merges: Vec<String> = MergeRegions::read(&sheet)
        .expect("merges")
        .iter()
        .map(|m| m.to_string())
        .collect();
    assert!(merges.contains(&"B24:D24".to_string()), "{merges:?}");
    assert!(!merges.contains(&"B20:D20".to_string()), "{merges:?}");
    assert!(merges.contains(&"A2:D2".to_string()));
    for row in 19..=23 {
        assert!(merges.contains(&format!("B{row}:C{row}")), "B{row}:C{row} in {merges:?}");
    }

    assert_eq!(sheet.dimension(), Some("A1:D26"));
    assert_eq!(text(&sheet, &sst, "C4").as_deref(), Some("Constructora Andina"));
}

#[test]
fn drawing_anchors_follow_the_footer() {
    let template = lab_template().build();
    let report = ReportEngine::generate(template, &lab_layout(), &payload(12)).expect("generate");
    assert!(report.replaced_parts.contains(&DRAWING.to_string()));

    let drawing = Drawing::parse(read_entry(&report.bytes, DRAWING).as_bytes()).expect("drawing");
    let anchors = drawing.summaries();
    assert_eq!(anchors[0].from, Some(AnchorPoint { col: 0, row: 0 }));
    assert_eq!(anchors[1].from, Some(AnchorPoint { col: 0, row: 26 }));
    assert_eq!(anchors[1].to, Some(AnchorPoint { col: 2, row: 30 }));
    assert_eq!(anchors[2].from, Some(AnchorPoint { col: 3, row: 26 }));
}

#[test]
fn signature_dates_go_to_their_own_shape() {
    let template = lab_template().build();
    let report = ReportEngine::generate(template, &lab_layout(), &payload(3)).expect("generate");

    let drawing = Drawing::parse(read_entry(&report.bytes, DRAWING).as_bytes()).expect("drawing");
    let anchors = drawing.summaries();
    assert_eq!(anchors[1].text, "Revisado: J. Rojas Fecha: 01/02/2024");
    assert_eq!(anchors[2].text, "Aprobado: M. Salas Fecha: 03/02/2024");
}

#[test]
fn filling_within_capacity_is_idempotent_and_keeps_rows() {
    let template = lab_template().build();
    let before = Worksheet::parse(read_entry(&template, SHEET).as_bytes())
        .expect("template sheet")
        .row_numbers()
        .expect("rows");

    let first = ReportEngine::generate(template.clone(), &lab_layout(), &payload(5)).expect("first");
    let second = ReportEngine::generate(template, &lab_layout(), &payload(5)).expect("second");
    assert_eq!(first.bytes, second.bytes);
    assert_eq!(first.extra_rows, 0);

    let (sheet, sst) = output_sheet(&first.bytes);
    assert_eq!(sheet.row_numbers().expect("rows"), before);
    assert_eq!(sheet.dimension(), Some("A1:D22"));

    // Unused authored rows are cleared but keep their styles.
    for row in 17..=19 {
        for col in ["A", "B", "C", "D"] {
            let address = CellAddress::parse(&format!("{col}{row}")).expect("address");
            let cell = sheet.cell(&address).expect("cell kept");
            assert!(cell.children.is_empty(), "{address} still has a value");
            assert!(cell.attr("s").is_some());
        }
    }
    // The placeholder in B12 was overwritten by the first item.
    assert_eq!(text(&sheet, &sst, "B12").as_deref(), Some("LEM-001"));
}

#[test]
fn shared_strings_stay_unique_and_counted() {
    let template = lab_template().build();
    let mut payload = payload(12);
    for item in payload.items.iter_mut() {
        item.insert("codigo".to_string(), json!(" LEM-X "));
    }
    payload.header.insert("cliente".to_string(), json!("LEM-X"));

    let report = ReportEngine::generate(template, &lab_layout(), &payload).expect("generate");
    let (_, sst) = output_sheet(&report.bytes);

    let entries: Vec<&str> = (0..sst.len()).filter_map(|i| sst.get(i)).collect();
    let distinct: HashSet<&str> = entries.iter().map(|e| e.trim()).collect();
    assert_eq!(distinct.len(), entries.len());
    assert_eq!(entries.iter().filter(|e| e.trim() == "LEM-X").count(), 1);

    let raw = read_entry(&report.bytes, STRINGS);
    let count = format!(r#"count="{}""#, sst.len());
    let unique = format!(r#"uniqueCount="{}""#, sst.len());
    assert!(raw.contains(&count) && raw.contains(&unique), "{raw}");
}

#[test]
fn untouched_parts_are_byte_identical() {
    let template = lab_template().build();
    let mut payload = payload(4);
    payload.footer.clear();
    payload.header.clear();
    for item in payload.items.iter_mut() {
        item.remove("codigo");
    }

    let report = ReportEngine::generate(template.clone(), &lab_layout(), &payload).expect("generate");
    // Only numbers and inline text were written, so the text pool and drawing stay put.
    assert_eq!(report.replaced_parts, vec![SHEET.to_string()]);
    for part in ["xl/workbook.xml", "xl/styles.xml", STRINGS, DRAWING, "[Content_Types].xml"] {
        assert_eq!(raw_entry(&report.bytes, part), raw_entry(&template, part), "{part}");
    }
}

#[test]
fn absent_header_keys_leave_template_text() {
    let template = lab_template().build();
    let mut payload = payload(1);
    payload.header.clear();
    payload.footer.insert("observaciones".to_string(), Value::Null);

    let report = ReportEngine::generate(template, &lab_layout(), &payload).expect("generate");
    let (sheet, sst) = output_sheet(&report.bytes);
    assert_eq!(text(&sheet, &sst, "C4"), None);
    // Null clears: the cell exists with its style but no value.
    let b21 = sheet.cell(&CellAddress::parse("B21").expect("B21")).expect("B21");
    assert!(b21.children.is_empty());
    assert_eq!(b21.attr("s"), Some("7"));
}

#[test]
fn label_anchor_rebases_the_item_block() {
    let mut layout = lab_layout();
    if let Some(block) = layout.item_block.as_mut() {
        // Authored coordinates are stale; the "N°" header on row 11 wins.
        block.first_row = 30;
        block.first_row_label = Some(RowAnchor {
            label: "n°".to_string(),
            row_offset: 1,
        });
    }
    let report = ReportEngine::generate(lab_template().build(), &layout, &payload(10)).expect("generate");
    assert_eq!(report.extra_rows, 2);

    let (sheet, sst) = output_sheet(&report.bytes);
    assert_eq!(text(&sheet, &sst, "B12").as_deref(), Some("LEM-001"));
    assert_eq!(text(&sheet, &sst, "B21").as_deref(), Some("LEM-010"));
    assert_eq!(text(&sheet, &sst, "B22").as_deref(), Some("OBSERVACIONES"));
}

#[test]
fn bad_input_produces_no_document() {
    let template = lab_template().build();

    let mut layout = lab_layout();
    if let Some(block) = layout.item_block.as_mut() {
        block.min_items = 1;
    }
    let err = ReportEngine::generate(template.clone(), &layout, &payload(0)).expect_err("min items");
    assert!(matches!(err, AppError::InvalidInput(_)));

    let mut bad = payload(3);
    bad.items[1].insert("resistencia".to_string(), json!("alta"));
    let err = ReportEngine::generate(template.clone(), &lab_layout(), &bad).expect_err("nan");
    assert!(err.to_string().contains("items[1].resistencia"), "{err}");

    let mut no_block = lab_layout();
    no_block.item_block = None;
    let err = ReportEngine::generate(template, &no_block, &payload(2)).expect_err("no block");
    assert!(matches!(err, AppError::InvalidInput(_)));

    let err = ReportEngine::generate(b"PK broken".to_vec(), &lab_layout(), &payload(1))
        .expect_err("broken container");
    assert!(matches!(err, AppError::MalformedTemplate(_)));
}

#[test]
fn templates_without_shared_strings_get_inline_text() {
    let template = TemplateFixture::new(
        "Hoja1",
        worksheet_xml(
            "A1:D12",
            r#"<row r="4"><c r="B4" s="1" t="inlineStr"><is><t>CLIENTE:</t></is></c></row><row r="12"><c r="A12" s="3"/></row>"#,
            &[],
        ),
    )
    .without_shared_strings()
    .build();
    let mut layout = lab_layout();
    layout.shapes.clear();
    if let Some(block) = layout.item_block.as_mut() {
        block.capacity = 1;
    }

    let report = ReportEngine::generate(template, &layout, &payload(2)).expect("generate");
    let sheet = Worksheet::parse(read_entry(&report.bytes, SHEET).as_bytes()).expect("sheet");
    let c4 = sheet.cell(&CellAddress::parse("C4").expect("C4")).expect("C4");
    assert_eq!(c4.attr("t"), Some("inlineStr"));
    assert_eq!(sheet.cell_text(&CellAddress::parse("B13").expect("B13"), None).as_deref(), Some("LEM-002"));
    sheet.validate().expect("valid");
}

#[test]
fn shape_edits_use_authored_anchors_before_the_shift() {
    let mut layout = lab_layout();
    layout.shape_values = vec![
        ShapeValue::at("recepcion_numero", AnchorSelector::Name("Shape 1".to_string()))
            .aligned("ctr"),
    ];
    // The approval box sits at D23 in the template and would be at D27 after the shift.
    layout.remove_anchors = vec![AnchorSelector::FromCell("D23".to_string())];
    let mut payload = payload(12);
    payload
        .header
        .insert("recepcion_numero".to_string(), json!("R-0042"));

    let report = ReportEngine::generate(lab_template().build(), &layout, &payload).expect("generate");
    let drawing = Drawing::parse(read_entry(&report.bytes, DRAWING).as_bytes()).expect("drawing");
    let anchors = drawing.summaries();
    assert_eq!(anchors.len(), 2);
    assert_eq!(anchors[0].text, "R-0042");
    assert_eq!(anchors[1].from, Some(AnchorPoint { col: 0, row: 26 }));
    assert_eq!(anchors[1].text, "Revisado: J. Rojas Fecha: 01/02/2024");
}

#[test]
fn absent_shape_value_leaves_the_drawing_untouched() {
    let mut layout = lab_layout();
    layout.shapes.clear();
    layout.shape_values = vec![ShapeValue::at(
        "recepcion_numero",
        AnchorSelector::Name("Shape 1".to_string()),
    )];

    let template = lab_template().build();
    let report = ReportEngine::generate(template.clone(), &layout, &payload(2)).expect("generate");
    assert!(!report.replaced_parts.contains(&DRAWING.to_string()));
    assert_eq!(raw_entry(&report.bytes, DRAWING), raw_entry(&template, DRAWING));
}

#[test]
fn slots_can_borrow_another_cells_style() {
    let mut layout = lab_layout();
    layout.header = vec![FieldSlot::beside("cliente", "CLIENTE:", 1, 0).style_from("H1")];
    layout.footer = vec![FieldSlot::at("observaciones", "B21").style_from("A11")];

    let report = ReportEngine::generate(lab_template().build(), &layout, &payload(12)).expect("generate");
    let (sheet, sst) = output_sheet(&report.bytes);

    // A11 carries style 1 in the template; B21 moved to B25.
    let footer = sheet.cell(&CellAddress::parse("B25").expect("B25")).expect("B25");
    assert_eq!(footer.attr("s"), Some("1"));
    assert_eq!(text(&sheet, &sst, "B25").as_deref(), Some("Sin observaciones"));

    // H1 does not exist, so C4 keeps its own style.
    let header = sheet.cell(&CellAddress::parse("C4").expect("C4")).expect("C4");
    assert_eq!(header.attr("s"), Some("2"));
}

#[test]
fn print_area_and_sheet_ranges_follow_the_expansion() {
    let sheet_xml = template_fixture::lab_sheet().replace(
        "<pageMargins",
        r#"<conditionalFormatting sqref="D12:D19"><cfRule type="cellIs" dxfId="0" priority="1" operator="lessThan"><formula>0</formula></cfRule></conditionalFormatting><hyperlinks><hyperlink ref="B21" r:id="rId9"/></hyperlinks><pageMargins"#,
    );
    let template = TemplateFixture::new("Informe", sheet_xml)
        .with_shared_strings(&template_fixture::LAB_STRINGS)
        .with_drawing(template_fixture::lab_drawing())
        .with_print_area("Informe!$A$1:$D$22")
        .build();

    let report = ReportEngine::generate(template, &lab_layout(), &payload(12)).expect("generate");
    assert!(report.replaced_parts.contains(&"xl/workbook.xml".to_string()));
    let workbook = read_entry(&report.bytes, "xl/workbook.xml");
    assert!(workbook.contains(">Informe!$A$1:$D$26</definedName>"), "{workbook}");

    let (sheet, _) = output_sheet(&report.bytes);
    let formatting = sheet.root().child("conditionalFormatting").expect("formatting");
    assert_eq!(formatting.attr("sqref"), Some("D12:D23"));
    let link = sheet
        .root()
        .child("hyperlinks")
        .and_then(|h| h.child("hyperlink"))
        .expect("hyperlink");
    assert_eq!(link.attr("ref"), Some("B25"));
}

#[test]
fn workbook_part_is_copied_when_no_rows_move() {
    let template = lab_template().with_print_area("Informe!$A$1:$D$22").build();
    let report = ReportEngine::generate(template.clone(), &lab_layout(), &payload(8)).expect("generate");
    assert!(!report.replaced_parts.contains(&"xl/workbook.xml".to_string()));
    assert_eq!(
        raw_entry(&report.bytes, "xl/workbook.xml"),
        raw_entry(&template, "xl/workbook.xml")
    );
}
