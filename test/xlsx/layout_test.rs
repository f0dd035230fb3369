use mcp_xlsx_report::common::errors::AppError;
use mcp_xlsx_report::xlsx::builtin_layouts::{BuiltinLayouts, BUILTIN_LAYOUT_NAMES};
use mcp_xlsx_report::xlsx::cell_writer::CellValue;
use mcp_xlsx_report::xlsx::layout::{
    AnchorSelector, BoolRendering, ItemColumn, TemplateLayout, ValueKind,
};
use mcp_xlsx_report::xlsx::payload::{coerce, shape_text, ReportPayload};
use mcp_xlsx_report::xlsx::sheet_ref::SheetRef;
use serde_json::json;

fn descriptor() -> serde_json::Value {
    json!({
        "name": "custom",
        "template": "custom.xlsx",
        "sheet": "Datos",
        "item_block": {
            "first_row": 5,
            "capacity": 4,
            "columns": [
                { "column": "A", "sequence": true, "kind": "number" },
                { "column": "B", "field": "codigo" },
                { "column": "C", "field": "valor", "kind": "number" },
                { "column": "D", "field": "ok", "boolean": { "when_true": "SI", "when_false": "NO" } }
            ]
        },
        "header": [
            { "field": "cliente", "label": "CLIENTE:", "col_offset": 1 },
            { "field": "fecha", "cell": "F2" }
        ],
        "shapes": [
            { "marker": "Revisado:", "labels": [ { "label": "Fecha:", "field": "revisado_fecha" } ] }
        ],
        "shape_values": [
            { "field": "numero", "anchor": { "from_cell": "E10" }, "align": "ctr" }
        ],
        "remove_anchors": [ { "from_row_at_least": 39 }, { "name": "Firma" } ]
    })
}

#[test]
fn builtin_layouts_all_validate() {
    assert_eq!(BuiltinLayouts::all().len(), BUILTIN_LAYOUT_NAMES.len());
    for name in BUILTIN_LAYOUT_NAMES {
        let layout = BuiltinLayouts::get(name).expect(name);
        layout.validate().unwrap_or_else(|e| panic!("{name}: {e}"));
        assert_eq!(layout.name, name);
    }
}

#[test]
fn capacities_are_per_template() {
    let capacity = |name: &str| BuiltinLayouts::get(name).expect(name).capacity();
    assert_eq!(capacity("recepcion"), Some(18));
    assert_eq!(capacity("compresion"), Some(18));
    assert_eq!(capacity("verificacion"), Some(8));
    assert_eq!(capacity("cbr"), Some(12));
    assert_eq!(capacity("informe"), Some(3));
    assert_eq!(capacity("humedad"), None);
}

#[test]
fn compression_numbers_live_in_shapes() {
    let layout = BuiltinLayouts::get("compresion").expect("compresion");
    let anchors: Vec<_> = layout
        .shape_values
        .iter()
        .map(|s| (s.field.as_str(), s.anchor.clone(), s.align.as_deref()))
        .collect();
    assert_eq!(
        anchors,
        vec![
            ("recepcion_numero", AnchorSelector::FromCell("E10".to_string()), Some("ctr")),
            ("ot_numero", AnchorSelector::FromCell("G10".to_string()), Some("r")),
        ]
    );
    assert_eq!(layout.remove_anchors, vec![AnchorSelector::FromRowAtLeast(39)]);
}

#[test]
fn moisture_header_borrows_styles() {
    let layout = BuiltinLayouts::get("humedad").expect("humedad");
    let style_of = |cell: &str| {
        layout
            .header
            .iter()
            .find(|slot| slot.cell.as_deref() == Some(cell))
            .and_then(|slot| slot.style_from.clone())
    };
    for cell in ["D12", "E12", "G12", "I12"] {
        assert_eq!(style_of(cell).as_deref(), Some("E10"), "{cell}");
    }
    assert_eq!(style_of("I33").as_deref(), Some("I37"));
    assert_eq!(style_of("I37"), None);
    assert_eq!(style_of("J18"), None);
}

#[test]
fn unknown_layout_lists_known_names() {
    let err = BuiltinLayouts::get("densidad").expect_err("unknown");
    assert!(matches!(err, AppError::LayoutNotFound(_)));
    assert!(err.to_string().contains("recepcion"));
    assert!(BuiltinLayouts::get(" CBR ").is_ok());
}

#[test]
fn descriptor_deserializes_with_defaults() {
    let layout: TemplateLayout = serde_json::from_value(descriptor()).expect("layout");
    layout.validate().expect("valid");
    assert_eq!(layout.sheet, SheetRef::Name { name: "Datos".to_string() });

    let block = layout.item_block.as_ref().expect("block");
    assert_eq!(block.source_row, None);
    assert_eq!(block.min_items, 0);
    assert_eq!(block.last_authored_row(), 8);
    assert_eq!(block.columns[1].kind, ValueKind::TextShared);
    assert_eq!(
        block.columns[3].boolean,
        Some(BoolRendering { when_true: "SI".into(), when_false: "NO".into() })
    );
    assert_eq!(layout.header[0].col_offset, 1);
    assert_eq!(layout.header[0].style_from, None);
    assert!(layout.footer.is_empty());
    assert_eq!(
        layout.shape_values[0].anchor,
        AnchorSelector::FromCell("E10".to_string())
    );
    assert_eq!(
        layout.remove_anchors,
        vec![
            AnchorSelector::FromRowAtLeast(39),
            AnchorSelector::Name("Firma".to_string())
        ]
    );

    let back = serde_json::to_value(&layout).expect("serialize");
    let again: TemplateLayout = serde_json::from_value(back).expect("reparse");
    assert_eq!(again, layout);
}

#[test]
fn validate_rejects_broken_descriptors() {
    let broken = [
        json!({ "item_block": { "first_row": 5, "capacity": 0, "columns": [ { "column": "A", "sequence": true } ] } }),
        json!({ "item_block": { "first_row": 5, "capacity": 4, "source_row": 9, "columns": [ { "column": "A", "sequence": true } ] } }),
        json!({ "item_block": { "first_row": 5, "capacity": 4, "columns": [ { "column": "A1", "field": "x" } ] } }),
        json!({ "item_block": { "first_row": 5, "capacity": 4, "columns": [ { "column": "B", "field": "x" }, { "column": "b", "field": "y" } ] } }),
        json!({ "item_block": { "first_row": 5, "capacity": 4, "columns": [ { "column": "B", "field": "x", "sequence": true } ] } }),
        json!({ "header": [ { "field": "cliente" } ] }),
        json!({ "footer": [ { "field": "nota", "cell": "ZZZZ1" } ] }),
        json!({ "clear_cells": [ "P" ] }),
        json!({ "header": [ { "field": "fecha", "cell": "F2", "style_from": "10" } ] }),
        json!({ "shape_values": [ { "field": "numero", "anchor": { "from_cell": "E" } } ] }),
        json!({ "shape_values": [ { "field": "numero", "anchor": { "name": "A" }, "align": "center" } ] }),
        json!({ "shape_values": [ { "field": " ", "anchor": { "name": "A" } } ] }),
        json!({ "remove_anchors": [ { "from_row_at_least": 0 } ] }),
        json!({ "remove_anchors": [ { "name": "" } ] }),
    ];
    for patch in broken {
        let mut value = descriptor();
        let object = value.as_object_mut().expect("object");
        for (key, v) in patch.as_object().expect("patch") {
            object.insert(key.clone(), v.clone());
        }
        let layout: TemplateLayout = serde_json::from_value(value).expect("deserialize");
        let err = layout.validate().expect_err(&patch.to_string());
        assert!(matches!(err, AppError::InvalidInput(_)), "{patch}: {err:?}");
    }
}

#[test]
fn rebased_block_moves_source_and_drawing_pivot() {
    let layout = BuiltinLayouts::get("recepcion").expect("recepcion");
    let block = layout.item_block.expect("block");
    let moved = block.rebased(25).expect("rebase");
    assert_eq!(moved.first_row, 25);
    assert_eq!(moved.source_row, Some(26));
    assert_eq!(moved.drawing_pivot_row, Some(45));
    assert_eq!(moved.capacity, 18);
}

#[test]
fn coerce_follows_slot_kind() {
    let number = coerce(&json!(12.5), ValueKind::Number, None, "f").expect("number");
    assert_eq!(number, CellValue::Number("12.5".into()));
    let numeric_text = coerce(&json!(" 210 "), ValueKind::Number, None, "f").expect("text number");
    assert_eq!(numeric_text, CellValue::Number("210".into()));
    assert_eq!(
        coerce(&json!(7), ValueKind::TextShared, None, "f").expect("shared"),
        CellValue::SharedText("7".into())
    );
    assert_eq!(
        coerce(&json!("LEM-01"), ValueKind::TextInline, None, "f").expect("inline"),
        CellValue::InlineText("LEM-01".into())
    );
    assert_eq!(coerce(&json!(null), ValueKind::Number, None, "f").expect("null"), CellValue::Empty);
    assert_eq!(coerce(&json!("  "), ValueKind::TextShared, None, "f").expect("blank"), CellValue::Empty);
}

#[test]
fn coerce_rejects_what_the_cell_cannot_hold() {
    let err = coerce(&json!("doce"), ValueKind::Number, None, "items[0].edad").expect_err("nan");
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert!(err.to_string().contains("items[0].edad"));

    assert!(coerce(&json!(true), ValueKind::TextShared, None, "f").is_err());
    assert!(coerce(&json!([1]), ValueKind::TextShared, None, "f").is_err());
    assert!(coerce(&json!({"a": 1}), ValueKind::TextInline, None, "f").is_err());
}

#[test]
fn booleans_use_the_slot_rendering() {
    let column = ItemColumn::field("K", "requiere_densidad").boolean("SI", "NO");
    let rendering = column.boolean.as_ref();
    assert_eq!(
        coerce(&json!(true), column.kind, rendering, "k").expect("true"),
        CellValue::SharedText("SI".into())
    );
    assert_eq!(
        coerce(&json!(false), column.kind, rendering, "k").expect("false"),
        CellValue::SharedText("NO".into())
    );

    let mark = BoolRendering { when_true: "X".into(), when_false: String::new() };
    assert_eq!(
        coerce(&json!(false), ValueKind::TextShared, Some(&mark), "k").expect("blank"),
        CellValue::Empty
    );
}

#[test]
fn payload_lookup_prefers_footer() {
    let payload: ReportPayload = serde_json::from_value(json!({
        "header": { "fecha": "01/01/2024", "cliente": "ACME" },
        "footer": { "fecha": "05/01/2024" }
    }))
    .expect("payload");
    assert!(payload.items.is_empty());
    assert_eq!(payload.lookup("fecha"), Some(&json!("05/01/2024")));
    assert_eq!(payload.lookup("cliente"), Some(&json!("ACME")));
    assert_eq!(payload.lookup("nada"), None);

    assert_eq!(shape_text(&json!("  ")), None);
    assert_eq!(shape_text(&json!(3)), Some("3".to_string()));
    assert_eq!(shape_text(&json!(null)), None);
}
