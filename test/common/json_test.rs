use mcp_xlsx_report::common::json::JsonUtil;
use mcp_xlsx_report::xlsx::cell_writer::CellValue;
use serde_json::json;

#[test]
fn json_roundtrip_works() {
    let value = json!({ "type": "shared_text", "data": "hola" });
    let parsed: CellValue = JsonUtil::from_value(value.clone()).expect("parse");
    assert_eq!(parsed, CellValue::SharedText("hola".to_string()));
    let output = JsonUtil::to_value(parsed).expect("serialize");
    assert_eq!(output, value);
}

#[test]
fn json_from_value_returns_invalid_input_error() {
    let value = json!({ "type": "formula", "data": "=A1" });
    let err = JsonUtil::from_value::<CellValue>(value).expect_err("invalid");
    assert!(err.to_string().contains("invalid input"));
}

#[test]
fn kind_of_names_every_json_type() {
    assert_eq!(JsonUtil::kind_of(&json!(null)), "null");
    assert_eq!(JsonUtil::kind_of(&json!([1])), "array");
    assert_eq!(JsonUtil::kind_of(&json!({})), "object");
    assert_eq!(JsonUtil::kind_of(&json!(1.5)), "number");
}

#[test]
fn pretty_text_is_indented_json() {
    let text = JsonUtil::to_pretty_text(&json!({ "written": true }));
    assert!(text.contains("\n"));
    assert_eq!(serde_json::from_str::<serde_json::Value>(&text).expect("json"), json!({ "written": true }));
}
