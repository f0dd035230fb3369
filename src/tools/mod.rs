pub mod generate_report;
pub mod inspect_template;
pub mod list_layouts;
