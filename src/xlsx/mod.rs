pub mod builtin_layouts;
pub mod cell_address;
pub mod cell_writer;
pub mod drawing;
pub mod engine;
pub mod layout;
pub mod merge_regions;
pub mod package;
pub mod payload;
pub mod row_region;
pub mod shared_strings;
pub mod sheet_ranges;
pub mod sheet_ref;
pub mod worksheet;
pub mod xml_tree;
