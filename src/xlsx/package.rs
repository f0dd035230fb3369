use crate::common::errors::AppError;
use crate::xlsx::sheet_ref::SheetRef;
use crate::xlsx::xml_tree::XmlDocument;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tracing::debug;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";
const DEFAULT_SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const REL_OFFICE_DOCUMENT: &str = "/officeDocument";
const REL_SHARED_STRINGS: &str = "/sharedStrings";
const REL_DRAWING: &str = "/drawing";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    // Package part name, already resolved against the source part.
    pub target: String,
    pub external: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorksheetPart {
    pub index: usize,
    pub name: String,
    pub part: String,
}

/// Read-only view of a template container.
pub struct TemplatePackage {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl TemplatePackage {
    pub fn open(bytes: Vec<u8>) -> Result<Self, AppError> {
        let archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| AppError::MalformedTemplate(format!("not a zip container: {e}")))?;
        Ok(Self { archive })
    }

    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        Self::open(Self::read_template(path)?)
    }

    /// Raw template bytes; a file gone missing is `TemplateNotFound`, not an I/O failure.
    pub fn read_template(path: &Path) -> Result<Vec<u8>, AppError> {
        std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AppError::TemplateNotFound(path.display().to_string()),
            _ => AppError::IoError(e.to_string()),
        })
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.archive.index_for_name(name).is_some()
    }

    pub fn read_part(&mut self, name: &str) -> Result<Vec<u8>, AppError> {
        let mut file = self.archive.by_name(name).map_err(|e| match e {
            ZipError::FileNotFound => AppError::MalformedTemplate(format!("missing part: {name}")),
            other => AppError::ZipError(other.to_string()),
        })?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    pub fn read_xml(&mut self, name: &str) -> Result<XmlDocument, AppError> {
        let bytes = self.read_part(name)?;
        XmlDocument::parse(&bytes)
    }

    /// Relationships declared by `source_part` (an empty name means the
    /// package root). A missing relationship part yields no relationships.
    pub fn relationships(&mut self, source_part: &str) -> Result<Vec<Relationship>, AppError> {
        let rels_part = rels_part_for(source_part);
        if !self.has_part(&rels_part) {
            return Ok(Vec::new());
        }
        let doc = self.read_xml(&rels_part)?;
        let base = part_dir(source_part);

        let mut out = Vec::new();
        for rel in doc.root.children_named("Relationship") {
            let (Some(id), Some(rel_type), Some(target)) =
                (rel.attr("Id"), rel.attr("Type"), rel.attr("Target"))
            else {
                continue;
            };
            let external = rel.attr("TargetMode") == Some("External");
            out.push(Relationship {
                id: id.to_string(),
                rel_type: rel_type.to_string(),
                target: if external {
                    target.to_string()
                } else {
                    resolve_target(base, target)
                },
                external,
            });
        }
        Ok(out)
    }

    pub fn workbook_part(&mut self) -> Result<String, AppError> {
        let from_root = self
            .relationships("")?
            .into_iter()
            .find(|r| r.rel_type.ends_with(REL_OFFICE_DOCUMENT))
            .map(|r| r.target);
        let part = from_root.unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string());
        if !self.has_part(&part) {
            return Err(AppError::MalformedTemplate(format!(
                "missing workbook part: {part}"
            )));
        }
        Ok(part)
    }

    /// `(name, relationship id)` per `<sheet>` in workbook order.
    fn sheet_entries(&mut self) -> Result<Vec<(String, String)>, AppError> {
        let workbook = self.workbook_part()?;
        let doc = self.read_xml(&workbook)?;
        let sheets = doc
            .root
            .child("sheets")
            .ok_or_else(|| AppError::MalformedTemplate("workbook has no <sheets>".to_string()))?;
        Ok(sheets
            .children_named("sheet")
            .map(|s| {
                (
                    s.attr("name").unwrap_or_default().to_string(),
                    s.attr_local("id").unwrap_or_default().to_string(),
                )
            })
            .collect())
    }

    pub fn sheet_names(&mut self) -> Result<Vec<String>, AppError> {
        Ok(self.sheet_entries()?.into_iter().map(|(name, _)| name).collect())
    }

    pub fn resolve_worksheet_part(&mut self, sheet: &SheetRef) -> Result<WorksheetPart, AppError> {
        let entries = self.sheet_entries()?;
        let names: Vec<String> = entries.iter().map(|(name, _)| name.clone()).collect();
        let (index, name) = sheet.resolve_in_names(&names)?;
        let rel_id = &entries[index].1;

        let workbook = self.workbook_part()?;
        let part = self
            .relationships(&workbook)?
            .into_iter()
            .find(|r| &r.id == rel_id)
            .map(|r| r.target)
            .ok_or_else(|| {
                AppError::MalformedTemplate(format!("sheet {name:?} has no worksheet relationship"))
            })?;
        if !self.has_part(&part) {
            return Err(AppError::MalformedTemplate(format!(
                "missing worksheet part: {part}"
            )));
        }
        debug!(sheet = %name, part = %part, "resolved worksheet part");
        Ok(WorksheetPart { index, name, part })
    }

    pub fn drawing_part_for(&mut self, worksheet_part: &str) -> Result<Option<String>, AppError> {
        let part = self
            .relationships(worksheet_part)?
            .into_iter()
            .find(|r| !r.external && r.rel_type.ends_with(REL_DRAWING))
            .map(|r| r.target);
        Ok(part.filter(|p| self.has_part(p)))
    }

    pub fn shared_strings_part(&mut self) -> Result<Option<String>, AppError> {
        let workbook = self.workbook_part()?;
        let declared = self
            .relationships(&workbook)?
            .into_iter()
            .find(|r| r.rel_type.ends_with(REL_SHARED_STRINGS))
            .map(|r| r.target);
        let part = declared.unwrap_or_else(|| DEFAULT_SHARED_STRINGS_PART.to_string());
        Ok(self.has_part(&part).then_some(part))
    }

    /// Writes a new container in the template's entry order. Entries named in
    /// `replacements` are deflated with a fixed timestamp; every other entry
    /// is raw-copied so its compressed bytes stay identical.
    pub fn assemble(&mut self, replacements: &BTreeMap<String, Vec<u8>>) -> Result<Vec<u8>, AppError> {
        for name in replacements.keys() {
            if !self.has_part(name) {
                return Err(AppError::MalformedTemplate(format!(
                    "cannot replace missing part: {name}"
                )));
            }
        }

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());

        for i in 0..self.archive.len() {
            let name = self.archive.by_index_raw(i)?.name().to_string();
            match replacements.get(&name) {
                Some(bytes) => {
                    debug!(part = %name, bytes = bytes.len(), "replacing part");
                    writer.start_file(name.as_str(), deflated)?;
                    writer.write_all(bytes)?;
                }
                None => {
                    let file = self.archive.by_index_raw(i)?;
                    writer.raw_copy_file(file)?;
                }
            }
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }
}

fn part_dir(part: &str) -> &str {
    part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

pub fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None if part.is_empty() => "_rels/.rels".to_string(),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolves a relationship target to a part name: absolute targets start at
/// the package root, relative ones at the source part's folder.
pub fn resolve_target(base_dir: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None if base_dir.is_empty() => target.to_string(),
        None => format!("{base_dir}/{target}"),
    };
    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
