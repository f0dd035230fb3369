use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("template not found: {0}")]
    TemplateNotFound(String),
    #[error("file already exists: {0}")]
    AlreadyExists(String),
    #[error("malformed template: {0}")]
    MalformedTemplate(String),
    #[error("layout not found: {0}")]
    LayoutNotFound(String),
    #[error("sheet not found: {0}")]
    SheetNotFound(String),
    #[error("invalid cell address: {0}")]
    InvalidCellAddress(String),
    #[error("xml parse error: {0}")]
    XmlParseError(String),
    #[error("zip error: {0}")]
    ZipError(String),
    #[error("io error: {0}")]
    IoError(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl AppError {
    pub fn code(&self) -> i32 {
        match self {
            AppError::InvalidPath(_) => 1001,
            AppError::TemplateNotFound(_) => 1002,
            AppError::AlreadyExists(_) => 1003,
            AppError::MalformedTemplate(_) => 1004,
            AppError::LayoutNotFound(_) => 1005,
            AppError::SheetNotFound(_) => 1006,
            AppError::InvalidCellAddress(_) => 1007,
            AppError::XmlParseError(_) => 1008,
            AppError::ZipError(_) => 1009,
            AppError::IoError(_) => 1010,
            AppError::InvalidInput(_) => 1011,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidPath(_) => "invalid_path",
            AppError::TemplateNotFound(_) => "template_not_found",
            AppError::AlreadyExists(_) => "already_exists",
            AppError::MalformedTemplate(_) => "malformed_template",
            AppError::LayoutNotFound(_) => "layout_not_found",
            AppError::SheetNotFound(_) => "sheet_not_found",
            AppError::InvalidCellAddress(_) => "invalid_cell_address",
            AppError::XmlParseError(_) => "xml_parse_error",
            AppError::ZipError(_) => "zip_error",
            AppError::IoError(_) => "io_error",
            AppError::InvalidInput(_) => "invalid_input",
        }
    }

    /// Caller errors are not worth retrying; everything else aborts generation
    /// because the template or the environment is broken.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidInput(_)
                | AppError::InvalidCellAddress(_)
                | AppError::InvalidPath(_)
                | AppError::AlreadyExists(_)
                | AppError::LayoutNotFound(_)
                | AppError::SheetNotFound(_)
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::IoError(value.to_string())
    }
}

impl From<zip::result::ZipError> for AppError {
    fn from(value: zip::result::ZipError) -> Self {
        Self::ZipError(value.to_string())
    }
}

impl From<quick_xml::Error> for AppError {
    fn from(value: quick_xml::Error) -> Self {
        Self::XmlParseError(value.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for AppError {
    fn from(value: quick_xml::events::attributes::AttrError) -> Self {
        Self::XmlParseError(value.to_string())
    }
}
