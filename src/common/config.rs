use crate::common::errors::AppError;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

pub const TEMPLATE_DIRS_VAR: &str = "XLSX_TEMPLATE_DIRS";

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub template_dirs: Vec<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_template_dirs_var(std::env::var_os(TEMPLATE_DIRS_VAR).as_deref())
    }

    pub fn from_template_dirs_var(raw: Option<&std::ffi::OsStr>) -> Self {
        let mut template_dirs: Vec<PathBuf> = raw
            .map(|value| std::env::split_paths(value).collect())
            .unwrap_or_default();
        template_dirs.retain(|p| !p.as_os_str().is_empty());
        if template_dirs.is_empty() {
            template_dirs = vec![PathBuf::from("templates"), PathBuf::from("app/templates")];
        }
        Self { template_dirs }
    }

    /// Installs the process-wide configuration. Called once from `main` before
    /// the server loop; later calls keep the first value.
    pub fn install(config: AppConfig) -> &'static AppConfig {
        CONFIG.get_or_init(|| config)
    }

    pub fn current() -> &'static AppConfig {
        CONFIG.get_or_init(Self::from_env)
    }

    pub fn locator(&self) -> TemplateLocator {
        TemplateLocator::new(self.template_dirs.clone())
    }
}

#[derive(Debug, Clone)]
pub struct TemplateLocator {
    search_dirs: Vec<PathBuf>,
}

impl TemplateLocator {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }

    pub fn resolve(&self, template: &str) -> Result<PathBuf, AppError> {
        if template.trim().is_empty() {
            return Err(AppError::InvalidInput("template name is empty".to_string()));
        }
        let direct = Path::new(template);
        if direct.is_file() {
            return Ok(direct.to_path_buf());
        }

        let cwd = std::env::current_dir()?;
        let mut tried = Vec::with_capacity(self.search_dirs.len());
        for dir in &self.search_dirs {
            let base = if dir.is_absolute() {
                dir.clone()
            } else {
                cwd.join(dir)
            };
            let candidate = base.join(template);
            debug!(candidate = %candidate.display(), "probing template location");
            if candidate.is_file() {
                return Ok(candidate);
            }
            tried.push(base.display().to_string());
        }

        Err(AppError::TemplateNotFound(format!(
            "{template} (searched: {})",
            tried.join(", ")
        )))
    }
}
