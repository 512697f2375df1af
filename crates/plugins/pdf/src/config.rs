//! PDF adapter configuration.

use std::path::{Path, PathBuf};

use toolport_core::EnvSource;

pub const PDF_OUTPUT_DIR: &str = "PDF_OUTPUT_DIR";

#[derive(Debug, Clone, Default)]
pub struct PdfConfig {
    /// Base directory for relative output paths.
    pub output_dir: Option<PathBuf>,
}

impl PdfConfig {
    pub fn from_env(env: &EnvSource) -> Self {
        Self {
            output_dir: env.get(PDF_OUTPUT_DIR).map(PathBuf::from),
        }
    }

    /// Where `write_pdf` should put a file requested as `path`.
    pub fn resolve_output(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.output_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}
