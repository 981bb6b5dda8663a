use std::path::{Path, PathBuf};
use std::process::Command;

use image::DynamicImage;

use crate::error::AppError;

const PDFTOPPM_BIN: &str = "pdftoppm";

/// Turns a PDF into one raster image per page, in document order.
pub trait PdfRasterizer: Send {
    fn rasterize(&self, pdf_path: &Path, dpi: u32) -> Result<Vec<DynamicImage>, AppError>;
}

/// Rasterizes through poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    program: PathBuf,
}

impl PdftoppmRasterizer {
    /// `path` may name the executable or the directory that contains it.
    pub fn new(path: Option<&Path>) -> Self {
        let program = match path {
            Some(p) if p.is_dir() => p.join(PDFTOPPM_BIN),
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(PDFTOPPM_BIN),
        };
        Self { program }
    }
}

fn page_number(path: &Path) -> Option<u32> {
    path.file_stem()?
        .to_str()?
        .rsplit('-')
        .next()?
        .parse()
        .ok()
}

impl PdfRasterizer for PdftoppmRasterizer {
    fn rasterize(&self, pdf_path: &Path, dpi: u32) -> Result<Vec<DynamicImage>, AppError> {
        let out_dir = tempfile::tempdir()?;
        let prefix = out_dir.path().join("page");

        let output = Command::new(&self.program)
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-png")
            .arg(pdf_path)
            .arg(&prefix)
            .output()
            .map_err(|e| {
                AppError::Rasterizer(format!("failed to run {}: {e}", self.program.display()))
            })?;
        if !output.status.success() {
            return Err(AppError::Rasterizer(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        // pdftoppm zero-pads page numbers to the width of the page count
        let mut pages: Vec<(u32, PathBuf)> = std::fs::read_dir(out_dir.path())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter_map(|path| page_number(&path).map(|n| (n, path)))
            .collect();
        pages.sort_by_key(|(n, _)| *n);

        if pages.is_empty() {
            return Err(AppError::Rasterizer(format!(
                "no pages produced for {}",
                pdf_path.display()
            )));
        }

        pages
            .into_iter()
            .map(|(_, path)| image::open(&path).map_err(AppError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_number_from_output_name() {
        assert_eq!(page_number(Path::new("/tmp/x/page-1.png")), Some(1));
        assert_eq!(page_number(Path::new("/tmp/x/page-012.png")), Some(12));
        assert_eq!(page_number(Path::new("/tmp/x/page.png")), None);
    }

    #[test]
    fn test_rasterizer_resolves_program() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            PdftoppmRasterizer::new(Some(dir.path())).program,
            dir.path().join("pdftoppm")
        );
        assert_eq!(
            PdftoppmRasterizer::new(Some(Path::new("/opt/poppler/pdftoppm"))).program,
            PathBuf::from("/opt/poppler/pdftoppm")
        );
        assert_eq!(PdftoppmRasterizer::new(None).program, PathBuf::from("pdftoppm"));
    }

    #[test]
    fn test_missing_program_is_a_rasterizer_error() {
        let rasterizer =
            PdftoppmRasterizer::new(Some(Path::new("/nonexistent/receipts/pdftoppm")));
        let err = rasterizer
            .rasterize(Path::new("/nonexistent/scan.pdf"), 72)
            .unwrap_err();
        assert!(matches!(err, AppError::Rasterizer(_)));
    }
}
