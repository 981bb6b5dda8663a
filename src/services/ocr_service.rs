use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::models::fragment::TextFragment;
use crate::models::settings::{AppConfig, OcrEngineKind};
use crate::services::pdf_service::{PdfRasterizer, PdftoppmRasterizer};

const OCR_LANGUAGE: &str = "eng";

/// Recognizes text tokens in the raster image stored at `image_path`.
/// Coordinates are pixels of that image. Blank tokens may be returned; the
/// extractor drops them.
pub trait TextRecognizer: Send {
    fn recognize(&self, image_path: &Path) -> Result<Vec<TextFragment>, AppError>;
}

/// Word-level recognition through libtesseract.
#[derive(Debug, Clone, Default)]
pub struct TesseractRecognizer {
    tessdata: Option<PathBuf>,
}

impl TesseractRecognizer {
    /// `tessdata` overrides the directory holding the language data.
    pub fn new(tessdata: Option<&Path>) -> Self {
        Self {
            tessdata: tessdata.map(Path::to_path_buf),
        }
    }
}

/// Parses tesseract's TSV rows:
/// `level page block par line word left top width height conf text`.
/// A header line, when present, is ignored like any other non-numeric row.
pub fn parse_tsv(tsv: &str) -> Vec<TextFragment> {
    tsv.lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.splitn(12, '\t').collect();
            if cols.len() < 12 {
                return None;
            }
            let num = |i: usize| cols[i].trim().parse::<i64>().ok();
            let fragment = TextFragment::new(cols[11], num(6)?, num(7)?, num(8)?, num(9)?);
            (!fragment.is_blank()).then_some(fragment)
        })
        .collect()
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image_path: &Path) -> Result<Vec<TextFragment>, AppError> {
        let data_path = self
            .tessdata
            .as_ref()
            .map(|dir| dir.to_string_lossy().to_string());
        let mut lt = leptess::LepTess::new(data_path.as_deref(), OCR_LANGUAGE)
            .map_err(|e| AppError::Ocr(format!("init failed: {e}")))?;
        lt.set_image(image_path).map_err(|e| {
            AppError::Ocr(format!("set_image failed for {}: {e}", image_path.display()))
        })?;
        let tsv = lt
            .get_tsv_text(0)
            .map_err(|e| AppError::Ocr(format!("get_tsv_text failed: {e}")))?;
        Ok(parse_tsv(&tsv))
    }
}

type RecognizerCtor = fn(&AppConfig) -> Box<dyn TextRecognizer>;

fn tesseract_recognizer(config: &AppConfig) -> Box<dyn TextRecognizer> {
    Box::new(TesseractRecognizer::new(config.tessdata_path.as_deref()))
}

const RECOGNIZERS: &[(OcrEngineKind, RecognizerCtor)] =
    &[(OcrEngineKind::Tesseract, tesseract_recognizer)];

/// Builds the recognizer the configuration names.
pub fn recognizer_for(config: &AppConfig) -> Result<Box<dyn TextRecognizer>, AppError> {
    let kind = config
        .ocr_engine
        .parse::<OcrEngineKind>()
        .map_err(|reason| AppError::InvalidSetting {
            key: crate::models::settings::OCR_ENGINE_KEY.to_string(),
            reason,
        })?;
    let ctor = RECOGNIZERS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, ctor)| *ctor)
        .ok_or_else(|| AppError::General(format!("no recognizer registered for {kind}")))?;
    Ok(ctor(config))
}

/// The atomic unit handed to OCR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Image {
        path: PathBuf,
    },
    PdfPage {
        document: PathBuf,
        page: u32,
        path: PathBuf,
    },
}

impl ImageSource {
    /// Where the pixels live; this is the path stored in `images.path`.
    pub fn image_path(&self) -> &Path {
        match self {
            Self::Image { path } | Self::PdfPage { path, .. } => path,
        }
    }
}

/// Deterministic location of a generated page image.
pub fn page_image_path(pages_dir: &Path, pdf_path: &Path, page: u32) -> PathBuf {
    let digest = Sha256::digest(pdf_path.to_string_lossy().as_bytes());
    pages_dir.join(format!("{}_{page}.png", hex::encode(digest)))
}

pub struct OcrExtractor {
    recognizer: Box<dyn TextRecognizer>,
    rasterizer: Box<dyn PdfRasterizer>,
    pages_dir: PathBuf,
    dpi: u32,
}

impl OcrExtractor {
    pub fn new(
        recognizer: Box<dyn TextRecognizer>,
        rasterizer: Box<dyn PdfRasterizer>,
        pages_dir: PathBuf,
        dpi: u32,
    ) -> Self {
        Self {
            recognizer,
            rasterizer,
            pages_dir,
            dpi,
        }
    }

    pub fn from_config(config: &AppConfig, pages_dir: PathBuf) -> Result<Self, AppError> {
        Ok(Self::new(
            recognizer_for(config)?,
            Box::new(PdftoppmRasterizer::new(config.pdftoppm_path.as_deref())),
            pages_dir,
            config.pdf_dpi,
        ))
    }

    /// Rasterizes every page of `pdf_path` and stores each one under the pages
    /// directory. Pages already on disk are left untouched.
    pub fn rasterize_pdf(&self, pdf_path: &Path) -> Result<Vec<ImageSource>, AppError> {
        let pages = self.rasterizer.rasterize(pdf_path, self.dpi)?;
        std::fs::create_dir_all(&self.pages_dir)?;

        let mut sources = Vec::with_capacity(pages.len());
        for (index, page_image) in pages.into_iter().enumerate() {
            let page = index as u32 + 1;
            let path = page_image_path(&self.pages_dir, pdf_path, page);
            if !path.exists() {
                page_image.save_with_format(&path, image::ImageFormat::Png)?;
            }
            sources.push(ImageSource::PdfPage {
                document: pdf_path.to_path_buf(),
                page,
                path,
            });
        }
        Ok(sources)
    }

    /// Runs OCR on one source and keeps only non-blank tokens.
    pub fn extract(&self, source: &ImageSource) -> Result<Vec<TextFragment>, AppError> {
        let fragments = self.recognizer.recognize(source.image_path())?;
        Ok(fragments.into_iter().filter(|f| !f.is_blank()).collect())
    }
}
