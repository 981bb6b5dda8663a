use std::path::Path;

use image::{Pixel, Rgba, RgbaImage};

use crate::models::search::SearchResult;

const HIGHLIGHT: Rgba<u8> = Rgba([0, 200, 0, 255]);
const HIGHLIGHT_OPACITY: f32 = 0.7;

/// Loads the image behind `result` and highlights its bounding box on a copy.
/// Returns `None` when the image is gone or cannot be decoded.
pub fn render(result: &SearchResult) -> Option<RgbaImage> {
    let path = Path::new(&result.image_path);
    if !path.exists() {
        log::debug!("no preview, {} is missing", path.display());
        return None;
    }
    let mut image = match image::open(path) {
        Ok(image) => image.to_rgba8(),
        Err(err) => {
            log::warn!("Could not load preview for {}: {err}", path.display());
            return None;
        }
    };
    highlight(&mut image, result.bounding_box());
    Some(image)
}

fn highlight(image: &mut RgbaImage, (left, top, width, height): (i64, i64, i64, i64)) {
    let x0 = left.clamp(0, i64::from(image.width()));
    let y0 = top.clamp(0, i64::from(image.height()));
    let x1 = (left + width).clamp(0, i64::from(image.width()));
    let y1 = (top + height).clamp(0, i64::from(image.height()));

    let mut overlay = HIGHLIGHT;
    overlay.0[3] = (255.0 * HIGHLIGHT_OPACITY).round() as u8;
    for y in y0..y1 {
        for x in x0..x1 {
            image.get_pixel_mut(x as u32, y as u32).blend(&overlay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_for(path: &Path, bbox: (i64, i64, i64, i64)) -> SearchResult {
        SearchResult {
            image_path: path.to_string_lossy().to_string(),
            text: "INVOICE".to_string(),
            page: None,
            document_path: None,
            left: bbox.0,
            top: bbox.1,
            width: bbox.2,
            height: bbox.3,
        }
    }

    fn white_png(dir: &Path, w: u32, h: u32) -> std::path::PathBuf {
        let path = dir.join("receipt.png");
        RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_missing_image_has_no_preview() {
        let dir = tempfile::tempdir().unwrap();
        let result = result_for(&dir.path().join("gone.png"), (0, 0, 1, 1));
        assert!(render(&result).is_none());
    }

    #[test]
    fn test_undecodable_image_has_no_preview() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        assert!(render(&result_for(&path, (0, 0, 1, 1))).is_none());
    }

    #[test]
    fn test_overlay_covers_box_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = white_png(dir.path(), 20, 20);
        let before = std::fs::read(&path).unwrap();

        let preview = render(&result_for(&path, (2, 3, 4, 5))).unwrap();
        assert_eq!(preview.dimensions(), (20, 20));

        let inside = preview.get_pixel(2, 3);
        assert!(inside[0] < 255 && inside[2] < 255);
        assert!(inside[1] > inside[0]);
        assert_eq!(preview.get_pixel(5, 7), inside);
        assert_eq!(*preview.get_pixel(6, 3), Rgba([255, 255, 255, 255]));
        assert_eq!(*preview.get_pixel(2, 8), Rgba([255, 255, 255, 255]));
        assert_eq!(*preview.get_pixel(1, 3), Rgba([255, 255, 255, 255]));

        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_box_is_clipped_to_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = white_png(dir.path(), 10, 10);

        let preview = render(&result_for(&path, (-5, 8, 50, 50))).unwrap();
        assert_ne!(*preview.get_pixel(0, 9), Rgba([255, 255, 255, 255]));
        assert_eq!(*preview.get_pixel(0, 7), Rgba([255, 255, 255, 255]));
    }
}
