pub mod indexing_service;
pub mod ocr_service;
pub mod pdf_service;
pub mod preview_service;
pub mod scan_service;
pub mod search_service;
