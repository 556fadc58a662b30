pub mod extract;
pub mod recognizer;

pub use extract::extract_table;
pub use recognizer::{MockRecognizer, OcrBackend, OcrError, TextImporter};
