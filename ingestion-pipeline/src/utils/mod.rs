pub mod analysis_client;
pub mod file_text_extraction;
pub mod sentence_segmenter;
