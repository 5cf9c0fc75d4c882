#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod pipeline;
pub mod types;
pub mod utils;

pub use pipeline::{
    DefaultPipelineServices, IngestionConfig, IngestionPipeline, IngestionTuning,
    PipelineServices, RawUpload,
};
pub use utils::sentence_segmenter::segment;
