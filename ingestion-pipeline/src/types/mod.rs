pub mod analysis_response;
