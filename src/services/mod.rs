pub mod analysis;
pub mod learning_path;
pub mod llm_provider;
pub mod prompt;
pub mod result_mapper;
