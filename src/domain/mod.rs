//! Domain models for documents, rule findings and validation results

pub mod document;
pub mod issues;
pub mod violations;
