pub mod blob;
pub mod embedding;
pub mod extraction;
pub mod files;
pub mod logging;
pub mod named_texts;
pub mod reference;
pub mod similarity;

/// Header of the column holding company names in both uploaded workbooks.
pub const COMPANY_NAME_COLUMN: &str = "Company Name";
