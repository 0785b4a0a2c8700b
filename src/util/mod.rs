pub mod adf;
pub mod dev_summary;
