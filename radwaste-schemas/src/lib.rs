pub mod calculation;
pub mod file_formats;
pub mod history;
pub mod isotope;
pub mod measurement;
