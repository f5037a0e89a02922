use crate::isotope::IsotopeSpec;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct IsotopeFile {
    pub schema_version: String,
    pub isotopes: Vec<IsotopeSpec>,
}
