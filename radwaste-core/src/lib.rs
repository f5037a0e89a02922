//! Activity, density and decay calculations for radioactive waste samples,
//! plus the history store and CSV export built around them.

pub mod calculation;
pub mod error;
pub mod export;
pub mod history;
pub mod reference;
pub mod storage;

pub use calculation::{
    builder::MeasurementBuilder,
    engine::{compute_result, decayed_activity, derive_activity_from_dose, exposure_rate},
};
pub use error::{RadwasteError, RadwasteResult};
pub use reference::IsotopeTable;
