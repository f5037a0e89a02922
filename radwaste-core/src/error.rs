use radwaste_schemas::measurement::MeasurementField;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RadwasteError {
    #[error("Invalid measurement: {0}")]
    Validation(ValidationErrors),

    #[error("Isotope '{0}' not found in the reference table")]
    UnknownIsotope(String),

    #[error("Half-life must be a positive number of hours, got {0}")]
    InvalidHalfLife(f64),

    #[error("Measurement distance must be a positive number of metres, got {0}")]
    InvalidDistance(f64),

    #[error("Gamma constant must be positive, got {0}")]
    InvalidGammaConstant(f64),

    #[error("Computation of {0} produced a non-finite value")]
    NonFiniteValue(&'static str),

    #[error("No value stored under key '{0}'")]
    KeyNotFound(String),

    #[error("I/O error for file '{0}': {1}")]
    FileIO(String, #[source] std::io::Error),

    #[error("Failed to parse YAML from '{0}': {1}")]
    YamlParsing(String, #[source] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Failed to write CSV to '{0}': {1}")]
    CsvError(String, #[source] csv::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Problem {
    Missing,
    NotPositive,
    NotFinite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: MeasurementField,
    pub problem: Problem,
}

/// Every rejected field of a measurement, in the order the fields were checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: MeasurementField, problem: Problem) {
        self.violations.push(FieldViolation { field, problem });
    }

    /// Records a violation if `value` is absent, non-finite or not strictly positive.
    pub fn check_positive(&mut self, field: MeasurementField, value: Option<f64>) {
        match value {
            None => self.push(field, Problem::Missing),
            Some(v) if !v.is_finite() => self.push(field, Problem::NotFinite),
            Some(v) if v <= 0.0 => self.push(field, Problem::NotPositive),
            Some(_) => {}
        }
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    pub fn fields(&self) -> Vec<MeasurementField> {
        self.violations.iter().map(|v| v.field).collect()
    }

    pub fn contains(&self, field: MeasurementField) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Turns a non-empty collection into an error.
    pub fn into_result(self) -> Result<(), RadwasteError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(RadwasteError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .violations
            .iter()
            .map(|v| {
                let problem = match v.problem {
                    Problem::Missing => "is missing",
                    Problem::NotPositive => "must be greater than zero",
                    Problem::NotFinite => "must be a finite number",
                };
                format!("{} {}", v.field, problem)
            })
            .collect();
        f.write_str(&parts.join("; "))
    }
}

pub type RadwasteResult<T> = Result<T, RadwasteError>;
