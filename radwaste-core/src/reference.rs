//! The isotope reference table consulted by the engine.

use crate::error::{Problem, RadwasteError, ValidationErrors};
use radwaste_schemas::{file_formats::IsotopeFile, isotope::IsotopeSpec, measurement::MeasurementField};
use std::{fs, path::Path};

/// (id, display name, gamma constant µSv·m²·MBq⁻¹·hr⁻¹, half-life hours)
const BUILTIN_ISOTOPES: [(&str, &str, f64, f64); 6] = [
    ("tc99m", "Tc-99m", 0.033, 6.0),
    ("f18", "F-18", 0.188, 1.83),
    ("i131", "I-131", 0.0594, 192.96),
    ("sm153", "Sm-153", 0.0227, 46.5),
    ("re186", "Re-186", 0.00454, 89.28),
    ("lu177", "Lu-177", 0.00764, 161.52),
];

/// Read-only catalogue of isotopes, kept in insertion order for listing.
#[derive(Debug, Clone)]
pub struct IsotopeTable {
    entries: Vec<IsotopeSpec>,
}

impl Default for IsotopeTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl IsotopeTable {
    /// The six isotopes commonly handled in nuclear medicine waste.
    pub fn builtin() -> Self {
        let entries = BUILTIN_ISOTOPES
            .iter()
            .map(|&(id, name, gamma, half_life)| IsotopeSpec::new(id, name, gamma, half_life))
            .collect();
        Self { entries }
    }

    pub fn lookup(&self, isotope_id: &str) -> Result<&IsotopeSpec, RadwasteError> {
        self.entries
            .iter()
            .find(|spec| spec.isotope_id.eq_ignore_ascii_case(isotope_id.trim()))
            .ok_or_else(|| RadwasteError::UnknownIsotope(isotope_id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &IsotopeSpec> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merges additional specs into the table. An entry whose id already exists replaces it.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if any spec has a blank id or a non-positive gamma constant or half-life;
    /// in that case the table is left unchanged.
    pub fn extend(&mut self, specs: Vec<IsotopeSpec>) -> Result<(), RadwasteError> {
        let mut errors = ValidationErrors::new();
        for spec in &specs {
            if spec.isotope_id.trim().is_empty() {
                errors.push(MeasurementField::IsotopeId, Problem::Missing);
            }
            errors.check_positive(MeasurementField::GammaConstant, Some(spec.gamma_constant));
            errors.check_positive(MeasurementField::HalfLifeHours, Some(spec.half_life_hours));
        }
        errors.into_result()?;

        for spec in specs {
            match self
                .entries
                .iter_mut()
                .find(|e| e.isotope_id.eq_ignore_ascii_case(&spec.isotope_id))
            {
                Some(existing) => {
                    log::debug!("Replacing isotope '{}' from catalogue file", spec.isotope_id);
                    *existing = spec;
                }
                None => {
                    log::debug!("Adding isotope '{}' from catalogue file", spec.isotope_id);
                    self.entries.push(spec);
                }
            }
        }
        Ok(())
    }

    /// Loads a catalogue YAML file and merges its entries over this table.
    pub fn extend_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), RadwasteError> {
        let path_str = path.as_ref().display().to_string();
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| RadwasteError::FileIO(path_str.clone(), e))?;
        let file: IsotopeFile = serde_yaml::from_str(&content)
            .map_err(|e| RadwasteError::YamlParsing(path_str.clone(), e))?;
        log::info!(
            "Loaded {} isotopes from '{}' (schema {})",
            file.isotopes.len(),
            path_str,
            file.schema_version
        );
        self.extend(file.isotopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_has_six_entries_in_order() {
        let table = IsotopeTable::builtin();
        let ids: Vec<&str> = table.iter().map(|s| s.isotope_id.as_str()).collect();
        assert_eq!(ids, vec!["tc99m", "f18", "i131", "sm153", "re186", "lu177"]);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let table = IsotopeTable::builtin();
        let f18 = table.lookup("F18").unwrap();
        assert_eq!(f18.display_name, "F-18");
        assert_eq!(f18.gamma_constant, 0.188);
        assert_eq!(f18.half_life_hours, 1.83);
    }

    #[test]
    fn lookup_unknown_isotope_fails() {
        let table = IsotopeTable::builtin();
        match table.lookup("co60") {
            Err(RadwasteError::UnknownIsotope(id)) => assert_eq!(id, "co60"),
            other => panic!("expected UnknownIsotope, got {:?}", other),
        }
    }

    #[test]
    fn extend_replaces_and_appends() {
        let mut table = IsotopeTable::builtin();
        table
            .extend(vec![
                IsotopeSpec::new("f18", "F-18 (revised)", 0.143, 1.8295),
                IsotopeSpec::new("ga68", "Ga-68", 0.134, 1.13),
            ])
            .unwrap();
        assert_eq!(table.len(), 7);
        assert_eq!(table.lookup("f18").unwrap().gamma_constant, 0.143);
        assert_eq!(table.lookup("ga68").unwrap().half_life_hours, 1.13);
    }

    #[test]
    fn extend_rejects_invalid_specs_atomically() {
        let mut table = IsotopeTable::builtin();
        let err = table
            .extend(vec![
                IsotopeSpec::new("ga68", "Ga-68", 0.134, 1.13),
                IsotopeSpec::new("bad", "Bad", 0.0, -2.0),
            ])
            .unwrap_err();
        match err {
            RadwasteError::Validation(errors) => {
                assert!(errors.contains(MeasurementField::GammaConstant));
                assert!(errors.contains(MeasurementField::HalfLifeHours));
            }
            other => panic!("expected Validation, got {:?}", other),
        }
        assert_eq!(table.len(), 6);
        assert!(table.lookup("ga68").is_err());
    }

    #[test]
    fn extend_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extra.yaml");
        fs::write(
            &path,
            "schema_version: \"1\"\nisotopes:\n  - isotope_id: ga68\n    display_name: Ga-68\n    gamma_constant: 0.134\n    half_life_hours: 1.13\n",
        )
        .unwrap();
        let mut table = IsotopeTable::builtin();
        table.extend_from_file(&path).unwrap();
        assert_eq!(table.lookup("ga68").unwrap().display_name, "Ga-68");
    }
}
