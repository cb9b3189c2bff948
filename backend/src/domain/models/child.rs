use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Domain model representing a registered child.
///
/// The authorized releaser list is the safety-critical field: it is mutated
/// only through an explicit registry edit, never by attendance events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Child {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub birthdate: NaiveDate,
    /// Ordered list of full names permitted to pick this child up.
    /// Non-empty at registration time.
    pub authorized_releasers: Vec<String>,
    pub allergies: Option<String>,
    pub medical_notes: Option<String>,
    /// Unique scan token assigned at registration.
    pub barcode_id: String,
    /// Deactivated children keep their attendance history but are invisible
    /// to the barcode resolver.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Child {
    /// Generate a unique ID for a child
    pub fn generate_id(timestamp_millis: u64) -> String {
        format!("child::{}", timestamp_millis)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Age in whole years on the given date. Derived, never stored.
    pub fn age_on(&self, date: NaiveDate) -> u32 {
        let mut age = date.year() - self.birthdate.year();
        if (date.month(), date.day()) < (self.birthdate.month(), self.birthdate.day()) {
            age -= 1;
        }
        age.max(0) as u32
    }

    /// Membership check against the authorized releaser list.
    ///
    /// Case-insensitive and whitespace-trimmed, but NOT fuzzy: a false
    /// negative forces a logged override, a false positive would release a
    /// child to the wrong person.
    pub fn is_authorized_releaser(&self, name: &str) -> bool {
        let needle = normalize_name(name);
        self.authorized_releasers
            .iter()
            .any(|r| normalize_name(r) == needle)
    }
}

/// Normalization applied to names before authorization comparison.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_child() -> Child {
        let now = Utc::now();
        Child {
            id: "child::1".to_string(),
            first_name: "Emma".to_string(),
            last_name: "Smith".to_string(),
            birthdate: NaiveDate::from_ymd_opt(2018, 6, 15).unwrap(),
            authorized_releasers: vec!["Sarah Johnson".to_string(), "Mike Johnson".to_string()],
            allergies: None,
            medical_notes: None,
            barcode_id: "JC2024001".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_authorized_releaser_exact_match() {
        let child = sample_child();
        assert!(child.is_authorized_releaser("Sarah Johnson"));
        assert!(child.is_authorized_releaser("Mike Johnson"));
    }

    #[test]
    fn test_authorized_releaser_normalizes_case_and_whitespace() {
        let child = sample_child();
        assert!(child.is_authorized_releaser("  sarah johnson "));
        assert!(child.is_authorized_releaser("MIKE JOHNSON"));
    }

    #[test]
    fn test_authorized_releaser_is_not_fuzzy() {
        let child = sample_child();
        assert!(!child.is_authorized_releaser("Sara Johnson"));
        assert!(!child.is_authorized_releaser("Sarah Johnsen"));
        assert!(!child.is_authorized_releaser("Unknown Person"));
    }

    #[test]
    fn test_age_on() {
        let child = sample_child();
        let before_birthday = NaiveDate::from_ymd_opt(2024, 6, 14).unwrap();
        let on_birthday = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert_eq!(child.age_on(before_birthday), 5);
        assert_eq!(child.age_on(on_birthday), 6);
    }
}
