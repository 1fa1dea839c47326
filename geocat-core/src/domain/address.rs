//! Address domain model

use serde::{Deserialize, Serialize};

/// A postal address owned by a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Storage identifier, 0 until persisted
    #[serde(default)]
    pub id: i32,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
}

impl Address {
    /// Create a blank, unsaved address
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_zip(mut self, zip: impl Into<String>) -> Self {
        self.zip = Some(zip.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// True when every field is empty
    pub fn is_blank(&self) -> bool {
        self.address.is_none()
            && self.city.is_none()
            && self.state.is_none()
            && self.zip.is_none()
            && self.country.is_none()
    }

    /// Copy data from `other` into this address.
    ///
    /// With `merge_null_data` every field is overwritten, otherwise only the
    /// fields `other` actually has. The id is left alone.
    pub fn merge_address(&mut self, other: &Address, merge_null_data: bool) {
        merge_field(&mut self.address, &other.address, merge_null_data);
        merge_field(&mut self.city, &other.city, merge_null_data);
        merge_field(&mut self.state, &other.state, merge_null_data);
        merge_field(&mut self.zip, &other.zip, merge_null_data);
        merge_field(&mut self.country, &other.country, merge_null_data);
    }
}

/// Null policy shared by every merge routine in the domain
pub(crate) fn merge_field<T: Clone>(target: &mut Option<T>, source: &Option<T>, merge_null_data: bool) {
    if merge_null_data || source.is_some() {
        *target = source.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_existing_when_source_missing() {
        let mut addr = Address::new().with_city("Rome").with_zip("00153");
        let other = Address::new().with_city("Bern");

        addr.merge_address(&other, false);

        assert_eq!(addr.city.as_deref(), Some("Bern"));
        assert_eq!(addr.zip.as_deref(), Some("00153"));
    }

    #[test]
    fn test_merge_null_data_clears_fields() {
        let mut addr = Address::new().with_city("Rome").with_zip("00153");
        let other = Address::new().with_country("IT");

        addr.merge_address(&other, true);

        assert!(addr.city.is_none());
        assert!(addr.zip.is_none());
        assert_eq!(addr.country.as_deref(), Some("IT"));
    }

    #[test]
    fn test_merge_never_copies_id() {
        let mut addr = Address { id: 4, ..Address::new() };
        let other = Address { id: 9, ..Address::new() };
        addr.merge_address(&other, true);
        assert_eq!(addr.id, 4);
    }

    #[test]
    fn test_blank() {
        assert!(Address::new().is_blank());
        assert!(!Address::new().with_state("VD").is_blank());
    }
}
