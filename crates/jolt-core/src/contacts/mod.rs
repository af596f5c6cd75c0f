//! Emergency contacts.
//!
//! - [`phone`]: regional mobile number validation
//! - [`ContactRegistry`]: ordered, validated, duplicate-free contact list
//! - [`KeyValueStore`]: persistence seam; the registry is saved as one
//!   delimited string under [`CONTACTS_KEY`]

pub mod phone;
mod registry;
mod store;

pub use registry::ContactRegistry;
pub use store::{KeyValueStore, MemoryStore, CONTACTS_KEY};

use serde::{Deserialize, Serialize};

use crate::error::InvalidContact;

/// Separator between entries in the persisted list.
pub(crate) const ENTRY_DELIMITER: &str = ", ";
/// Separator between name and number inside one entry.
pub(crate) const FIELD_DELIMITER: &str = ": ";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub phone_number: String,
}

impl Contact {
    /// Validate and normalize a contact.
    ///
    /// The name is trimmed; the number is stored without separators.
    ///
    /// # Errors
    /// Returns [`InvalidContact`] for an empty name, a name containing a
    /// store delimiter, or a number failing [`phone::validate`].
    pub fn new(name: &str, phone_number: &str) -> Result<Self, InvalidContact> {
        let name = name.trim();
        if name.is_empty() {
            return Err(InvalidContact::EmptyName);
        }
        if let Some(ch) = name.chars().find(|c| *c == ',' || *c == ':') {
            return Err(InvalidContact::ReservedCharacter {
                name: name.to_string(),
                ch,
            });
        }
        if !phone::validate(phone_number) {
            return Err(InvalidContact::InvalidNumber(phone_number.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            phone_number: phone::normalize(phone_number),
        })
    }

    /// Number with everything but the area code hidden, e.g. `(863) XXX-XXXX`.
    pub fn masked_number(&self) -> String {
        let prefix: String = self.phone_number.chars().take(3).collect();
        format!("({prefix}) XXX-XXXX")
    }

    pub(crate) fn to_entry(&self) -> String {
        format!("{}{FIELD_DELIMITER}{}", self.name, self.phone_number)
    }

    pub(crate) fn from_entry(entry: &str) -> Result<Self, InvalidContact> {
        let (name, number) = entry
            .split_once(FIELD_DELIMITER)
            .ok_or_else(|| InvalidContact::InvalidNumber(entry.to_string()))?;
        Self::new(name, number)
    }
}

impl std::fmt::Display for Contact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.masked_number())
    }
}
