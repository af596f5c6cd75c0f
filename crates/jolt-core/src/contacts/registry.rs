use crate::error::{ContactError, CoreError};

use super::store::{KeyValueStore, CONTACTS_KEY};
use super::{Contact, ENTRY_DELIMITER};

/// Ordered list of emergency contacts.
///
/// Insertion order is preserved so the display order stays stable. Every
/// mutation validates first and only then touches the list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactRegistry {
    contacts: Vec<Contact>,
}

impl ContactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a contact at the end of the list.
    ///
    /// # Errors
    /// [`ContactError::Invalid`] if the contact fails validation,
    /// [`ContactError::Duplicate`] if the same name and number already exist.
    pub fn add(&mut self, contact: Contact) -> Result<(), ContactError> {
        let contact = Contact::new(&contact.name, &contact.phone_number)?;
        if self.position(&contact).is_some() {
            return Err(duplicate(&contact));
        }
        tracing::debug!(name = %contact.name, "contact added");
        self.contacts.push(contact);
        Ok(())
    }

    /// Remove a contact. Returns whether anything was removed.
    pub fn remove(&mut self, contact: &Contact) -> bool {
        let Ok(contact) = Contact::new(&contact.name, &contact.phone_number) else {
            return false;
        };
        match self.position(&contact) {
            Some(index) => {
                self.contacts.remove(index);
                true
            }
            None => false,
        }
    }

    /// Replace `old` with `new`, keeping its position.
    ///
    /// # Errors
    /// [`ContactError::Invalid`] if `new` fails validation,
    /// [`ContactError::NotFound`] if `old` is not registered,
    /// [`ContactError::Duplicate`] if `new` matches a different existing entry.
    pub fn update(&mut self, old: &Contact, new: Contact) -> Result<(), ContactError> {
        let new = Contact::new(&new.name, &new.phone_number)?;
        let index = Contact::new(&old.name, &old.phone_number)
            .ok()
            .and_then(|old| self.position(&old))
            .ok_or_else(|| ContactError::NotFound {
                name: old.name.clone(),
            })?;
        if matches!(self.position(&new), Some(existing) if existing != index) {
            return Err(duplicate(&new));
        }
        self.contacts[index] = new;
        Ok(())
    }

    pub fn list(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// First contact in display order, the dial target in single-number mode.
    pub fn primary(&self) -> Option<&Contact> {
        self.contacts.first()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Contact> {
        let name = name.trim();
        self.contacts.iter().find(|c| c.name == name)
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Serialize as `"Name: 9876543210, Other: 8765432109"`.
    pub fn to_delimited(&self) -> String {
        self.contacts
            .iter()
            .map(Contact::to_entry)
            .collect::<Vec<_>>()
            .join(ENTRY_DELIMITER)
    }

    /// Parse the delimited form. Malformed or duplicate entries are skipped.
    pub fn from_delimited(raw: &str) -> Self {
        let mut registry = Self::new();
        for entry in raw.split(ENTRY_DELIMITER).filter(|e| !e.trim().is_empty()) {
            let parsed = Contact::from_entry(entry)
                .map_err(ContactError::from)
                .and_then(|contact| registry.add(contact));
            if let Err(e) = parsed {
                tracing::warn!(entry, error = %e, "skipping stored contact");
            }
        }
        registry
    }

    /// Load the registry from a store. A missing key is an empty registry.
    ///
    /// # Errors
    /// Returns an error only if the store itself fails.
    pub fn load(store: &dyn KeyValueStore) -> Result<Self, CoreError> {
        Ok(store
            .get(CONTACTS_KEY)?
            .map(|raw| Self::from_delimited(&raw))
            .unwrap_or_default())
    }

    /// Persist the whole list.
    ///
    /// # Errors
    /// Returns an error if the store write fails.
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), CoreError> {
        store.set(CONTACTS_KEY, &self.to_delimited())
    }

    fn position(&self, contact: &Contact) -> Option<usize> {
        self.contacts.iter().position(|c| c == contact)
    }
}

fn duplicate(contact: &Contact) -> ContactError {
    ContactError::Duplicate {
        name: contact.name.clone(),
        phone_number: contact.phone_number.clone(),
    }
}
