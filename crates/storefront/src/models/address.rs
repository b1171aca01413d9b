//! Saved shipping addresses.

use kec_core::{AddressId, ContactForm, UserId};

/// A saved address in a user's address book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub label: String,
    pub full_name: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    pub postal_code: String,
    pub is_default: bool,
}

impl Address {
    /// Apply this address over a submitted checkout form.
    #[must_use]
    pub fn overlay(&self, form: &ContactForm) -> ContactForm {
        form.with_saved_address(
            &self.full_name,
            &self.phone,
            &self.address_line,
            &self.city,
            &self.postal_code,
        )
    }
}
