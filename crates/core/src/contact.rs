//! Contact and shipping details captured at order time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Email;

/// Maximum lengths of the snapshot columns on `store.order`.
pub mod limits {
    pub const FULL_NAME: usize = 200;
    pub const PHONE: usize = 15;
    pub const CITY: usize = 100;
    pub const POSTAL_CODE: usize = 10;
    pub const ADDRESS: usize = 1000;
    pub const NOTES: usize = 2000;
}

/// Per-field validation messages, keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    /// Record an error for a field. The first error per field wins.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Message for a field, if it failed.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Field names that failed, in sorted order.
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

/// Raw contact fields as submitted by a checkout form.
///
/// Every field is optional here; [`ContactForm::validate`] decides what is
/// missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ContactForm {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    #[serde(alias = "pincode")]
    pub postal_code: Option<String>,
    pub notes: Option<String>,
}

/// A complete, validated contact record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub full_name: String,
    pub email: Email,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub notes: Option<String>,
}

impl ContactForm {
    /// Validate the form into [`ContactDetails`].
    ///
    /// # Errors
    ///
    /// Returns every failing field at once so the form can be re-rendered
    /// with all messages.
    pub fn validate(&self) -> Result<ContactDetails, FieldErrors> {
        let mut errors = FieldErrors::default();

        let full_name = required(&mut errors, "full_name", self.full_name.as_deref(), limits::FULL_NAME);
        let phone = required(&mut errors, "phone", self.phone.as_deref(), limits::PHONE);
        let address = required(&mut errors, "address", self.address.as_deref(), limits::ADDRESS);
        let city = required(&mut errors, "city", self.city.as_deref(), limits::CITY);
        let postal_code = required(
            &mut errors,
            "postal_code",
            self.postal_code.as_deref(),
            limits::POSTAL_CODE,
        );

        let email = match self.email.as_deref().map(str::trim) {
            None | Some("") => {
                errors.add("email", "This field is required.");
                None
            }
            Some(raw) => match Email::parse(raw) {
                Ok(email) => Some(email),
                Err(e) => {
                    errors.add("email", e.to_string());
                    None
                }
            },
        };

        if let Some(phone) = phone.as_deref()
            && !phone
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' '))
        {
            errors.add("phone", "Enter a valid phone number.");
        }

        let notes = self
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(ToOwned::to_owned);
        if notes.as_ref().is_some_and(|n| n.chars().count() > limits::NOTES) {
            errors.add("notes", format!("Ensure this value has at most {} characters.", limits::NOTES));
        }

        match (full_name, email, phone, address, city, postal_code) {
            (Some(full_name), Some(email), Some(phone), Some(address), Some(city), Some(postal_code))
                if errors.is_empty() =>
            {
                Ok(ContactDetails {
                    full_name,
                    email,
                    phone,
                    address,
                    city,
                    postal_code,
                    notes,
                })
            }
            _ => Err(errors),
        }
    }

    /// Overlay a saved address onto this form.
    ///
    /// The saved address replaces name, phone, street, city and postal code.
    /// Email and notes still come from the form because addresses do not
    /// carry them.
    #[must_use]
    pub fn with_saved_address(
        &self,
        full_name: &str,
        phone: &str,
        address: &str,
        city: &str,
        postal_code: &str,
    ) -> Self {
        Self {
            full_name: Some(full_name.to_owned()),
            email: self.email.clone(),
            phone: Some(phone.to_owned()),
            address: Some(address.to_owned()),
            city: Some(city.to_owned()),
            postal_code: Some(postal_code.to_owned()),
            notes: self.notes.clone(),
        }
    }

    /// Fill a blank email with the account's address.
    #[must_use]
    pub fn with_account_email(mut self, account: &Email) -> Self {
        if self.email.as_deref().map(str::trim).is_none_or(str::is_empty) {
            self.email = Some(account.as_str().to_owned());
        }
        self
    }
}

fn required(
    errors: &mut FieldErrors,
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Option<String> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        errors.add(field, "This field is required.");
        return None;
    }
    if value.chars().count() > max {
        errors.add(field, format!("Ensure this value has at most {max} characters."));
        return None;
    }
    Some(value.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn complete_form() -> ContactForm {
        ContactForm {
            full_name: Some("Meena Iyer".into()),
            email: Some("Meena@Example.com".into()),
            phone: Some("+91 98400 12345".into()),
            address: Some("12 Mill Road".into()),
            city: Some("Coimbatore".into()),
            postal_code: Some("641001".into()),
            notes: Some("  ".into()),
        }
    }

    #[test]
    fn test_complete_form_validates() {
        let details = complete_form().validate().unwrap();
        assert_eq!(details.email.as_str(), "meena@example.com");
        assert_eq!(details.city, "Coimbatore");
        assert_eq!(details.notes, None);
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let form = ContactForm {
            email: Some("buyer@example.com".into()),
            ..ContactForm::default()
        };
        let errors = form.validate().unwrap_err();
        let fields: Vec<_> = errors.fields().collect();
        assert_eq!(fields, vec!["address", "city", "full_name", "phone", "postal_code"]);
    }

    #[test]
    fn test_length_limits() {
        let mut form = complete_form();
        form.postal_code = Some("12345678901".into());
        form.full_name = Some("x".repeat(201));
        let errors = form.validate().unwrap_err();
        assert!(errors.get("postal_code").is_some());
        assert!(errors.get("full_name").is_some());
        assert!(errors.get("city").is_none());
    }

    #[test]
    fn test_bad_email_and_phone() {
        let mut form = complete_form();
        form.email = Some("not-an-email".into());
        form.phone = Some("call me".into());
        let errors = form.validate().unwrap_err();
        assert!(errors.get("email").is_some());
        assert_eq!(errors.get("phone"), Some("Enter a valid phone number."));
    }

    #[test]
    fn test_saved_address_overrides_form_fields() {
        let form = ContactForm {
            full_name: Some("Typed Name".into()),
            email: Some("buyer@example.com".into()),
            ..ContactForm::default()
        };
        let details = form
            .with_saved_address("Saved Name", "9840012345", "4 Lake View", "Madurai", "625001")
            .validate()
            .unwrap();
        assert_eq!(details.full_name, "Saved Name");
        assert_eq!(details.city, "Madurai");
        assert_eq!(details.email.as_str(), "buyer@example.com");
    }

    #[test]
    fn test_blank_email_falls_back_to_account() {
        let account = Email::parse("owner@example.com").unwrap();

        let blank = ContactForm {
            email: Some("  ".into()),
            ..ContactForm::default()
        };
        assert_eq!(
            blank.with_account_email(&account).email.as_deref(),
            Some("owner@example.com")
        );
        assert_eq!(
            ContactForm::default().with_account_email(&account).email.as_deref(),
            Some("owner@example.com")
        );

        let typed = complete_form().with_account_email(&account);
        assert_eq!(typed.email.as_deref(), Some("Meena@Example.com"));
    }

    #[test]
    fn test_pincode_alias() {
        let form: ContactForm = serde_json::from_str(r#"{"pincode": "641001"}"#).unwrap();
        assert_eq!(form.postal_code.as_deref(), Some("641001"));
    }
}
