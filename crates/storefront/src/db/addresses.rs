//! Saved address lookups.

use async_trait::async_trait;
use sqlx::PgPool;

use kec_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::Address;
use crate::services::checkout::AddressBook;

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    user_id: UserId,
    label: String,
    full_name: String,
    phone: String,
    address_line: String,
    city: String,
    postal_code: String,
    is_default: bool,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            label: row.label,
            full_name: row.full_name,
            phone: row.phone,
            address_line: row.address_line,
            city: row.city,
            postal_code: row.postal_code,
            is_default: row.is_default,
        }
    }
}

/// Repository for the address book.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AddressBook for AddressRepository<'_> {
    async fn address_for_user(
        &self,
        id: AddressId,
        user_id: UserId,
    ) -> Result<Option<Address>, RepositoryError> {
        let row: Option<AddressRow> = sqlx::query_as(
            r"
            SELECT id, user_id, label, full_name, phone, address_line, city, postal_code, is_default
            FROM store.address
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Address::from))
    }
}
