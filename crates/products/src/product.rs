use serde::{Deserialize, Serialize};

use salesdesk_core::{AggregateRoot, DomainError, DomainResult, ExpectedVersion, Money, ProductId};

/// Case-insensitive lookup key for a catalog name.
///
/// Two names collide when their keys are equal.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Aggregate root: catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    name: String,
    price: Money,
    version: u64,
}

impl Product {
    /// A brand new entry at version 0.
    pub fn create(id: ProductId, name: &str, price: Money) -> DomainResult<Self> {
        let name = validate_fields(name, price)?;
        Ok(Self {
            id,
            name,
            price,
            version: 0,
        })
    }

    /// Rebuild an entry from stored state.
    pub fn restore(id: ProductId, name: String, price: Money, version: u64) -> Self {
        Self {
            id,
            name,
            price,
            version,
        }
    }

    /// The entry after a write made by someone who last saw `expected`.
    ///
    /// Fails with `Conflict` if the entry moved on since, leaving `self` untouched.
    pub fn revise(&self, name: &str, price: Money, expected: ExpectedVersion) -> DomainResult<Self> {
        expected.check(self.version)?;
        let name = validate_fields(name, price)?;
        Ok(Self {
            id: self.id,
            name,
            price,
            version: expected.next(),
        })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }

    pub fn price(&self) -> Money {
        self.price
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

fn validate_fields(name: &str, price: Money) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    if price.is_negative() {
        return Err(DomainError::validation(format!(
            "price cannot be negative (got {price})"
        )));
    }
    Ok(name.to_string())
}

/// Command: create a catalog entry (no `id`) or update one (`id` + `version`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertProduct {
    #[serde(default)]
    pub id: Option<ProductId>,
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub version: Option<u64>,
}

/// What an `UpsertProduct` asks for, once validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertIntent {
    Create,
    Update {
        id: ProductId,
        expected: ExpectedVersion,
    },
}

impl UpsertProduct {
    /// Field checks plus the create/update decision.
    ///
    /// An update must carry the version the caller last read; without it no
    /// conflict could be detected.
    pub fn intent(&self) -> DomainResult<UpsertIntent> {
        validate_fields(&self.name, self.price)?;
        match (self.id, self.version) {
            (None, _) => Ok(UpsertIntent::Create),
            (Some(id), Some(version)) => Ok(UpsertIntent::Update {
                id,
                expected: ExpectedVersion(version),
            }),
            (Some(id), None) => Err(DomainError::validation(format!(
                "version is required to update product {id}"
            ))),
        }
    }
}
