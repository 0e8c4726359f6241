//! Tenant ("analysis") tables discovered at runtime.
//!
//! Several releases repeat the same statement for every analysis table.
//! Analysis names come from the database, so each one is validated as an
//! identifier and only names from the discovered list are ever
//! interpolated into a statement template.

use anyhow::{Context, Result, anyhow};
use std::fmt;

use crate::db::DatabaseGateway;
use crate::db::identifiers::is_valid_identifier;

/// Placeholder replaced by the tenant name in statement templates
pub const TENANT_PLACEHOLDER: &str = "{tenant}";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantName(String);

impl TenantName {
    pub fn new(name: &str) -> Result<Self> {
        if !is_valid_identifier(name) {
            return Err(anyhow!(
                "Analysis name '{}' cannot be used as a table name",
                name
            ));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The allow-list of tenants for one migration run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TenantSet {
    names: Vec<TenantName>,
}

impl TenantSet {
    pub fn new(names: Vec<TenantName>) -> Self {
        Self { names }
    }

    /// Read the tenant list; the first column of every row is a name
    pub async fn discover(db: &dyn DatabaseGateway, query: &str) -> Result<Self> {
        let cursor = db
            .query(query)
            .await
            .context("Failed to list analyses")?;

        let mut names = Vec::with_capacity(cursor.total());
        for row in cursor {
            let raw = row
                .at(0)
                .ok_or_else(|| anyhow!("Analysis list returned a NULL name"))?;
            let name = TenantName::new(raw.trim())?;
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(Self { names })
    }

    pub fn names(&self) -> &[TenantName] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Look a name up in the allow-list
    pub fn get(&self, name: &str) -> Option<&TenantName> {
        self.names.iter().find(|t| t.as_str() == name)
    }

    /// One statement per tenant, in discovery order
    pub fn render_all(&self, template: &str) -> Result<Vec<String>> {
        self.names.iter().map(|t| render(template, t)).collect()
    }
}

/// Substitute the tenant name into a template
pub fn render(template: &str, tenant: &TenantName) -> Result<String> {
    if !template.contains(TENANT_PLACEHOLDER) {
        return Err(anyhow!(
            "Per-analysis statement has no {} placeholder: {}",
            TENANT_PLACEHOLDER,
            template
        ));
    }
    Ok(template.replace(TENANT_PLACEHOLDER, tenant.as_str()))
}
