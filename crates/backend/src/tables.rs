//! Table access over the REST layer.
//!
//! Filters use the `column=op.value` query syntax; writes ask for the
//! affected rows back with `Prefer: return=representation`.

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::client::BackendClient;
use crate::error::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Clients,
    Factures,
    Products,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Clients, Table::Factures, Table::Products];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Clients => "clients",
            Table::Factures => "factures",
            Table::Products => "products",
        }
    }

    fn path(&self) -> String {
        format!("rest/v1/{}", self.name())
    }
}

impl core::fmt::Display for Table {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Column selection and ordering for reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query {
    pub select: &'static str,
    /// `column.asc` / `column.desc`.
    pub order: Option<&'static str>,
}

impl Query {
    pub const ALL_NEWEST_FIRST: Query = Query {
        select: "*",
        order: Some("created_at.desc"),
    };

    pub fn select(select: &'static str) -> Self {
        Self {
            select,
            order: Some("created_at.desc"),
        }
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::ALL_NEWEST_FIRST
    }
}

fn id_filter(id: &str) -> String {
    format!("eq.{id}")
}

impl BackendClient {
    pub async fn list<T: DeserializeOwned>(&self, table: Table, query: Query) -> Result<Vec<T>, BackendError> {
        let mut params = vec![("select", query.select.to_string())];
        if let Some(order) = query.order {
            params.push(("order", order.to_string()));
        }
        let request = self.request(Method::GET, &table.path())?.query(&params);
        let rows: Vec<T> = self.send(request).await?.json().await?;
        tracing::debug!(%table, rows = rows.len(), "listed rows");
        Ok(rows)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        table: Table,
        query: Query,
        id: &str,
    ) -> Result<Option<T>, BackendError> {
        let request = self
            .request(Method::GET, &table.path())?
            .query(&[("select", query.select.to_string()), ("id", id_filter(id))]);
        let rows: Vec<T> = self.send(request).await?.json().await?;
        Ok(rows.into_iter().next())
    }

    pub async fn insert<B, T>(&self, table: Table, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .request(Method::POST, &table.path())?
            .header("Prefer", "return=representation")
            .json(body);
        let rows: Vec<T> = self.send(request).await?.json().await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Decode(format!("insert into {table} returned no row")))?;
        tracing::info!(%table, "row inserted");
        Ok(row)
    }

    /// Update one row by id; `Ok(None)` when no visible row matched.
    pub async fn update<B, T>(&self, table: Table, id: &str, body: &B) -> Result<Option<T>, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .request(Method::PATCH, &table.path())?
            .query(&[("id", id_filter(id))])
            .header("Prefer", "return=representation")
            .json(body);
        let rows: Vec<T> = self.send(request).await?.json().await?;
        if !rows.is_empty() {
            tracing::info!(%table, id, "row updated");
        }
        Ok(rows.into_iter().next())
    }

    pub async fn delete(&self, table: Table, id: &str) -> Result<(), BackendError> {
        let request = self
            .request(Method::DELETE, &table.path())?
            .query(&[("id", id_filter(id))]);
        self.send(request).await?;
        tracing::info!(%table, id, "row deleted");
        Ok(())
    }

    /// Exact row count via `Prefer: count=exact` on a zero-length range.
    pub async fn count(&self, table: Table) -> Result<u64, BackendError> {
        let request = self
            .request(Method::HEAD, &table.path())?
            .query(&[("select", "id")])
            .header("Prefer", "count=exact")
            .header("Range-Unit", "items")
            .header("Range", "0-0");
        let response = self.send(request).await?;
        let range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| BackendError::Decode(format!("count of {table}: missing Content-Range")))?;
        parse_content_range_total(range)
            .ok_or_else(|| BackendError::Decode(format!("count of {table}: bad Content-Range {range:?}")))
    }
}

/// `0-0/42` or `*/0` → total.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_match_backend() {
        let names: Vec<_> = Table::ALL.iter().map(Table::name).collect();
        assert_eq!(names, vec!["clients", "factures", "products"]);
        assert_eq!(Table::Factures.path(), "rest/v1/factures");
    }

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_content_range_total("0-0/42"), Some(42));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-9/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }
}
