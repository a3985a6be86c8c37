//! Typed wrappers over the JSON row operations of [`Backend`].

use serde::de::DeserializeOwned;
use serde::Serialize;

use bazaar_shared::query::{Filter, Query};
use bazaar_shared::Table;

use crate::error::{ClientError, Result};
use crate::remote::Backend;

pub async fn select_as<T: DeserializeOwned>(backend: &dyn Backend, query: &Query) -> Result<Vec<T>> {
    let rows = backend.select(query).await?;
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(ClientError::from))
        .collect()
}

/// Insert a single row and decode what the backend stored.
pub async fn insert_one<N: Serialize, T: DeserializeOwned>(
    backend: &dyn Backend,
    table: Table,
    row: &N,
) -> Result<T> {
    let rows = backend.insert(table, serde_json::to_value(row)?).await?;
    let stored = rows.into_iter().next().ok_or_else(|| {
        ClientError::UnexpectedResponse(format!("insert into {table} returned no row"))
    })?;
    Ok(serde_json::from_value(stored)?)
}

pub async fn update_as<P: Serialize, T: DeserializeOwned>(
    backend: &dyn Backend,
    table: Table,
    filters: &[Filter],
    patch: &P,
) -> Result<Vec<T>> {
    let rows = backend
        .update(table, filters, serde_json::to_value(patch)?)
        .await?;
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(ClientError::from))
        .collect()
}
