//! Schema upgrades, keyed on SQLite's `user_version` pragma.
//!
//! [`STEPS`] lists every upgrade in ascending version order. Opening a
//! database applies the ones above its stored version, each inside its own
//! transaction together with the version bump.

pub mod v001_initial;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};

/// One schema upgrade, taking the database to `version`.
pub struct Step {
    pub version: u32,
    pub name: &'static str,
    pub apply: fn(&Connection) -> rusqlite::Result<()>,
}

pub const STEPS: &[Step] = &[Step {
    version: 1,
    name: "initial",
    apply: v001_initial::up,
}];

/// Bring `conn` up to the newest schema in [`STEPS`].
pub fn migrate(conn: &Connection) -> Result<u32> {
    apply_steps(conn, STEPS)
}

fn apply_steps(conn: &Connection, steps: &[Step]) -> Result<u32> {
    let mut version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    let latest = steps.last().map_or(0, |s| s.version);
    if version > latest {
        warn!(version, latest, "database schema is newer than this build");
        return Ok(version);
    }

    for step in steps.iter().filter(move |s| s.version > version) {
        let tx = conn.unchecked_transaction()?;
        (step.apply)(&tx)
            .and_then(|()| tx.pragma_update(None, "user_version", step.version))
            .map_err(|e| StoreError::Migration(format!("v{:03} {}: {e}", step.version, step.name)))?;
        tx.commit()?;
        info!(version = step.version, name = step.name, "schema upgraded");
        version = step.version;
    }

    debug!(version, "schema current");
    Ok(version)
}
