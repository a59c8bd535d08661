use crate::infrastructure::error::InfraError;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the workspace database. The daemon and CLI invocations share one
/// file, so writers wait on each other instead of failing with `SQLITE_BUSY`.
pub fn open_connection(path: &Path) -> Result<Connection, InfraError> {
    let connection = Connection::open(path)?;
    connection.busy_timeout(BUSY_TIMEOUT)?;
    Ok(connection)
}

pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = open_connection(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
