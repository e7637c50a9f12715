use gscdb_client::ClientError;
use gscdb_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Client(#[from] ClientError),
}
