//! Client-management error types

use thiserror::Error;

use crate::ClientId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The client is unknown, usually because it was removed before a queued
    /// task referring to it was processed
    #[error("Invalid client: {0}")]
    InvalidClient(ClientId),

    #[error("Client already registered: {0}")]
    DuplicateClient(ClientId),
}

pub type ClientResult<T> = Result<T, ClientError>;
