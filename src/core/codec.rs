use crate::core::models::application::Proposal;
use crate::error::Error;
use serde::{de::DeserializeOwned, Serialize};

/// Turns entity snapshots into opaque proposal payloads and back.
pub trait ProposalCodec: Clone + 'static {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Proposal, Error>;
    fn decode<T: DeserializeOwned>(&self, proposal: &Proposal) -> Result<T, Error>;
}
