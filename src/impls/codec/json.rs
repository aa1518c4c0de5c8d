use crate::core::codec::ProposalCodec;
use crate::core::models::application::Proposal;
use crate::error::Error;
use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ProposalCodec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Proposal, Error> {
        Ok(Proposal(serde_json::to_value(value)?))
    }

    fn decode<T: DeserializeOwned>(&self, proposal: &Proposal) -> Result<T, Error> {
        let value = T::deserialize(&proposal.0)?;
        Ok(value)
    }
}
