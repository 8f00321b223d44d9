use std::fmt;

use anyhow::{bail, Result};
use tracing::{debug, warn};

use super::{
    validation::{self, Claim, Discovered, Failure, Validated},
    Options,
};
use crate::core::{
    claim_token::{ClaimToken, TokenType},
    response::{ValidationResponse, ValidationResult},
};

/// Who put an item on the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// The seed token handed to [Validator::validate](super::Validator::validate).
    Caller,
    /// A token discovered while validating the item with this id.
    Item(usize),
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Caller => f.write_str("caller"),
            Owner::Item(id) => write!(f, "item {id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Validating,
    /// Passed its own checks; waits for the tokens it discovered.
    AwaitingChildren,
    Succeeded,
    Failed,
}

impl ItemState {
    /// The allowed moves. `Succeeded` and `Failed` are final.
    fn advance(self, next: ItemState) -> Result<ItemState> {
        use ItemState::*;

        match (self, next) {
            (Pending, Validating)
            | (Validating, AwaitingChildren | Succeeded | Failed)
            | (AwaitingChildren, Succeeded | Failed) => Ok(next),
            (from, to) => bail!("illegal queue item transition from {from:?} to {to:?}"),
        }
    }
}

/// One unit of work: a token and the validator it must pass.
#[derive(Debug, Clone)]
pub(crate) struct QueueItem {
    pub id: usize,
    pub owner: Owner,
    pub token: ClaimToken,
    pub validator: TokenType,
    /// The DID of the party presenting this token, once known.
    pub presenter: Option<String>,
    /// The descriptor or attestation key this token was found under.
    pub descriptor_id: Option<String>,
    pub state: ItemState,
    /// Children that have not settled yet.
    open_children: usize,
    claims: Vec<Claim>,
}

/// The work list of a single `validate` call.
///
/// Items are validated one at a time in discovery order; the first rejection
/// ends the run.
#[derive(Debug)]
pub(crate) struct ValidationQueue {
    items: Vec<QueueItem>,
    cursor: usize,
}

impl ValidationQueue {
    pub fn seed(token: ClaimToken, validator: TokenType) -> Self {
        Self {
            items: vec![QueueItem {
                id: 0,
                owner: Owner::Caller,
                token,
                validator,
                presenter: None,
                descriptor_id: None,
                state: ItemState::Pending,
                open_children: 0,
                claims: Vec::new(),
            }],
            cursor: 0,
        }
    }

    /// Validate items until the queue drains or an item is rejected.
    pub async fn run(mut self, options: &Options) -> Result<ValidationResponse> {
        while let Some(id) = self.start_next()? {
            let item = &self.items[id];
            let validator = item.validator;
            debug!(item = id, owner = %item.owner, %validator, "validating queue item");

            match validation::validate(item, options).await {
                Ok(validated) => self.succeed(id, validated)?,
                Err(Failure::Rejected(rejection)) => {
                    warn!(item = id, %validator, error = %rejection, "queue item rejected");
                    self.fail(id)?;
                    return Ok(ValidationResponse::failure(
                        rejection.status(),
                        rejection.to_string(),
                    ));
                }
                Err(Failure::Unexpected(error)) => {
                    self.fail(id)?;
                    return Err(error.context(format!(
                        "unable to validate queue item {id} as {validator}"
                    )));
                }
            }
        }

        Ok(ValidationResponse::success(self.into_result()))
    }

    /// Move the next pending item to `Validating` and return its id.
    fn start_next(&mut self) -> Result<Option<usize>> {
        let Some(item) = self.items.get_mut(self.cursor) else {
            return Ok(None);
        };
        item.state = item.state.advance(ItemState::Validating)?;
        self.cursor += 1;
        Ok(Some(item.id))
    }

    fn succeed(&mut self, id: usize, validated: Validated) -> Result<()> {
        let Validated { claims, children } = validated;

        let item = &mut self.items[id];
        if children.is_empty() {
            item.claims = claims;
            return self.settle(id);
        }

        item.state = item.state.advance(ItemState::AwaitingChildren)?;
        item.claims = claims;
        item.open_children = children.len();
        for child in children {
            self.push(Owner::Item(id), child);
        }
        Ok(())
    }

    /// Mark the item succeeded, and every owner whose last open child it was.
    fn settle(&mut self, id: usize) -> Result<()> {
        let mut next = Some(id);
        while let Some(id) = next {
            let item = &mut self.items[id];
            item.state = item.state.advance(ItemState::Succeeded)?;
            let owner = item.owner;
            next = match owner {
                Owner::Caller => None,
                Owner::Item(owner) => {
                    let owner_item = &mut self.items[owner];
                    owner_item.open_children = owner_item.open_children.saturating_sub(1);
                    (owner_item.open_children == 0).then_some(owner)
                }
            };
        }
        Ok(())
    }

    fn push(&mut self, owner: Owner, discovered: Discovered) {
        let Discovered {
            token,
            validator,
            presenter,
            descriptor_id,
        } = discovered;

        let id = self.items.len();
        debug!(item = id, %owner, %validator, "queued discovered token");
        self.items.push(QueueItem {
            id,
            owner,
            token,
            validator,
            presenter,
            descriptor_id,
            state: ItemState::Pending,
            open_children: 0,
            claims: Vec::new(),
        });
    }

    /// Fail the item and every item on its owner chain.
    fn fail(&mut self, id: usize) -> Result<()> {
        let mut next = Some(id);
        while let Some(id) = next {
            let item = &mut self.items[id];
            item.state = item.state.advance(ItemState::Failed)?;
            next = match item.owner {
                Owner::Caller => None,
                Owner::Item(owner) => Some(owner),
            };
        }
        Ok(())
    }

    /// Fold the claims of every item into one result, in validation order.
    fn into_result(self) -> ValidationResult {
        let mut result = ValidationResult::default();

        for claim in self.items.into_iter().flat_map(|item| item.claims) {
            match claim {
                Claim::Presenter(did) => {
                    result.did.get_or_insert(did);
                }
                Claim::SiopJti(jti) => {
                    result.siop_jti.get_or_insert(jti);
                }
                Claim::IdToken { issuer, payload } => {
                    result.id_tokens.insert(issuer, payload);
                }
                Claim::Presentation { key, payload } => {
                    result.verifiable_presentations.insert(key, payload);
                }
                Claim::Credential {
                    credential_type,
                    subject,
                } => {
                    result.verifiable_credentials.insert(credential_type, subject);
                }
                Claim::SelfIssued(claims) => {
                    result.self_issued.get_or_insert(claims);
                }
            }
        }
        result
    }

    #[cfg(test)]
    fn states(&self) -> Vec<ItemState> {
        self.items.iter().map(|item| item.state).collect()
    }
}
