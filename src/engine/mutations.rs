//! Reservation mutation flows: propose, commit, update, cancel.
//!
//! Proposals never block on conflicts: a taken slot comes back as a
//! `ReserveOutcome::Conflict` carrying the existing records and up to three
//! advisory alternatives. Committing one of those is a separate, explicit
//! call that revalidates under the store lock.

use chrono::NaiveDateTime;
use tracing::debug;
use ulid::Ulid;

use crate::calendar;
use crate::engine::{alternatives, Engine, EngineError};
use crate::model::{Proposal, Reservation, ReserveOutcome, ResourceId, Slot};
use crate::store::CommitError;

impl Engine {
    /// Parse a free-text request, resolve its resource hint against the
    /// configured pools, and run the normal proposal flow.
    pub async fn propose_from_text(
        &self,
        text: &str,
        owner: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<ReserveOutcome, EngineError> {
        let parsed = self.parser.parse(text, now)?;
        let hint = parsed
            .resource_hint
            .ok_or_else(|| EngineError::UnknownResource(text.trim().to_string()))?;
        let resource = self
            .config()
            .resolve_hint(&hint)
            .ok_or(EngineError::UnknownResource(hint))?;
        self.propose(resource, parsed.slot, owner, Some(parsed.raw_text), now)
            .await
    }

    /// Validate and, if the slot is free, commit immediately. A conflict is
    /// a successful outcome here, not an error: the caller gets the
    /// conflicting records plus alternatives and decides what to do.
    pub async fn propose(
        &self,
        resource: ResourceId,
        slot: Slot,
        owner: Option<&str>,
        request_text: Option<String>,
        now: NaiveDateTime,
    ) -> Result<ReserveOutcome, EngineError> {
        self.store().close_expired(now).await?;

        match self
            .store()
            .commit_create(resource, slot, owner.map(str::to_string), request_text, now)
            .await
        {
            Ok(reservation) => Ok(ReserveOutcome::Confirmed(reservation)),
            Err(CommitError::Conflict(existing)) => {
                // The commit only reports conflicts after validation passed,
                // so normalizing again here cannot fail.
                let requested =
                    calendar::normalize_and_validate(self.config(), now, slot.start, slot.end)?;
                let active = self.store().snapshot().await;
                let alternatives =
                    alternatives::propose(self.config(), resource, &requested, now, &active);
                debug!(
                    %resource,
                    conflicts = existing.len(),
                    alternatives = alternatives.len(),
                    "reservation conflicted"
                );
                Ok(ReserveOutcome::Conflict { existing, alternatives })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Commit one previously proposed alternative. The slot may have been
    /// taken since it was proposed, so everything revalidates; a new
    /// conflict surfaces as an error with fresh alternatives.
    pub async fn commit_option(
        &self,
        proposal: &Proposal,
        owner: Option<&str>,
        request_text: Option<String>,
        now: NaiveDateTime,
    ) -> Result<Reservation, EngineError> {
        match self
            .store()
            .commit_create(
                proposal.resource,
                proposal.slot,
                owner.map(str::to_string),
                request_text,
                now,
            )
            .await
        {
            Ok(reservation) => Ok(reservation),
            Err(CommitError::Conflict(existing)) => {
                let active = self.store().snapshot().await;
                let alternatives = alternatives::propose(
                    self.config(),
                    proposal.resource,
                    &proposal.slot,
                    now,
                    &active,
                );
                Err(EngineError::Conflict { existing, alternatives })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Full-replace update of an active reservation; the record itself is
    /// excluded from the conflict scan.
    pub async fn update_reservation(
        &self,
        id: Ulid,
        resource: Option<ResourceId>,
        slot: Slot,
        now: NaiveDateTime,
    ) -> Result<Reservation, EngineError> {
        match self.store().commit_update(id, resource, slot, now).await {
            Ok(reservation) => Ok(reservation),
            Err(CommitError::Conflict(existing)) => {
                // Conflicts are always on the target resource.
                let target = resource
                    .or_else(|| existing.first().map(|r| r.resource))
                    .ok_or(CommitError::Conflict(Vec::new()))?;
                let requested =
                    calendar::normalize_and_validate(self.config(), now, slot.start, slot.end)?;
                let active = self.store().snapshot().await;
                let alternatives =
                    alternatives::propose(self.config(), target, &requested, now, &active);
                Err(EngineError::Conflict { existing, alternatives })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Explicitly close an active reservation.
    pub async fn cancel(&self, id: Ulid, now: NaiveDateTime) -> Result<Reservation, EngineError> {
        Ok(self.store().close(id, now).await?)
    }
}
