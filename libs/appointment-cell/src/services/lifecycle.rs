// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use shared_models::auth::{Role, User};

use crate::models::{AppointmentError, AppointmentStatus};
use crate::store::{Participant, TransitionGuard};

use crate::models::AppointmentStatus::{Cancelled, Completed, Confirmed, Pending};

/// One permitted status change: who may move an appointment from which
/// states into `to`, and which side of the appointment they must be.
#[derive(Debug, Clone, Copy)]
pub struct TransitionRule {
    pub actor: Role,
    pub from: &'static [AppointmentStatus],
    pub to: AppointmentStatus,
    pub owner: Option<Participant>,
}

const ANY_STATUS: &[AppointmentStatus] = &AppointmentStatus::ALL;

/// Creation (patient → pending) goes through booking, not through this table.
pub static TRANSITION_RULES: &[TransitionRule] = &[
    TransitionRule { actor: Role::Provider, from: &[Pending], to: Confirmed, owner: Some(Participant::Provider) },
    TransitionRule { actor: Role::Provider, from: &[Pending], to: Cancelled, owner: Some(Participant::Provider) },
    TransitionRule { actor: Role::Provider, from: &[Pending, Confirmed], to: Completed, owner: Some(Participant::Provider) },
    TransitionRule { actor: Role::Patient, from: &[Pending, Confirmed], to: Cancelled, owner: Some(Participant::Patient) },
    // Administrator override: any state to any state, no ownership check.
    TransitionRule { actor: Role::Admin, from: ANY_STATUS, to: Pending, owner: None },
    TransitionRule { actor: Role::Admin, from: ANY_STATUS, to: Confirmed, owner: None },
    TransitionRule { actor: Role::Admin, from: ANY_STATUS, to: Completed, owner: None },
    TransitionRule { actor: Role::Admin, from: ANY_STATUS, to: Cancelled, owner: None },
];

pub fn find_rule(role: Role, to: AppointmentStatus) -> Option<&'static TransitionRule> {
    TRANSITION_RULES
        .iter()
        .find(|rule| rule.actor == role && rule.to == to)
}

/// Checks the actor's role against the table and returns the guard the
/// conditional update must satisfy. Source state and ownership are left to
/// storage so that the check and the write happen atomically.
pub fn authorize_transition(
    actor: &User,
    to: AppointmentStatus,
) -> Result<TransitionGuard, AppointmentError> {
    let rule = find_rule(actor.role, to).ok_or_else(|| {
        warn!("{} {} may not set status {}", actor.role, actor.id, to);
        AppointmentError::Forbidden(format!(
            "A {} cannot change an appointment to {}",
            actor.role, to
        ))
    })?;

    debug!("Transition to {} permitted for {} from {:?}", to, actor.role, rule.from);

    Ok(TransitionGuard {
        allowed_from: rule.from.to_vec(),
        owner: rule.owner.map(|participant| (participant, actor.id)),
    })
}
