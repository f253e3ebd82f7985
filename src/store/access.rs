//! Who may see and act on a case

use crate::models::{Actor, Case, Role};

/// Requester owns it; Tier1/Tier2 only when assigned; Lead and Admin always.
pub fn can_view(actor: &Actor, case: &Case) -> bool {
    match actor.role {
        Role::Requester => case.requester_id == actor.id,
        Role::CaseOfficerTier1 | Role::CaseOfficerTier2 => is_assignee(actor, case),
        Role::CaseOfficerLead | Role::Admin => true,
        Role::System => false,
    }
}

/// Chat participants are exactly the viewers.
pub fn is_participant(actor: &Actor, case: &Case) -> bool {
    can_view(actor, case)
}

/// Complete/reject and session control: Lead and Admin on any case, other
/// officers only on their own assignments.
pub fn can_resolve(actor: &Actor, case: &Case) -> bool {
    actor.role.can_route() || (actor.role.is_officer() && is_assignee(actor, case))
}

fn is_assignee(actor: &Actor, case: &Case) -> bool {
    case.assigned_officer_id.as_deref() == Some(actor.id.as_str())
}
