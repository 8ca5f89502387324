// libs/appointment-cell/src/services/policy.rs
//! Every role decision in the cell goes through this module.

use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::auth::User;

use crate::models::{AccessScope, Appointment, AppointmentError, Principal, Role};

impl Principal {
    /// Builds the acting principal from a validated token.
    ///
    /// The clinic role lives in `app_metadata.role`; the top-level `role` claim
    /// is only a fallback since Supabase fills it with `authenticated`.
    pub fn from_user(user: &User) -> Result<Self, AppointmentError> {
        let id = Uuid::parse_str(&user.id)
            .map_err(|_| AppointmentError::Forbidden("Token subject is not a valid user id".to_string()))?;

        let role = user
            .app_claim("role")
            .or(user.role.as_deref())
            .map(Role::parse)
            .unwrap_or_else(|| Role::Other(String::new()));

        Ok(Principal {
            id,
            role,
            linked_doctor_id: linked_id(user, "doctor_id"),
            linked_patient_id: linked_id(user, "patient_id"),
        })
    }
}

fn linked_id(user: &User, claim: &str) -> Option<Uuid> {
    let raw = user.app_claim(claim)?;
    match Uuid::parse_str(raw) {
        Ok(id) => Some(id),
        Err(_) => {
            warn!("Ignoring malformed {} claim for user {}", claim, user.id);
            None
        }
    }
}

pub fn can_access(principal: &Principal, appointment: &Appointment) -> bool {
    match principal.role {
        Role::Admin | Role::GroupAdmin => true,
        Role::Doctor => principal.linked_doctor_id == Some(appointment.doctor_id),
        Role::Patient => {
            appointment.requesting_user_id == principal.id
                || (principal.linked_patient_id.is_some()
                    && appointment.patient_id == principal.linked_patient_id)
        }
        Role::Other(_) => false,
    }
}

pub fn authorize(principal: &Principal, appointment: &Appointment) -> Result<(), AppointmentError> {
    if can_access(principal, appointment) {
        return Ok(());
    }
    warn!("Principal {} ({:?}) denied access to appointment {}", principal.id, principal.role, appointment.id);
    Err(AppointmentError::Forbidden(
        "You do not have access to this appointment".to_string(),
    ))
}

/// Store-side equivalent of `can_access`. `None` means unrestricted.
pub fn list_scope(principal: &Principal) -> Result<Option<AccessScope>, AppointmentError> {
    let scope = match &principal.role {
        Role::Admin | Role::GroupAdmin => None,
        Role::Doctor => {
            let doctor_id = principal.linked_doctor_id.ok_or_else(|| {
                AppointmentError::Forbidden("Doctor account is not linked to a doctor record".to_string())
            })?;
            Some(AccessScope::Doctor(doctor_id))
        }
        Role::Patient => Some(AccessScope::Patient {
            user_id: principal.id,
            patient_id: principal.linked_patient_id,
        }),
        Role::Other(role) => {
            warn!("Role {:?} may not list appointments", role);
            return Err(AppointmentError::Forbidden(format!("Role '{}' may not list appointments", role)));
        }
    };
    debug!("List scope for {}: {:?}", principal.id, scope);
    Ok(scope)
}

/// Scope for "my appointments". Staff see what they booked themselves.
pub fn own_scope(principal: &Principal) -> Result<Option<AccessScope>, AppointmentError> {
    if principal.role.is_staff() {
        return Ok(Some(AccessScope::RequestedBy(principal.id)));
    }
    list_scope(principal)
}

/// Roles that may create bookings at all.
pub fn ensure_can_book(principal: &Principal) -> Result<(), AppointmentError> {
    match principal.role {
        Role::Patient | Role::Doctor | Role::Admin | Role::GroupAdmin => Ok(()),
        Role::Other(ref role) => Err(AppointmentError::Forbidden(format!(
            "Role '{}' may not book appointments",
            role
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(role: Option<&str>, app_metadata: serde_json::Value) -> User {
        User {
            id: Uuid::new_v4().to_string(),
            email: None,
            role: role.map(str::to_string),
            app_metadata: Some(app_metadata),
            metadata: None,
            created_at: None,
        }
    }

    #[test]
    fn app_metadata_role_wins_over_top_level_role() {
        let doctor_id = Uuid::new_v4();
        let principal = Principal::from_user(&user(
            Some("authenticated"),
            json!({ "role": "doctor", "doctor_id": doctor_id.to_string() }),
        ))
        .unwrap();

        assert_eq!(principal.role, Role::Doctor);
        assert_eq!(principal.linked_doctor_id, Some(doctor_id));
        assert_eq!(principal.linked_patient_id, None);
    }

    #[test]
    fn top_level_role_is_the_fallback() {
        let principal = Principal::from_user(&user(Some("admin"), json!({}))).unwrap();
        assert_eq!(principal.role, Role::Admin);
    }

    #[test]
    fn malformed_subject_is_forbidden() {
        let mut bad = user(Some("admin"), json!({}));
        bad.id = "not-a-uuid".to_string();
        assert!(matches!(Principal::from_user(&bad), Err(AppointmentError::Forbidden(_))));
    }

    #[test]
    fn staff_mine_scope_is_requested_by() {
        let admin = Principal::new(Uuid::new_v4(), Role::Admin);
        assert_eq!(list_scope(&admin).unwrap(), None);
        assert_eq!(own_scope(&admin).unwrap(), Some(AccessScope::RequestedBy(admin.id)));
    }

    #[test]
    fn unlinked_doctor_and_unknown_roles_cannot_list() {
        let doctor = Principal::new(Uuid::new_v4(), Role::Doctor);
        assert!(list_scope(&doctor).is_err());
        let nurse = Principal::new(Uuid::new_v4(), Role::Other("nurse".to_string()));
        assert!(list_scope(&nurse).is_err());
        assert!(ensure_can_book(&nurse).is_err());
    }
}
