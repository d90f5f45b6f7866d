//! Organization settings.

use axum::{
    Json, Router,
    extract::State,
    routing::get,
};
use chrono::NaiveTime;
use serde::Deserialize;

use crate::db::OrganizationRepository;
use crate::db::organizations::OrganizationSettings;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::Organization;
use crate::routes::load_organization;
use crate::routes::responses::{OrganizationResponse, parse_time};
use crate::services::auth::validate_name;
use crate::services::checkin::validate_window;
use crate::state::AppState;

/// Build the organization settings router.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/admin/organization",
        get(get_organization).put(update_organization),
    )
}

/// Request for updating settings. Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateOrganizationRequest {
    pub name: Option<String>,
    /// `HH:MM` or `HH:MM:SS`.
    pub checkin_start: Option<String>,
    pub checkin_end: Option<String>,
    pub utc_offset_minutes: Option<i32>,
}

fn parse_bound(field: &str, value: Option<&str>, current: NaiveTime) -> Result<NaiveTime> {
    value.map_or(Ok(current), |v| {
        parse_time(v).ok_or_else(|| AppError::BadRequest(format!("{field} must be HH:MM")))
    })
}

/// Merge a request into the current settings and validate the result.
fn merge_settings(
    current: &Organization,
    body: &UpdateOrganizationRequest,
) -> Result<OrganizationSettings> {
    let name = match body.name.as_deref() {
        Some(name) => validate_name("organization name", name)?,
        None => current.name.clone(),
    };
    let checkin_start = parse_bound(
        "checkin_start",
        body.checkin_start.as_deref(),
        current.checkin_start,
    )?;
    let checkin_end = parse_bound(
        "checkin_end",
        body.checkin_end.as_deref(),
        current.checkin_end,
    )?;
    let utc_offset_minutes = body.utc_offset_minutes.unwrap_or(current.utc_offset_minutes);

    validate_window(checkin_start, checkin_end, utc_offset_minutes)?;

    Ok(OrganizationSettings {
        name,
        checkin_start,
        checkin_end,
        utc_offset_minutes,
    })
}

/// Get the organization settings.
///
/// # Route
///
/// `GET /api/admin/organization`
///
/// # Errors
///
/// Returns an error if the organization cannot be loaded.
pub async fn get_organization(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<OrganizationResponse>> {
    let organization = load_organization(&state, &admin).await?;
    Ok(Json(OrganizationResponse::from(&organization)))
}

/// Update the name, check-in window or UTC offset.
///
/// Existing check-ins keep the bucket they were recorded with.
///
/// # Route
///
/// `PUT /api/admin/organization`
///
/// # Errors
///
/// Returns 400 if the window is empty or the offset is out of range.
pub async fn update_organization(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(body): Json<UpdateOrganizationRequest>,
) -> Result<Json<OrganizationResponse>> {
    let current = load_organization(&state, &admin).await?;
    let settings = merge_settings(&current, &body)?;

    let updated = OrganizationRepository::new(state.pool())
        .update_settings(current.id, &settings)
        .await?;

    tracing::info!(
        admin_id = %admin.id,
        organization_id = %updated.id,
        checkin_start = %updated.checkin_start,
        checkin_end = %updated.checkin_end,
        utc_offset_minutes = updated.utc_offset_minutes,
        "Organization settings updated"
    );

    Ok(Json(OrganizationResponse::from(&updated)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use worktally_core::OrganizationId;

    use super::*;

    fn organization() -> Organization {
        let now = Utc::now();
        Organization {
            id: OrganizationId::new(1),
            name: "Acme".to_string(),
            jira_cloud_id: None,
            jira_site_url: None,
            checkin_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            checkin_end: NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            utc_offset_minutes: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn request() -> UpdateOrganizationRequest {
        UpdateOrganizationRequest {
            name: None,
            checkin_start: None,
            checkin_end: None,
            utc_offset_minutes: None,
        }
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let settings = merge_settings(
            &organization(),
            &UpdateOrganizationRequest {
                utc_offset_minutes: Some(120),
                ..request()
            },
        )
        .unwrap();

        assert_eq!(settings.name, "Acme");
        assert_eq!(settings.checkin_start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(settings.utc_offset_minutes, 120);
    }

    #[test]
    fn test_merge_rejects_empty_window() {
        let result = merge_settings(
            &organization(),
            &UpdateOrganizationRequest {
                checkin_start: Some("10:00".to_string()),
                ..request()
            },
        );
        assert!(matches!(result, Err(AppError::CheckIn(_))));
    }

    #[test]
    fn test_merge_rejects_bad_time_and_offset() {
        let bad_time = merge_settings(
            &organization(),
            &UpdateOrganizationRequest {
                checkin_end: Some("quarter past".to_string()),
                ..request()
            },
        );
        assert!(matches!(bad_time, Err(AppError::BadRequest(_))));

        let bad_offset = merge_settings(
            &organization(),
            &UpdateOrganizationRequest {
                utc_offset_minutes: Some(15 * 60),
                ..request()
            },
        );
        assert!(matches!(bad_offset, Err(AppError::CheckIn(_))));
    }

    #[test]
    fn test_merge_rejects_blank_name() {
        let result = merge_settings(
            &organization(),
            &UpdateOrganizationRequest {
                name: Some("   ".to_string()),
                ..request()
            },
        );
        assert!(matches!(result, Err(AppError::Auth(_))));
    }
}
