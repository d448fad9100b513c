// libs/staff-cell/src/services/staff.rs
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Staff, StaffError};

pub struct StaffService {
    supabase: SupabaseClient,
}

impl StaffService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn get_staff(&self, staff_id: Uuid, auth_token: &str) -> Result<Staff, StaffError> {
        let path = format!(
            "/rest/v1/staff?select=*,staff_skills(*),work_schedules(*)&id=eq.{}",
            staff_id
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(StaffError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| StaffError::DatabaseError(format!("Failed to parse staff: {}", e)))
    }

    /// Resolve the staff row owned by an authenticated user. Used by handlers
    /// to turn a JWT subject into a staff actor.
    pub async fn get_by_user_id(&self, user_id: Uuid, auth_token: &str) -> Result<Staff, StaffError> {
        debug!("Resolving staff profile for user {}", user_id);

        let path = format!(
            "/rest/v1/staff?select=*,staff_skills(*),work_schedules(*)&user_id=eq.{}",
            user_id
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(StaffError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| StaffError::DatabaseError(format!("Failed to parse staff: {}", e)))
    }

    pub async fn list_staff(&self, auth_token: &str) -> Result<Vec<Staff>, StaffError> {
        let path = "/rest/v1/staff?select=*,staff_skills(*),work_schedules(*)&order=full_name.asc";

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|e| StaffError::DatabaseError(format!("Failed to parse staff: {}", e)))
    }
}
