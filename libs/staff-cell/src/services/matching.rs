// libs/staff-cell/src/services/matching.rs
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::geo::haversine_km;
use crate::models::{GeoPoint, MatchCandidate, MatchQuery, Staff, StaffError, TimeWindow};
use crate::services::eligibility::EligibilityService;

/// Scoring weights for ranking eligible staff. Proximity and rating dominate;
/// completed-job count acts as an experience tie-breaker.
#[derive(Debug, Clone, Copy)]
pub struct MatchingWeights {
    pub proximity: f64,
    pub rating: f64,
    pub experience: f64,
}

impl Default for MatchingWeights {
    fn default() -> Self {
        Self {
            proximity: 30.0,
            rating: 30.0,
            experience: 0.5,
        }
    }
}

/// Score one staff member against a target location. A zero or unknown
/// distance earns the full proximity weight, otherwise proximity decays as
/// the inverse of distance.
pub fn score_staff(staff: &Staff, distance_km: Option<f64>, weights: &MatchingWeights) -> f64 {
    let proximity = match distance_km {
        Some(d) if d > 0.0 => (1.0 / d) * weights.proximity,
        _ => weights.proximity,
    };

    proximity
        + staff.average_rating * weights.rating
        + staff.total_completed_jobs as f64 * weights.experience
}

/// Rank staff by descending score. Ties break on ascending staff id so the
/// ordering is stable across runs.
pub fn rank_candidates(
    staff: Vec<Staff>,
    target: Option<&GeoPoint>,
    weights: &MatchingWeights,
) -> Vec<MatchCandidate> {
    let mut candidates: Vec<MatchCandidate> = staff
        .into_iter()
        .map(|s| {
            let distance_km = match (target, s.location()) {
                (Some(target), Some(location)) => Some(haversine_km(&location, target)),
                _ => None,
            };
            let score = score_staff(&s, distance_km, weights);
            MatchCandidate {
                staff: s,
                distance_km,
                score,
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.staff.id.cmp(&b.staff.id))
    });

    candidates
}

pub struct MatchingService {
    eligibility: EligibilityService,
    weights: MatchingWeights,
}

impl MatchingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            eligibility: EligibilityService::new(config),
            weights: MatchingWeights::default(),
        }
    }

    pub fn with_weights(config: &AppConfig, weights: MatchingWeights) -> Self {
        Self {
            eligibility: EligibilityService::new(config),
            weights,
        }
    }

    /// Find and rank staff able to take a job. Returns candidates ordered
    /// best-first; empty when nobody qualifies.
    pub async fn find_candidates(
        &self,
        query: &MatchQuery,
        auth_token: &str,
    ) -> Result<Vec<MatchCandidate>, StaffError> {
        let window = query.window();
        if window.start >= window.end {
            return Err(StaffError::ValidationError(
                "Start time must precede end time".to_string(),
            ));
        }

        let target = query.target();
        let eligible = self
            .eligibility
            .find_eligible(
                query.service_id,
                query.date,
                &window,
                target.as_ref(),
                None,
                auth_token,
            )
            .await?;

        let candidates = rank_candidates(eligible, target.as_ref(), &self.weights);

        info!(
            "Matched {} candidates for {} at {}",
            candidates.len(),
            query.date,
            window.start
        );
        Ok(candidates)
    }

    /// Single-staff availability probe used by the booking cell's assignment
    /// path to re-verify a candidate under the scheduling lock.
    pub async fn staff_is_free(
        &self,
        staff_id: Uuid,
        date: chrono::NaiveDate,
        window: &TimeWindow,
        auth_token: &str,
    ) -> Result<bool, StaffError> {
        debug!("Re-checking calendar for staff {}", staff_id);
        self.eligibility
            .staff_is_free(staff_id, date, window, auth_token)
            .await
    }
}
