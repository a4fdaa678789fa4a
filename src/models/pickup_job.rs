use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::pickup_jobs;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = pickup_jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PickupJob {
    pub id: Uuid,
    pub order_id: Uuid,
    pub agent_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = pickup_jobs)]
pub struct NewPickupJob {
    pub id: Uuid,
    pub order_id: Uuid,
    pub agent_id: Uuid,
    pub status: String,
}

pub const JOB_ASSIGNED: &str = "ASSIGNED";
pub const JOB_PICKED_UP: &str = "PICKED_UP";
pub const JOB_DROPPED: &str = "DROPPED";
pub const JOB_COMPLETED: &str = "COMPLETED";
