use std::sync::Arc;

use sqlx::SqlitePool;

use crate::clock::Clock;
use crate::config::PresencePolicy;
use crate::services::{PresenceService, ScheduleService, StatsService};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub clock: Arc<dyn Clock>,
    pub policy: PresencePolicy,
}

impl AppState {
    pub fn presences(&self) -> PresenceService {
        PresenceService::new(self.db.clone(), self.clock.clone(), self.policy)
    }

    pub fn schedules(&self) -> ScheduleService {
        ScheduleService::new(self.db.clone())
    }

    pub fn stats(&self) -> StatsService {
        StatsService::new(self.db.clone())
    }
}
