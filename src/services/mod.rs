pub mod aggregator;
pub mod class_label;
pub mod presence_service;
pub mod resolver;
pub mod schedule_service;
pub mod session_deriver;
pub mod stats_service;
pub mod transitions;

pub use presence_service::PresenceService;
pub use schedule_service::ScheduleService;
pub use stats_service::StatsService;
