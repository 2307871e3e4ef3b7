pub mod presence;
pub mod program;
pub mod schedule;
pub mod stats;

pub use presence::{Actor, ActorRef, ClassScope, PresenceEvent, PresenceRecord, PresenceSource, PresenceStatus, Role};
pub use program::{ClassCoordinates, NewProgramRequest, Program};
pub use schedule::{
    CourseRef, DaySchedule, InstructorRef, NewTemplateEntryRequest, PresenceState, RoomRef, ScheduledSession, SessionKey,
    SessionWithPresence, TemplateEntry, TimeSlot,
};
pub use stats::{ClassStat, PresenceStats, StatsReport, StatsScope};
