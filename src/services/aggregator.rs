use std::collections::{BTreeMap, HashMap};

use crate::models::{ClassStat, PresenceState, PresenceStats, Program, SessionWithPresence};

/// Rounded percentage of present sessions among declared ones, half up.
pub fn presence_rate(present: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (present, total) = (u64::from(present), u64::from(total));
    ((present * 200 + total) / (total * 2)) as u32
}

impl PresenceStats {
    fn count(&mut self, state: PresenceState) {
        match state {
            PresenceState::Unset => self.unset += 1,
            PresenceState::Pending => self.pending += 1,
            PresenceState::Present => self.present += 1,
            PresenceState::Absent => self.absent += 1,
            PresenceState::Late => self.late += 1,
        }
    }

    fn finish(mut self) -> Self {
        self.total = self.present + self.absent + self.late + self.pending;
        self.presence_rate = presence_rate(self.present, self.total);
        self
    }

    /// Sums two summaries, recomputing the derived fields.
    pub fn merge(self, other: PresenceStats) -> PresenceStats {
        PresenceStats {
            total: 0,
            present: self.present + other.present,
            absent: self.absent + other.absent,
            late: self.late + other.late,
            pending: self.pending + other.pending,
            unset: self.unset + other.unset,
            presence_rate: 0,
        }
        .finish()
    }
}

pub fn aggregate<'a, I>(sessions: I) -> PresenceStats
where
    I: IntoIterator<Item = &'a SessionWithPresence>,
{
    let mut stats = PresenceStats::default();
    for s in sessions {
        stats.count(s.state);
    }
    stats.finish()
}

/// One [`ClassStat`] per `(program_id, group)` present in `sessions`, in
/// [`sort_class_stats`] order.
///
/// Sessions of programs missing from `catalog` are still counted, with an
/// empty name and zero level.
pub fn aggregate_by_class(sessions: &[SessionWithPresence], catalog: &[Program]) -> Vec<ClassStat> {
    let programs: HashMap<&str, &Program> = catalog.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut groups: BTreeMap<(&str, u32), PresenceStats> = BTreeMap::new();
    for s in sessions {
        groups
            .entry((s.session.program_id.as_str(), s.session.group))
            .or_default()
            .count(s.state);
    }

    let mut stats: Vec<ClassStat> = groups
        .into_iter()
        .map(|((program_id, group), counts)| {
            let program = programs.get(program_id);
            ClassStat {
                program_id: program_id.to_string(),
                program_name: program.map(|p| p.name.clone()).unwrap_or_default(),
                licence_level: program.map_or(0, |p| p.licence_level),
                semester: program.map_or(0, |p| p.semester),
                group,
                stats: counts.finish(),
            }
        })
        .collect();

    sort_class_stats(&mut stats);
    stats
}

/// Orders class summaries by program name, level, semester, group and id.
pub fn sort_class_stats(stats: &mut [ClassStat]) {
    stats.sort_by(|a, b| {
        (&a.program_name, a.licence_level, a.semester, a.group, &a.program_id).cmp(&(
            &b.program_name,
            b.licence_level,
            b.semester,
            b.group,
            &b.program_id,
        ))
    });
}

/// Global summary over class summaries.
pub fn aggregate_global(classes: &[ClassStat]) -> PresenceStats {
    classes
        .iter()
        .fold(PresenceStats::default(), |acc, c| acc.merge(c.stats))
}
