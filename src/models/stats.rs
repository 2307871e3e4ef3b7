use serde::{Deserialize, Serialize};

/// Counts of declared sessions by status.
///
/// `total` only counts sessions carrying a presence record, so
/// `present + absent + late + pending == total`. Sessions without a record
/// are reported separately in `unset`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceStats {
    pub total: u32,
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub pending: u32,
    pub unset: u32,
    pub presence_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassStat {
    pub program_id: String,
    pub program_name: String,
    pub licence_level: u32,
    pub semester: u32,
    pub group: u32,
    #[serde(flatten)]
    pub stats: PresenceStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum StatsScope {
    AllClasses,
    OneClass { program_id: String, group: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum StatsReport {
    AllClasses {
        classes: Vec<ClassStat>,
        global: PresenceStats,
    },
    OneClass(ClassStat),
}
