use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Program {
    pub id: String,
    pub name: String,
    pub licence_level: u32,
    pub semester: u32,
    pub group_count: u32,
}

/// Structured form of a class label such as `Génie Civil - L4 S7 G1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCoordinates {
    pub name: String,
    pub licence: u32,
    pub semester: u32,
    pub group: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProgramRequest {
    pub name: String,
    pub licence_level: u32,
    pub semester: u32,
    pub group_count: u32,
}
