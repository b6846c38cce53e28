use crate::geo::Point;

/// Workforce member with a geocoded home. The planning core only reads these;
/// CRUD lives outside.
#[derive(Debug, Clone)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub home: Point,
    pub address: Option<String>,
    pub shift_id: Option<i64>,
}

/// Work shift, used purely as an employee filter.
#[derive(Debug, Clone)]
pub struct Shift {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}
