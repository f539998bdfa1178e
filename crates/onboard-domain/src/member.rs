// member.rs
use std::fmt;

/// Marcador de estado visible para el operador en la ficha del miembro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberStatus {
  Pending,
  DaySent(u32),
  DayFailed(u32),
  Completed,
  Cancelled,
}

impl fmt::Display for MemberStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MemberStatus::Pending => write!(f, "pending"),
      MemberStatus::DaySent(day) => write!(f, "Day {}: Sent", day),
      MemberStatus::DayFailed(day) => write!(f, "Day {}: Failed", day),
      MemberStatus::Completed => write!(f, "completed"),
      MemberStatus::Cancelled => write!(f, "cancelled"),
    }
  }
}
