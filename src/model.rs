use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const STUDENT_KEY_PREFIX: &str = "student_";
pub const LOGS_KEY: &str = "attendanceLogs";
pub const SETTINGS_KEY: &str = "settings";

/// Session packages sold at the front desk.
pub const PACKAGE_SIZES: [i64; 4] = [5, 10, 15, 20];

pub const DEFAULT_LOG_RETENTION: usize = 100;
pub const DEFAULT_RECEPTIONIST: &str = "Reception Staff";

pub const STUDENT_ID_LEN: usize = 9;
const STUDENT_ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// One member record, stored under `student_<ID>` as JSON. Field names stay
/// camelCase so records written by the original front end parse unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub student_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    /// Total purchased sessions, kept as a numeric string (legacy wire shape).
    pub sessions: String,
    #[serde(default)]
    pub attended_sessions: i64,
    pub registration_date: String,
    #[serde(default)]
    pub last_checkin: Option<String>,
}

impl StudentRecord {
    pub fn storage_key(&self) -> String {
        student_key(&self.student_id)
    }

    /// Lenient parse: a non-numeric `sessions` value counts as zero.
    pub fn total_sessions(&self) -> i64 {
        self.sessions.trim().parse().unwrap_or(0)
    }

    pub fn derived(&self) -> Derived {
        Derived::of(self.total_sessions(), self.attended_sessions)
    }

    pub fn matches(&self, needle: &str) -> bool {
        contains_ci(&self.full_name, needle)
            || contains_ci(&self.email, needle)
            || contains_ci(&self.student_id, needle)
    }
}

/// One check-in fact, denormalized: the name is snapshotted at check-in time
/// and never re-joined against the live record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub student_id: String,
    pub student_name: String,
    pub checkin_time: String,
    pub receptionist: String,
    pub session_number: i64,
}

impl LogEntry {
    pub fn matches(&self, needle: &str) -> bool {
        contains_ci(&self.student_name, needle)
            || contains_ci(&self.student_id, needle)
            || contains_ci(&self.receptionist, needle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StudentStatus {
    Active,
    AtRisk,
    Completed,
}

impl StudentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StudentStatus::Active => "active",
            StudentStatus::AtRisk => "at-risk",
            StudentStatus::Completed => "completed",
        }
    }

    /// Filter values as sent by the admin list screen. Anything else (for
    /// example "all") means no status filter.
    pub fn parse_filter(s: &str) -> Option<StudentStatus> {
        match s {
            "active" => Some(StudentStatus::Active),
            "at-risk" => Some(StudentStatus::AtRisk),
            "completed" => Some(StudentStatus::Completed),
            _ => None,
        }
    }
}

/// Derived fields recomputed from (sessions, attendedSessions) wherever they
/// are shown. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Derived {
    pub total_sessions: i64,
    pub remaining_sessions: i64,
    pub attendance_rate: i64,
    pub status: StudentStatus,
}

impl Derived {
    pub fn of(total: i64, attended: i64) -> Derived {
        let remaining = total - attended;
        // The browser original divides blindly and renders NaN for a
        // zero-session record; a non-positive total pins the rate to 0 here.
        let rate = if total > 0 {
            ((attended as f64 * 100.0) / total as f64).round() as i64
        } else {
            0
        };
        let status = if remaining <= 0 {
            StudentStatus::Completed
        } else if rate < 50 {
            StudentStatus::AtRisk
        } else {
            StudentStatus::Active
        };
        Derived {
            total_sessions: total,
            remaining_sessions: remaining,
            attendance_rate: rate,
            status,
        }
    }
}

pub fn student_key(student_id: &str) -> String {
    format!("{}{}", STUDENT_KEY_PREFIX, student_id)
}

/// Normalization applied to operator-entered codes before lookup.
pub fn normalize_student_id(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// 9 uppercase alphanumerics, no collision check (matches the issued-card
/// policy of the original registration flow). UUID v4 supplies the entropy.
pub fn generate_student_id() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    bytes
        .iter()
        .take(STUDENT_ID_LEN)
        .map(|b| STUDENT_ID_ALPHABET[(*b as usize) % STUDENT_ID_ALPHABET.len()] as char)
        .collect()
}

/// Current instant as ISO-8601 UTC with millisecond precision, the same
/// shape `Date.toISOString()` produced in stored records.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sessions: &str, attended: i64) -> StudentRecord {
        StudentRecord {
            student_id: "ABC123XYZ".to_string(),
            full_name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            phone: "+1 555 0100".to_string(),
            sessions: sessions.to_string(),
            attended_sessions: attended,
            registration_date: "2026-01-05T09:00:00.000Z".to_string(),
            last_checkin: None,
        }
    }

    #[test]
    fn derived_example_from_design() {
        let d = record("10", 4).derived();
        assert_eq!(d.remaining_sessions, 6);
        assert_eq!(d.attendance_rate, 40);
        assert_eq!(d.status, StudentStatus::AtRisk);
    }

    #[test]
    fn status_partition_is_total_and_exclusive() {
        for total in 0..=20 {
            for attended in 0..=25 {
                let d = Derived::of(total, attended);
                let completed = d.remaining_sessions <= 0;
                let at_risk = d.remaining_sessions > 0 && d.attendance_rate < 50;
                let active = d.remaining_sessions > 0 && d.attendance_rate >= 50;
                let held = [completed, at_risk, active]
                    .iter()
                    .filter(|b| **b)
                    .count();
                assert_eq!(held, 1, "total={} attended={}", total, attended);
                let expected = if completed {
                    StudentStatus::Completed
                } else if at_risk {
                    StudentStatus::AtRisk
                } else {
                    StudentStatus::Active
                };
                assert_eq!(d.status, expected, "total={} attended={}", total, attended);
            }
        }
    }

    #[test]
    fn zero_or_garbage_sessions_do_not_divide_by_zero() {
        let d = record("0", 0).derived();
        assert_eq!(d.attendance_rate, 0);
        assert_eq!(d.status, StudentStatus::Completed);

        let d = record("not-a-number", 3).derived();
        assert_eq!(d.total_sessions, 0);
        assert_eq!(d.attendance_rate, 0);
        assert_eq!(d.status, StudentStatus::Completed);
    }

    #[test]
    fn rate_rounds_to_nearest_integer() {
        assert_eq!(Derived::of(3, 1).attendance_rate, 33);
        assert_eq!(Derived::of(3, 2).attendance_rate, 67);
        assert_eq!(Derived::of(15, 7).attendance_rate, 47);
    }

    #[test]
    fn generated_ids_match_card_policy() {
        for _ in 0..50 {
            let id = generate_student_id();
            assert_eq!(id.len(), STUDENT_ID_LEN);
            assert!(id.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn lookup_normalization_uppercases_and_trims() {
        assert_eq!(normalize_student_id("  ab12cd34e "), "AB12CD34E");
    }

    #[test]
    fn record_filter_covers_name_email_and_id() {
        let r = record("10", 0);
        assert!(r.matches("jane"));
        assert!(r.matches("EXAMPLE.COM"));
        assert!(r.matches("abc123"));
        assert!(!r.matches("nobody"));
    }
}
