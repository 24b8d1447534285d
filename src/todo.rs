// todo.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const LOCAL_ID_SUFFIX_LEN: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// The `completed` / `completedAt` pair, always written together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Completion {
    pub fn done(at: DateTime<Utc>) -> Self {
        Self {
            completed: true,
            completed_at: Some(at),
        }
    }

    pub fn open() -> Self {
        Self {
            completed: false,
            completed_at: None,
        }
    }
}

impl Todo {
    /// Builds a fresh, incomplete todo with a client-generated id.
    ///
    /// `text` is expected to be normalized already (see [`normalize_text`]).
    pub fn new_local(text: String, now: DateTime<Utc>) -> Self {
        Self {
            id: generate_local_id(now),
            text,
            completed: false,
            created_at: now,
            completed_at: None,
        }
    }

    pub fn completion(&self) -> Completion {
        Completion {
            completed: self.completed,
            completed_at: self.completed_at,
        }
    }

    /// The completion this todo would have after one toggle at `now`.
    pub fn toggled_completion(&self, now: DateTime<Utc>) -> Completion {
        if self.completed {
            Completion::open()
        } else {
            Completion::done(now)
        }
    }

    pub fn apply_completion(&mut self, completion: Completion) {
        self.completed = completion.completed;
        self.completed_at = if completion.completed {
            completion.completed_at
        } else {
            None
        };
    }

    /// Drops a `completed_at` left on an incomplete todo by an older writer.
    pub fn normalized(mut self) -> Self {
        if !self.completed {
            self.completed_at = None;
        }
        self
    }
}

/// Trims user input. Returns `None` when nothing but whitespace is left.
pub fn normalize_text(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Millisecond timestamp followed by a short random lowercase suffix.
pub fn generate_local_id(now: DateTime<Utc>) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{}{}",
        now.timestamp_millis(),
        &random[..LOCAL_ID_SUFFIX_LEN]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    #[test]
    fn normalize_text_trims_and_rejects_blank() {
        assert_eq!(normalize_text("  Buy milk \n"), Some("Buy milk".to_string()));
        assert_eq!(normalize_text(""), None);
        assert_eq!(normalize_text(" \t\r\n "), None);
    }

    #[test]
    fn local_ids_start_with_timestamp_and_are_unique() {
        let now = at(1_700_000_000);
        let a = generate_local_id(now);
        let b = generate_local_id(now);
        assert!(a.starts_with("1700000000000"));
        assert_eq!(a.len(), "1700000000000".len() + LOCAL_ID_SUFFIX_LEN);
        assert!(a.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(a, b);
    }

    #[test]
    fn toggle_twice_restores_original_completion() {
        let mut todo = Todo::new_local("A".into(), at(10));
        let original = todo.completion();

        let first = todo.toggled_completion(at(20));
        assert_eq!(first, Completion::done(at(20)));
        todo.apply_completion(first);

        let second = todo.toggled_completion(at(30));
        todo.apply_completion(second);
        assert_eq!(todo.completion(), original);
        assert_eq!(todo.completed_at, None);
    }

    #[test]
    fn normalized_clears_stale_completed_at() {
        let mut todo = Todo::new_local("A".into(), at(10));
        todo.completed_at = Some(at(11));
        assert_eq!(todo.normalized().completed_at, None);
    }

    #[test]
    fn serializes_with_camel_case_and_omits_missing_completed_at() {
        let todo = Todo::new_local("A".into(), at(10));
        let json = serde_json::to_value(&todo).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("completedAt").is_none());
    }
}
