use serde::{Deserialize, Serialize};

/// The character that opens mention matching.
pub const MENTION_TRIGGER: char = '@';

/// A user that can be mentioned. Supplied by the host in display order and
/// read-only to the widget.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Candidate {
    pub fn new(
        id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            profile_url: None,
            image_url: None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// First letters of both names, shown in the dropdown avatar bubble.
    pub fn initials(&self) -> String {
        let mut initials = String::new();
        if let Some(first) = self.first_name.chars().next() {
            initials.push(first);
        }
        initials.push(' ');
        if let Some(last) = self.last_name.chars().next() {
            initials.push(last);
        }
        initials
    }

    /// The text spliced into the document when this candidate is selected,
    /// without the trailing space.
    pub fn mention_text(&self) -> String {
        format!("{MENTION_TRIGGER}{} {}", self.first_name, self.last_name)
    }
}

/// The active mention query, derived from the plain text and cursor on
/// every change; never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MentionQuery {
    /// Byte offset of the trigger character, if one is active.
    pub trigger_index: Option<usize>,
    /// Case-folded text between the trigger and the cursor.
    pub query: String,
}

impl MentionQuery {
    pub fn is_active(&self) -> bool {
        self.trigger_index.is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DropdownState {
    pub visible: bool,
    pub candidates: Vec<Candidate>,
}

impl DropdownState {
    fn hidden() -> Self {
        Self::default()
    }
}

/// Derives the mention query and dropdown state from the current plain text
/// and cursor offset.
///
/// The scan walks backward from the cursor and takes the nearest trigger
/// character; hitting whitespace first (or the start of text) means no
/// trigger is active. An empty query right after the trigger shows the full
/// candidate list; otherwise candidates whose first or last name starts with
/// the query (case-insensitive) are kept, in input order. An empty candidate
/// list never opens the dropdown.
///
/// This must be recomputed on every text or selection change: deleting the
/// trigger character hides the dropdown on the very next call.
pub fn compute_mention_state(
    plain_text: &str,
    cursor_offset: usize,
    candidates: &[Candidate],
) -> (MentionQuery, DropdownState) {
    let Some(trigger_index) = find_trigger(plain_text, cursor_offset) else {
        return (MentionQuery::default(), DropdownState::hidden());
    };

    let cursor = cursor_offset.min(plain_text.len());
    let query = plain_text[trigger_index + MENTION_TRIGGER.len_utf8()..cursor].to_lowercase();

    let filtered: Vec<Candidate> = if query.is_empty() {
        candidates.to_vec()
    } else {
        candidates
            .iter()
            .filter(|c| {
                c.first_name.to_lowercase().starts_with(&query)
                    || c.last_name.to_lowercase().starts_with(&query)
            })
            .cloned()
            .collect()
    };

    let dropdown = DropdownState {
        visible: !filtered.is_empty(),
        candidates: filtered,
    };
    let query = MentionQuery {
        trigger_index: Some(trigger_index),
        query,
    };
    (query, dropdown)
}

/// Byte offset of the nearest trigger character before `cursor`, or `None`
/// if whitespace (or the start of text) is reached first.
fn find_trigger(text: &str, cursor: usize) -> Option<usize> {
    let mut cursor = cursor.min(text.len());
    while !text.is_char_boundary(cursor) {
        cursor -= 1;
    }
    for (idx, ch) in text[..cursor].char_indices().rev() {
        if ch == MENTION_TRIGGER {
            return Some(idx);
        }
        if ch.is_whitespace() {
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Vec<Candidate> {
        vec![
            Candidate::new("u1", "John", "Doe"),
            Candidate::new("u2", "Jane", "Smith"),
            Candidate::new("u3", "Dora", "Jones"),
        ]
    }

    #[test]
    fn no_trigger_means_hidden_dropdown() {
        let (query, dropdown) = compute_mention_state("hello world", 11, &users());
        assert_eq!(query.trigger_index, None);
        assert!(!dropdown.visible);
        assert!(dropdown.candidates.is_empty());
    }

    #[test]
    fn whitespace_between_cursor_and_trigger_cancels_it() {
        let (query, dropdown) = compute_mention_state("@jo hn", 6, &users());
        assert_eq!(query.trigger_index, None);
        assert!(!dropdown.visible);
    }

    #[test]
    fn bare_trigger_shows_full_list() {
        let (query, dropdown) = compute_mention_state("hey @", 5, &users());
        assert_eq!(query.trigger_index, Some(4));
        assert_eq!(query.query, "");
        assert!(dropdown.visible);
        assert_eq!(dropdown.candidates, users());
    }

    #[test]
    fn prefix_match_is_case_insensitive_on_both_names() {
        let (query, dropdown) = compute_mention_state("@JO", 3, &users());
        assert_eq!(query.query, "jo");
        assert!(dropdown.visible);
        // "John Doe" by first name, "Dora Jones" by last name; input order kept.
        let names: Vec<String> = dropdown.candidates.iter().map(|c| c.full_name()).collect();
        assert_eq!(names, ["John Doe", "Dora Jones"]);
    }

    #[test]
    fn no_match_hides_dropdown_but_keeps_query() {
        let (query, dropdown) = compute_mention_state("@zzz", 4, &users());
        assert_eq!(query.trigger_index, Some(0));
        assert_eq!(query.query, "zzz");
        assert!(!dropdown.visible);
        assert!(dropdown.candidates.is_empty());
    }

    #[test]
    fn trigger_mid_word_is_found() {
        // The scan only stops at whitespace, so "Hello@Jo" is an active query.
        let (query, dropdown) = compute_mention_state("Hello@Jo", 8, &users());
        assert_eq!(query.trigger_index, Some(5));
        assert_eq!(query.query, "jo");
        assert!(dropdown.visible);
    }

    #[test]
    fn empty_candidate_list_never_opens() {
        let (query, dropdown) = compute_mention_state("@", 1, &[]);
        assert_eq!(query.trigger_index, Some(0));
        assert!(!dropdown.visible);
    }

    #[test]
    fn deleting_the_trigger_hides_on_next_recompute() {
        let (_, dropdown) = compute_mention_state("hi @jo", 6, &users());
        assert!(dropdown.visible);

        // Trigger deleted; same recompute path must hide the dropdown.
        let (query, dropdown) = compute_mention_state("hi jo", 5, &users());
        assert_eq!(query.trigger_index, None);
        assert!(!dropdown.visible);
    }

    #[test]
    fn cursor_past_end_is_clamped() {
        let (query, dropdown) = compute_mention_state("@ja", 99, &users());
        assert_eq!(query.query, "ja");
        assert_eq!(
            dropdown.candidates,
            vec![Candidate::new("u2", "Jane", "Smith")]
        );
    }
}
