use crate::editor_core::{Document, DocumentError, InlineStyle, Selection, EMPTY_HTML};
use crate::mention::{compute_mention_state, Candidate, DropdownState, MentionQuery};

/// Lifecycle of the input widget.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ComposerState {
    #[default]
    Empty,
    Editing,
    MentionOpen,
    Submitting,
}

/// Owns the editing state of one comment input: the document, the derived
/// mention query/dropdown, and the serialized html that the host observes.
///
/// Every transition that changes the document re-serializes it, so `html()`
/// is always current. The mention state is recomputed on every text or
/// selection change, never carried over from a previous keystroke.
#[derive(Clone, Debug)]
pub struct InputComposer {
    doc: Document,
    state: ComposerState,
    query: MentionQuery,
    dropdown: DropdownState,
    html: String,
    candidates: Vec<Candidate>,
}

impl InputComposer {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            doc: Document::new(),
            state: ComposerState::Empty,
            query: MentionQuery::default(),
            dropdown: DropdownState::default(),
            html: EMPTY_HTML.to_string(),
            candidates,
        }
    }

    /// Initializes the document from seed html (edit mode). A malformed or
    /// empty seed falls back to the empty document.
    pub fn with_seed_html(seed: &str, candidates: Vec<Candidate>) -> Self {
        let mut composer = Self::new(candidates);
        composer.reseed(seed);
        composer
    }

    /// Reinitializes from externally supplied html, e.g. when the host
    /// switches the input into edit mode mid-session.
    pub fn reseed(&mut self, seed: &str) {
        self.doc = Document::from_html(seed);
        self.state = if self.doc.is_empty() {
            ComposerState::Empty
        } else {
            ComposerState::Editing
        };
        self.query = MentionQuery::default();
        self.dropdown = DropdownState::default();
        self.html = self.doc.to_html();
    }

    pub fn state(&self) -> ComposerState {
        self.state
    }

    /// The externally observable serialized value.
    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn plain_text(&self) -> &str {
        self.doc.plain_text()
    }

    pub fn dropdown(&self) -> &DropdownState {
        &self.dropdown
    }

    pub fn mention_query(&self) -> &MentionQuery {
        &self.query
    }

    /// True when the serialized content equals the canonical empty value;
    /// submission is a no-op in that case.
    pub fn is_content_empty(&self) -> bool {
        self.html == EMPTY_HTML
    }

    pub fn set_candidates(&mut self, candidates: Vec<Candidate>) {
        self.candidates = candidates;
        self.recompute_mention_state();
    }

    /// Applies a keystroke's worth of change reported by the editing
    /// surface: the full new plain text plus the selection after the edit.
    pub fn apply_input(&mut self, new_text: &str, selection: Selection) {
        self.doc = self.doc.apply_input(new_text, selection);
        self.html = self.doc.to_html();
        self.recompute_mention_state();
    }

    /// Selection-only change (arrow keys, mouse click). The document is
    /// untouched but the mention state still depends on the cursor.
    pub fn set_selection(&mut self, selection: Selection) {
        self.doc.set_selection(selection);
        self.recompute_mention_state();
    }

    /// Replaces the span from the trigger character to the cursor with the
    /// candidate's mention text plus a trailing unstyled space, hides the
    /// dropdown, and places the cursor after the inserted text.
    pub fn select_candidate(&mut self, candidate: &Candidate) -> Result<(), DocumentError> {
        let Some(trigger_index) = self.query.trigger_index else {
            return Ok(());
        };
        let cursor = self.doc.selection().clamp(self.doc.plain_text().len()).start;

        let doc = self.doc.replace_range(
            trigger_index,
            cursor,
            &candidate.mention_text(),
            Some(InlineStyle::Mention),
        )?;
        // The trailing space carries no style, so whatever is typed next is
        // plain text again.
        let after_mention = doc.selection().start;
        self.doc = doc.insert_at(after_mention, " ", None)?;

        self.html = self.doc.to_html();
        self.query = MentionQuery::default();
        self.dropdown = DropdownState::default();
        self.state = ComposerState::Editing;
        Ok(())
    }

    /// Starts a submission: returns the serialized payload and enters
    /// `Submitting`, or `None` (state unchanged) when the content is the
    /// canonical empty document.
    pub fn begin_submit(&mut self) -> Option<String> {
        if self.is_content_empty() {
            return None;
        }
        self.state = ComposerState::Submitting;
        Some(self.html.clone())
    }

    /// Resets to the empty document after a submission has been dispatched.
    /// Called eagerly: the composer does not wait for the host's callbacks.
    pub fn finish_submit(&mut self) {
        self.doc = Document::new();
        self.html = EMPTY_HTML.to_string();
        self.query = MentionQuery::default();
        self.dropdown = DropdownState::default();
        self.state = ComposerState::Empty;
    }

    fn recompute_mention_state(&mut self) {
        let cursor = self.doc.selection().start;
        let (query, dropdown) =
            compute_mention_state(self.doc.plain_text(), cursor, &self.candidates);
        self.query = query;
        self.dropdown = dropdown;

        self.state = if self.dropdown.visible {
            ComposerState::MentionOpen
        } else if self.doc.is_empty() {
            ComposerState::Empty
        } else {
            ComposerState::Editing
        };
    }
}
