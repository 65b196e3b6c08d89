pub mod app;
pub mod composer;
pub mod editor_core;
pub mod mention;
pub mod submit;

pub use app::{CommentInput, CommentTheme, RegularInput};
pub use composer::{ComposerState, InputComposer};
pub use editor_core::{Document, DocumentError, InlineStyle, Selection, StyleSpan, EMPTY_HTML};
pub use mention::{compute_mention_state, Candidate, DropdownState, MentionQuery};
pub use submit::{
    ActionPayload, CurrentUser, SubmissionRouter, SubmitCallbacks, SubmitContext, SubmitMode,
};

/// One-time wasm setup; call before mounting any component.
pub fn init() {
    console_error_panic_hook::set_once();
}
