use leptos::task::spawn_local;

use leptos::prelude::*;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::composer::InputComposer;
use crate::editor_core::{
    byte_to_utf16_offset, escape_text, utf16_to_byte_offset, Document, InlineStyle, Selection,
};
use crate::mention::Candidate;
use crate::submit::{SubmissionRouter, SubmitContext, SubmitMode};

/// User-configurable styling, applied as CSS custom properties on the
/// widget root. Hosts can pass it as a prop or push updates at runtime via
/// a `comment-theme` CustomEvent carrying either a JSON string or a
/// structured object.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CommentTheme {
    pub font_size: u32,
    pub accent_color: String,
    pub bg_primary: String,
    pub bg_secondary: String,
    pub text_primary: String,
    pub text_muted: String,
    pub border_color: String,
    pub mention_color: String,
    pub submit_bg: String,
    pub cancel_bg: String,
}

impl Default for CommentTheme {
    fn default() -> Self {
        Self {
            font_size: 15,
            accent_color: "#6366f1".to_string(),
            bg_primary: "#ffffff".to_string(),
            bg_secondary: "#f4f5f7".to_string(),
            text_primary: "#1a1a1a".to_string(),
            text_muted: "#9ca3af".to_string(),
            border_color: "#e5e7eb".to_string(),
            mention_color: "#2563eb".to_string(),
            submit_bg: "#6366f1".to_string(),
            cancel_bg: "#f3f4f6".to_string(),
        }
    }
}

impl CommentTheme {
    pub fn css_variables(&self) -> String {
        format!(
            "--comment-font-size: {}px; --comment-accent: {}; --comment-bg-primary: {}; --comment-bg-secondary: {}; --comment-text-primary: {}; --comment-text-muted: {}; --comment-border: {}; --comment-mention-color: {}; --comment-submit-bg: {}; --comment-cancel-bg: {};",
            self.font_size,
            self.accent_color,
            self.bg_primary,
            self.bg_secondary,
            self.text_primary,
            self.text_muted,
            self.border_color,
            self.mention_color,
            self.submit_bg,
            self.cancel_bg,
        )
    }
}

const COMMENT_INPUT_CSS: &str = r#"
.comment-input { display: flex; gap: 0.75rem; font-size: var(--comment-font-size); color: var(--comment-text-primary); }
.comment-avatar-img { width: 38px; height: 38px; border-radius: 50%; object-fit: cover; }
.comment-form { flex: 1; display: flex; flex-direction: column; gap: 0.5rem; position: relative; }
.comment-editor { position: relative; border: 1px solid var(--comment-border); border-radius: 8px; background: var(--comment-bg-primary); overflow: hidden; min-height: 5.5em; }
.comment-highlight-layer { position: absolute; top: 0; left: 0; width: 100%; height: 100%; padding: 0.6rem 0.8rem; white-space: pre-wrap; word-wrap: break-word; pointer-events: none; box-sizing: border-box; overflow-y: hidden; font: inherit; }
.comment-textarea { position: absolute; top: 0; left: 0; width: 100%; height: 100%; padding: 0.6rem 0.8rem; color: transparent; background: transparent; caret-color: var(--comment-text-primary); outline: none; border: none; resize: none; box-sizing: border-box; overflow-y: auto; font: inherit; }
.comment-textarea::placeholder { color: var(--comment-text-muted); }
.hl-mention { color: var(--comment-mention-color); font-weight: 600; }
.hl-bold { font-weight: 700; }
.hl-italic { font-style: italic; }
.comment-dropdown-wrapper { position: relative; }
.comment-dropdown { position: absolute; z-index: 10; width: 100%; max-height: 220px; overflow-y: auto; background: var(--comment-bg-primary); border: 1px solid var(--comment-border); border-radius: 8px; box-shadow: 0 4px 12px rgba(0,0,0,0.08); }
.comment-dropdown-item { display: flex; align-items: center; gap: 0.6rem; padding: 0.45rem 0.75rem; cursor: pointer; }
.comment-dropdown-item:hover { background: var(--comment-bg-secondary); }
.comment-user-initials { width: 28px; height: 28px; border-radius: 50%; background: var(--comment-accent); color: white; display: flex; align-items: center; justify-content: center; font-size: 0.75em; }
.comment-user-name { font-weight: 500; }
.comment-actions { display: flex; justify-content: flex-end; gap: 0.5rem; }
.comment-cancel { background: var(--comment-cancel-bg); color: var(--comment-text-primary); border: none; border-radius: 6px; padding: 0.45rem 1rem; cursor: pointer; }
.comment-post { background: var(--comment-submit-bg); color: white; border: none; border-radius: 6px; padding: 0.45rem 1.2rem; cursor: pointer; }
.comment-post:disabled { opacity: 0.5; cursor: default; }
.comment-regular-input { flex: 1; border: 1px solid var(--comment-border); border-radius: 8px; padding: 0.55rem 0.8rem; background: var(--comment-bg-primary); color: var(--comment-text-primary); outline: none; font: inherit; }
"#;

/// Renders the document into the highlight layer that sits behind the
/// transparent textarea: identical text, with styled runs wrapped in spans.
fn overlay_markup(doc: &Document) -> String {
    let text = doc.plain_text();
    let mut bounds = vec![0, text.len()];
    for span in doc.spans() {
        bounds.push(span.start);
        bounds.push(span.end);
    }
    bounds.sort_unstable();
    bounds.dedup();

    let mut html = String::new();
    for pair in bounds.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let style = doc
            .spans()
            .iter()
            .filter(|span| span.start <= a && span.end >= b)
            .map(|span| span.style)
            .min();
        let segment = escape_text(&text[a..b]);
        match style {
            Some(InlineStyle::Mention) => {
                html.push_str("<span class=\"hl-mention\">");
                html.push_str(&segment);
                html.push_str("</span>");
            }
            Some(InlineStyle::Bold) => {
                html.push_str("<span class=\"hl-bold\">");
                html.push_str(&segment);
                html.push_str("</span>");
            }
            Some(InlineStyle::Italic) => {
                html.push_str("<span class=\"hl-italic\">");
                html.push_str(&segment);
                html.push_str("</span>");
            }
            None => html.push_str(&segment),
        }
    }
    // Extra trailing line keeps the layer's height matching the textarea.
    html.push_str("\n ");
    html
}

fn dom_selection(el: &leptos::web_sys::HtmlTextAreaElement, text: &str) -> Selection {
    let start = el.selection_start().ok().flatten().unwrap_or(0) as usize;
    let end = el
        .selection_end()
        .ok()
        .flatten()
        .map(|v| v as usize)
        .unwrap_or(start);
    Selection::new(
        utf16_to_byte_offset(text, start),
        utf16_to_byte_offset(text, end),
    )
}

/// Pushes the composer's text and cursor back onto the DOM textarea after a
/// programmatic edit (mention insertion, reseed).
fn sync_textarea_cursor(
    composer: RwSignal<InputComposer>,
    textarea_ref: NodeRef<leptos::html::Textarea>,
) {
    let Some(el) = textarea_ref.get_untracked() else {
        return;
    };
    let (text, cursor) =
        composer.with_untracked(|c| (c.plain_text().to_string(), c.document().selection().start));
    el.set_value(&text);
    let pos = byte_to_utf16_offset(&text, cursor) as u32;
    let _ = el.focus();
    let _ = el.set_selection_range(pos, pos);
}

fn update_caret(composer: RwSignal<InputComposer>, el: &leptos::web_sys::HtmlTextAreaElement) {
    let value = el.value();
    let selection = dom_selection(el, &value);
    composer.update(|c| c.set_selection(selection));
}

/// Rich comment input: transparent textarea over a highlight layer, with
/// @mention autocomplete and create/edit/reply submission routing.
#[component]
pub fn CommentInput(
    router: SubmissionRouter,
    #[prop(optional)] users: Vec<Candidate>,
    /// Initial html, e.g. the comment being edited. Reinitializes the
    /// document whenever it changes to a non-empty value.
    #[prop(optional)]
    seed_html: Option<Signal<String>>,
    /// `None` (create), `"editMode"`, or `"replyMode"`.
    #[prop(optional, into)]
    mode: Option<String>,
    #[prop(optional, into)] com_id: Option<String>,
    #[prop(optional, into)] parent_id: Option<String>,
    #[prop(optional, into)] placeholder: Option<String>,
    #[prop(optional)] theme: Option<CommentTheme>,
    /// Fired by the Cancel button in edit/reply mode; the bool is true for
    /// edit mode.
    #[prop(optional)]
    on_cancel: Option<Callback<bool>>,
) -> impl IntoView {
    let submit_mode = SubmitMode::from_flag(mode.as_deref());
    let has_mode = mode.is_some();
    let is_edit_mode = submit_mode == SubmitMode::Edit;
    let ctx = SubmitContext { com_id, parent_id };

    let composer = RwSignal::new(InputComposer::new(users));
    let (theme, set_theme) = signal(theme.unwrap_or_default());
    let (scroll_top, set_scroll_top) = signal(0);
    let textarea_ref: NodeRef<leptos::html::Textarea> = NodeRef::new();

    let closure = Closure::<dyn FnMut(leptos::web_sys::CustomEvent)>::new(
        move |e: leptos::web_sys::CustomEvent| {
            let detail = e.detail();
            if let Some(json) = detail.as_string() {
                if let Ok(t) = serde_json::from_str::<CommentTheme>(&json) {
                    set_theme.set(t);
                }
            } else if let Ok(t) = serde_wasm_bindgen::from_value::<CommentTheme>(detail) {
                set_theme.set(t);
            }
        },
    );
    let _ = window()
        .add_event_listener_with_callback("comment-theme", closure.as_ref().unchecked_ref());
    closure.forget();

    if let Some(seed) = seed_html {
        Effect::new(move |_| {
            let html = seed.get();
            if !html.is_empty() {
                composer.update(|c| c.reseed(&html));
                sync_textarea_cursor(composer, textarea_ref);
            }
        });
    }

    let avatar_url = router.user.avatar_url.clone();
    let profile_url = router.user.profile_url.clone().unwrap_or_default();

    let on_input = move |ev| {
        let el: leptos::web_sys::HtmlTextAreaElement = event_target(&ev);
        let value = el.value();
        let selection = dom_selection(&el, &value);
        composer.update(|c| c.apply_input(&value, selection));
    };
    // The mention state depends on the caret, not only on the text, so
    // plain cursor movement recomputes it too.
    let on_keyup = move |ev: leptos::web_sys::KeyboardEvent| {
        let el: leptos::web_sys::HtmlTextAreaElement = event_target(&ev);
        update_caret(composer, &el);
    };
    let on_click = move |ev: leptos::web_sys::MouseEvent| {
        let el: leptos::web_sys::HtmlTextAreaElement = event_target(&ev);
        update_caret(composer, &el);
    };

    let on_submit = move |ev: leptos::web_sys::SubmitEvent| {
        ev.prevent_default();
        let Some(html) = composer.try_update(|c| c.begin_submit()).flatten() else {
            return;
        };
        // Reset eagerly; the dispatched future owns the payload from here
        // and any failure in the host's callbacks surfaces unhandled.
        composer.update(|c| c.finish_submit());
        let router = router.clone();
        let ctx = ctx.clone();
        spawn_local(async move {
            router.submit(submit_mode, html, &ctx).await;
        });
    };

    view! {
        <style>{COMMENT_INPUT_CSS}</style>
        <div class="comment-input" style=move || theme.get().css_variables()>
            <div class="comment-avatar">
                <a target="_blank" href=profile_url>
                    <img class="comment-avatar-img" src=avatar_url alt="userIcon"/>
                </a>
            </div>
            <form class="comment-form" on:submit=on_submit>
                <div class="comment-editor">
                    <div
                        class="comment-highlight-layer"
                        inner_html=move || composer.with(|c| overlay_markup(c.document()))
                        prop:scrollTop=move || scroll_top.get()
                    ></div>
                    <textarea
                        class="comment-textarea"
                        node_ref=textarea_ref
                        placeholder=placeholder.unwrap_or_else(|| "Type your reply here.".to_string())
                        spellcheck="false"
                        prop:value=move || composer.with(|c| c.plain_text().to_string())
                        on:input=on_input
                        on:keyup=on_keyup
                        on:click=on_click
                        on:scroll=move |e| {
                            let target: leptos::web_sys::Element = event_target(&e);
                            set_scroll_top.set(target.scroll_top());
                        }
                    ></textarea>
                </div>

                {move || {
                    let dropdown = composer.with(|c| c.dropdown().clone());
                    dropdown.visible.then(|| view! {
                        <div class="comment-dropdown-wrapper">
                            <div class="comment-dropdown">
                                {dropdown.candidates.into_iter().map(|user| {
                                    let initials = user.initials();
                                    let name = user.full_name();
                                    view! {
                                        <div
                                            class="comment-dropdown-item"
                                            on:mousedown=move |ev: leptos::web_sys::MouseEvent| {
                                                ev.prevent_default();
                                                composer.update(|c| {
                                                    if let Err(err) = c.select_candidate(&user) {
                                                        log::warn!("mention insert failed: {err}");
                                                    }
                                                });
                                                sync_textarea_cursor(composer, textarea_ref);
                                            }
                                        >
                                            <div class="comment-user-initials"><span>{initials}</span></div>
                                            <div class="comment-user-name">{name}</div>
                                        </div>
                                    }
                                }).collect::<Vec<_>>()}
                            </div>
                        </div>
                    })
                }}

                <div class="comment-actions">
                    {has_mode.then(|| view! {
                        <button
                            type="button"
                            class="comment-cancel"
                            on:click=move |_| {
                                if let Some(cb) = on_cancel {
                                    cb.run(is_edit_mode);
                                }
                            }
                        >
                            "Cancel"
                        </button>
                    })}
                    <button
                        type="submit"
                        class="comment-post"
                        prop:disabled=move || composer.with(|c| c.is_content_empty())
                    >
                        "Post"
                    </button>
                </div>
            </form>
        </div>
    }
}

/// Plain single-line comment input without mention support, sharing the
/// same submission routing as [`CommentInput`].
#[component]
pub fn RegularInput(
    router: SubmissionRouter,
    #[prop(optional, into)] mode: Option<String>,
    #[prop(optional, into)] com_id: Option<String>,
    #[prop(optional, into)] parent_id: Option<String>,
    #[prop(optional, into)] placeholder: Option<String>,
    #[prop(optional)] theme: Option<CommentTheme>,
    #[prop(optional)] on_cancel: Option<Callback<bool>>,
) -> impl IntoView {
    let submit_mode = SubmitMode::from_flag(mode.as_deref());
    let has_mode = mode.is_some();
    let is_edit_mode = submit_mode == SubmitMode::Edit;
    let ctx = SubmitContext { com_id, parent_id };

    let (text, set_text) = signal(String::new());
    let theme = theme.unwrap_or_default();

    let avatar_url = router.user.avatar_url.clone();
    let profile_url = router.user.profile_url.clone().unwrap_or_default();

    let on_submit = move |ev: leptos::web_sys::SubmitEvent| {
        ev.prevent_default();
        let value = text.get_untracked();
        if value.trim().is_empty() {
            return;
        }
        set_text.set(String::new());
        let router = router.clone();
        let ctx = ctx.clone();
        spawn_local(async move {
            router.submit(submit_mode, value, &ctx).await;
        });
    };

    view! {
        <style>{COMMENT_INPUT_CSS}</style>
        <div class="comment-input" style=theme.css_variables()>
            <div class="comment-avatar">
                <a target="_blank" href=profile_url>
                    <img class="comment-avatar-img" src=avatar_url alt="userIcon"/>
                </a>
            </div>
            <form class="comment-form" on:submit=on_submit>
                <input
                    class="comment-regular-input"
                    type="text"
                    placeholder=placeholder.unwrap_or_else(|| "Type your reply here.".to_string())
                    prop:value=move || text.get()
                    on:input=move |ev| set_text.set(event_target_value(&ev))
                />
                <div class="comment-actions">
                    {has_mode.then(|| view! {
                        <button
                            type="button"
                            class="comment-cancel"
                            on:click=move |_| {
                                if let Some(cb) = on_cancel {
                                    cb.run(is_edit_mode);
                                }
                            }
                        >
                            "Cancel"
                        </button>
                    })}
                    <button
                        type="submit"
                        class="comment-post"
                        prop:disabled=move || text.get().trim().is_empty()
                    >
                        "Post"
                    </button>
                </div>
            </form>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_round_trips_through_json() {
        let theme = CommentTheme {
            mention_color: "#ff0000".to_string(),
            ..CommentTheme::default()
        };
        let json = serde_json::to_string(&theme).unwrap();
        let parsed: CommentTheme = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, theme);
    }

    #[test]
    fn css_variables_expose_every_theme_knob() {
        let css = CommentTheme::default().css_variables();
        assert!(css.contains("--comment-font-size: 15px"));
        assert!(css.contains("--comment-mention-color: #2563eb"));
        assert!(css.contains("--comment-submit-bg:"));
    }

    #[test]
    fn overlay_wraps_mention_spans() {
        let doc = Document::from_html("<p>hi <span class=\"mention\">@Ada Lovelace</span>!</p>");
        assert_eq!(
            overlay_markup(&doc),
            "hi <span class=\"hl-mention\">@Ada Lovelace</span>!\n "
        );
    }

    #[test]
    fn overlay_escapes_markup_in_plain_text() {
        let doc = Document::from_html("<p>a &lt;b&gt; &amp; c</p>");
        assert_eq!(overlay_markup(&doc), "a &lt;b&gt; &amp; c\n ");
    }

    #[test]
    fn overlay_of_empty_document_is_just_the_filler() {
        assert_eq!(overlay_markup(&Document::new()), "\n ");
    }
}
