use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

/// Which submission flow a composed comment is routed to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SubmitMode {
    #[default]
    Create,
    Edit,
    Reply,
}

impl SubmitMode {
    /// Parses the host-facing mode flag: absent means create.
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("editMode") => SubmitMode::Edit,
            Some("replyMode") => SubmitMode::Reply,
            _ => SubmitMode::Create,
        }
    }
}

/// The author of everything this widget submits. Passed in explicitly
/// rather than read from ambient global state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: String,
    pub full_name: String,
    pub avatar_url: String,
    pub profile_url: Option<String>,
}

/// Identifiers of the comment being edited or replied to. Empty for the
/// create flow.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubmitContext {
    pub com_id: Option<String>,
    pub parent_id: Option<String>,
}

/// Structured payload handed to the optional `*_action` callbacks after the
/// primary callback resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPayload {
    pub user_id: String,
    pub com_id: String,
    pub avatar_url: String,
    pub user_profile: Option<String>,
    pub full_name: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_of_edited_comment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replied_to_comment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_of_replied_comment_id: Option<String>,
}

/// Callbacks run on the single-threaded UI event loop, so the futures they
/// return need not be `Send`; the callbacks themselves are shared across
/// view closures and must be.
pub type CallbackFuture = Pin<Box<dyn Future<Output = ()>>>;

/// `(text, new_comment_id)`
pub type SubmitFn = Arc<dyn Fn(String, String) -> CallbackFuture + Send + Sync>;
/// `(text, com_id, parent_id)`
pub type EditFn = Arc<dyn Fn(String, Option<String>, Option<String>) -> CallbackFuture + Send + Sync>;
/// `(text, com_id, parent_id, reply_id)`
pub type ReplyFn =
    Arc<dyn Fn(String, Option<String>, Option<String>, String) -> CallbackFuture + Send + Sync>;
pub type ActionFn = Arc<dyn Fn(ActionPayload) -> CallbackFuture + Send + Sync>;

/// The host's submission callbacks: one primary mutation callback per mode,
/// each with an optional action counterpart fired after it. Failures are
/// not caught here; an error escaping a callback surfaces to the host, and
/// a completed primary callback is not rolled back if its action fails.
#[derive(Clone)]
pub struct SubmitCallbacks {
    pub on_submit: SubmitFn,
    pub on_edit: EditFn,
    pub on_reply: ReplyFn,
    pub on_submit_action: Option<ActionFn>,
    pub on_edit_action: Option<ActionFn>,
    pub on_reply_action: Option<ActionFn>,
}

impl SubmitCallbacks {
    pub fn new(on_submit: SubmitFn, on_edit: EditFn, on_reply: ReplyFn) -> Self {
        Self {
            on_submit,
            on_edit,
            on_reply,
            on_submit_action: None,
            on_edit_action: None,
            on_reply_action: None,
        }
    }

    pub fn with_submit_action(mut self, action: ActionFn) -> Self {
        self.on_submit_action = Some(action);
        self
    }

    pub fn with_edit_action(mut self, action: ActionFn) -> Self {
        self.on_edit_action = Some(action);
        self
    }

    pub fn with_reply_action(mut self, action: ActionFn) -> Self {
        self.on_reply_action = Some(action);
        self
    }
}

/// Routes a composed submission to the create, edit, or reply flow.
#[derive(Clone)]
pub struct SubmissionRouter {
    pub user: CurrentUser,
    pub callbacks: SubmitCallbacks,
}

impl SubmissionRouter {
    pub fn new(user: CurrentUser, callbacks: SubmitCallbacks) -> Self {
        Self { user, callbacks }
    }

    /// Dispatches `html` according to `mode`. Always asynchronous: the
    /// primary callback is awaited first, then the action callback if one
    /// is configured.
    pub async fn submit(&self, mode: SubmitMode, html: String, ctx: &SubmitContext) {
        match mode {
            SubmitMode::Create => self.submit_create(html).await,
            SubmitMode::Edit => self.submit_edit(html, ctx).await,
            SubmitMode::Reply => self.submit_reply(html, ctx).await,
        }
    }

    async fn submit_create(&self, html: String) {
        let new_id = new_comment_id();
        (self.callbacks.on_submit)(html.clone(), new_id.clone()).await;
        if let Some(action) = &self.callbacks.on_submit_action {
            action(self.payload(new_id, html)).await;
        }
    }

    async fn submit_edit(&self, html: String, ctx: &SubmitContext) {
        (self.callbacks.on_edit)(html.clone(), ctx.com_id.clone(), ctx.parent_id.clone()).await;
        if let Some(action) = &self.callbacks.on_edit_action {
            let mut payload = self.payload(ctx.com_id.clone().unwrap_or_default(), html);
            payload.parent_of_edited_comment_id = ctx.parent_id.clone();
            action(payload).await;
        }
    }

    async fn submit_reply(&self, html: String, ctx: &SubmitContext) {
        let reply_id = new_comment_id();
        (self.callbacks.on_reply)(
            html.clone(),
            ctx.com_id.clone(),
            ctx.parent_id.clone(),
            reply_id.clone(),
        )
        .await;
        if let Some(action) = &self.callbacks.on_reply_action {
            let mut payload = self.payload(reply_id, html);
            payload.replied_to_comment_id = ctx.com_id.clone();
            payload.parent_of_replied_comment_id = ctx.parent_id.clone();
            action(payload).await;
        }
    }

    fn payload(&self, com_id: String, text: String) -> ActionPayload {
        ActionPayload {
            user_id: self.user.id.clone(),
            com_id,
            avatar_url: self.user.avatar_url.clone(),
            user_profile: self.user.profile_url.clone(),
            full_name: self.user.full_name.clone(),
            text,
            parent_of_edited_comment_id: None,
            replied_to_comment_id: None,
            parent_of_replied_comment_id: None,
        }
    }
}

fn new_comment_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::sync::Mutex;

    #[derive(Debug, PartialEq)]
    enum Call {
        Submit(String, String),
        Edit(String, Option<String>, Option<String>),
        Reply(String, Option<String>, Option<String>, String),
        Action(ActionPayload),
    }

    type CallLog = Arc<Mutex<Vec<Call>>>;

    fn user() -> CurrentUser {
        CurrentUser {
            id: "user-1".into(),
            full_name: "Ada Lovelace".into(),
            avatar_url: "https://example.com/ada.png".into(),
            profile_url: Some("https://example.com/ada".into()),
        }
    }

    fn recording_router(log: CallLog, with_actions: bool) -> SubmissionRouter {
        let submit_log = log.clone();
        let edit_log = log.clone();
        let reply_log = log.clone();
        let callbacks = SubmitCallbacks::new(
            Arc::new(move |text, id| {
                let log = submit_log.clone();
                Box::pin(async move {
                    log.lock().unwrap().push(Call::Submit(text, id));
                })
            }),
            Arc::new(move |text, com_id, parent_id| {
                let log = edit_log.clone();
                Box::pin(async move {
                    log.lock().unwrap().push(Call::Edit(text, com_id, parent_id));
                })
            }),
            Arc::new(move |text, com_id, parent_id, reply_id| {
                let log = reply_log.clone();
                Box::pin(async move {
                    log.lock()
                        .unwrap()
                        .push(Call::Reply(text, com_id, parent_id, reply_id));
                })
            }),
        );

        let callbacks = if with_actions {
            let action = |log: CallLog| -> ActionFn {
                Arc::new(move |payload| {
                    let log = log.clone();
                    Box::pin(async move {
                        log.lock().unwrap().push(Call::Action(payload));
                    })
                })
            };
            callbacks
                .with_submit_action(action(log.clone()))
                .with_edit_action(action(log.clone()))
                .with_reply_action(action(log.clone()))
        } else {
            callbacks
        };

        SubmissionRouter::new(user(), callbacks)
    }

    #[test]
    fn mode_flag_parses_like_the_host_api() {
        assert_eq!(SubmitMode::from_flag(None), SubmitMode::Create);
        assert_eq!(SubmitMode::from_flag(Some("editMode")), SubmitMode::Edit);
        assert_eq!(SubmitMode::from_flag(Some("replyMode")), SubmitMode::Reply);
        assert_eq!(SubmitMode::from_flag(Some("bogus")), SubmitMode::Create);
    }

    #[test]
    fn create_generates_id_and_fires_both_callbacks_in_order() {
        let log: CallLog = Arc::default();
        let router = recording_router(log.clone(), true);

        block_on(router.submit(
            SubmitMode::Create,
            "<p>hi</p>".into(),
            &SubmitContext::default(),
        ));

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        let Call::Submit(text, id) = &log[0] else {
            panic!("expected primary submit first, got {:?}", log[0]);
        };
        assert_eq!(text, "<p>hi</p>");
        assert!(Uuid::parse_str(id).is_ok());

        let Call::Action(payload) = &log[1] else {
            panic!("expected action second, got {:?}", log[1]);
        };
        assert_eq!(&payload.com_id, id);
        assert_eq!(payload.user_id, "user-1");
        assert_eq!(payload.full_name, "Ada Lovelace");
        assert_eq!(payload.text, "<p>hi</p>");
    }

    #[test]
    fn edit_passes_existing_ids_through() {
        let log: CallLog = Arc::default();
        let router = recording_router(log.clone(), true);
        let ctx = SubmitContext {
            com_id: Some("c-9".into()),
            parent_id: Some("c-1".into()),
        };

        block_on(router.submit(SubmitMode::Edit, "<p>fix</p>".into(), &ctx));

        let log = log.lock().unwrap();
        assert_eq!(
            log[0],
            Call::Edit("<p>fix</p>".into(), Some("c-9".into()), Some("c-1".into()))
        );
        let Call::Action(payload) = &log[1] else {
            panic!("expected edit action, got {:?}", log[1]);
        };
        assert_eq!(payload.com_id, "c-9");
        assert_eq!(payload.parent_of_edited_comment_id, Some("c-1".into()));
        assert_eq!(payload.replied_to_comment_id, None);
    }

    #[test]
    fn reply_generates_fresh_id_and_carries_parent() {
        let log: CallLog = Arc::default();
        let router = recording_router(log.clone(), true);
        let ctx = SubmitContext {
            com_id: Some("c-9".into()),
            parent_id: None,
        };

        block_on(router.submit(SubmitMode::Reply, "<p>re</p>".into(), &ctx));

        let log = log.lock().unwrap();
        let Call::Reply(text, com_id, parent_id, reply_id) = &log[0] else {
            panic!("expected reply first, got {:?}", log[0]);
        };
        assert_eq!(text, "<p>re</p>");
        assert_eq!(com_id.as_deref(), Some("c-9"));
        assert_eq!(parent_id, &None);
        assert!(Uuid::parse_str(reply_id).is_ok());

        let Call::Action(payload) = &log[1] else {
            panic!("expected reply action, got {:?}", log[1]);
        };
        assert_eq!(&payload.com_id, reply_id);
        assert_eq!(payload.replied_to_comment_id, Some("c-9".into()));
        assert_eq!(payload.parent_of_replied_comment_id, None);
    }

    #[test]
    fn actions_are_skipped_when_not_configured() {
        let log: CallLog = Arc::default();
        let router = recording_router(log.clone(), false);

        block_on(router.submit(
            SubmitMode::Create,
            "<p>hi</p>".into(),
            &SubmitContext::default(),
        ));
        block_on(router.submit(
            SubmitMode::Edit,
            "<p>fix</p>".into(),
            &SubmitContext::default(),
        ));

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert!(matches!(log[0], Call::Submit(..)));
        assert!(matches!(log[1], Call::Edit(..)));
    }

    #[test]
    fn generated_ids_are_unique() {
        let mut ids = std::collections::HashSet::new();
        for _ in 0..100 {
            assert!(ids.insert(new_comment_id()));
        }
    }
}
