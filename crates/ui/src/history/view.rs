use std::sync::Arc;

use chrono::{DateTime, Utc};
use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    v_flex,
};
use gpui_tokio_bridge::Tokio;

use parley_backend::{BackendClient, SessionRecord, StoredMessage};

const CARD_WIDTH: Pixels = px(280.);
const DETAIL_PANEL_WIDTH: Pixels = px(440.);
const DETAIL_MESSAGES_MAX_HEIGHT: Pixels = px(384.);

/// Card preview: the first message's content with the literal ellipsis
/// marker. A session with no messages still renders the bare marker.
pub(crate) fn preview_snippet(messages: &[StoredMessage]) -> String {
    let first = messages
        .first()
        .map(|message| message.content.as_str())
        .unwrap_or("");
    format!("{first}...")
}

/// Medium-date/short-time card stamp, e.g. `Jan 1, 2024, 12:00 AM`.
pub(crate) fn format_card_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%b %-d, %Y, %-I:%M %p").to_string()
}

/// Flattens a record's messages into (content, model-side) pairs in stored
/// order; the detail overlay renders exactly this, so reopening reproduces
/// an identical rendering.
pub(crate) fn detail_rows(record: &SessionRecord) -> Vec<(&str, bool)> {
    record
        .messages
        .iter()
        .map(|message| (message.content.as_str(), message.is_model_side()))
        .collect()
}

/// History route: one card per stored session in backend order, with a
/// modal detail overlay per card. Construction triggers the fetch, so every
/// activation of the route refetches.
pub struct HistoryView {
    sessions: Vec<SessionRecord>,
    open_session: Option<usize>,
    fetch_task: Option<Task<()>>,
}

impl HistoryView {
    pub fn new(client: Arc<BackendClient>, cx: &mut Context<Self>) -> Self {
        let mut this = Self {
            sessions: Vec::new(),
            open_session: None,
            fetch_task: None,
        };
        this.spawn_fetch(client, cx);
        this
    }

    pub fn sessions(&self) -> &[SessionRecord] {
        &self.sessions
    }

    /// A failed fetch leaves the view empty; the error is logged and never
    /// surfaced.
    fn spawn_fetch(&mut self, client: Arc<BackendClient>, cx: &mut Context<Self>) {
        let fetched = Tokio::spawn(cx, async move { client.list_sessions().await });

        self.fetch_task = Some(cx.spawn(async move |this, cx| {
            let outcome = fetched.await;
            let _ = this.update(cx, |this, cx| {
                match outcome {
                    Ok(Ok(sessions)) => {
                        // Backend order is preserved; no client-side sort.
                        this.sessions = sessions;
                    }
                    Ok(Err(error)) => {
                        tracing::error!(error = %error, "failed to fetch chat history");
                    }
                    Err(join_error) => {
                        tracing::error!(error = %join_error, "history fetch worker aborted");
                    }
                }
                cx.notify();
            });
        }));
    }

    fn open_detail(&mut self, index: usize, cx: &mut Context<Self>) {
        if index < self.sessions.len() {
            self.open_session = Some(index);
            cx.notify();
        }
    }

    fn close_detail(&mut self, cx: &mut Context<Self>) {
        // Idempotent; closing an already-closed detail changes nothing.
        if self.open_session.take().is_some() {
            cx.notify();
        }
    }

    fn render_card(&self, index: usize, session: &SessionRecord, cx: &Context<Self>) -> AnyElement {
        let theme = cx.theme();

        v_flex()
            .id(("history-card", index))
            .w(CARD_WIDTH)
            .gap_1()
            .p_4()
            .rounded_lg()
            .border_1()
            .border_color(theme.border)
            .bg(theme.muted)
            .cursor_pointer()
            .child(Label::new(format_card_timestamp(&session.created_at)).text_sm())
            .child(
                Label::new(preview_snippet(&session.messages))
                    .text_sm()
                    .text_color(theme.muted_foreground),
            )
            .on_click(cx.listener(move |this, _, _window, cx| {
                this.open_detail(index, cx);
            }))
            .into_any_element()
    }

    fn render_detail_overlay(&self, record: &SessionRecord, cx: &Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let rows = detail_rows(record)
            .into_iter()
            .map(|(content, model_side)| {
                let row_bg = if model_side { theme.accent } else { theme.muted };
                div()
                    .w_full()
                    .p_2()
                    .rounded_md()
                    .bg(row_bg)
                    .child(Label::new(content.to_string()).text_sm())
                    .into_any_element()
            })
            .collect::<Vec<_>>();

        div()
            .id("session-detail-overlay")
            .absolute()
            .inset_0()
            .flex()
            .items_center()
            .justify_center()
            .bg(gpui::black().opacity(0.25))
            .on_mouse_down(
                MouseButton::Left,
                cx.listener(|this, _, _window, cx| {
                    this.close_detail(cx);
                }),
            )
            .child(
                v_flex()
                    .id("session-detail-panel")
                    .w(DETAIL_PANEL_WIDTH)
                    .gap_4()
                    .p_6()
                    .rounded_xl()
                    .bg(theme.background)
                    .border_1()
                    .border_color(theme.border)
                    // Clicks inside the panel must not fall through to the
                    // backdrop close handler.
                    .on_mouse_down(MouseButton::Left, |_, _, cx| cx.stop_propagation())
                    .child(
                        h_flex()
                            .w_full()
                            .items_center()
                            .justify_between()
                            .child(Label::new("Chat Messages").text_sm())
                            .child(
                                Button::new("close-detail")
                                    .ghost()
                                    .small()
                                    .icon(IconName::CircleX)
                                    .on_click(cx.listener(|this, _, _window, cx| {
                                        this.close_detail(cx);
                                    })),
                            ),
                    )
                    .child(
                        div()
                            .id("session-detail-messages")
                            .w_full()
                            .max_h(DETAIL_MESSAGES_MAX_HEIGHT)
                            .overflow_y_scroll()
                            .child(v_flex().gap_2().children(rows)),
                    ),
            )
            .into_any_element()
    }
}

impl Render for HistoryView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let open_record = self
            .open_session
            .and_then(|index| self.sessions.get(index))
            .cloned();
        let cards = self
            .sessions
            .iter()
            .enumerate()
            .map(|(index, session)| self.render_card(index, session, cx))
            .collect::<Vec<_>>();

        div()
            .id("history-view")
            .relative()
            .size_full()
            .min_h_0()
            .overflow_hidden()
            .bg(theme.background)
            .child(
                div()
                    .id("history-cards")
                    .size_full()
                    .overflow_y_scroll()
                    .child(h_flex().flex_wrap().items_start().gap_4().p_4().children(cards)),
            )
            .when_some(open_record, |el, record| {
                el.child(self.render_detail_overlay(&record, cx))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stored(content: &str, role: &str) -> StoredMessage {
        StoredMessage {
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            content: content.to_string(),
            role: role.to_string(),
        }
    }

    #[test]
    fn preview_takes_the_first_message_with_ellipsis() {
        let messages = vec![stored("hi", "user"), stored("hello!", "model")];
        assert_eq!(preview_snippet(&messages), "hi...");
    }

    #[test]
    fn preview_of_an_empty_session_is_the_bare_marker() {
        assert_eq!(preview_snippet(&[]), "...");
    }

    #[test]
    fn card_timestamp_renders_medium_date_short_time() {
        let midnight = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(format_card_timestamp(&midnight), "Jan 1, 2024, 12:00 AM");

        let afternoon = Utc.with_ymd_and_hms(2024, 3, 10, 15, 5, 0).unwrap();
        assert_eq!(format_card_timestamp(&afternoon), "Mar 10, 2024, 3:05 PM");
    }

    #[test]
    fn detail_rows_preserve_order_and_role_sides() {
        let record = SessionRecord {
            id: "1".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap(),
            messages: vec![
                stored("hi", "user"),
                stored("hello!", "model"),
                stored("older reply", "assistant"),
            ],
        };

        let rows = detail_rows(&record);
        assert_eq!(
            rows,
            vec![("hi", false), ("hello!", true), ("older reply", true)]
        );

        // Reopening renders from the same in-memory record: same rows.
        assert_eq!(detail_rows(&record), rows);
    }
}
