use gpui::*;
use gpui_component::{
    ActiveTheme, Disableable, IconName,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputEvent, InputState},
};

use crate::chat::events::Submit;
use crate::chat::transcript::RequestId;

/// Single-line message input with a send control.
///
/// While a submission is in flight the input and the button are disabled;
/// that disablement is what serializes requests, the submit state machine in
/// the transcript only backstops it.
pub struct Composer {
    input_state: Entity<InputState>,
    request_id: RequestId,
    busy: bool,
}

impl EventEmitter<Submit> for Composer {}

impl Composer {
    pub fn new(window: &mut Window, cx: &mut Context<Self>) -> Self {
        let input_state = cx.new(|cx| {
            InputState::new(window, cx)
                .placeholder("Type your message here...")
                .clean_on_escape()
        });

        cx.subscribe_in(
            &input_state,
            window,
            |this, _, event: &InputEvent, window, cx| {
                if let InputEvent::PressEnter { .. } = event {
                    this.handle_submit(window, cx);
                }
            },
        )
        .detach();

        Self {
            input_state,
            request_id: RequestId::new(0),
            busy: false,
        }
    }

    /// Binds the composer to the request id reserved for its next submit.
    pub fn set_request_id(&mut self, request_id: RequestId, cx: &mut Context<Self>) {
        self.request_id = request_id;
        cx.notify();
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn set_busy(&mut self, busy: bool, cx: &mut Context<Self>) {
        self.busy = busy;
        cx.notify();
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn clear(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.input_state.update(cx, |state, cx| {
            state.set_value("", window, cx);
        });
    }

    fn handle_submit(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        if self.busy {
            return;
        }

        let content = self.input_state.read(cx).value().trim().to_string();
        if content.is_empty() {
            return;
        }

        cx.emit(Submit::new(self.request_id, content));
        self.clear(window, cx);
    }
}

impl Render for Composer {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let busy = self.busy;
        let send_label = if busy { "Sending..." } else { "Send" };

        h_flex()
            .w_full()
            .items_center()
            .gap_2()
            .p_3()
            .bg(theme.background)
            .child(
                div()
                    .flex_1()
                    .px_3()
                    .py_2()
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.background)
                    .child(Input::new(&self.input_state).w_full().disabled(busy)),
            )
            .child(
                Button::new("send")
                    .primary()
                    .icon(IconName::ArrowUp)
                    .child(send_label)
                    .disabled(busy)
                    .on_click(cx.listener(|this, _, window, cx| {
                        this.handle_submit(window, cx);
                    })),
            )
    }
}
