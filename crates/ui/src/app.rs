use std::sync::Arc;

use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{ActiveTheme, h_flex, label::Label, v_flex};

use crate::chat::ChatView;
use crate::config::SettingsStore;
use crate::history::HistoryView;
use parley_backend::BackendClient;

#[cfg(target_os = "macos")]
const WINDOW_TOOLBAR_LEFT_SAFE_PADDING: f32 = 78.0;
#[cfg(not(target_os = "macos"))]
const WINDOW_TOOLBAR_LEFT_SAFE_PADDING: f32 = 16.0;
#[cfg(target_os = "windows")]
const WINDOW_TOOLBAR_RIGHT_SAFE_PADDING: f32 = 120.0;
#[cfg(not(target_os = "windows"))]
const WINDOW_TOOLBAR_RIGHT_SAFE_PADDING: f32 = 16.0;

/// Computes the top toolbar height using a Zed-style responsive formula.
///
/// This keeps the title area consistent across macOS and Linux while still
/// respecting user font scaling via rem size.
fn window_toolbar_height(window: &Window) -> Pixels {
    (1.75 * window.rem_size()).max(px(34.0))
}

gpui::actions!(shell, [Quit,]);

/// The two top-level routes. Active route is matched exactly for the
/// navigation highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Chat,
    History,
}

/// Main application shell: top navigation bar plus the active route's view.
pub struct AppShell {
    route: Route,
    client: Arc<BackendClient>,
    chat_view: Entity<ChatView>,
    history_view: Option<Entity<HistoryView>>,
    title_bar_should_move: bool,
}

impl AppShell {
    pub fn new(window: &mut Window, cx: &mut Context<Self>) -> Self {
        let settings = SettingsStore::load().settings();
        let client = Arc::new(BackendClient::new(&settings.endpoint));
        let agent_deadline = settings.agent_deadline();

        // The chat view lives for the window's lifetime; switching routes
        // only hides it, so a late reply still lands in the transcript it
        // started against.
        let chat_view = cx.new(|cx| ChatView::new(client.clone(), agent_deadline, window, cx));

        Self {
            route: Route::Chat,
            client,
            chat_view,
            history_view: None,
            title_bar_should_move: false,
        }
    }

    pub fn route(&self) -> Route {
        self.route
    }

    fn select_route(&mut self, route: Route, cx: &mut Context<Self>) {
        if self.route == route {
            return;
        }

        self.route = route;
        self.history_view = match route {
            // Each history activation rebuilds the view, which refetches.
            Route::History => Some(cx.new(|cx| HistoryView::new(self.client.clone(), cx))),
            Route::Chat => None,
        };
        cx.notify();
    }
}

impl Render for AppShell {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let toolbar_height = window_toolbar_height(window);
        let content: AnyElement = match self.route {
            Route::Chat => self.chat_view.clone().into_any_element(),
            Route::History => match self.history_view.as_ref() {
                Some(history_view) => history_view.clone().into_any_element(),
                None => div().into_any_element(),
            },
        };

        div()
            .size_full()
            .relative()
            .bg(theme.background)
            .child(
                v_flex().size_full().child(
                    div()
                        .id("app-shell-body")
                        .flex_1()
                        .min_w_0()
                        .min_h_0()
                        .pt(toolbar_height)
                        .overflow_hidden()
                        .child(content),
                ),
            )
            .child(
                div()
                    .absolute()
                    .top_0()
                    .left_0()
                    .right_0()
                    .child(self.render_top_bar(window, toolbar_height, cx)),
            )
    }
}

impl AppShell {
    fn render_top_bar(
        &self,
        window: &Window,
        toolbar_height: Pixels,
        cx: &Context<Self>,
    ) -> impl IntoElement {
        let theme = cx.theme();

        h_flex()
            .id("app-top-bar")
            .window_control_area(WindowControlArea::Drag)
            .on_mouse_down_out(cx.listener(|this, _, _window, _cx| {
                this.title_bar_should_move = false;
            }))
            .on_mouse_up(
                MouseButton::Left,
                cx.listener(|this, _, _window, _cx| {
                    this.title_bar_should_move = false;
                }),
            )
            .on_mouse_down(
                MouseButton::Left,
                cx.listener(|this, _, _window, _cx| {
                    this.title_bar_should_move = true;
                }),
            )
            .on_mouse_move(cx.listener(|this, _, window, _cx| {
                if this.title_bar_should_move {
                    this.title_bar_should_move = false;
                    window.start_window_move();
                }
            }))
            .w_full()
            .h(toolbar_height)
            .flex_shrink_0()
            .pl(px(WINDOW_TOOLBAR_LEFT_SAFE_PADDING))
            .pr(px(WINDOW_TOOLBAR_RIGHT_SAFE_PADDING))
            .items_center()
            .bg(theme.background)
            .border_b_1()
            .border_color(theme.border)
            .child(div().flex_1().min_w_0())
            .child(
                h_flex()
                    .gap_2()
                    .items_center()
                    .child(self.render_nav_link("nav-chat", Route::Chat, "Chat with me", cx))
                    .child(self.render_nav_link(
                        "nav-history",
                        Route::History,
                        "View Chat History",
                        cx,
                    )),
            )
            .child(
                h_flex()
                    .flex_1()
                    .min_w_0()
                    .justify_end()
                    .child(self.render_linux_window_controls(window, cx)),
            )
            .when(
                cfg!(target_os = "linux") && window.window_controls().window_menu,
                |title_bar| {
                    title_bar.on_mouse_down(MouseButton::Right, |event, window, _| {
                        window.show_window_menu(event.position);
                    })
                },
            )
    }

    fn render_nav_link(
        &self,
        id: &'static str,
        route: Route,
        title: &'static str,
        cx: &Context<Self>,
    ) -> impl IntoElement {
        let theme = cx.theme();
        let active = self.route == route;

        div()
            .id(id)
            .px_3()
            .py_1()
            .rounded_full()
            .cursor_pointer()
            .when(active, |el| el.bg(theme.muted))
            .child(Label::new(title).text_sm())
            .on_click(cx.listener(move |this, _, _window, cx| {
                this.select_route(route, cx);
            }))
    }

    fn render_linux_window_controls(&self, window: &Window, cx: &Context<Self>) -> AnyElement {
        #[cfg(target_os = "linux")]
        {
            use gpui_component::{
                IconName, Sizable,
                button::{Button, ButtonVariants},
            };

            let maximize_icon = if window.is_maximized() {
                IconName::WindowRestore
            } else {
                IconName::WindowMaximize
            };

            h_flex()
                .id("linux-window-controls")
                .items_center()
                // Prevent clicks on window controls from bubbling into title bar gestures
                // (e.g. double-click maximize), which can cause double-toggle behavior.
                .on_mouse_down(MouseButton::Left, |_, _, cx| cx.stop_propagation())
                .on_mouse_down(MouseButton::Right, |_, _, cx| cx.stop_propagation())
                .gap_2()
                .ml_2()
                .child(
                    Button::new("linux-window-minimize")
                        .ghost()
                        .small()
                        .icon(IconName::WindowMinimize)
                        .on_click(cx.listener(|_, _, window, _| {
                            window.minimize_window();
                        })),
                )
                .child(
                    Button::new("linux-window-maximize")
                        .ghost()
                        .small()
                        .icon(maximize_icon)
                        .on_click(cx.listener(|_, _, window, _| {
                            window.zoom_window();
                        })),
                )
                .child(
                    Button::new("linux-window-close")
                        .ghost()
                        .small()
                        .icon(IconName::WindowClose)
                        .on_click(cx.listener(|_, _, window, _| {
                            window.remove_window();
                        })),
                )
                .into_any_element()
        }

        #[cfg(not(target_os = "linux"))]
        {
            let _ = (window, cx);
            div().into_any_element()
        }
    }
}
