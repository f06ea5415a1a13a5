use gpui::*;
use gpui_component::Root;

use parley::app::{AppShell, Quit};

/// Application entry point.
///
/// Bootstraps the GPUI application with:
/// 1. Asset loading via gpui-component-assets
/// 2. gpui-component initialization (required for Root and the theme system)
/// 3. Global action handlers for shell-level commands
/// 4. Window creation with Root wrapper for gpui-component composition
fn main() {
    // Initialize tracing for development debugging
    tracing_subscriber::fmt::init();

    // Create application with bundled assets
    let app = Application::new().with_assets(gpui_component_assets::Assets);

    app.run(|cx| {
        gpui_tokio_bridge::init(cx);

        // Initialize gpui-component - REQUIRED before any Root usage
        gpui_component::init(cx);

        // Quit action: cleanly shut down the application
        cx.on_action(|_: &Quit, cx| {
            cx.quit();
        });

        cx.bind_keys([KeyBinding::new("cmd-q", Quit, None)]);

        // Spawn async window creation to ensure all initialization is complete
        cx.spawn(async move |cx| {
            cx.update(|cx| {
                let options = WindowOptions {
                    window_bounds: Some(WindowBounds::Windowed(Bounds::centered(
                        None,
                        size(px(1100.), px(760.)),
                        cx,
                    ))),
                    titlebar: Some(TitlebarOptions {
                        appears_transparent: true,
                        traffic_light_position: Some(point(px(9.), px(9.))),
                        ..Default::default()
                    }),
                    // Client decorations on Linux/FreeBSD so the app draws its
                    // own title area instead of showing a system titlebar.
                    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
                    window_decorations: Some(WindowDecorations::Client),
                    #[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
                    window_decorations: None,
                    ..Default::default()
                };

                // Root is REQUIRED by gpui-component for dialogs and layering
                cx.open_window(options, |window, cx| {
                    let shell = cx.new(|cx| AppShell::new(window, cx));
                    cx.new(|cx| Root::new(shell, window, cx))
                })
                .expect("failed to open main window");

                cx.activate(true);
            })
        })
        .detach();
    });
}
