use gpui::{Pixels, point, px};
use gpui_component::VirtualListScrollHandle;

/// Distance from the tail within which follow mode stays engaged.
const FOLLOW_STICKY_THRESHOLD: Pixels = px(24.);
/// Small delta used to ignore floating-point scroll jitter.
const SCROLL_DELTA_EPSILON: f32 = 1.0;

/// Keeps the entry list pinned to the newest entry unless the user scrolls
/// away from the tail.
pub struct TailFollow {
    scroll_handle: VirtualListScrollHandle,
    pending_jump: bool,
    follow: bool,
    last_offset: Pixels,
}

impl TailFollow {
    pub fn new() -> Self {
        Self {
            scroll_handle: VirtualListScrollHandle::new(),
            pending_jump: true,
            follow: true,
            last_offset: Pixels::ZERO,
        }
    }

    pub fn handle(&self) -> &VirtualListScrollHandle {
        &self.scroll_handle
    }

    /// Requests a tail jump only while follow mode is engaged; appended
    /// entries then stay in view without fighting a user who scrolled up.
    pub fn request_jump_if_following(&mut self) {
        if self.follow {
            self.pending_jump = true;
        }
    }

    /// Updates follow mode from the scroll position observed this frame.
    pub fn update_follow_state(&mut self) {
        let offset = self.scroll_handle.offset().y;
        let scrolled_up = f32::from(offset) - f32::from(self.last_offset) > SCROLL_DELTA_EPSILON;

        if self.pending_jump {
            self.follow = true;
        } else if self.near_tail() {
            self.follow = true;
        } else if scrolled_up {
            self.follow = false;
        }

        self.last_offset = offset;
    }

    /// Scrolls to the tail when a jump is pending or follow mode is on.
    pub fn apply_pending_jump(&mut self) {
        if self.follow || self.pending_jump {
            let max_offset = self.scroll_handle.max_offset().height;
            let current_x = self.scroll_handle.offset().x;
            let target_y = if max_offset > Pixels::ZERO {
                -max_offset
            } else {
                Pixels::ZERO
            };
            self.scroll_handle.set_offset(point(current_x, target_y));
        }

        self.pending_jump = false;
    }

    pub fn bounds(&self) -> gpui::Bounds<Pixels> {
        self.scroll_handle.bounds()
    }

    fn near_tail(&self) -> bool {
        let max_offset = self.scroll_handle.max_offset().height;
        if max_offset <= Pixels::ZERO {
            return true;
        }

        // GPUI uses negative Y offsets for scrolling down, so `offset + max`
        // approaches zero at the tail.
        let offset = self.scroll_handle.offset().y;
        (offset + max_offset).abs() <= FOLLOW_STICKY_THRESHOLD
    }
}

impl Default for TailFollow {
    fn default() -> Self {
        Self::new()
    }
}
