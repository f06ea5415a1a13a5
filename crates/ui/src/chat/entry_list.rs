use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;
use std::ops::Range;
use std::rc::Rc;

use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{ActiveTheme, h_flex, label::Label, v_flex, v_virtual_list};

use crate::chat::scroll_manager::TailFollow;
use crate::chat::transcript::{ChatEntry, EntryRole};

const DEFAULT_CONTENT_WIDTH: Pixels = px(680.);
const LIST_HORIZONTAL_PADDING: Pixels = px(16.);
const CONTENT_WIDTH_CHANGE_EPSILON: f32 = 1.0;
const USER_BUBBLE_MAX_WIDTH: Pixels = px(540.);
const USER_BUBBLE_PADDING_X: Pixels = px(14.);
const USER_BUBBLE_PADDING_Y: Pixels = px(10.);
const MODEL_LABEL_HEIGHT: Pixels = px(16.);
const MODEL_LABEL_GAP: Pixels = px(8.);
const LOADING_ROW_HEIGHT: Pixels = px(20.);
const ESTIMATED_TEXT_LINE_HEIGHT: Pixels = px(18.);
const ESTIMATED_CHAR_WIDTH: f32 = 7.0;

struct SizeCacheEntry {
    layout_hash: u64,
    height: Pixels,
    measured: bool,
}

/// Virtualized transcript renderer. User entries sit right-aligned in a
/// bubble, model entries left-aligned under a speaker label, and the
/// placeholder renders as an in-flight indicator row.
pub struct EntryList {
    entries: Vec<ChatEntry>,
    item_sizes: Rc<Vec<Size<Pixels>>>,
    tail: TailFollow,
    // Entries carry no ids; the transcript is append-only with only its tail
    // ever replaced, so the row index is a stable cache key.
    size_cache: HashMap<usize, SizeCacheEntry>,
    content_width: Option<Pixels>,
}

impl EntryList {
    pub fn new(_cx: &mut Context<Self>) -> Self {
        Self {
            entries: Vec::new(),
            item_sizes: Rc::new(Vec::new()),
            tail: TailFollow::new(),
            size_cache: HashMap::new(),
            content_width: None,
        }
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn set_entries(&mut self, entries: Vec<ChatEntry>, cx: &mut Context<Self>) {
        let should_follow = entries.len() > self.entries.len()
            || entries.iter().any(ChatEntry::is_loading);

        self.entries = entries;
        self.rebuild_item_sizes();

        if should_follow {
            self.tail.request_jump_if_following();
        }

        cx.notify();
    }

    fn update_content_width(&mut self, cx: &mut Context<Self>) {
        let list_width = self.tail.bounds().size.width;
        if list_width <= Pixels::ZERO {
            return;
        }

        let next_content_width = max_pixels(px(1.), list_width - LIST_HORIZONTAL_PADDING * 2);
        let width_changed = self.content_width.is_none_or(|current| {
            (f32::from(current) - f32::from(next_content_width)).abs()
                > CONTENT_WIDTH_CHANGE_EPSILON
        });

        if width_changed {
            self.content_width = Some(next_content_width);

            // Mark cached measurements dirty so row heights recalculate for
            // the new width.
            for entry in self.size_cache.values_mut() {
                entry.measured = false;
            }

            self.rebuild_item_sizes();
            cx.notify();
        }
    }

    fn rebuild_item_sizes(&mut self) {
        let content_width = self.content_width.unwrap_or(DEFAULT_CONTENT_WIDTH);
        let entry_count = self.entries.len();
        let mut sizes = Vec::with_capacity(entry_count);

        for (index, entry) in self.entries.iter().enumerate() {
            let next_hash = layout_hash(index, entry);
            let estimated_height = estimate_entry_height(entry, content_width);

            let cached = self.size_cache.entry(index).or_insert(SizeCacheEntry {
                layout_hash: next_hash,
                height: estimated_height,
                measured: false,
            });

            // Invalidate only on semantic row changes, which in practice is
            // the tail being replaced on settlement.
            if cached.layout_hash != next_hash {
                cached.layout_hash = next_hash;
                cached.height = estimated_height;
                cached.measured = false;
            } else if !cached.measured {
                cached.height = estimated_height;
            }

            sizes.push(size(px(0.), cached.height));
        }

        self.size_cache.retain(|index, _| *index < entry_count);
        self.item_sizes = Rc::new(sizes);
    }

    fn measure_visible_items(
        &mut self,
        visible_range: Range<usize>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        if self.entries.is_empty() {
            return;
        }

        let content_width = self.content_width.unwrap_or(DEFAULT_CONTENT_WIDTH);
        let available_space = size(
            AvailableSpace::Definite(content_width),
            AvailableSpace::MinContent,
        );
        let mut updated = false;

        for index in visible_range {
            let Some(entry) = self.entries.get(index).cloned() else {
                continue;
            };

            let mut row = self.render_entry_row(&entry, cx);
            let measured_height = row.layout_as_root(available_space, window, cx).height;
            let Some(cached) = self.size_cache.get_mut(&index) else {
                continue;
            };
            let height_changed =
                !cached.measured || pixels_changed(cached.height, measured_height);
            if height_changed {
                cached.height = measured_height;
                updated = true;
            }
            cached.measured = true;
        }

        if updated {
            self.rebuild_item_sizes();
            cx.notify();
        }
    }

    fn render_entry_row(&self, entry: &ChatEntry, cx: &mut Context<Self>) -> AnyElement {
        let theme = cx.theme();

        if entry.role == EntryRole::User {
            let content = if entry.content.is_empty() {
                " ".to_string()
            } else {
                entry.content.clone()
            };

            return v_flex()
                .w_full()
                .items_end()
                .child(
                    div()
                        .max_w(USER_BUBBLE_MAX_WIDTH)
                        .px(USER_BUBBLE_PADDING_X)
                        .py(USER_BUBBLE_PADDING_Y)
                        .rounded_lg()
                        .bg(theme.accent)
                        .text_color(theme.accent_foreground)
                        .child(Label::new(content).text_sm()),
                )
                .into_any_element();
        }

        v_flex()
            .w_full()
            .gap_2()
            .child(
                Label::new("Model")
                    .text_xs()
                    .text_color(theme.foreground.opacity(0.5)),
            )
            .map(|column| {
                if entry.is_loading() {
                    column.child(
                        h_flex()
                            .w_full()
                            .gap_2()
                            .items_center()
                            .child(div().size(px(8.)).rounded_full().bg(theme.primary))
                            .child(
                                Label::new(entry.content.clone())
                                    .text_sm()
                                    .text_color(theme.foreground.opacity(0.65)),
                            ),
                    )
                } else {
                    column.child(Label::new(entry.content.clone()).text_sm())
                }
            })
            .into_any_element()
    }
}

impl Render for EntryList {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        self.update_content_width(cx);
        self.tail.update_follow_state();
        self.tail.apply_pending_jump();

        v_flex().size_full().min_h_0().child(
            v_virtual_list(
                cx.entity().clone(),
                "entry-list",
                self.item_sizes.clone(),
                |this, visible_range, window, cx| {
                    // Measure only visible rows so long transcripts keep
                    // O(visible) layout work.
                    this.update_content_width(cx);
                    this.measure_visible_items(visible_range.clone(), window, cx);
                    visible_range
                        .filter_map(|index| {
                            this.entries
                                .get(index)
                                .cloned()
                                .map(|entry| this.render_entry_row(&entry, cx))
                        })
                        .collect::<Vec<_>>()
                },
            )
            .size_full()
            .px_4()
            .py_3()
            .gap_4()
            .track_scroll(self.tail.handle()),
        )
    }
}

fn layout_hash(index: usize, entry: &ChatEntry) -> u64 {
    let mut hasher = DefaultHasher::new();

    hasher.write_usize(index);
    hasher.write_u8(match entry.role {
        EntryRole::User => 0,
        EntryRole::Model => 1,
    });
    hasher.write_u8(if entry.is_loading() { 1 } else { 0 });
    hasher.write(entry.content.as_bytes());
    hasher.finish()
}

fn estimate_entry_height(entry: &ChatEntry, content_width: Pixels) -> Pixels {
    match entry.role {
        EntryRole::User => {
            let bubble_width = min_pixels(content_width, USER_BUBBLE_MAX_WIDTH);
            let text_width = max_pixels(px(1.), bubble_width - USER_BUBBLE_PADDING_X * 2);
            let text_height = estimate_text_height(&entry.content, text_width);
            text_height + USER_BUBBLE_PADDING_Y * 2
        }
        EntryRole::Model => {
            let body_height = if entry.is_loading() {
                LOADING_ROW_HEIGHT
            } else {
                estimate_text_height(&entry.content, content_width)
            };

            MODEL_LABEL_HEIGHT + MODEL_LABEL_GAP + body_height
        }
    }
}

fn estimate_text_height(content: &str, width: Pixels) -> Pixels {
    if content.is_empty() {
        return ESTIMATED_TEXT_LINE_HEIGHT;
    }

    let width_as_f32 = f32::from(width);
    let chars_per_line = (width_as_f32 / ESTIMATED_CHAR_WIDTH).floor().max(1.0) as usize;

    let mut line_count = 0usize;
    for line in content.lines() {
        let char_count = line.chars().count().max(1);
        line_count += char_count.div_ceil(chars_per_line);
    }

    // Account for the trailing empty line when content ends with a newline.
    if content.ends_with('\n') {
        line_count += 1;
    }

    ESTIMATED_TEXT_LINE_HEIGHT * line_count.max(1)
}

fn max_pixels(a: Pixels, b: Pixels) -> Pixels {
    if f32::from(a) >= f32::from(b) { a } else { b }
}

fn min_pixels(a: Pixels, b: Pixels) -> Pixels {
    if f32::from(a) <= f32::from(b) { a } else { b }
}

fn pixels_changed(a: Pixels, b: Pixels) -> bool {
    (f32::from(a) - f32::from(b)).abs() > 0.5
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowMetric {
    pub index: usize,
    pub estimated_height: f32,
    pub layout_hash: u64,
}

/// Pure row metrics for a transcript snapshot, used to validate
/// virtualization behavior without a window.
pub fn row_metrics(entries: &[ChatEntry], content_width: f32) -> Vec<RowMetric> {
    let bounded_width = px(content_width.max(1.0));

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| RowMetric {
            index,
            estimated_height: f32::from(estimate_entry_height(entry, bounded_width)),
            layout_hash: layout_hash(index, entry),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::transcript::ChatEntry;
    use chrono::{TimeZone, Utc};

    fn fixture_entries(count: usize) -> Vec<ChatEntry> {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..count)
            .map(|index| {
                if index == count - 1 {
                    ChatEntry::pending_model(at)
                } else if index % 2 == 0 {
                    ChatEntry::user_text(format!("entry-{index}: fixture payload"), at)
                } else {
                    ChatEntry::model_text(format!("entry-{index}: fixture payload"), at)
                }
            })
            .collect()
    }

    #[test]
    fn large_transcript_keeps_row_metrics_deterministic() {
        let mut entries = fixture_entries(2_000);
        let metrics_before = row_metrics(&entries, 680.);

        assert_eq!(metrics_before.len(), 2_000);
        assert!(
            metrics_before
                .iter()
                .all(|metric| metric.estimated_height > 0.0)
        );

        // Settlement replaces only the tail; every other row hash must hold.
        let settled_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 5).unwrap();
        *entries.last_mut().unwrap() = ChatEntry::model_text("final reply", settled_at);

        let metrics_after = row_metrics(&entries, 680.);
        assert_eq!(metrics_after.len(), 2_000);
        assert_eq!(
            metrics_before[..1_999]
                .iter()
                .map(|metric| metric.layout_hash)
                .collect::<Vec<_>>(),
            metrics_after[..1_999]
                .iter()
                .map(|metric| metric.layout_hash)
                .collect::<Vec<_>>(),
        );
        assert_ne!(
            metrics_before[1_999].layout_hash,
            metrics_after[1_999].layout_hash
        );
    }

    #[test]
    fn loading_rows_reserve_the_indicator_height() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let placeholder = ChatEntry::pending_model(at);
        let settled = ChatEntry::model_text("ok", at);

        let placeholder_height = estimate_entry_height(&placeholder, px(680.));
        let settled_height = estimate_entry_height(&settled, px(680.));

        assert!(placeholder_height > Pixels::ZERO);
        assert!(placeholder_height >= settled_height);
    }

    #[test]
    fn multiline_user_entries_grow_with_line_count() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let one_line = ChatEntry::user_text("short", at);
        let three_lines = ChatEntry::user_text("one\ntwo\nthree", at);

        assert!(
            estimate_entry_height(&three_lines, px(680.))
                > estimate_entry_height(&one_line, px(680.))
        );
    }
}
