pub mod view;

pub use view::HistoryView;
