/// Event contracts for chat module wiring.
pub mod events;
/// Domain entities and the submit lifecycle boundary.
pub mod transcript;

pub mod composer;
pub mod entry_list;
pub mod scroll_manager;
pub mod view;

pub use composer::Composer;
pub use entry_list::EntryList;
pub use events::Submit;
pub use scroll_manager::TailFollow;
pub use transcript::{
    AGENT_ERROR_MESSAGE, ChatEntry, EntryKind, EntryRole, PENDING_MARKER, RequestId, SubmitState,
    SubmitTransition, Transcript,
};
pub use view::ChatView;
