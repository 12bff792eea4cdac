//! Highlight lifecycle and synchronization.
//!
//! The [`HighlightSession`] owns the local highlight set of the active
//! document and mirrors mutations to a remote store through a
//! [`HighlightGateway`]. Remote calls run on a [`Dispatcher`] and come back as
//! [`Completion`] events that the session applies when it is pumped, so all
//! local state is only ever touched from the session's own thread.

pub mod dispatch;
pub mod gateway;
pub mod navigation;
pub mod session;
pub mod store;
pub mod switcher;

pub use dispatch::{Completion, DispatchLink, Dispatcher, RemoteCall};
pub use gateway::{GatewayError, HighlightGateway, MemoryGateway};
pub use navigation::{
    fragment_for, parse_fragment, NavigationController, ScrollRegistration, ScrollRegistry,
    ScrollTarget,
};
pub use session::HighlightSession;
pub use store::{HighlightStore, SyncStatus, TrackedHighlight};
pub use switcher::{DocumentSwitcher, LoadTicket};

use highlight_model::ModelError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("no document is active")]
    NoActiveDocument,
    #[error("id generator kept returning ids already in use")]
    IdsExhausted,
    #[error(transparent)]
    Model(#[from] ModelError),
}
