//! Roster store
//!
//! [`RecordStore`] is the single owner of the roster for a process. UI code
//! reads copies through [`RecordStore::get_all`], edits through
//! [`RecordStore::update_member`] / [`RecordStore::toggle_completion`], and
//! follows changes through [`RecordStore::subscribe`].

mod defaults;
mod listeners;
mod record_store;

pub use defaults::{avatar_url, default_team};
pub use listeners::{Listener, ListenerRegistry, Subscription};
pub use record_store::{RecordStore, StoreOptions};
