pub mod date;
pub mod env;
pub mod event;
pub mod fieldnames;
pub mod host;
pub mod layout;
pub mod userfields;

pub mod init;
pub mod layer;

pub use event::{LogEvent, Message};
pub use fieldnames::FieldNames;
pub use layout::JsonEventLayout;
