mod action;
mod change_set;
mod map_diff;
mod entry;

pub use action::ChangeAction;
pub use change_set::{ChangeSet, Modification};
pub use map_diff::{ReservedKeys, diff};
pub use entry::{DiffEntry, DiffKind, format_value};
