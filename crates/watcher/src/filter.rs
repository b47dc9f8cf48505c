//! Event filtering for a single watched file
//!
//! The directory watch sees every entry in the directory. Only content writes
//! and name creation for the target's base name count as activity; a rename
//! into place (temp file renamed over the target) shows up as creation or as
//! the destination side of a rename.

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::Event;
use std::ffi::OsStr;
use std::path::PathBuf;

/// Does this raw event indicate activity on `file_name`?
pub fn is_activity(event: &Event, file_name: &OsStr) -> bool {
    let names_target = |path: &PathBuf| path.file_name() == Some(file_name);

    match event.kind {
        EventKind::Create(_) => event.paths.iter().any(names_target),
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            event.paths.iter().any(names_target)
        }
        // Both carries [from, to]; only the destination matters
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.get(1).map_or(false, names_target)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To))
        | EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
            event.paths.iter().any(names_target)
        }
        _ => false,
    }
}
