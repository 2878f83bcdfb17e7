//! Directory Lister: browse listings with a stable order.

use crate::dropzone::error::DropResult;
use crate::dropzone::gateway::RemoteSession;
use crate::dropzone::store::RemoteStore;
use crate::dropzone::types::{DirectoryEntry, EntryKind};
use sorng_ftp::ftp::parser::parse_listing;
use sorng_ftp::ftp::FtpEntry;

/// List `remote_path` for display.
///
/// `at_root` controls the `..` entry and the template filter: the root
/// never links upwards and hides `template_name`; other directories always
/// carry exactly one `..` and hide nothing.
pub async fn list_directory<S: RemoteStore>(
    session: &mut RemoteSession<S>,
    remote_path: &str,
    at_root: bool,
    template_name: Option<&str>,
) -> DropResult<Vec<DirectoryEntry>> {
    session.enter(remote_path).await?;

    let raw: Vec<FtpEntry> = if session.supports_structured_listing() {
        session.list_structured().await?
    } else {
        let lines = session.list_lines().await?;
        parse_listing(&lines.join("\n"))
    };

    let mut entries: Vec<DirectoryEntry> = raw
        .into_iter()
        .filter(|e| e.name != "." && e.name != "..")
        .filter(|e| !(at_root && template_name == Some(e.name.as_str())))
        .map(to_entry)
        .collect();

    if !at_root {
        entries.push(DirectoryEntry::new("..", EntryKind::ParentDirectory));
    }
    sort_entries(&mut entries);
    Ok(entries)
}

fn to_entry(e: FtpEntry) -> DirectoryEntry {
    let kind = if e.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::File
    };
    DirectoryEntry {
        size: (kind == EntryKind::File).then_some(e.size),
        modified: e.modified,
        name: e.name,
        kind,
    }
}

/// Parent first, then directories, then files; byte-wise by name inside
/// each group.
pub fn sort_entries(entries: &mut [DirectoryEntry]) {
    entries.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| a.name.as_bytes().cmp(b.name.as_bytes()))
    });
}
