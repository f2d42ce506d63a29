//! Root manifest (`_INDEX.md`) rendering.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::Error;

use super::{SUMMARY_FILE_NAME, package_dir_name};

/// File name of the root manifest.
pub const INDEX_FILE_NAME: &str = "_INDEX.md";

const HEADING: &str = "# AI Vendor Docs Index\n\n";
const EMPTY_BODY: &str = "No packages were synced.\n";
const FALLBACK_MARKER: &str = " ⚠️ fallback";

/// One manifest line, derived from a snapshot directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    pub version: String,
    pub is_fallback: bool,
}

impl IndexEntry {
    fn label(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

/// Render the manifest for a set of entries.
///
/// Output depends only on the set of entries, never on their input order.
pub fn render(entries: &[IndexEntry]) -> String {
    let mut sorted: Vec<&IndexEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.label().cmp(&b.label()).then(a.is_fallback.cmp(&b.is_fallback)));

    let mut content = String::from(HEADING);
    if sorted.is_empty() {
        content.push_str(EMPTY_BODY);
        return content;
    }

    for entry in sorted {
        let dir = link_target(&package_dir_name(&entry.name, &entry.version));
        let suffix = if entry.is_fallback { FALLBACK_MARKER } else { "" };
        content.push_str(&format!("- [{}]({}/{}){}\n", entry.label(), dir, SUMMARY_FILE_NAME, suffix));
    }

    content
}

/// Percent-encode a directory name for use inside a Markdown link.
///
/// Directory names already contain `%2F` for scoped packages; a link resolver
/// decodes once, so the `%` itself must be escaped to reach the real directory.
fn link_target(dir: &str) -> String {
    dir.replace('%', "%25")
}

/// Write the manifest under `root_dir`, creating the directory if needed.
///
/// The file is written to a uniquely named temporary sibling and renamed into
/// place, so a reader never observes a partially written manifest.
pub async fn write(root_dir: &Path, entries: &[IndexEntry]) -> Result<(), Error> {
    tokio::fs::create_dir_all(root_dir)
        .await
        .map_err(|e| Error::io(root_dir, e))?;

    let root = root_dir.to_path_buf();
    let content = render(entries);
    let target = tokio::task::spawn_blocking(move || persist(&root, &content))
        .await
        .map_err(|e| Error::io(root_dir, std::io::Error::other(e)))??;

    tracing::debug!(path = %target.display(), entries = entries.len(), "manifest written");
    Ok(())
}

fn persist(root: &Path, content: &str) -> Result<PathBuf, Error> {
    let target = root.join(INDEX_FILE_NAME);
    let mut tmp = tempfile::Builder::new()
        .prefix(".index-")
        .suffix(".tmp")
        .tempfile_in(root)
        .map_err(|e| Error::io(root, e))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| Error::io(tmp.path(), e))?;
    tmp.persist(&target).map_err(|e| Error::io(&target, e.error))?;
    Ok(target)
}
