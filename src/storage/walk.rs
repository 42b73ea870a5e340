use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use crate::storage::fs::FileSystem;

/// Depth-first pre-order walk from `root`, in listing order, yielding every
/// file. Children whose name starts with `hidden_prefix` are skipped; a root
/// that is itself a file yields just that file. Unreadable directories are
/// logged and skipped.
pub fn walk_files<F: FileSystem + ?Sized>(fs: &F, root: &Path, hidden_prefix: char) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(path) = pending.pop() {
        let stat = fs.stat(&path);
        if !stat.exists {
            debug!(path = %path.display(), "skipping missing path");
            continue;
        }
        if !stat.is_directory {
            files.push(path);
            continue;
        }

        let children = match fs.list_children(&path) {
            Ok(children) => children,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot list directory");
                continue;
            }
        };

        // Reversed so the first child is popped first
        for name in children.iter().rev() {
            if name.starts_with(hidden_prefix) {
                continue;
            }
            pending.push(path.join(name));
        }
    }

    files
}
