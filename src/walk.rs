//! Absolute path resolution (`spec.md` §4.9, described alongside the
//! reader in §4.5 since it composes directly on directory iteration).

use crate::device::Device;
use crate::layout::ROOT_INODE;
use crate::mount::Filesystem;
use crate::reader::DirIter;

impl<D: Device> Filesystem<D> {
    /// `walk`: resolves an absolute path to an inode number, or 0 if the
    /// path is empty, lacks a leading `/`, or any segment is not found.
    /// A trailing `/` is tolerated. Symlinks are never followed here —
    /// that interpretation is left to higher layers (`spec.md` §4.5).
    pub fn walk(&mut self, path: &str) -> u32 {
        self.try_walk(path).unwrap_or(0)
    }

    fn try_walk(&mut self, path: &str) -> Option<u32> {
        let rest = path.strip_prefix('/')?;
        let mut cursor = ROOT_INODE;
        for segment in rest.split('/') {
            if segment.is_empty() {
                // Either a trailing slash or a doubled slash; tolerate the
                // former (it produces a trailing empty segment), reject
                // the latter the same way — both simply contribute no
                // further descent, matching "trailing `/` is tolerated".
                continue;
            }
            let mut it = DirIter::new(cursor);
            let mut found = None;
            while let Some(entry) = it.next(self).ok()? {
                if entry.name == segment.as_bytes() {
                    found = Some(entry.inode);
                    break;
                }
            }
            cursor = found?;
        }
        Some(cursor)
    }
}
