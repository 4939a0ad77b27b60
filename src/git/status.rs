/// One line of `git status --porcelain=v1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Index (staged) status character.
    pub index: char,
    /// Working-tree status character.
    pub worktree: char,
    /// Path relative to the repository root. For renames, the new path.
    pub path: String,
}

impl StatusEntry {
    pub fn is_untracked(&self) -> bool {
        self.index == '?' && self.worktree == '?'
    }
}

/// Parse the NUL-separated output of `git status --porcelain=v1 -z`.
///
/// Each record is `XY <path>`; rename and copy records are followed by an
/// extra NUL-terminated field holding the original path, which is skipped.
/// Records that are too short to carry a path are dropped.
pub fn parse_porcelain_z(output: &str) -> Vec<StatusEntry> {
    let mut entries = Vec::new();
    let mut fields = output.split('\0').filter(|f| !f.is_empty());

    while let Some(record) = fields.next() {
        let mut chars = record.chars();
        let (Some(index), Some(worktree), Some(' ')) = (chars.next(), chars.next(), chars.next())
        else {
            tracing::debug!(record = %record, "Skipping malformed status record");
            continue;
        };
        let path = chars.as_str();
        if path.is_empty() {
            continue;
        }

        if matches!(index, 'R' | 'C') {
            fields.next();
        }

        entries.push(StatusEntry {
            index,
            worktree,
            path: path.to_string(),
        });
    }

    entries
}
