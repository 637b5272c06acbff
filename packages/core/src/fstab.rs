//! Fstab-format mount table: parsing, rewriting, and the persistent
//! repository for managed share entries.
//!
//! The table file is rewritten wholesale on every mutating call, but lines
//! whose target lies outside the managed prefix are carried through
//! byte-for-byte: comments, blank lines, and the host's own mounts are
//! never restructured. Only managed entries are appended, collapsed, or
//! dropped.

use std::collections::HashSet;

use crate::config::Config;
use crate::error::{IoResultExt, Result, UnsupportedMountTypeSnafu};
use crate::fs::FileSystemGateway;
use crate::mount::{Mount, MountType, path_under_prefix};

/// Owner uid written into synthesized mount options.
const MOUNT_UID: u32 = 1001;

/// Owner gid written into synthesized mount options.
const MOUNT_GID: u32 = 5001;

/// Persistent storage for mount information, plus read access to the live
/// mount table.
pub trait MountTableRepository {
    /// Appends one table line for `mount` and rewrites the file.
    ///
    /// Fails with `UnsupportedMountType` for mounts without a protocol
    /// mapping; the table is left untouched in that case.
    fn store_mount_information(&self, mount: &Mount) -> Result<()>;

    /// Drops every managed line whose target equals the sanitized
    /// `mount_path`. Removing a path with no line is a no-op, not an error.
    fn remove_mount_information(&self, mount_path: &str) -> Result<()>;

    /// Bulk variant of [`remove_mount_information`], one rewrite for the
    /// whole set.
    ///
    /// [`remove_mount_information`]: MountTableRepository::remove_mount_information
    fn remove_mounts(&self, mounts: &[Mount]) -> Result<()>;

    /// Parses the full table into mounts. No prefix filtering happens
    /// here; that is the caller's responsibility.
    fn all_system_mounts(&self) -> Result<Vec<Mount>>;

    /// True iff the live mount table has a line whose target equals
    /// `mount_path` exactly. Reads fresh on every call.
    fn is_mounted(&self, mount_path: &str) -> Result<bool>;

    /// Collapses duplicates and drops managed entries whose
    /// `(source, target)` pair is absent from the live table.
    fn cleanup(&self) -> Result<()>;
}

/// A single parsed table line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FstabEntry {
    /// Remote source (the `<file system>` field).
    pub source: String,
    /// Local mount point (the `<dir>` field).
    pub target: String,
    /// Filesystem type token.
    pub fs_type: String,
    /// Comma-joined mount options.
    pub options: String,
    /// dump(8) flag.
    pub dump: u8,
    /// fsck(8) pass number.
    pub fsck_order: u16,
}

impl FstabEntry {
    /// Parses one table line.
    ///
    /// Returns `None` for comments, blank lines, and anything that does not
    /// have the six whitespace-delimited fields of the fstab grammar; such
    /// lines are preserved verbatim rather than rejected.
    pub fn parse_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }

        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        if parts.len() != 6 {
            return None;
        }

        Some(Self {
            source: unescape_path(parts[0]),
            target: unescape_path(parts[1]),
            fs_type: parts[2].to_string(),
            options: parts[3].to_string(),
            dump: parts[4].parse().ok()?,
            fsck_order: parts[5].parse().ok()?,
        })
    }

    /// Formats the entry as a table line, escaping embedded whitespace.
    pub fn to_line(&self) -> String {
        format!(
            "{}  {}  {}  {}  {}  {}",
            escape_path(&self.source),
            escape_path(&self.target),
            self.fs_type,
            self.options,
            self.dump,
            self.fsck_order
        )
    }
}

/// Escapes special characters in table paths using octal sequences.
///
/// Handles space (\040), tab (\011), newline (\012), and backslash (\134).
fn escape_path(path: &str) -> String {
    let mut encoded = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            ' ' => encoded.push_str(r"\040"),
            '\t' => encoded.push_str(r"\011"),
            '\n' => encoded.push_str(r"\012"),
            '\\' => encoded.push_str(r"\134"),
            _ => encoded.push(c),
        }
    }
    encoded
}

/// Unescapes octal sequences in table paths.
fn unescape_path(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            let mut octal_digits = String::new();
            let mut lookahead = chars.clone();
            for _ in 0..3 {
                match lookahead.next() {
                    Some(digit) if digit.is_ascii_digit() => octal_digits.push(digit),
                    _ => break,
                }
            }

            if octal_digits.len() == 3
                && let Ok(byte) = u8::from_str_radix(&octal_digits, 8)
            {
                result.push(byte as char);
                for _ in 0..3 {
                    chars.next();
                }
                continue;
            }
        }
        result.push(c);
    }
    result
}

/// Strips characters that would corrupt the table's line grammar:
/// newlines and carriage returns are dropped, backslashes become forward
/// slashes (UNC-style sources arrive with them). Embedded spaces survive
/// here and are escaped at line-format time.
pub fn sanitize_path(path: &str) -> String {
    path.chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .map(|c| if c == '\\' { '/' } else { c })
        .collect()
}

#[derive(Debug, Clone)]
enum TableLine {
    /// Comment, blank line, or anything we could not parse. Emitted as-is.
    Passthrough(String),
    /// A parsed entry together with its original text.
    Entry { raw: String, entry: FstabEntry },
}

/// An in-memory view of a table file, preserving unmanaged lines verbatim.
#[derive(Debug, Clone)]
pub struct MountTable {
    lines: Vec<TableLine>,
    managed_prefix: String,
}

impl MountTable {
    /// Parses table content. Duplicate managed `(source, target)` pairs are
    /// collapsed immediately, so callers never observe them.
    pub fn parse(content: &str, managed_prefix: &str) -> Self {
        let lines = content
            .lines()
            .map(|line| match FstabEntry::parse_line(line) {
                Some(entry) => TableLine::Entry {
                    raw: line.to_string(),
                    entry,
                },
                None => TableLine::Passthrough(line.to_string()),
            })
            .collect();

        let mut table = Self {
            lines,
            managed_prefix: managed_prefix.to_string(),
        };
        table.collapse_duplicates();
        table
    }

    /// Keeps the first of every managed `(source, target)` pair.
    fn collapse_duplicates(&mut self) {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let prefix = self.managed_prefix.clone();
        self.lines.retain(|line| match line {
            TableLine::Entry { entry, .. } if path_under_prefix(&prefix, &entry.target) => {
                seen.insert((entry.source.clone(), entry.target.clone()))
            }
            _ => true,
        });
    }

    /// All parsed entries, in file order.
    pub fn entries(&self) -> impl Iterator<Item = &FstabEntry> {
        self.lines.iter().filter_map(|line| match line {
            TableLine::Entry { entry, .. } => Some(entry),
            TableLine::Passthrough(_) => None,
        })
    }

    /// Appends an entry, then re-collapses so an already-present pair does
    /// not duplicate.
    pub fn push_entry(&mut self, entry: FstabEntry) {
        self.lines.push(TableLine::Entry {
            raw: entry.to_line(),
            entry,
        });
        self.collapse_duplicates();
    }

    /// Drops every managed entry whose target is in `targets`.
    pub fn remove_targets(&mut self, targets: &HashSet<String>) {
        let prefix = self.managed_prefix.clone();
        self.lines.retain(|line| match line {
            TableLine::Entry { entry, .. } if path_under_prefix(&prefix, &entry.target) => {
                !targets.contains(&entry.target)
            }
            _ => true,
        });
    }

    /// Drops every managed entry whose `(source, target)` pair is absent
    /// from `live`.
    pub fn retain_live(&mut self, live: &HashSet<(String, String)>) {
        let prefix = self.managed_prefix.clone();
        self.lines.retain(|line| match line {
            TableLine::Entry { entry, .. } if path_under_prefix(&prefix, &entry.target) => {
                live.contains(&(entry.source.clone(), entry.target.clone()))
            }
            _ => true,
        });
    }

    /// Serializes the table back to file content.
    pub fn render(&self) -> String {
        let mut output = String::new();
        for line in &self.lines {
            match line {
                TableLine::Passthrough(raw) => output.push_str(raw),
                TableLine::Entry { raw, .. } => output.push_str(raw),
            }
            output.push('\n');
        }
        output
    }
}

/// [`MountTableRepository`] persisting to an fstab-format file through a
/// [`FileSystemGateway`].
#[derive(Debug, Clone)]
pub struct FstabRepository<F> {
    fs: F,
    config: Config,
}

impl<F: FileSystemGateway> FstabRepository<F> {
    /// Creates a repository over the configured table paths.
    pub fn new(fs: F, config: Config) -> Self {
        Self { fs, config }
    }

    fn read_table(&self) -> Result<MountTable> {
        let content = self
            .fs
            .read_file(&self.config.fstab_path)
            .table_read_context(&self.config.fstab_path)?;
        Ok(MountTable::parse(&content, &self.config.managed_prefix))
    }

    fn read_live_table(&self) -> Result<MountTable> {
        let content = self
            .fs
            .read_file(&self.config.proc_mounts_path)
            .table_read_context(&self.config.proc_mounts_path)?;
        Ok(MountTable::parse(&content, &self.config.managed_prefix))
    }

    fn write_table(&self, table: &MountTable) -> Result<()> {
        self.fs
            .write_file(&self.config.fstab_path, &table.render())
            .table_write_context(&self.config.fstab_path)
    }

    /// Synthesizes the type token and options field for a mount's protocol.
    fn mount_options(&self, mount: &Mount) -> Result<(&'static str, String)> {
        match mount.mount_type {
            MountType::Windows => Ok((
                crate::mount::CIFS_TOKEN,
                format!(
                    "credentials={},domain={},uid={},gid={},auto",
                    self.config.cifs_credentials_path.display(),
                    self.config.cifs_domain,
                    MOUNT_UID,
                    MOUNT_GID
                ),
            )),
            MountType::Linux => Ok((
                crate::mount::SSHFS_TOKEN,
                format!(
                    "IdentityFile={},uid={},gid={},auto",
                    self.config.ssh_identity_path.display(),
                    MOUNT_UID,
                    MOUNT_GID
                ),
            )),
            MountType::None => UnsupportedMountTypeSnafu {
                mount_type: mount.mount_type,
            }
            .fail(),
        }
    }
}

impl<F: FileSystemGateway> MountTableRepository for FstabRepository<F> {
    fn store_mount_information(&self, mount: &Mount) -> Result<()> {
        // Synthesize options before reading so an unsupported type fails
        // with the table untouched.
        let (fs_type, options) = self.mount_options(mount)?;

        let entry = FstabEntry {
            source: sanitize_path(&mount.actual_path),
            target: sanitize_path(&mount.mount_path),
            fs_type: fs_type.to_string(),
            options,
            dump: 0,
            fsck_order: 0,
        };

        let mut table = self.read_table()?;
        table.push_entry(entry);
        self.write_table(&table)
    }

    fn remove_mount_information(&self, mount_path: &str) -> Result<()> {
        let targets: HashSet<String> = [sanitize_path(mount_path)].into();
        let mut table = self.read_table()?;
        table.remove_targets(&targets);
        self.write_table(&table)
    }

    fn remove_mounts(&self, mounts: &[Mount]) -> Result<()> {
        let targets: HashSet<String> = mounts
            .iter()
            .map(|mount| sanitize_path(&mount.mount_path))
            .collect();
        let mut table = self.read_table()?;
        table.remove_targets(&targets);
        self.write_table(&table)
    }

    fn all_system_mounts(&self) -> Result<Vec<Mount>> {
        let table = self.read_table()?;
        Ok(table
            .entries()
            .map(|entry| {
                Mount::new(
                    entry.target.clone(),
                    entry.source.clone(),
                    MountType::from_token(&entry.fs_type),
                )
            })
            .collect())
    }

    fn is_mounted(&self, mount_path: &str) -> Result<bool> {
        let live = self.read_live_table()?;
        Ok(live.entries().any(|entry| entry.target == mount_path))
    }

    fn cleanup(&self) -> Result<()> {
        let mut table = self.read_table()?;
        let live: HashSet<(String, String)> = self
            .read_live_table()?
            .entries()
            .map(|entry| (entry.source.clone(), entry.target.clone()))
            .collect();
        table.retain_live(&live);
        self.write_table(&table)
    }
}
