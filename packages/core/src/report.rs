//! Operator-facing mount tables rendered into the log stream.

use log::Level;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::mount::Mount;

#[derive(Tabled)]
struct MountRow {
    #[tabled(rename = "Mount Path")]
    mount_path: String,
    #[tabled(rename = "Actual Path")]
    actual_path: String,
    #[tabled(rename = "Type")]
    mount_type: String,
}

impl From<&Mount> for MountRow {
    fn from(mount: &Mount) -> Self {
        Self {
            mount_path: mount.mount_path.clone(),
            actual_path: mount.actual_path.clone(),
            mount_type: mount.mount_type.to_string(),
        }
    }
}

/// Renders a set of mounts as an ascii table.
pub fn render_mount_table(mounts: &[Mount]) -> String {
    let rows: Vec<MountRow> = mounts.iter().map(MountRow::from).collect();
    Table::new(rows).with(Style::ascii()).to_string()
}

/// Logs a titled mount table at the given level. Empty sets log a single
/// marker line instead of an empty frame.
pub fn log_mount_table(level: Level, title: &str, mounts: &[Mount]) {
    if mounts.is_empty() {
        log::log!(level, "{title}: (none)");
        return;
    }
    log::log!(level, "{title}\n{}", render_mount_table(mounts));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::MountType;

    #[test]
    fn test_render_mount_table() {
        let mounts = vec![
            Mount::new("/shares/a", "//server/a", MountType::Windows),
            Mount::new("/shares/b", "dave@host:/b", MountType::Linux),
        ];

        let table = render_mount_table(&mounts);
        assert!(table.contains("Mount Path"));
        assert!(table.contains("Actual Path"));
        assert!(table.contains("/shares/a"));
        assert!(table.contains("dave@host:/b"));
        assert!(table.contains("fuse.sshfs"));
    }
}
