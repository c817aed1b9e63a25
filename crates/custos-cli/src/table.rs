use comfy_table::{presets, Cell, Table};

use custos_core::store::BackupRecord;

use crate::format::format_bytes;

pub(crate) fn backup_table(backups: &[BackupRecord]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_BORDERS_ONLY);
    table.set_header(vec!["ID", "Name", "Kind", "Created", "Size", "Files"]);
    for backup in backups {
        table.add_row(vec![
            Cell::new(backup.id),
            Cell::new(&backup.name),
            Cell::new(&backup.kind),
            Cell::new(&backup.created_at),
            Cell::new(format_bytes(backup.size_bytes)),
            Cell::new(backup.included_files.len()),
        ]);
    }
    table
}
