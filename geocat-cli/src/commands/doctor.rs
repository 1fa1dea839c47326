//! Doctor command - check the catalog's ownership links

use anyhow::{bail, Result};
use colored::Colorize;
use comfy_table::{Cell, Color};

use super::get_context;
use crate::output;

fn status_cell(count: i64) -> Cell {
    if count == 0 {
        Cell::new("PASS").fg(Color::Green)
    } else {
        Cell::new("ERROR").fg(Color::Red)
    }
}

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let report = ctx.repository.check_integrity()?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "healthy": report.is_healthy(),
                "database_path": ctx.repository.db_path().map(|p| p.to_string_lossy()),
                "report": report,
            })
        );
    } else {
        println!("{}", "Catalog Health Check".bold());
        if let Some(path) = ctx.repository.db_path() {
            println!("  Database: {}", path.display());
        }
        println!("  Users: {}", report.users);
        println!("  Addresses: {}", report.addresses);
        println!();

        let mut table = output::create_table();
        table.set_header(vec!["Check", "Status", "Rows"]);
        for (name, count) in [
            ("orphan_addresses", report.orphan_addresses),
            ("users_without_security", report.users_without_security),
            ("dangling_emails", report.dangling_emails),
        ] {
            table.add_row(vec![Cell::new(name), status_cell(count), Cell::new(count)]);
        }
        println!("{}", table);
    }

    if !report.is_healthy() {
        bail!("Integrity check failed");
    }
    Ok(())
}
