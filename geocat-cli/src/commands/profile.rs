//! Profiles command - show the role hierarchy

use anyhow::Result;
use serde_json::json;

use crate::output;
use geocat_core::Profile;

fn join(profiles: &[Profile]) -> String {
    profiles
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn run(json: bool) -> Result<()> {
    if json {
        let rows: Vec<_> = Profile::ALL
            .iter()
            .map(|p| {
                json!({
                    "name": p.as_str(),
                    "parents": p.parents().iter().map(|x| x.as_str()).collect::<Vec<_>>(),
                    "authorities": p.all_names(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Profile", "Parents", "Grants"]);
    for profile in Profile::ALL {
        table.add_row(vec![
            profile.as_str().to_string(),
            join(profile.parents()),
            join(&profile.all()),
        ]);
    }
    println!("{}", table);
    Ok(())
}
