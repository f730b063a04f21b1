//! Users command - list registered users

use anyhow::Result;
use colored::Colorize;

use super::start_command;
use crate::output;
use pocket_core::ports::UserDirectory;

pub fn run(json: bool) -> Result<()> {
    let (ctx, _logger) = start_command("users")?;
    let users = ctx.directory.list()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&users)?);
        return Ok(());
    }

    if users.is_empty() {
        output::info("No users registered yet.");
        return Ok(());
    }

    println!("{}", "Registered Users".bold());
    let mut table = output::create_table();
    table.set_header(vec!["User ID", "Name", "Joined"]);
    for user in &users {
        table.add_row(vec![
            user.id.to_string(),
            user.display_name.clone(),
            user.joined_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    println!("{}", table);
    println!("{} user(s)", users.len());

    Ok(())
}
