use jolt_core::Database;

pub fn run(limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let history = db.history(limit)?;
    println!("{}", serde_json::to_string_pretty(&history)?);
    Ok(())
}
