use chrono::{Local, NaiveTime};
use clap::Args;
use stepalarm_core::next_occurrence;

#[derive(Args)]
pub struct NextArgs {
    /// Time of day, 24h `HH:MM`
    #[arg(long)]
    pub at: String,
}

pub fn run(args: NextArgs) -> Result<(), Box<dyn std::error::Error>> {
    let time = NaiveTime::parse_from_str(&args.at, "%H:%M")
        .map_err(|e| format!("invalid time '{}': {e}", args.at))?;
    let next = next_occurrence(&Local::now(), time)
        .ok_or_else(|| format!("{} does not occur in the next two days", args.at))?;
    println!("{}", next.to_rfc3339());
    Ok(())
}
