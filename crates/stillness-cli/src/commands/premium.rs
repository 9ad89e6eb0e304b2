use clap::Subcommand;
use stillness_core::premium::{FREE_MOODS, PREMIUM_MOODS};
use stillness_core::Config;

#[derive(Subcommand)]
pub enum PremiumAction {
    /// Record the premium unlock
    Unlock,
    /// Show what is unlocked
    Status,
}

fn mood_list(moods: &[stillness_core::Mood]) -> String {
    moods.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ")
}

pub fn run(action: PremiumAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load()?;
    match action {
        PremiumAction::Unlock => {
            if config.premium_unlocked {
                println!("Premium is already unlocked.");
            } else {
                config.premium_unlocked = true;
                config.save()?;
                println!("Premium unlocked. Thank you.");
            }
        }
        PremiumAction::Status => {
            let gate = config.premium_gate();
            println!("premium:        {}", if gate.is_unlocked() { "unlocked" } else { "locked" });
            println!("free moods:     {}", mood_list(&FREE_MOODS));
            println!("premium moods:  {}", mood_list(&PREMIUM_MOODS));
            println!("premium extras: background image");
        }
    }
    Ok(())
}
