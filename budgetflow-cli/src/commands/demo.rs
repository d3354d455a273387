//! Demo command - manage demo mode

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use budgetflow_core::services::DemoService;

use super::get_data_dir;

#[derive(Subcommand)]
pub enum DemoCommands {
    /// Enable demo mode with freshly seeded data
    #[command(name = "on")]
    On,
    /// Disable demo mode
    #[command(name = "off")]
    Off {
        /// Also delete the demo store
        #[arg(long)]
        clean: bool,
    },
    /// Show demo mode status
    Status,
}

pub fn run(command: Option<DemoCommands>) -> Result<()> {
    let data_dir = get_data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let demo_service = DemoService::new(&data_dir);

    match command {
        Some(DemoCommands::On) => {
            demo_service.enable(chrono::Local::now().date_naive())?;
            println!("{}", "Demo mode enabled".green());
            println!("Demo data has been populated. Run 'bf summary' to see your demo dashboard.");
            Ok(())
        }
        Some(DemoCommands::Off { clean }) => {
            demo_service.disable(clean)?;
            println!("{}", "Demo mode disabled".yellow());
            Ok(())
        }
        Some(DemoCommands::Status) | None => {
            if demo_service.is_enabled()? {
                println!("Demo mode is {}", "ON".green());
            } else {
                println!("Demo mode is {}", "OFF".yellow());
            }
            Ok(())
        }
    }
}
