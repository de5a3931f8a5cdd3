use clap::{Args, Subcommand, ValueEnum};
use timetable::config::Config;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!(
                            "api_url: {}",
                            config.api_url.value.as_deref().unwrap_or("(not set)")
                        );
                        println!("  source: {}", config.api_url.source);
                        println!();

                        println!("transport: {}", config.transport.value);
                        println!("  source: {}", config.transport.source);
                        println!();

                        println!("data_dir: {}", config.data_dir.value.display());
                        println!("  source: {}", config.data_dir.source);
                        println!();

                        println!("teachers: {}", config.teachers.value.join(", "));
                        println!("  source: {}", config.teachers.source);
                        println!();

                        println!(
                            "hours: {} to {}",
                            config.start_hour.value, config.end_hour.value
                        );
                        println!("  source: {}", config.start_hour.source);
                        println!();

                        println!("debounce_ms: {}", config.debounce_ms.value);
                        println!("  source: {}", config.debounce_ms.source);
                        println!();

                        println!("poll_interval_ms: {}", config.poll_interval_ms.value);
                        println!("  source: {}", config.poll_interval_ms.source);
                    }
                }
                Ok(())
            }
        }
    }
}
