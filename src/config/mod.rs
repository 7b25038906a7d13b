pub mod toml_config;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "funnel-checkout")]
#[command(about = "Pricing, persistence and checkout hand-off for the order wizard")]
pub struct CliConfig {
    /// Path to TOML configuration file (built-in catalog when omitted)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Session file overriding store.path from the configuration
    #[arg(long)]
    pub session: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Price a selection without touching the session
    Quote {
        #[arg(short, long, default_value_t = 1)]
        recipients: i64,

        #[arg(short, long, value_delimiter = ',')]
        add_ons: Vec<String>,

        #[arg(short, long, default_value_t = 0)]
        photos: u32,

        #[arg(short, long, default_value = "en")]
        locale: String,
    },

    /// Merge fields into the saved session and print the new pricing
    Save {
        #[arg(short, long)]
        recipients: Option<i64>,

        /// Replaces the add-on set; pass an empty value to clear it
        #[arg(short, long, value_delimiter = ',')]
        add_ons: Option<Vec<String>>,

        #[arg(short, long)]
        photos: Option<u32>,

        #[arg(short, long)]
        locale: Option<String>,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        tax_id: Option<String>,

        #[arg(long, value_delimiter = ',')]
        children: Option<Vec<String>>,

        #[arg(long)]
        message: Option<String>,

        /// Landing page URL whose tracking parameters should be captured
        #[arg(long)]
        landing_url: Option<String>,

        #[arg(long)]
        step: Option<u32>,
    },

    /// Print the saved selection and pricing
    Show,

    /// Remove every saved session key
    Clear,

    /// Print the checkout URL for the saved session
    CheckoutUrl,

    /// Submit the order, redirect and clear the session
    Handoff,
}
