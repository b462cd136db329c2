pub mod database;
pub mod error;
pub mod runner;

pub use error::CampaignError;
pub use runner::{run_batch, run_campaign, run_campaign_with, CampaignOptions, CampaignResult, FactionResult};
