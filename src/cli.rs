use crate::request::RawInputs;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "sensor-datagen",
    version,
    about = "Generate synthetic sensor readings and bulk-insert them"
)]
pub struct Args {
    /// Organization id; a random UUID when omitted
    #[arg(long = "org-id", default_value = "")]
    pub org_id: String,
    /// Location id; a random UUID when omitted
    #[arg(long = "loc-id", default_value = "")]
    pub loc_id: String,
    /// Machine (robot) id; a random UUID when omitted
    #[arg(long = "machine-id", default_value = "")]
    pub machine_id: String,
    /// Part id; a random UUID when omitted
    #[arg(long = "part-id", default_value = "")]
    pub part_id: String,
    /// Start of the window, format: 2006-01-02 15:04:05
    #[arg(long = "start-time")]
    pub start_time: String,
    /// End of the window, defaults to now. Format: 2006-01-02 15:04:05
    #[arg(long = "end-time")]
    pub end_time: Option<String>,
    /// UNIMPLEMENTED: emit movement-sensor records without payloads
    #[arg(long = "is-mov", default_value_t = false)]
    pub is_mov: bool,
    /// Frequency of simulated data in hz
    #[arg(short = 'f', long = "frequency", allow_negative_numbers = true)]
    pub frequency: i64,
    /// Datapoints per insert; overrides DATAGEN_BATCH_SIZE
    #[arg(long)]
    pub batch_size: Option<usize>,
    /// Seed for reproducible ids and readings
    #[arg(long)]
    pub seed: Option<u64>,
    /// Write NDJSON to this path ('-' for stdout) instead of Postgres
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl Args {
    pub fn raw_inputs(&self) -> RawInputs {
        RawInputs {
            org_id: self.org_id.clone(),
            loc_id: self.loc_id.clone(),
            machine_id: self.machine_id.clone(),
            part_id: self.part_id.clone(),
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            is_movement_sensor: self.is_mov,
            frequency: self.frequency,
        }
    }
}
