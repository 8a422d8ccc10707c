use crate::datapoint::Datapoint;
use crate::error::SinkError;
use crate::pipeline::BatchSink;
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

/// Newline-delimited JSON output, one datapoint document per line.
pub struct JsonLinesSink {
    writer: BufWriter<Box<dyn AsyncWrite + Unpin + Send>>,
    written: u64,
}

impl JsonLinesSink {
    /// `-` writes to stdout.
    pub async fn create(path: &Path) -> Result<Self, SinkError> {
        let writer: Box<dyn AsyncWrite + Unpin + Send> = if path.as_os_str() == "-" {
            Box::new(tokio::io::stdout())
        } else {
            Box::new(tokio::fs::File::create(path).await?)
        };
        Ok(Self {
            writer: BufWriter::new(writer),
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl BatchSink for JsonLinesSink {
    async fn insert_batch(&mut self, records: Vec<Datapoint>) -> Result<(), SinkError> {
        for point in &records {
            let mut line = serde_json::to_vec(point)?;
            line.push(b'\n');
            self.writer.write_all(&line).await?;
        }
        self.writer.flush().await?;
        self.written += records.len() as u64;
        Ok(())
    }
}
