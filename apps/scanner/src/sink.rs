use anyhow::Result;
use log::info;
use rdkafka::producer::FutureProducer;
use schema::{MintedToken, SwapEvent, TxFacts};
use serde::Serialize;
use serde_json::{Value, json};
use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Write},
    path::Path,
};

use crate::kafka;

/// Output records carry the signature they are keyed by.
pub trait Keyed {
    fn key(&self) -> &str;
    fn kind() -> &'static str;
}

impl Keyed for SwapEvent {
    fn key(&self) -> &str {
        &self.signature
    }
    fn kind() -> &'static str {
        "SwapEvent"
    }
}

impl Keyed for MintedToken {
    fn key(&self) -> &str {
        &self.signature
    }
    fn kind() -> &'static str {
        "MintedToken"
    }
}

impl Keyed for TxFacts {
    fn key(&self) -> &str {
        &self.signature
    }
    fn kind() -> &'static str {
        "TxFacts"
    }
}

pub struct KafkaTarget {
    pub producer: FutureProducer,
    pub topic: String,
}

/// JSON-lines writer with an optional Kafka copy of every record.
pub struct Sink<W: Write> {
    writer: W,
    kafka: Option<KafkaTarget>,
    emitted: usize,
    logged_sample: bool,
}

pub type OutputSink = Sink<Box<dyn Write + Send>>;

/// Stdout, or `out` when given.
pub fn open_output(out: Option<&Path>, kafka: Option<KafkaTarget>) -> Result<OutputSink> {
    let writer: Box<dyn Write + Send> = match out {
        Some(path) => Box::new(BufWriter::new(append_file(path)?)),
        None => Box::new(io::stdout()),
    };
    Ok(Sink::new(writer, kafka))
}

impl<W: Write> Sink<W> {
    pub fn new(writer: W, kafka: Option<KafkaTarget>) -> Self {
        Self {
            writer,
            kafka,
            emitted: 0,
            logged_sample: false,
        }
    }

    pub async fn emit<T: Serialize + Keyed>(&mut self, event: &T) -> Result<()> {
        let line = serde_json::to_string(event)?;

        if !self.logged_sample {
            let sample = serde_json::to_string_pretty(event).unwrap_or_default();
            info!("First {} schema sample:\n{}", T::kind(), sample);
            self.logged_sample = true;
        }

        writeln!(self.writer, "{line}")?;
        if let Some(k) = &self.kafka {
            kafka::send_json(&k.producer, &k.topic, event.key(), &line).await?;
        }

        self.emitted += 1;
        Ok(())
    }

    pub async fn emit_all<T: Serialize + Keyed>(&mut self, events: &[T]) -> Result<()> {
        for event in events {
            self.emit(event).await?;
        }
        Ok(())
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Appends raw records as `{"signature", "tx"}` lines for later replay.
pub struct Recorder {
    file: BufWriter<File>,
    recorded: usize,
}

impl Recorder {
    pub fn open(path: &Path) -> Result<Self> {
        info!("recording raw records to {}", path.display());
        Ok(Self {
            file: BufWriter::new(append_file(path)?),
            recorded: 0,
        })
    }

    pub fn record(&mut self, signature: &str, tx: &Value) -> Result<()> {
        let line = serde_json::to_string(&json!({ "signature": signature, "tx": tx }))?;
        writeln!(self.file, "{line}")?;
        self.recorded += 1;
        Ok(())
    }

    /// Records keyed by their own `signature` field.
    pub fn record_all(&mut self, records: &[Value]) -> Result<()> {
        for tx in records {
            let sig = tx.get("signature").and_then(|v| v.as_str()).unwrap_or("");
            self.record(sig, tx)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<usize> {
        self.file.flush()?;
        Ok(self.recorded)
    }
}

fn append_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}
