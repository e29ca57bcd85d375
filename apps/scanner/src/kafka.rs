use anyhow::{Result, anyhow};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::time::Duration;

/// Idempotent producer: events are keyed by signature and may be resent
const PRODUCER_SETTINGS: &[(&str, &str)] = &[
    ("acks", "all"),
    ("enable.idempotence", "true"),
    ("linger.ms", "10"),
    ("message.timeout.ms", "60000"),
    ("retries", "10"),
];

const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(10);

pub fn producer_config(broker: &str) -> ClientConfig {
    let mut cfg = ClientConfig::new();
    cfg.set("bootstrap.servers", broker);
    for (key, value) in PRODUCER_SETTINGS {
        cfg.set(*key, *value);
    }
    cfg
}

pub fn create_producer(broker: &str) -> Result<FutureProducer> {
    producer_config(broker)
        .create()
        .map_err(|e| anyhow!("kafka producer for {broker}: {e}"))
}

/// Publish one JSON payload keyed by transaction signature.
pub async fn send_json(
    producer: &FutureProducer,
    topic: &str,
    key: &str,
    json: &str,
) -> Result<()> {
    let rec = FutureRecord::<str, str>::to(topic).key(key).payload(json);
    producer
        .send(rec, ENQUEUE_TIMEOUT)
        .await
        .map_err(|(e, _)| anyhow!("kafka delivery error on {topic}: {e:?}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_config_is_idempotent() {
        let cfg = producer_config("localhost:9092");

        assert_eq!(cfg.get("bootstrap.servers"), Some("localhost:9092"));
        assert_eq!(cfg.get("enable.idempotence"), Some("true"));
        assert_eq!(cfg.get("acks"), Some("all"));
    }
}
