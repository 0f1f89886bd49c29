use crate::config::MqttConfig;
use crate::error::AppError;
use crate::ingest::Route;
use std::time::Duration;
use uuid::Uuid;

// Use the MQTT v5 API surface only
use rumqttc::v5 as mqtt5;
use rumqttc::Transport;

pub type MqttOptions = mqtt5::MqttOptions;
pub type AsyncClient = mqtt5::AsyncClient;
pub type EventLoop = mqtt5::EventLoop;
pub type V5Publish = mqtt5::mqttbytes::v5::Publish;

pub fn build_options(cfg: &MqttConfig) -> MqttOptions {
    let client_id = format!("{}-{}", cfg.client_id, Uuid::new_v4());
    let mut opts = MqttOptions::new(client_id, &cfg.host, cfg.port);
    opts.set_keep_alive(Duration::from_secs(cfg.keep_alive_secs.unwrap_or(30)));
    opts.set_clean_start(cfg.clean_session.unwrap_or(true));
    if let (Some(u), Some(p)) = (&cfg.username, &cfg.password) {
        opts.set_credentials(u.clone(), p.clone());
    }
    if cfg.port == 8883 {
        opts.set_transport(Transport::tls_with_default_config());
    }
    opts
}

pub fn new(options: MqttOptions) -> (AsyncClient, EventLoop) {
    mqtt5::AsyncClient::new(options, 50)
}

pub fn qos(v: u8) -> mqtt5::mqttbytes::QoS {
    match v {
        2 => mqtt5::mqttbytes::QoS::ExactlyOnce,
        0 => mqtt5::mqttbytes::QoS::AtMostOnce,
        _ => mqtt5::mqttbytes::QoS::AtLeastOnce,
    }
}

pub async fn subscribe_routes(client: &AsyncClient, routes: &[Route], qos_level: u8) -> Result<(), AppError> {
    for r in routes {
        client
            .subscribe(r.topic.clone(), qos(qos_level))
            .await
            .map_err(|e| AppError::Mqtt(e.to_string()))?;
    }
    Ok(())
}

pub async fn next_publish(eventloop: &mut EventLoop) -> Result<Option<V5Publish>, AppError> {
    loop {
        match eventloop.poll().await {
            Ok(mqtt5::Event::Incoming(mqtt5::Incoming::Publish(p))) => return Ok(Some(p)),
            Ok(_) => continue,
            Err(e) => return Err(AppError::Mqtt(e.to_string())),
        }
    }
}

/// MQTT topic filter matching with `+` and `#` wildcards.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let fseg: Vec<&str> = filter.split('/').collect();
    let tseg: Vec<&str> = topic.split('/').collect();
    for (i, f) in fseg.iter().enumerate() {
        match *f {
            "#" => return true,
            "+" => {
                if i >= tseg.len() {
                    return false;
                }
            }
            _ => {
                if i >= tseg.len() || *f != tseg[i] {
                    return false;
                }
            }
        }
    }
    fseg.len() == tseg.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_matches_exact() {
        assert!(topic_matches("telemetry/temperature", "telemetry/temperature"));
        assert!(!topic_matches("telemetry/temperature", "telemetry/watertemperature"));
        assert!(!topic_matches("telemetry/temperature", "telemetry/temperature/extra"));
    }

    #[test]
    fn test_topic_matches_wildcards() {
        assert!(topic_matches("telemetry/+/temperature", "telemetry/dock-3/temperature"));
        assert!(!topic_matches("telemetry/+/temperature", "telemetry/temperature"));
        assert!(topic_matches("telemetry/#", "telemetry/a/b/c"));
    }

    #[test]
    fn test_qos_mapping() {
        assert_eq!(qos(0), mqtt5::mqttbytes::QoS::AtMostOnce);
        assert_eq!(qos(1), mqtt5::mqttbytes::QoS::AtLeastOnce);
        assert_eq!(qos(2), mqtt5::mqttbytes::QoS::ExactlyOnce);
        assert_eq!(qos(7), mqtt5::mqttbytes::QoS::AtLeastOnce);
    }

    #[test]
    fn test_build_options_uses_prefix() {
        let cfg = MqttConfig {
            host: "broker".into(),
            port: 1883,
            client_id: "temperature-context".into(),
            username: Some("u".into()),
            password: Some("p".into()),
            keep_alive_secs: Some(15),
            clean_session: None,
        };
        let opts = build_options(&cfg);
        assert!(opts.client_id().starts_with("temperature-context-"));
        assert_eq!(opts.keep_alive(), Duration::from_secs(15));
        assert_eq!(opts.broker_address(), ("broker".to_string(), 1883));
    }
}
