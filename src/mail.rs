//! Dispatch account mail events.
//!
//! Events are fire-and-forget from the service's point of view:
//! callers log publish failures and carry on, so a broken queue never
//! blocks the state transition that triggered the send.

use std::borrow::Cow;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::uri::{
    AMQPAuthority, AMQPQueryString, AMQPScheme, AMQPUri, AMQPUserInfo,
};
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use serde::Serialize;
use url::Url;

use crate::config::Mail;

const DEFAULT_AMQP_HOST: &str = "localhost";
const DEFAULT_AMQP_PORT: u16 = 5672;
const DEFAULT_AMQP_VHOST: &str = "/";

const CONTENT_ENCODING: &str = "utf8";
const CONTENT_TYPE: &str = "application/cloudevents+json";
const DATA_CONTENT_TYPE: &str = "application/json";
const CLOUDEVENT_VERSION: &str = "1.0";
const ID_LENGTH: usize = 12;

type Result<T> = std::result::Result<T, MailError>;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error(transparent)]
    Amqp(#[from] lapin::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Address(#[from] url::ParseError),

    #[error("unknown amqp scheme")]
    InvalidScheme,
}

/// Mail templates list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    /// Greets a freshly registered account.
    Welcome,
    /// Carries an email confirmation code.
    EmailConfirmation,
    /// Carries a password reset code.
    PasswordReset,
}

#[derive(Debug, Serialize)]
struct Cloudevent<'a> {
    specversion: &'static str,
    r#type: &'static str,
    source: &'static str,
    id: String,
    time: String,
    datacontenttype: &'static str,
    data: Content<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    to: Cow<'a, str>,
    login: Cow<'a, str>,
    template: Template,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<Cow<'a, str>>,
}

/// Mail queue publisher.
#[derive(Debug, Clone, Default)]
pub struct MailManager {
    queue: String,
    conn: Option<Arc<Connection>>,
}

impl MailManager {
    /// Create a new [`MailManager`].
    pub async fn new(config: &Mail) -> Result<Self> {
        let addr = Url::parse(&config.address)?;
        let uri = AMQPUri {
            scheme: AMQPScheme::from_str(addr.scheme())
                .map_err(|_| MailError::InvalidScheme)?,
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: config.username.clone(),
                    password: config.password.clone(),
                },
                host: addr.host_str().unwrap_or(DEFAULT_AMQP_HOST).into(),
                port: addr.port().unwrap_or(DEFAULT_AMQP_PORT),
            },
            vhost: config
                .vhost
                .clone()
                .unwrap_or(DEFAULT_AMQP_VHOST.to_string()),
            query: AMQPQueryString {
                channel_max: config.pool,
                ..Default::default()
            },
        };

        let conn_config = ConnectionProperties::default()
            .with_connection_name("identa_mail_client".into());
        let conn = Connection::connect_uri(uri, conn_config).await?;

        tracing::info!(%addr, "rabbitmq connected");

        Ok(Self {
            queue: config.queue.clone(),
            conn: Some(Arc::new(conn)),
        })
    }

    async fn create_channel(
        conn: Arc<Connection>,
        queue: &str,
    ) -> Result<Channel> {
        let channel = conn.create_channel().await?;
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(channel)
    }

    fn create_event(data: Content) -> Cloudevent {
        let id = Alphanumeric.sample_string(&mut OsRng, ID_LENGTH);
        Cloudevent {
            specversion: CLOUDEVENT_VERSION,
            r#type: "com.identa.email",
            source: "com.identa.api",
            id,
            time: Utc::now().to_rfc3339(),
            datacontenttype: DATA_CONTENT_TYPE,
            data,
        }
    }

    /// Publish an event for a specific address.
    ///
    /// A manager without a connection (no `mail` section configured)
    /// only logs the attempt.
    pub async fn publish_event(
        &self,
        template: Template,
        to: &str,
        login: &str,
        code: Option<&str>,
    ) -> Result<()> {
        let Some(conn) = &self.conn else {
            tracing::debug!(?template, "mail event skipped, no connection");
            return Ok(());
        };
        let channel =
            Self::create_channel(Arc::clone(conn), &self.queue).await?;

        let content = Content {
            to: Cow::from(to),
            login: Cow::from(login),
            template,
            code: code.map(Cow::from),
        };
        let payload = Self::create_event(content);
        let payload = serde_json::to_string(&payload)?;

        channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                payload.as_bytes(),
                BasicProperties::default()
                    .with_content_encoding(CONTENT_ENCODING.into())
                    .with_content_type(CONTENT_TYPE.into()),
            )
            .await?;

        tracing::trace!(queue = self.queue, "mail event sent");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disconnected_manager_swallows_events() {
        let manager = MailManager::default();
        let sent = manager
            .publish_event(
                Template::EmailConfirmation,
                "user@example.com",
                "user",
                Some("abc123"),
            )
            .await;

        assert!(sent.is_ok());
    }

    #[test]
    fn event_payload_is_cloudevents_shaped() {
        let event = MailManager::create_event(Content {
            to: Cow::from("user@example.com"),
            login: Cow::from("user"),
            template: Template::PasswordReset,
            code: Some(Cow::from("deadbeef")),
        });
        let payload =
            serde_json::to_value(&event).expect("event must serialize");

        assert_eq!(payload["specversion"], "1.0");
        assert_eq!(payload["data"]["template"], "password_reset");
        assert_eq!(payload["data"]["code"], "deadbeef");
        assert_eq!(payload["id"].as_str().map(str::len), Some(ID_LENGTH));
    }
}
