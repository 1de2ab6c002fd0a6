//! Hosted e-mail API channels (JSON and multipart form endpoints)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::Form;
use serde::Serialize;

use super::{NotificationChannel, NotificationReceipt, NotifyError, SellerNotice, TemplateParams};
use crate::config::NotificationConfig;

const SEND_PATH: &str = "/api/v1.0/email/send";
const SEND_FORM_PATH: &str = "/api/v1.0/email/send-form";

/// Shared HTTP client and account credentials
pub struct EmailJsClient {
    http: reqwest::Client,
    base_url: String,
    service_id: String,
    template_id: String,
    public_key: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: TemplateParams,
}

impl EmailJsClient {
    pub fn from_config(config: &NotificationConfig) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.emailjs_base_url.trim_end_matches('/').to_string(),
            service_id: config.service_id.clone(),
            template_id: config.template_id.clone(),
            public_key: config.public_key.clone(),
        })
    }

    fn credentialed(&self) -> bool {
        !self.service_id.is_empty() && !self.template_id.is_empty() && !self.public_key.is_empty()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_json(&self, notice: &SellerNotice) -> Result<(), NotifyError> {
        let body = SendRequest {
            service_id: &self.service_id,
            template_id: &self.template_id,
            user_id: &self.public_key,
            template_params: notice.template_params(),
        };

        let resp = self.http.post(self.url(SEND_PATH)).json(&body).send().await?;
        check_status(resp.status())
    }

    async fn send_form(&self, notice: &SellerNotice) -> Result<(), NotifyError> {
        let params = notice.template_params();
        let form = params.fields().into_iter().fold(
            Form::new()
                .text("service_id", self.service_id.clone())
                .text("template_id", self.template_id.clone())
                .text("user_id", self.public_key.clone()),
            |form, (name, value)| form.text(name, value.to_string()),
        );

        let resp = self
            .http
            .post(self.url(SEND_FORM_PATH))
            .multipart(form)
            .send()
            .await?;
        check_status(resp.status())
    }
}

fn check_status(status: reqwest::StatusCode) -> Result<(), NotifyError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(NotifyError::Rejected {
            status: status.as_u16(),
        })
    }
}

/// JSON `send` endpoint
pub struct EmailJsApi {
    client: Arc<EmailJsClient>,
}

impl EmailJsApi {
    pub const NAME: &'static str = "emailjs-api";

    pub fn new(client: Arc<EmailJsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationChannel for EmailJsApi {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn deliver(&self, notice: &SellerNotice) -> Result<NotificationReceipt, NotifyError> {
        if !self.client.credentialed() {
            return Err(NotifyError::Disabled(Self::NAME));
        }
        self.client.send_json(notice).await?;
        Ok(NotificationReceipt::Sent {
            channel: Self::NAME.to_string(),
        })
    }
}

/// Multipart `send-form` endpoint
pub struct EmailJsForm {
    client: Arc<EmailJsClient>,
}

impl EmailJsForm {
    pub const NAME: &'static str = "emailjs-form";

    pub fn new(client: Arc<EmailJsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationChannel for EmailJsForm {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn deliver(&self, notice: &SellerNotice) -> Result<NotificationReceipt, NotifyError> {
        if !self.client.credentialed() {
            return Err(NotifyError::Disabled(Self::NAME));
        }
        self.client.send_form(notice).await?;
        Ok(NotificationReceipt::Sent {
            channel: Self::NAME.to_string(),
        })
    }
}
