//! Mail-composer handoff: the last link of the chain

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use super::{NotificationChannel, NotificationReceipt, NotifyError, SellerNotice};

/// Characters left alone by JavaScript's `encodeURIComponent`
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// The `to` part: component encoding, but `@` stays readable
const ADDRESS: &AsciiSet = &COMPONENT.remove(b'@');

pub struct MailtoHandoff {
    brand: String,
}

impl MailtoHandoff {
    pub const NAME: &'static str = "mailto";

    pub fn new(brand: &str) -> Self {
        Self {
            brand: brand.to_string(),
        }
    }

    pub fn subject(notice: &SellerNotice) -> String {
        format!("Your item \"{}\" has been sold!", notice.item.name)
    }

    pub fn body(&self, notice: &SellerNotice) -> String {
        format!(
            "Hi {seller},\n\n\
             Great news! Your item \"{item}\" has been sold to {buyer} for ${price}.\n\n\
             Buyer Details:\n\
             - Name: {buyer}\n\
             - Email: {email}\n\
             - School: {school}\n\n\
             Please contact them to arrange payment and pickup.\n\n\
             Best regards,\n\
             {brand} Team\n",
            seller = notice.seller.name,
            item = notice.item.name,
            buyer = notice.buyer.name,
            price = notice.item.price,
            email = notice.buyer.email,
            school = notice.school_name(),
            brand = self.brand,
        )
    }

    /// `mailto:` URL with encoded subject and body
    pub fn url(&self, notice: &SellerNotice) -> String {
        format!(
            "mailto:{}?subject={}&body={}",
            utf8_percent_encode(notice.seller.email.trim(), ADDRESS),
            utf8_percent_encode(&Self::subject(notice), COMPONENT),
            utf8_percent_encode(&self.body(notice), COMPONENT),
        )
    }
}

#[async_trait]
impl NotificationChannel for MailtoHandoff {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn deliver(&self, notice: &SellerNotice) -> Result<NotificationReceipt, NotifyError> {
        Ok(NotificationReceipt::Handoff {
            mailto_url: self.url(notice),
        })
    }
}
