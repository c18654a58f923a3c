//! Rendering of the configurable order identifier and description strings
//! sent to the payment page.

use crate::entities::order;

/// Renders order-derived text from a configured template.
pub trait OrderTemplater: Send + Sync {
    fn render(&self, template: &str, order: &order::Model) -> String;
}

/// Replaces `{order_number}` and `{order_id}` placeholders.
pub struct PlaceholderTemplater;

impl OrderTemplater for PlaceholderTemplater {
    fn render(&self, template: &str, order: &order::Model) -> String {
        template
            .replace("{order_number}", &order.order_number)
            .replace("{order_id}", &order.id.to_string())
    }
}
