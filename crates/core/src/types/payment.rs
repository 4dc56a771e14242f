//! Payment record.

use serde::{Deserialize, Serialize};

use crate::types::id::{OrderId, PaymentId};
use crate::types::status::PaymentStatus;

/// A payment intent for one order.
///
/// `qr_string` is the opaque payload the shopper scans with their banking
/// app; it is rendered, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_string: Option<String>,
}
