use crate::UserId;

/// Builder for filtering orders.
///
/// Results are always ordered newest first (by placement time, then by
/// order number).
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Filter by owning customer.
    pub customer_id: Option<UserId>,

    /// Filter by status name, compared case-insensitively.
    pub status: Option<String>,

    /// Maximum number of orders to return.
    pub limit: Option<usize>,

    /// Number of orders to skip.
    pub offset: Option<usize>,
}

impl OrderQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for one customer's orders.
    pub fn for_customer(customer_id: UserId) -> Self {
        Self {
            customer_id: Some(customer_id),
            ..Default::default()
        }
    }

    /// Creates a query for orders in a given status.
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Default::default()
        }
    }

    pub fn customer(mut self, customer_id: UserId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if a status name passes the status filter.
    pub fn matches_status(&self, status: &str) -> bool {
        self.status
            .as_deref()
            .is_none_or(|wanted| wanted.eq_ignore_ascii_case(status))
    }
}
