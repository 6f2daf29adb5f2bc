use serde::{Deserialize, Serialize};

/// Postal address used for profiles and as the shipping copy on orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street_number: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip_code: String,
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}, {}, {}, {}, {}",
            self.street_number, self.street, self.city, self.state, self.country, self.zip_code
        )
    }
}
