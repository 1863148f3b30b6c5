use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Role {
    Hr,
    Employee,
}

impl Role {
    pub fn is_hr(&self) -> bool {
        *self == Role::Hr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_round_trips_through_storage_form() {
        assert_eq!(Role::Hr.as_ref(), "HR");
        assert_eq!(Role::Employee.to_string(), "EMPLOYEE");
        assert_eq!(Role::from_str("HR").unwrap(), Role::Hr);
        assert!(Role::from_str("ADMIN").is_err());
    }

    #[test]
    fn role_serializes_uppercase() {
        let json = serde_json::to_string(&Role::Hr).unwrap();
        assert_eq!(json, "\"HR\"");
        let role: Role = serde_json::from_str("\"EMPLOYEE\"").unwrap();
        assert_eq!(role, Role::Employee);
    }
}
