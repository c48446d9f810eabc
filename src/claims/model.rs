use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be between {min} and {max} characters")]
    Length {
        field: &'static str,
        min: usize,
        max: usize,
    },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

fn check_len(field: &'static str, value: &str, min: usize, max: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if max == usize::MAX && len < min {
        return Err(ValidationError::TooShort { field, min });
    }
    if len < min || len > max {
        return Err(ValidationError::Length { field, min, max });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    #[default]
    Submitted,
    Processing,
    Approved,
    Denied,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub code: String,
    pub amount: f64,
    pub description: String,
}

/// Payload for submitting a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewClaim {
    pub patient_id: String,
    pub provider_id: String,
    pub service_date: NaiveDate,
    pub procedures: Vec<Procedure>,
    pub total_amount: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewClaim {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_len("patient_id", &self.patient_id, 1, usize::MAX)?;
        check_len("provider_id", &self.provider_id, 1, usize::MAX)?;
        if self.total_amount.is_nan() || self.total_amount <= 0.0 {
            return Err(ValidationError::NotPositive("total_amount"));
        }
        for procedure in &self.procedures {
            check_len("description", &procedure.description, 1, 500)?;
        }
        Ok(())
    }
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimUpdate {
    pub patient_id: Option<String>,
    pub provider_id: Option<String>,
    pub service_date: Option<NaiveDate>,
    pub procedures: Option<Vec<Procedure>>,
    pub total_amount: Option<f64>,
    pub notes: Option<String>,
    pub status: Option<ClaimStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: Uuid,
    pub user_id: Uuid,
    pub patient_id: String,
    pub provider_id: String,
    pub service_date: NaiveDate,
    pub procedures: Vec<Procedure>,
    pub total_amount: f64,
    pub status: ClaimStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Claim {
    pub fn new(user_id: Uuid, new: NewClaim) -> Self {
        let now = Utc::now();
        Claim {
            id: Uuid::new_v4(),
            user_id,
            patient_id: new.patient_id,
            provider_id: new.provider_id,
            service_date: new.service_date,
            procedures: new.procedures,
            total_amount: new.total_amount,
            status: ClaimStatus::default(),
            notes: new.notes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: ClaimUpdate) {
        if let Some(patient_id) = update.patient_id {
            self.patient_id = patient_id;
        }
        if let Some(provider_id) = update.provider_id {
            self.provider_id = provider_id;
        }
        if let Some(service_date) = update.service_date {
            self.service_date = service_date;
        }
        if let Some(procedures) = update.procedures {
            self.procedures = procedures;
        }
        if let Some(total_amount) = update.total_amount {
            self.total_amount = total_amount;
        }
        if let Some(notes) = update.notes {
            self.notes = Some(notes);
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        self.updated_at = Utc::now();
    }

    pub fn status_view(&self) -> ClaimStatusView {
        ClaimStatusView {
            id: self.id,
            status: self.status,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimStatusView {
    pub id: Uuid,
    pub status: ClaimStatus,
    pub updated_at: DateTime<Utc>,
}

/// Registration payload. The password is hashed before storage.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub full_name: String,
    pub username: String,
    pub password: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_len("full_name", &self.full_name, 2, 100)?;
        check_len("username", &self.username, 3, 50)?;
        check_len("password", &self.password, 8, usize::MAX)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn new_claim() -> NewClaim {
        NewClaim {
            patient_id: "P-100".to_string(),
            provider_id: "PR-7".to_string(),
            service_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            procedures: vec![Procedure {
                code: "99213".to_string(),
                amount: 150.0,
                description: "Office visit".to_string(),
            }],
            total_amount: 150.0,
            notes: None,
        }
    }

    #[test]
    fn claim_validation() {
        assert_eq!(new_claim().validate(), Ok(()));

        let mut claim = new_claim();
        claim.total_amount = 0.0;
        assert_eq!(claim.validate(), Err(ValidationError::NotPositive("total_amount")));

        let mut claim = new_claim();
        claim.patient_id.clear();
        assert!(claim.validate().is_err());

        let mut claim = new_claim();
        claim.procedures[0].description = "x".repeat(501);
        assert!(claim.validate().is_err());
    }

    #[test]
    fn user_validation() {
        let user = NewUser {
            full_name: "Ada Lovelace".to_string(),
            username: "ada".to_string(),
            password: "engine-notes".to_string(),
        };
        assert_eq!(user.validate(), Ok(()));

        let short = NewUser {
            password: "short".to_string(),
            ..user
        };
        assert!(short.validate().is_err());
    }

    #[test]
    fn update_only_touches_given_fields() {
        let mut claim = Claim::new(Uuid::new_v4(), new_claim());
        claim.apply(ClaimUpdate {
            status: Some(ClaimStatus::Approved),
            ..Default::default()
        });

        assert_eq!(claim.status, ClaimStatus::Approved);
        assert_eq!(claim.patient_id, "P-100");
        assert!(claim.updated_at >= claim.created_at);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_value(ClaimStatus::Denied).unwrap(), json!("denied"));
        let update: ClaimUpdate = serde_json::from_value(json!({ "status": "processing" })).unwrap();
        assert_eq!(update.status, Some(ClaimStatus::Processing));
    }
}
