use serde::{Deserialize, Serialize};
use time::Date;

use crate::activity::{store::Totals, sync::SyncReport};

/// `YYYY-MM-DD` on the wire.
pub mod iso_date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::{format_description::FormatItem, macros::format_description, Date};

    const FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

    pub fn serialize<S: Serializer>(date: &Date, s: S) -> Result<S::Ok, S::Error> {
        let text = date.format(FORMAT).map_err(serde::ser::Error::custom)?;
        s.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Date, D::Error> {
        let text = String::deserialize(d)?;
        Date::parse(&text, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    M,
    F,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::M => "M",
            Gender::F => "F",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(with = "iso_date")]
    pub birthdate: Date,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileDetails {
    pub username: String,
    pub email: String,
    pub gender: Option<String>,
    #[serde(with = "iso_date")]
    pub birthdate: Date,
    pub phone: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: ProfileDetails,
    pub totals: Totals,
    pub sync: SyncReport,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub image_url: String,
}
