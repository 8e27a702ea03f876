/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate an opaque identifier for new resources
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Serialize a `bool` as the strings `"true"` / `"false"`.
///
/// The triage UI treats the reviewed flag as a string; decoding also accepts
/// a plain JSON boolean.
pub mod bool_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "true" } else { "false" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => Ok(b),
            Raw::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" | "" => Ok(false),
                other => Err(serde::de::Error::custom(format!(
                    "invalid boolean string: {other}"
                ))),
            },
        }
    }

    /// Optional variant for request bodies where the flag may be omitted.
    pub fn deserialize_option<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<bool>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(deserialize_with = "deserialize")] bool);

        Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(b)| b))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Flag {
        #[serde(with = "super::bool_string")]
        reviewed: bool,
    }

    #[test]
    fn test_bool_string_serialize() {
        let json = serde_json::to_string(&Flag { reviewed: true }).unwrap();
        assert_eq!(json, r#"{"reviewed":"true"}"#);
    }

    #[test]
    fn test_bool_string_accepts_both_forms() {
        let a: Flag = serde_json::from_str(r#"{"reviewed":"false"}"#).unwrap();
        let b: Flag = serde_json::from_str(r#"{"reviewed":true}"#).unwrap();
        assert!(!a.reviewed);
        assert!(b.reviewed);
        assert!(serde_json::from_str::<Flag>(r#"{"reviewed":"maybe"}"#).is_err());
    }
}
